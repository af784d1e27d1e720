//! Index settings, analyzers and mappings for the catalog index.
//!
//! Exact-match fields are `keyword`. Free text (`title`, `text`) goes through
//! an English analyzer extended with the synonym filter, which is fixed at
//! index creation time; changing the synonym list takes a rebuild.

use serde_json::{json, Value};

/// Synonym groups loaded into every new index: organization short codes,
/// common misspellings, subject abbreviations and technology acronyms.
pub const SYNONYMS: &[&str] = &[
    // organizations
    "harvardx, harvard",
    "mitx, mit, massachusetts institute of technology",
    "berkeleyx, berkeley, uc berkeley",
    "delftx, delft, tu delft",
    "ubcx, ubc, university of british columbia",
    // misspellings
    "psychology, pyschology, phsychology",
    "chinese, chineese",
    "entrepreneurship, entreprenurship, entrepenurship",
    "excel, exel",
    // subject abbreviations
    "cs, computer science",
    "econ, economics",
    "bio, biology",
    "chem, chemistry",
    "stats, statistics",
    // technology acronyms
    "ai, artificial intelligence",
    "ml, machine learning",
    "iot, internet of things",
    "sql, structured query language",
    "ux, user experience",
];

/// Settings and mappings for a new physical index.
pub fn index_settings(synonyms: &[&str]) -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "filter": {
                    "catalog_synonyms": {
                        "type": "synonym",
                        "synonyms": synonyms
                    },
                    "english_stop": {
                        "type": "stop",
                        "stopwords": "_english_"
                    },
                    "english_stemmer": {
                        "type": "stemmer",
                        "language": "english"
                    },
                    "english_possessive_stemmer": {
                        "type": "stemmer",
                        "language": "possessive_english"
                    }
                },
                "analyzer": {
                    "catalog_english": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": [
                            "english_possessive_stemmer",
                            "lowercase",
                            "catalog_synonyms",
                            "english_stop",
                            "english_stemmer"
                        ]
                    },
                    "lowercase_keyword": {
                        "type": "custom",
                        "tokenizer": "keyword",
                        "filter": ["lowercase"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "uuid": { "type": "keyword" },
                "content_type": { "type": "keyword" },
                "partner": { "type": "keyword" },
                "key": {
                    "type": "keyword",
                    "fields": {
                        "lower": { "type": "text", "analyzer": "lowercase_keyword" }
                    }
                },
                "title": {
                    "type": "text",
                    "analyzer": "catalog_english",
                    "fields": {
                        "raw": { "type": "keyword" }
                    }
                },
                "organizations": { "type": "keyword" },
                "subjects": { "type": "keyword" },
                "prerequisites": { "type": "keyword" },
                "level_type": { "type": "keyword" },
                "language": { "type": "keyword" },
                "transcript_languages": { "type": "keyword" },
                "start": { "type": "date" },
                "end": { "type": "date" },
                "pacing_type": { "type": "keyword" },
                "status": { "type": "keyword" },
                "mobile_available": { "type": "boolean" },
                "hidden": { "type": "boolean" },
                "program_type": { "type": "keyword" },
                "course_key": { "type": "keyword" },
                "card_image_url": { "type": "keyword", "index": false },
                "text": { "type": "text", "analyzer": "catalog_english" },
                "indexed_at": { "type": "date" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonyms_loaded_into_filter() {
        let settings = index_settings(SYNONYMS);
        let filter = &settings["settings"]["analysis"]["filter"]["catalog_synonyms"];
        assert_eq!(filter["type"], "synonym");
        assert_eq!(filter["synonyms"].as_array().unwrap().len(), SYNONYMS.len());
    }

    #[test]
    fn test_free_text_uses_english_analyzer() {
        let settings = index_settings(SYNONYMS);
        let props = &settings["mappings"]["properties"];
        assert_eq!(props["text"]["analyzer"], "catalog_english");
        assert_eq!(props["title"]["analyzer"], "catalog_english");
        assert_eq!(props["organizations"]["type"], "keyword");
        assert_eq!(props["pacing_type"]["type"], "keyword");
    }

    #[test]
    fn test_synonym_groups_are_lowercase() {
        for group in SYNONYMS {
            assert_eq!(*group, group.to_lowercase());
        }
    }
}
