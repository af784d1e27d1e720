//! The document stored in the search index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of catalog entity a document was projected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Course,
    CourseRun,
    Program,
    Person,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [
        ContentType::Course,
        ContentType::CourseRun,
        ContentType::Program,
        ContentType::Person,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Course => "course",
            ContentType::CourseRun => "course_run",
            ContentType::Program => "program",
            ContentType::Person => "person",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search projection of one catalog entity.
///
/// The document id in the index is [`SearchDocument::uuid`], which makes
/// repeated writes of the same entity idempotent. Organization labels are
/// `"{key}: {name}"`. `text` concatenates every free-text field the entity
/// contributes to relevance scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub uuid: Uuid,
    pub content_type: Option<ContentType>,
    pub partner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub transcript_languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pacing_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_available: Option<bool>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_type: Option<String>,
    /// Key of the parent course, for runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_image_url: Option<String>,
    pub text: String,
    pub indexed_at: DateTime<Utc>,
}

impl SearchDocument {
    pub fn new(uuid: Uuid, content_type: ContentType, partner: impl Into<String>) -> Self {
        Self {
            uuid,
            content_type: Some(content_type),
            partner: partner.into(),
            indexed_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn document_id(&self) -> String {
        self.uuid.to_string()
    }

    /// Values of a facet field, as aggregated by the search engine.
    pub fn facet_values(&self, field: &str) -> Vec<String> {
        match field {
            "content_type" => self
                .content_type
                .map(|t| vec![t.as_str().to_string()])
                .unwrap_or_default(),
            "organizations" => self.organizations.clone(),
            "subjects" => self.subjects.clone(),
            "pacing_type" => self.pacing_type.iter().cloned().collect(),
            "level_type" => self.level_type.iter().cloned().collect(),
            "language" => self.language.iter().cloned().collect(),
            "partner" => vec![self.partner.clone()],
            _ => Vec::new(),
        }
    }
}

/// Joins the non-empty parts of a document's free text, one per line.
pub fn render_text<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_labels() {
        for t in ContentType::ALL {
            assert_eq!(ContentType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ContentType::parse("organization"), None);
        assert_eq!(
            serde_json::to_value(ContentType::CourseRun).unwrap(),
            serde_json::json!("course_run")
        );
    }

    #[test]
    fn test_render_text_skips_blanks() {
        let text = render_text([Some("Intro to Python"), None, Some("  "), Some(" MITx ")]);
        assert_eq!(text, "Intro to Python\nMITx");
    }

    #[test]
    fn test_serialization_omits_missing_fields() {
        let doc = SearchDocument::new(Uuid::nil(), ContentType::Course, "edx");
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("title").is_none());
        assert_eq!(value["content_type"], "course");
        assert_eq!(value["partner"], "edx");
    }
}
