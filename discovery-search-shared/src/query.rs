//! Query cleanup and construction.
//!
//! User input goes through [`normalize_query`] before it reaches the engine:
//! the query is case-folded and the reserved boolean operators are restored
//! to upper case when they stand alone between other words. The cleaned
//! string is issued as a `query_string` query against the `text` field.

use serde_json::{json, Value};

use crate::boost::BoostConfig;
use crate::types::SearchRequest;

/// Words the query parser treats as operators only in upper case.
pub const RESERVED_OPERATORS: [&str; 4] = ["and", "or", "not", "to"];

/// Keyword fields aggregated for faceted search.
pub const FACET_FIELDS: [&str; 6] = [
    "content_type",
    "organizations",
    "subjects",
    "pacing_type",
    "level_type",
    "language",
];

const FACET_SIZE: usize = 50;

/// Case-folds a query and upper-cases stand-alone `and`, `or`, `not` and `to`.
///
/// `"Python and Data or R"` becomes `"python AND data OR r"`. Operators at the
/// very start or end of the query are left folded.
pub fn normalize_query(query: &str) -> String {
    let lowered = query.trim().to_lowercase();
    let tokens: Vec<&str> = lowered.split(' ').collect();
    let last = tokens.len().saturating_sub(1);
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            if i > 0 && i < last && RESERVED_OPERATORS.contains(token) {
                token.to_uppercase()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The `query_string` clause for a cleaned query, or `match_all` when empty.
pub fn query_string_clause(query: &str) -> Value {
    let cleaned = normalize_query(query);
    if cleaned.is_empty() {
        return json!({ "match_all": {} });
    }
    json!({
        "query_string": {
            "query": cleaned,
            "default_field": "text",
            "analyze_wildcard": true,
            "auto_generate_synonyms_phrase_query": true,
            "fuzzy_transpositions": false,
            "lenient": true
        }
    })
}

fn filter_clauses(request: &SearchRequest) -> Vec<Value> {
    let mut filters = Vec::new();
    if !request.content_types.is_empty() {
        let types: Vec<&str> = request.content_types.iter().map(|t| t.as_str()).collect();
        filters.push(json!({ "terms": { "content_type": types } }));
    }
    if let Some(partner) = &request.partner {
        filters.push(json!({ "term": { "partner": partner } }));
    }
    if request.hide_hidden {
        filters.push(json!({ "term": { "hidden": false } }));
    }
    for (field, value) in &request.filters {
        filters.push(json!({ "term": { field.as_str(): value } }));
    }
    filters
}

/// Builds the request body for a search.
///
/// Without filters the query is issued at the top level; with a model filter
/// or any other restriction it is wrapped in a filtered `bool` query. The
/// boost configuration, when given, wraps the result in its function score.
pub fn build_search_body(request: &SearchRequest, boost: Option<&BoostConfig>) -> Value {
    let clause = query_string_clause(&request.query);
    let filters = filter_clauses(request);
    let query = if filters.is_empty() {
        clause
    } else {
        json!({ "bool": { "must": clause, "filter": filters } })
    };
    let query = match boost {
        Some(boost) => boost.wrap(query),
        None => query,
    };

    let mut body = json!({
        "query": query,
        "from": request.offset(),
        "size": request.effective_page_size(),
        "track_total_hits": true
    });
    if request.facets {
        let aggs: serde_json::Map<String, Value> = FACET_FIELDS
            .iter()
            .map(|field| {
                (
                    field.to_string(),
                    json!({ "terms": { "field": field, "size": FACET_SIZE } }),
                )
            })
            .collect();
        body["aggs"] = Value::Object(aggs);
    }
    body
}
