//! Search request and response types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::document::{ContentType, SearchDocument};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// A search against the catalog index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Raw user query; cleaned with [`crate::normalize_query`] before use.
    #[serde(default)]
    pub query: String,
    /// Model filter. Empty means every content type.
    #[serde(default)]
    pub content_types: Vec<ContentType>,
    #[serde(default)]
    pub partner: Option<String>,
    /// Exact-match facet filters, field to accepted value.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    /// Drop documents flagged hidden. Off unless asked for.
    #[serde(default)]
    pub hide_hidden: bool,
    /// One-based page number.
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub facets: bool,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: default_page(),
            page_size: default_page_size(),
            ..Default::default()
        }
    }

    pub fn of_type(mut self, content_type: ContentType) -> Self {
        self.content_types.push(content_type);
        self
    }

    pub fn for_partner(mut self, partner: impl Into<String>) -> Self {
        self.partner = Some(partner.into());
        self
    }

    pub fn with_facets(mut self) -> Self {
        self.facets = true;
        self
    }

    pub fn paginate(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1) * self.effective_page_size()
    }

    /// Whether a document passes the structured part of the request.
    pub fn accepts(&self, doc: &SearchDocument) -> bool {
        if self.hide_hidden && doc.hidden {
            return false;
        }
        if !self.content_types.is_empty()
            && !doc
                .content_type
                .map(|t| self.content_types.contains(&t))
                .unwrap_or(false)
        {
            return false;
        }
        if let Some(partner) = &self.partner {
            if &doc.partner != partner {
                return false;
            }
        }
        self.filters
            .iter()
            .all(|(field, value)| doc.facet_values(field).iter().any(|v| v == value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f64,
    pub document: SearchDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total: u64,
    pub hits: Vec<SearchHit>,
    /// Facet field to counts, largest first.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, Vec<FacetCount>>,
    pub took_ms: u64,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &SearchDocument> {
        self.hits.iter().map(|h| &h.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn run(partner: &str, hidden: bool) -> SearchDocument {
        let mut doc = SearchDocument::new(Uuid::new_v4(), ContentType::CourseRun, partner);
        doc.hidden = hidden;
        doc.pacing_type = Some("self_paced".into());
        doc
    }

    #[test]
    fn test_accepts_model_filter_and_partner() {
        let request = SearchRequest::new("python")
            .of_type(ContentType::CourseRun)
            .for_partner("edx");
        assert!(request.accepts(&run("edx", false)));
        assert!(!request.accepts(&run("mitx", false)));
        assert!(request.accepts(&run("edx", true)));

        let courses_only = SearchRequest::new("").of_type(ContentType::Course);
        assert!(!courses_only.accepts(&run("edx", false)));
    }

    #[test]
    fn test_hidden_documents_dropped_only_on_request() {
        let mut request = SearchRequest::new("");
        assert!(request.accepts(&run("edx", true)));

        request.hide_hidden = true;
        assert!(!request.accepts(&run("edx", true)));
        assert!(request.accepts(&run("edx", false)));
    }

    #[test]
    fn test_accepts_facet_filters() {
        let mut request = SearchRequest::new("");
        request
            .filters
            .insert("pacing_type".into(), "instructor_paced".into());
        assert!(!request.accepts(&run("edx", false)));

        request.filters.insert("pacing_type".into(), "self_paced".into());
        assert!(request.accepts(&run("edx", false)));
    }

    #[test]
    fn test_pagination_bounds() {
        let request = SearchRequest::new("").paginate(3, 500);
        assert_eq!(request.effective_page_size(), MAX_PAGE_SIZE);
        assert_eq!(request.offset(), 200);
        assert_eq!(SearchRequest::new("").paginate(0, 10).offset(), 0);
    }
}
