//! In-memory search provider for tests and local runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use discovery_search_shared::{
    normalize_query, query::RESERVED_OPERATORS, BoostConfig, FacetCount, SearchDocument,
    SearchHit, SearchRequest, SearchResponse, FACET_FIELDS,
};

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::BatchOperationSummary;

#[derive(Default)]
struct MemoryIndex {
    settings: Value,
    documents: BTreeMap<String, SearchDocument>,
}

#[derive(Default)]
struct MemoryState {
    indices: HashMap<String, MemoryIndex>,
    aliases: HashMap<String, String>,
    unavailable: bool,
}

impl MemoryState {
    fn check(&self) -> Result<(), SearchIndexError> {
        if self.unavailable {
            return Err(SearchIndexError::connection("search engine unavailable"));
        }
        Ok(())
    }

    fn resolve(&self, target: &str) -> Result<String, SearchIndexError> {
        if let Some(index) = self.aliases.get(target) {
            return Ok(index.clone());
        }
        if self.indices.contains_key(target) {
            return Ok(target.to_string());
        }
        Err(SearchIndexError::index_not_found(target))
    }
}

/// Keeps indices, aliases and documents in process memory.
///
/// Text matching is a plain term count over title and text, good enough to
/// exercise ranking-independent behaviour. `set_unavailable(true)` makes every
/// call fail with a connection error.
#[derive(Default)]
pub struct InMemorySearchProvider {
    state: RwLock<MemoryState>,
}

impl InMemorySearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    pub async fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().await.indices.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn document(&self, target: &str, document_id: &str) -> Option<SearchDocument> {
        let state = self.state.read().await;
        let index = state.resolve(target).ok()?;
        state.indices.get(&index)?.documents.get(document_id).cloned()
    }

    pub async fn document_count(&self, target: &str) -> usize {
        let state = self.state.read().await;
        state
            .resolve(target)
            .ok()
            .and_then(|index| state.indices.get(&index))
            .map(|i| i.documents.len())
            .unwrap_or(0)
    }

    pub async fn settings_of(&self, index: &str) -> Option<Value> {
        self.state
            .read()
            .await
            .indices
            .get(index)
            .map(|i| i.settings.clone())
    }
}

/// Lowercased terms of a query, without boolean operators.
fn query_terms(query: &str) -> Vec<String> {
    normalize_query(query)
        .split(' ')
        .filter(|t| !t.is_empty())
        .filter(|t| !RESERVED_OPERATORS.iter().any(|op| op.eq_ignore_ascii_case(t)))
        .map(|t| t.to_lowercase())
        .collect()
}

fn score(doc: &SearchDocument, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 1.0;
    }
    let haystack = format!(
        "{} {}",
        doc.title.as_deref().unwrap_or_default(),
        doc.text
    )
    .to_lowercase();
    let words: Vec<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    terms
        .iter()
        .filter(|term| match term.strip_suffix('*') {
            Some(prefix) => words.iter().any(|w| w.starts_with(prefix)),
            None => words.iter().any(|w| w == term),
        })
        .count() as f64
}

fn facet_counts(docs: &[&SearchDocument]) -> BTreeMap<String, Vec<FacetCount>> {
    let mut facets = BTreeMap::new();
    for field in FACET_FIELDS {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for doc in docs {
            for value in doc.facet_values(field) {
                *counts.entry(value).or_default() += 1;
            }
        }
        if counts.is_empty() {
            continue;
        }
        let mut buckets: Vec<FacetCount> = counts
            .into_iter()
            .map(|(value, count)| FacetCount { value, count })
            .collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        facets.insert(field.to_string(), buckets);
    }
    facets
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchProvider {
    async fn create_index(&self, index: &str, settings: &Value) -> Result<(), SearchIndexError> {
        let mut state = self.state.write().await;
        state.check()?;
        if state.indices.contains_key(index) {
            return Err(SearchIndexError::index_creation(format!(
                "index {} already exists",
                index
            )));
        }
        state.indices.insert(
            index.to_string(),
            MemoryIndex {
                settings: settings.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        let mut state = self.state.write().await;
        state.check()?;
        if state.indices.remove(index).is_none() {
            return Err(SearchIndexError::index_not_found(index));
        }
        state.aliases.retain(|_, bound| bound != index);
        Ok(())
    }

    async fn list_indices(&self, alias: &str) -> Result<Vec<String>, SearchIndexError> {
        let state = self.state.read().await;
        state.check()?;
        let prefix = format!("{}_", alias);
        let mut names: Vec<String> = state
            .indices
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn alias_target(&self, alias: &str) -> Result<Option<String>, SearchIndexError> {
        let state = self.state.read().await;
        state.check()?;
        Ok(state.aliases.get(alias).cloned())
    }

    async fn swap_alias(&self, alias: &str, index: &str) -> Result<(), SearchIndexError> {
        let mut state = self.state.write().await;
        state.check()?;
        if !state.indices.contains_key(index) {
            return Err(SearchIndexError::index_not_found(index));
        }
        state.aliases.insert(alias.to_string(), index.to_string());
        Ok(())
    }

    async fn bulk_index(
        &self,
        index: &str,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let mut state = self.state.write().await;
        state.check()?;
        let target = state
            .indices
            .get_mut(index)
            .ok_or_else(|| SearchIndexError::index_not_found(index))?;

        let mut summary = BatchOperationSummary::default();
        for doc in documents {
            let id = doc.document_id();
            target.documents.insert(id.clone(), doc.clone());
            summary.record(id, Ok(()));
        }
        Ok(summary)
    }

    async fn index_document(
        &self,
        target: &str,
        document: &SearchDocument,
    ) -> Result<(), SearchIndexError> {
        let mut state = self.state.write().await;
        state.check()?;
        let index = state.resolve(target)?;
        if let Some(i) = state.indices.get_mut(&index) {
            i.documents.insert(document.document_id(), document.clone());
        }
        Ok(())
    }

    async fn delete_document(
        &self,
        target: &str,
        document_id: &str,
    ) -> Result<(), SearchIndexError> {
        let mut state = self.state.write().await;
        state.check()?;
        let index = state.resolve(target)?;
        if let Some(i) = state.indices.get_mut(&index) {
            i.documents.remove(document_id);
        }
        Ok(())
    }

    async fn search(
        &self,
        target: &str,
        request: &SearchRequest,
        _boost: Option<&BoostConfig>,
    ) -> Result<SearchResponse, SearchIndexError> {
        let state = self.state.read().await;
        state.check()?;
        let index = state.resolve(target)?;
        let Some(memory_index) = state.indices.get(&index) else {
            return Ok(SearchResponse::empty());
        };

        let terms = query_terms(&request.query);
        let mut matched: Vec<(f64, &SearchDocument)> = memory_index
            .documents
            .values()
            .filter(|doc| request.accepts(doc))
            .map(|doc| (score(doc, &terms), doc))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        matched.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let facets = if request.facets {
            facet_counts(&matched.iter().map(|(_, d)| *d).collect::<Vec<_>>())
        } else {
            BTreeMap::new()
        };

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .skip(request.offset())
            .take(request.effective_page_size())
            .map(|(score, doc)| SearchHit {
                score,
                document: doc.clone(),
            })
            .collect();

        Ok(SearchResponse {
            total,
            hits,
            facets,
            took_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_search_shared::ContentType;
    use serde_json::json;
    use uuid::Uuid;

    fn course(title: &str, org: &str) -> SearchDocument {
        let mut doc = SearchDocument::new(Uuid::new_v4(), ContentType::Course, "edx");
        doc.title = Some(title.to_string());
        doc.organizations = vec![org.to_string()];
        doc
    }

    #[tokio::test]
    async fn test_search_matches_terms_and_prefixes() {
        let provider = InMemorySearchProvider::new();
        provider.create_index("catalog_1", &json!({})).await.unwrap();
        provider.swap_alias("catalog", "catalog_1").await.unwrap();
        provider
            .bulk_index(
                "catalog_1",
                &[
                    course("Introduction to Python", "MITx: MIT"),
                    course("Data Science", "HarvardX: Harvard"),
                ],
            )
            .await
            .unwrap();

        let response = provider
            .search("catalog", &SearchRequest::new("pyth*"), None)
            .await
            .unwrap();
        assert_eq!(response.total, 1);

        let response = provider
            .search("catalog", &SearchRequest::new("python and data"), None)
            .await
            .unwrap();
        assert_eq!(response.total, 2);

        let response = provider
            .search("catalog", &SearchRequest::new("").with_facets(), None)
            .await
            .unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.facets["organizations"].len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_document_is_ok() {
        let provider = InMemorySearchProvider::new();
        provider.create_index("catalog_1", &json!({})).await.unwrap();
        provider.delete_document("catalog_1", "nope").await.unwrap();
        assert!(matches!(
            provider.delete_document("absent", "nope").await,
            Err(SearchIndexError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let provider = InMemorySearchProvider::new();
        provider.set_unavailable(true).await;
        assert!(matches!(
            provider.list_indices("catalog").await,
            Err(SearchIndexError::ConnectionError(_))
        ));
    }
}
