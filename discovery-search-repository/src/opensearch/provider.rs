//! OpenSearch provider implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use opensearch::{
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCreateParts, IndicesDeleteParts, IndicesGetAliasParts, IndicesGetParts,
        IndicesRefreshParts,
    },
    BulkOperation, BulkOperations, BulkParts, DeleteParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use discovery_search_shared::{
    build_search_body, BoostConfig, FacetCount, SearchDocument, SearchHit, SearchRequest,
    SearchResponse, FACET_FIELDS,
};

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::BatchOperationSummary;

/// OpenSearch-backed provider.
///
/// ```ignore
/// let provider = OpenSearchProvider::new("http://localhost:9200").await?;
/// provider.ping().await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    pub async fn new(url: &str) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Checks that the cluster answers.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self.client.ping().send().await?;
        if !response.status_code().is_success() {
            return Err(SearchIndexError::connection(format!(
                "ping returned {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    /// Reads the body of a failed response into an error.
    async fn failure(
        response: Response,
        make: fn(String) -> SearchIndexError,
        operation: &str,
    ) -> SearchIndexError {
        let status = response.status_code();
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, operation, "OpenSearch request failed");
        make(format!("{} failed with status {}: {}", operation, status, body))
    }

    async fn refresh(&self, index: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await?;
        if !response.status_code().is_success() {
            return Err(Self::failure(response, SearchIndexError::index, "Refresh").await);
        }
        Ok(())
    }

    fn parse_bulk_response(
        documents: &[SearchDocument],
        body: &Value,
    ) -> BatchOperationSummary {
        let mut summary = BatchOperationSummary::default();
        let items = body["items"].as_array().cloned().unwrap_or_default();
        for (doc, item) in documents.iter().zip(items.iter()) {
            let result = &item["index"];
            let status = result["status"].as_u64().unwrap_or(500);
            let outcome = if (200..300).contains(&status) {
                Ok(())
            } else {
                Err(SearchIndexError::bulk_index(format!(
                    "status {}: {}",
                    status, result["error"]
                )))
            };
            summary.record(doc.document_id(), outcome);
        }
        // Items missing from the response are failures.
        for doc in documents.iter().skip(items.len()) {
            summary.record(
                doc.document_id(),
                Err(SearchIndexError::bulk_index("no result returned")),
            );
        }
        summary
    }

    fn parse_search_response(body: &Value) -> Result<SearchResponse, SearchIndexError> {
        let mut hits = Vec::new();
        for hit in body["hits"]["hits"].as_array().cloned().unwrap_or_default() {
            let document: SearchDocument = serde_json::from_value(hit["_source"].clone())
                .map_err(|e| SearchIndexError::parse(e.to_string()))?;
            hits.push(SearchHit {
                score: hit["_score"].as_f64().unwrap_or(0.0),
                document,
            });
        }

        let mut facets = BTreeMap::new();
        if let Some(aggs) = body.get("aggregations") {
            for field in FACET_FIELDS {
                let buckets = aggs[field]["buckets"].as_array().cloned().unwrap_or_default();
                if buckets.is_empty() {
                    continue;
                }
                let counts = buckets
                    .iter()
                    .map(|b| FacetCount {
                        value: match &b["key"] {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        },
                        count: b["doc_count"].as_u64().unwrap_or(0),
                    })
                    .collect();
                facets.insert(field.to_string(), counts);
            }
        }

        Ok(SearchResponse {
            total: body["hits"]["total"]["value"].as_u64().unwrap_or(hits.len() as u64),
            hits,
            facets,
            took_ms: body["took"].as_u64().unwrap_or(0),
        })
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn create_index(&self, index: &str, settings: &Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(settings.clone())
            .send()
            .await?;
        if !response.status_code().is_success() {
            return Err(
                Self::failure(response, SearchIndexError::index_creation, "Create index").await,
            );
        }
        info!(index, "Created index");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await?;
        if response.status_code().as_u16() == 404 {
            return Err(SearchIndexError::index_not_found(index));
        }
        if !response.status_code().is_success() {
            return Err(Self::failure(response, SearchIndexError::delete, "Delete index").await);
        }
        info!(index, "Deleted index");
        Ok(())
    }

    async fn list_indices(&self, alias: &str) -> Result<Vec<String>, SearchIndexError> {
        let pattern = format!("{}_*", alias);
        let response = self
            .client
            .indices()
            .get(IndicesGetParts::Index(&[&pattern]))
            .send()
            .await?;
        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !response.status_code().is_success() {
            return Err(Self::failure(response, SearchIndexError::index, "List indices").await);
        }
        let body: Value = response.json().await?;
        Ok(body
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn alias_target(&self, alias: &str) -> Result<Option<String>, SearchIndexError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await?;
        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status_code().is_success() {
            return Err(Self::failure(response, SearchIndexError::alias, "Get alias").await);
        }
        let body: Value = response.json().await?;
        Ok(body.as_object().and_then(|m| m.keys().next().cloned()))
    }

    async fn swap_alias(&self, alias: &str, index: &str) -> Result<(), SearchIndexError> {
        let mut actions = Vec::new();
        if self.alias_target(alias).await?.is_some() {
            actions.push(json!({ "remove": { "index": "*", "alias": alias } }));
        }
        actions.push(json!({ "add": { "index": index, "alias": alias } }));

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": actions }))
            .send()
            .await?;
        if !response.status_code().is_success() {
            return Err(Self::failure(response, SearchIndexError::alias, "Swap alias").await);
        }
        info!(alias, index, "Alias swapped");
        Ok(())
    }

    async fn bulk_index(
        &self,
        index: &str,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }
        let mut ops = BulkOperations::new();
        for doc in documents {
            ops.push(BulkOperation::index(doc).id(doc.document_id()))
                .map_err(|e| SearchIndexError::serialization(e.to_string()))?;
        }

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(vec![ops])
            .send()
            .await?;
        if !response.status_code().is_success() {
            return Err(Self::failure(response, SearchIndexError::bulk_index, "Bulk index").await);
        }
        let body: Value = response.json().await?;
        let summary = Self::parse_bulk_response(documents, &body);
        self.refresh(index).await?;

        debug!(
            index,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk indexed documents"
        );
        Ok(summary)
    }

    async fn index_document(
        &self,
        target: &str,
        document: &SearchDocument,
    ) -> Result<(), SearchIndexError> {
        let doc_id = document.document_id();
        let response = self
            .client
            .index(IndexParts::IndexId(target, &doc_id))
            .body(document)
            .send()
            .await?;
        if !response.status_code().is_success() {
            return Err(Self::failure(response, SearchIndexError::index, "Index document").await);
        }
        debug!(doc_id = %doc_id, target, "Document indexed");
        Ok(())
    }

    async fn delete_document(
        &self,
        target: &str,
        document_id: &str,
    ) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(target, document_id))
            .send()
            .await?;

        // 404 is acceptable - document may not exist
        let status = response.status_code();
        if !status.is_success() && status.as_u16() != 404 {
            return Err(Self::failure(response, SearchIndexError::delete, "Delete document").await);
        }
        debug!(doc_id = %document_id, target, "Document deleted");
        Ok(())
    }

    async fn search(
        &self,
        target: &str,
        request: &SearchRequest,
        boost: Option<&BoostConfig>,
    ) -> Result<SearchResponse, SearchIndexError> {
        let body = build_search_body(request, boost);
        let response = self
            .client
            .search(SearchParts::Index(&[target]))
            .body(body)
            .send()
            .await?;
        if !response.status_code().is_success() {
            return Err(Self::failure(response, SearchIndexError::search, "Search").await);
        }
        let body: Value = response.json().await?;
        Self::parse_search_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_search_shared::ContentType;
    use uuid::Uuid;

    fn doc() -> SearchDocument {
        SearchDocument::new(Uuid::new_v4(), ContentType::Course, "edx")
    }

    #[test]
    fn test_parse_bulk_response_partial_failure() {
        let docs = vec![doc(), doc(), doc()];
        let body = json!({
            "errors": true,
            "items": [
                {"index": {"_id": docs[0].document_id(), "status": 201}},
                {"index": {"_id": docs[1].document_id(), "status": 400, "error": {"type": "mapper_parsing_exception"}}}
            ]
        });
        let summary = OpenSearchProvider::parse_bulk_response(&docs, &body);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.results[0].document_id, docs[0].document_id());
    }

    #[test]
    fn test_parse_search_response() {
        let source = serde_json::to_value(doc()).unwrap();
        let body = json!({
            "took": 7,
            "hits": {
                "total": {"value": 12, "relation": "eq"},
                "hits": [{"_id": "x", "_score": 1.5, "_source": source}]
            },
            "aggregations": {
                "content_type": {"buckets": [{"key": "course", "doc_count": 12}]},
                "subjects": {"buckets": []}
            }
        });
        let response = OpenSearchProvider::parse_search_response(&body).unwrap();
        assert_eq!(response.total, 12);
        assert_eq!(response.took_ms, 7);
        assert_eq!(response.hits[0].score, 1.5);
        assert_eq!(
            response.facets["content_type"],
            vec![FacetCount {
                value: "course".into(),
                count: 12
            }]
        );
        assert!(!response.facets.contains_key("subjects"));
    }
}
