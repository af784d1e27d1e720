use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use discovery_search_repository::{
    InMemorySearchProvider, SearchIndexProvider, SearchIndexService, SearchIndexServiceConfig,
};
use discovery_search_shared::{ContentType, SearchDocument, SearchRequest};

fn course(title: &str) -> SearchDocument {
    let mut doc = SearchDocument::new(Uuid::new_v4(), ContentType::Course, "edx");
    doc.title = Some(title.to_string());
    doc
}

async fn seeded(alias: &str, index: &str) -> (Arc<InMemorySearchProvider>, SearchIndexService) {
    let provider = Arc::new(InMemorySearchProvider::new());
    provider.create_index(index, &json!({})).await.unwrap();
    provider.swap_alias(alias, index).await.unwrap();
    let service =
        SearchIndexService::with_config(provider.clone(), SearchIndexServiceConfig::new(alias));
    (provider, service)
}

#[tokio::test]
async fn rebuild_swaps_alias_and_janitor_removes_old_index() {
    let (provider, service) = seeded("courses", "courses_20240101000000").await;
    provider
        .index_document("courses", &course("Stale course"))
        .await
        .unwrap();

    let outcome = service
        .rebuild(vec![course("Fresh one"), course("Fresh two")])
        .await
        .unwrap();
    assert_eq!(outcome.previous.as_deref(), Some("courses_20240101000000"));
    assert_eq!(
        provider.alias_target("courses").await.unwrap(),
        Some(outcome.index.clone())
    );
    assert!(outcome.index.starts_with("courses_"));
    assert_eq!(provider.document_count("courses").await, 2);

    // The new index carries the analyzers and mappings.
    let settings = provider.settings_of(&outcome.index).await.unwrap();
    assert!(settings["settings"]["analysis"]["filter"]["catalog_synonyms"].is_object());

    let deleted = service.prune_indices(Some(1)).await.unwrap();
    assert_eq!(deleted, vec!["courses_20240101000000".to_string()]);
    assert_eq!(provider.index_names().await, vec![outcome.index]);
}

#[tokio::test]
async fn janitor_never_deletes_the_live_index() {
    let (provider, service) = seeded("courses", "courses_20240101000000").await;
    // Newer indices that are not live, e.g. from failed rebuilds.
    for name in ["courses_20240201000000", "courses_20240301000000"] {
        provider.create_index(name, &json!({})).await.unwrap();
    }

    let deleted = service.prune_indices(Some(1)).await.unwrap();
    assert_eq!(deleted, vec!["courses_20240201000000".to_string()]);

    let deleted = service.prune_indices(Some(0)).await.unwrap();
    assert_eq!(deleted, vec!["courses_20240301000000".to_string()]);
    assert_eq!(
        provider.index_names().await,
        vec!["courses_20240101000000".to_string()]
    );
}

#[tokio::test]
async fn reads_keep_working_while_rebuild_loads() {
    let (provider, service) = seeded("courses", "courses_20240101000000").await;
    service.upsert(&course("Live course")).await.unwrap();

    // A second index being filled does not affect the alias.
    provider
        .create_index("courses_20990101000000", &json!({}))
        .await
        .unwrap();
    provider
        .bulk_index("courses_20990101000000", &[course("Not yet live")])
        .await
        .unwrap();

    let response = service
        .search(&SearchRequest::new("live"), None)
        .await
        .unwrap();
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].document.title.as_deref(), Some("Live course"));
}

#[tokio::test]
async fn ensure_alias_creates_index_once() {
    let provider = Arc::new(InMemorySearchProvider::new());
    let service = SearchIndexService::new(provider.clone());

    let first = service.ensure_alias().await.unwrap();
    let second = service.ensure_alias().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(provider.index_names().await.len(), 1);
}

#[tokio::test]
async fn delete_of_missing_document_succeeds() {
    let (_provider, service) = seeded("courses", "courses_20240101000000").await;
    service
        .delete(&Uuid::new_v4().to_string())
        .await
        .unwrap();
}
