//! Full re-index of the catalog.

use discovery_repository::{CatalogRepositoryError, CatalogService};
use discovery_search_repository::{RebuildOutcome, SearchIndexService};
use discovery_search_shared::SearchDocument;
use discovery_shared::{Course, CourseRun, Person, Program};
use tracing::{debug, info, instrument};

use crate::errors::OrchestratorError;
use crate::indexing::projection::Projector;

/// Documents for every indexable official row of every partner.
///
/// Retired rows and drafts are never listed. Runs of non-marketable types
/// and deleted programs are left out.
pub async fn collect_documents(catalog: &CatalogService) -> Result<Vec<SearchDocument>, CatalogRepositoryError> {
    let mut projector = Projector::new(catalog);
    let mut documents = Vec::new();
    let mut suppressed = 0usize;

    for partner in catalog.list_partners().await? {
        for course in catalog.repo::<Course>().list_by_partner(partner.id).await? {
            documents.push(projector.course_document(&course).await?);
        }
        for run in catalog.repo::<CourseRun>().list_by_partner(partner.id).await? {
            match projector.course_run_document(&run).await? {
                Some(doc) => documents.push(doc),
                None => {
                    debug!(key = %run.key, "Run type is not marketable");
                    suppressed += 1;
                }
            }
        }
        for program in catalog.repo::<Program>().list_by_partner(partner.id).await? {
            match projector.program_document(&program).await? {
                Some(doc) => documents.push(doc),
                None => suppressed += 1,
            }
        }
        for person in catalog.repo::<Person>().list_by_partner(partner.id).await? {
            documents.push(projector.person_document(&person).await?);
        }
    }

    info!(documents = documents.len(), suppressed, "Collected search documents");
    Ok(documents)
}

/// Loads the whole catalog into a new physical index and swaps the alias onto it.
#[instrument(skip(catalog, search), fields(alias = %search.alias()))]
pub async fn rebuild_index(
    catalog: &CatalogService,
    search: &SearchIndexService,
) -> Result<RebuildOutcome, OrchestratorError> {
    let documents = collect_documents(catalog).await?;
    Ok(search.rebuild(documents).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_repository::InMemoryCatalogStore;
    use discovery_search_repository::InMemorySearchProvider;
    use discovery_shared::{ChangeContext, Organization};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_rebuild_indexes_courses_and_runs() {
        let catalog = CatalogService::new(Arc::new(InMemoryCatalogStore::new()));
        let ctx = ChangeContext::refresh();
        let partner = catalog.ensure_partner("edx", "edX").await.unwrap();
        let org = catalog
            .save_organization(
                &Organization {
                    partner_id: partner.id,
                    key: "HarvardX".into(),
                    ..Default::default()
                },
                None,
                &ctx,
            )
            .await
            .unwrap()
            .into_entity();
        let course = catalog
            .save_course(
                &Course {
                    partner_id: partner.id,
                    key: "HarvardX+CS50".into(),
                    title: Some("Introduction to Computer Science".into()),
                    authoring_organization_ids: vec![org.id],
                    ..Default::default()
                },
                None,
                &ctx,
            )
            .await
            .unwrap()
            .into_entity();
        catalog
            .save_course_run(
                &CourseRun {
                    partner_id: partner.id,
                    course_id: course.id,
                    key: "course-v1:HarvardX+CS50+1T2020".into(),
                    ..Default::default()
                },
                None,
                &ctx,
            )
            .await
            .unwrap();

        let provider = Arc::new(InMemorySearchProvider::new());
        let search = SearchIndexService::new(provider.clone());
        let outcome = rebuild_index(&catalog, &search).await.unwrap();

        assert_eq!(outcome.indexed, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(provider.document_count(search.alias()).await, 2);
        let doc = provider
            .document(search.alias(), &course.uuid.to_string())
            .await
            .unwrap();
        assert_eq!(doc.organizations, vec!["HarvardX"]);
    }
}
