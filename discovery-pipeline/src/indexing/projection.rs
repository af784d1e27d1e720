//! Projection of catalog rows onto search documents.

use std::collections::HashMap;

use discovery_repository::{CatalogRepositoryError, CatalogService};
use discovery_search_shared::{render_text, ContentType, SearchDocument};
use discovery_shared::{
    CatalogEntity, Course, CourseRun, CourseRunType, LanguageTag, LevelType, Organization,
    Person, Prerequisite, Program, ProgramStatus, Subject,
};

/// Builds documents, caching the labels of related rows it looks up.
///
/// One projector serves a whole rebuild. Realtime indexing uses a fresh one
/// per change so labels are never stale.
pub struct Projector<'a> {
    catalog: &'a CatalogService,
    partners: HashMap<i64, String>,
    organizations: HashMap<i64, Option<String>>,
    subjects: HashMap<i64, Option<String>>,
    prerequisites: HashMap<i64, Option<String>>,
    level_types: HashMap<i64, Option<String>>,
    languages: HashMap<i64, Option<String>>,
    run_types: HashMap<i64, bool>,
    courses: HashMap<i64, Option<Course>>,
}

impl<'a> Projector<'a> {
    pub fn new(catalog: &'a CatalogService) -> Self {
        Self {
            catalog,
            partners: HashMap::new(),
            organizations: HashMap::new(),
            subjects: HashMap::new(),
            prerequisites: HashMap::new(),
            level_types: HashMap::new(),
            languages: HashMap::new(),
            run_types: HashMap::new(),
            courses: HashMap::new(),
        }
    }

    async fn partner(&mut self, id: i64) -> Result<String, CatalogRepositoryError> {
        if !self.partners.contains_key(&id) {
            for partner in self.catalog.list_partners().await? {
                self.partners.insert(partner.id, partner.short_code);
            }
        }
        Ok(self.partners.get(&id).cloned().unwrap_or_default())
    }

    async fn labels<E, F>(
        catalog: &CatalogService,
        cache: &mut HashMap<i64, Option<String>>,
        ids: &[i64],
        label: F,
    ) -> Result<Vec<String>, CatalogRepositoryError>
    where
        E: CatalogEntity,
        F: Fn(&E) -> String,
    {
        let mut labels = Vec::with_capacity(ids.len());
        for id in ids {
            if !cache.contains_key(id) {
                let row = catalog.repo::<E>().get(*id).await?;
                cache.insert(*id, row.as_ref().map(&label));
            }
            if let Some(Some(value)) = cache.get(id) {
                labels.push(value.clone());
            }
        }
        Ok(labels)
    }

    async fn organization_labels(&mut self, ids: &[i64]) -> Result<Vec<String>, CatalogRepositoryError> {
        Self::labels::<Organization, _>(self.catalog, &mut self.organizations, ids, |o| o.display_label())
            .await
    }

    async fn subject_names(&mut self, ids: &[i64]) -> Result<Vec<String>, CatalogRepositoryError> {
        Self::labels::<Subject, _>(self.catalog, &mut self.subjects, ids, |s| s.name.clone()).await
    }

    async fn prerequisite_names(&mut self, ids: &[i64]) -> Result<Vec<String>, CatalogRepositoryError> {
        Self::labels::<Prerequisite, _>(self.catalog, &mut self.prerequisites, ids, |p| p.name.clone())
            .await
    }

    async fn level_type(&mut self, id: Option<i64>) -> Result<Option<String>, CatalogRepositoryError> {
        let ids: Vec<i64> = id.into_iter().collect();
        Ok(
            Self::labels::<LevelType, _>(self.catalog, &mut self.level_types, &ids, |l| l.name.clone())
                .await?
                .into_iter()
                .next(),
        )
    }

    async fn language_names(&mut self, ids: &[i64]) -> Result<Vec<String>, CatalogRepositoryError> {
        Self::labels::<LanguageTag, _>(self.catalog, &mut self.languages, ids, |l| l.name.clone()).await
    }

    async fn course(&mut self, id: i64) -> Result<Option<Course>, CatalogRepositoryError> {
        if !self.courses.contains_key(&id) {
            let course = self.catalog.repo::<Course>().get(id).await?;
            self.courses.insert(id, course);
        }
        Ok(self.courses.get(&id).cloned().flatten())
    }

    /// Whether runs of this run's type may appear in search. Runs without a type are.
    pub async fn is_marketable(&mut self, run: &CourseRun) -> Result<bool, CatalogRepositoryError> {
        let Some(type_id) = run.run_type_id else {
            return Ok(true);
        };
        if let Some(marketable) = self.run_types.get(&type_id) {
            return Ok(*marketable);
        }
        let marketable = self
            .catalog
            .repo::<CourseRunType>()
            .get(type_id)
            .await?
            .map(|t| t.is_marketable)
            .unwrap_or(true);
        self.run_types.insert(type_id, marketable);
        Ok(marketable)
    }

    pub async fn course_document(&mut self, course: &Course) -> Result<SearchDocument, CatalogRepositoryError> {
        let mut doc = SearchDocument::new(course.uuid, ContentType::Course, self.partner(course.partner_id).await?);
        let org_ids: Vec<i64> = course
            .authoring_organization_ids
            .iter()
            .chain(&course.sponsoring_organization_ids)
            .copied()
            .collect();
        doc.key = Some(course.key.clone());
        doc.title = course.title.clone();
        doc.organizations = self.organization_labels(&org_ids).await?;
        doc.subjects = self.subject_names(&course.subject_ids).await?;
        doc.prerequisites = self.prerequisite_names(&course.prerequisite_ids).await?;
        doc.level_type = self.level_type(course.level_type_id).await?;
        doc.card_image_url = course.card_image_url.clone();
        doc.text = render_text(
            [
                course.title.as_deref(),
                Some(course.key.as_str()),
                course.short_description.as_deref(),
                course.full_description.as_deref(),
            ]
            .into_iter()
            .chain(course.expected_learning_items.iter().map(|i| Some(i.as_str())))
            .chain(doc.organizations.iter().map(|o| Some(o.as_str())))
            .chain(doc.subjects.iter().map(|s| Some(s.as_str()))),
        );
        Ok(doc)
    }

    /// `None` for runs whose type is not marketable.
    pub async fn course_run_document(
        &mut self,
        run: &CourseRun,
    ) -> Result<Option<SearchDocument>, CatalogRepositoryError> {
        if !self.is_marketable(run).await? {
            return Ok(None);
        }
        let course = self.course(run.course_id).await?;
        let mut doc = SearchDocument::new(run.uuid, ContentType::CourseRun, self.partner(run.partner_id).await?);
        doc.key = Some(run.key.clone());
        doc.title = run
            .title_override
            .clone()
            .or_else(|| course.as_ref().and_then(|c| c.title.clone()));
        if let Some(course) = &course {
            let org_ids: Vec<i64> = course
                .authoring_organization_ids
                .iter()
                .chain(&course.sponsoring_organization_ids)
                .copied()
                .collect();
            doc.organizations = self.organization_labels(&org_ids).await?;
            doc.subjects = self.subject_names(&course.subject_ids).await?;
            doc.prerequisites = self.prerequisite_names(&course.prerequisite_ids).await?;
            doc.level_type = self.level_type(course.level_type_id).await?;
            doc.course_key = Some(course.key.clone());
        }
        let language: Vec<i64> = run.language_id.into_iter().collect();
        doc.language = self.language_names(&language).await?.into_iter().next();
        doc.transcript_languages = self.language_names(&run.transcript_language_ids).await?;
        doc.start = run.start;
        doc.end = run.end;
        doc.pacing_type = run.pacing_type.map(|p| p.as_str().to_string());
        doc.status = Some(run.status.as_str().to_string());
        doc.mobile_available = Some(run.mobile_available);
        doc.hidden = run.hidden;
        doc.card_image_url = run
            .card_image_url
            .clone()
            .or_else(|| course.as_ref().and_then(|c| c.card_image_url.clone()));
        doc.text = render_text(
            [
                doc.title.as_deref(),
                Some(run.key.as_str()),
                course.as_ref().and_then(|c| c.short_description.as_deref()),
                course.as_ref().and_then(|c| c.full_description.as_deref()),
            ]
            .into_iter()
            .chain(doc.organizations.iter().map(|o| Some(o.as_str())))
            .chain(doc.subjects.iter().map(|s| Some(s.as_str()))),
        );
        Ok(Some(doc))
    }

    /// `None` for deleted programs.
    pub async fn program_document(
        &mut self,
        program: &Program,
    ) -> Result<Option<SearchDocument>, CatalogRepositoryError> {
        if program.status == ProgramStatus::Deleted {
            return Ok(None);
        }
        let mut doc = SearchDocument::new(program.uuid, ContentType::Program, self.partner(program.partner_id).await?);
        doc.title = Some(program.title.clone());
        doc.organizations = self
            .organization_labels(&program.authoring_organization_ids)
            .await?;
        doc.program_type = program.program_type.as_ref().map(|t| t.slug.clone());
        doc.status = Some(program.status.as_str().to_string());
        doc.card_image_url = program.card_image_url.clone();
        doc.text = render_text(
            [
                Some(program.title.as_str()),
                program.subtitle.as_deref(),
                program.overview.as_deref(),
                program.program_type.as_ref().map(|t| t.name.as_str()),
            ]
            .into_iter()
            .chain(program.expected_learning_items.iter().map(|i| Some(i.as_str())))
            .chain(doc.organizations.iter().map(|o| Some(o.as_str()))),
        );
        Ok(Some(doc))
    }

    pub async fn person_document(&mut self, person: &Person) -> Result<SearchDocument, CatalogRepositoryError> {
        let mut doc = SearchDocument::new(person.uuid, ContentType::Person, self.partner(person.partner_id).await?);
        doc.title = Some(person.full_name());
        let org_ids: Vec<i64> = person
            .position
            .as_ref()
            .and_then(|p| p.organization_id)
            .into_iter()
            .collect();
        doc.organizations = self.organization_labels(&org_ids).await?;
        doc.card_image_url = person.profile_image_url.clone();
        let position = person.position.as_ref();
        doc.text = render_text(
            [
                doc.title.as_deref(),
                person.bio.as_deref(),
                position.map(|p| p.title.as_str()),
                position.and_then(|p| p.organization_override.as_deref()),
            ]
            .into_iter()
            .chain(person.areas_of_expertise.iter().map(|a| Some(a.as_str())))
            .chain(doc.organizations.iter().map(|o| Some(o.as_str()))),
        );
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_repository::InMemoryCatalogStore;
    use discovery_shared::{ChangeContext, PacingType};
    use std::sync::Arc;

    async fn seeded() -> (CatalogService, Course) {
        let catalog = CatalogService::new(Arc::new(InMemoryCatalogStore::new()));
        let ctx = ChangeContext::refresh();
        let partner = catalog.ensure_partner("edx", "edX").await.unwrap();
        let org = catalog
            .save_organization(
                &Organization {
                    partner_id: partner.id,
                    key: "MITx".into(),
                    name: Some("Massachusetts Institute of Technology".into()),
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
                    key: "MITx+0.111x".into(),
                    title: Some("Making Science and Engineering Pictures".into()),
                    short_description: Some("<p>Pictures for papers</p>".into()),
                    authoring_organization_ids: vec![org.id],
                    ..Default::default()
                },
                None,
                &ctx,
            )
            .await
            .unwrap()
            .into_entity();
        (catalog, course)
    }

    #[tokio::test]
    async fn test_course_document_labels_organizations() {
        let (catalog, course) = seeded().await;
        let mut projector = Projector::new(&catalog);
        let doc = projector.course_document(&course).await.unwrap();

        assert_eq!(doc.partner, "edx");
        assert_eq!(doc.content_type, Some(ContentType::Course));
        assert_eq!(doc.organizations, vec!["MITx: Massachusetts Institute of Technology"]);
        assert!(doc.text.contains("Making Science and Engineering Pictures"));
        assert!(doc.text.contains("MITx+0.111x"));
    }

    #[tokio::test]
    async fn test_run_document_inherits_course_fields() {
        let (catalog, course) = seeded().await;
        let run = CourseRun {
            partner_id: course.partner_id,
            course_id: course.id,
            key: "course-v1:MITx+0.111x+2T2015".into(),
            pacing_type: Some(PacingType::SelfPaced),
            ..Default::default()
        };
        let mut projector = Projector::new(&catalog);
        let doc = projector.course_run_document(&run).await.unwrap().unwrap();

        assert_eq!(doc.title, course.title);
        assert_eq!(doc.course_key.as_deref(), Some("MITx+0.111x"));
        assert_eq!(doc.pacing_type.as_deref(), Some("self_paced"));
        assert_eq!(doc.status.as_deref(), Some("unpublished"));
    }

    #[tokio::test]
    async fn test_non_marketable_run_has_no_document() {
        let (catalog, course) = seeded().await;
        let run_type = catalog
            .save_vocabulary(
                &CourseRunType {
                    slug: "empty".into(),
                    name: "Empty".into(),
                    is_marketable: false,
                    ..Default::default()
                },
                None,
                &ChangeContext::refresh(),
            )
            .await
            .unwrap()
            .into_entity();
        let run = CourseRun {
            partner_id: course.partner_id,
            course_id: course.id,
            key: "course-v1:MITx+0.111x+3T2016".into(),
            run_type_id: Some(run_type.id),
            ..Default::default()
        };
        let mut projector = Projector::new(&catalog);
        assert!(projector.course_run_document(&run).await.unwrap().is_none());
    }
}
