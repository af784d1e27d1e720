//! Catalog facade.
//!
//! [`CatalogService`] is the single write path for catalog entities. On top of
//! the store's per-row transactions it enforces the cross-entity invariants
//! (partner ownership of references, program run subsets, course-type
//! entitlement types, program slug uniqueness, HTML and color validation),
//! derives course slugs and keeps their history, cascades deletes, and hands
//! every committed change to the registered [`ChangeListener`]s.

use chrono::{DateTime, Utc};
use discovery_shared::diff::{diff_fields, object_fields};
use discovery_shared::slug::{slugify, unique_slug};
use discovery_shared::validation::{validate_hex_color, validate_html_field};
use discovery_shared::{
    Catalog, CatalogEntity, ChangeContext, Course, CourseEntitlement, CourseRun, CourseRunType,
    CourseType, Currency, Draftable, EntityKind, HistoryRecord, HistoryType, LanguageTag,
    LevelType, Mode, Organization, Partner, Person, Prerequisite, Program, Scope, Seat, SeatType,
    SkillValidationConfiguration, Subject, ValidationError, DEFAULT_EXCLUDED_FIELDS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::errors::CatalogRepositoryError;
use crate::hooks::{
    CatalogChange, ChangeDispatcher, ChangeListener, ChangeOp, PostCommitQueue,
    DEFAULT_QUEUE_CAPACITY,
};
use crate::interfaces::{CatalogStore, RecordFilter, RecordWrite, StoreOutcome};
use crate::repository::{Repository, SaveOutcome};

/// Kinds with no cross-entity invariants beyond their own natural key.
pub trait Vocabulary: CatalogEntity {}

impl Vocabulary for Currency {}
impl Vocabulary for LanguageTag {}
impl Vocabulary for LevelType {}
impl Vocabulary for SeatType {}
impl Vocabulary for Mode {}
impl Vocabulary for CourseRunType {}
impl Vocabulary for Subject {}
impl Vocabulary for Prerequisite {}

/// One `{old -> new}` mapping for the username replacement endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameReplacement {
    pub current_username: String,
    pub new_username: String,
}

/// How many history rows a replacement rewrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacedUsername {
    pub current_username: String,
    pub new_username: String,
    pub rows_updated: u64,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    dispatcher: ChangeDispatcher,
    queue_capacity: usize,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            dispatcher: ChangeDispatcher::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Registers a listener notified after each committed change.
    pub fn with_listener(mut self, listener: Arc<dyn ChangeListener>) -> Self {
        self.dispatcher.register(listener);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn store(&self) -> Arc<dyn CatalogStore> {
        self.store.clone()
    }

    pub fn repo<E: CatalogEntity>(&self) -> Repository<E> {
        Repository::new(self.store.clone())
    }

    async fn publish(&self, changes: Vec<CatalogChange>) {
        if changes.is_empty() || self.dispatcher.is_empty() {
            return;
        }
        let mut queue = PostCommitQueue::with_capacity(self.queue_capacity);
        for change in changes {
            queue.push(change);
        }
        self.dispatcher.dispatch(queue.drain(), self).await;
    }

    /// Saves one row and dispatches its change once the store has committed.
    async fn apply<E: CatalogEntity>(
        &self,
        entity: &E,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<E>, CatalogRepositoryError> {
        let excluded: Vec<String> = DEFAULT_EXCLUDED_FIELDS.iter().map(|f| f.to_string()).collect();
        let write = RecordWrite::from_entity(entity, source, &excluded)?;
        let outcome = self.store.save(write, ctx).await?;

        let change = match &outcome {
            StoreOutcome::Created(record) => Some(CatalogChange::from_record(record, ChangeOp::Created)),
            StoreOutcome::Updated { record, .. } => {
                Some(CatalogChange::from_record(record, ChangeOp::Updated))
            }
            StoreOutcome::Unchanged(_) => None,
        };
        let typed = Repository::<E>::typed(outcome)?;
        if let Some(change) = change {
            self.publish(vec![change]).await;
        }
        Ok(typed)
    }

    /// Ensures every id in `ids` names a row of `kind` owned by `partner_id`.
    async fn ensure_partner_refs(
        &self,
        kind: EntityKind,
        ids: &[i64],
        partner_id: i64,
    ) -> Result<(), CatalogRepositoryError> {
        for id in ids {
            let record = self.store.find_by_id(kind, *id).await?.ok_or_else(|| {
                ValidationError::field(kind.label(), format!("unknown {} {}", kind, id))
            })?;
            if record.partner_id != Some(partner_id) {
                return Err(ValidationError::constraint(format!(
                    "{} {} belongs to another partner",
                    kind, id
                ))
                .into());
            }
        }
        Ok(())
    }

    // Partners

    pub async fn ensure_partner(
        &self,
        short_code: &str,
        name: &str,
    ) -> Result<Partner, CatalogRepositoryError> {
        self.store.ensure_partner(short_code, name).await
    }

    pub async fn get_partner(&self, short_code: &str) -> Result<Option<Partner>, CatalogRepositoryError> {
        self.store.get_partner(short_code).await
    }

    pub async fn list_partners(&self) -> Result<Vec<Partner>, CatalogRepositoryError> {
        self.store.list_partners().await
    }

    // Vocabularies

    pub async fn save_vocabulary<E: Vocabulary>(
        &self,
        entity: &E,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<E>, CatalogRepositoryError> {
        self.apply(entity, source, ctx).await
    }

    /// Returns the row with `key`, creating a placeholder from `make` if absent.
    pub async fn ensure_vocabulary<E: Vocabulary>(
        &self,
        scope: Scope,
        key: &str,
        ctx: &ChangeContext,
        make: impl FnOnce() -> E + Send,
    ) -> Result<E, CatalogRepositoryError> {
        if let Some(existing) = self.repo::<E>().get_by_natural_key(scope, key, false).await? {
            return Ok(existing);
        }
        debug!(kind = %E::KIND, key, "Creating placeholder");
        Ok(self.apply(&make(), None, ctx).await?.into_entity())
    }

    pub async fn ensure_currency(
        &self,
        code: &str,
        ctx: &ChangeContext,
    ) -> Result<Currency, CatalogRepositoryError> {
        let code = code.to_ascii_uppercase();
        self.ensure_vocabulary(Scope::Global, &code, ctx, || Currency {
            code: code.clone(),
            name: code.clone(),
            ..Default::default()
        })
        .await
    }

    pub async fn ensure_language(
        &self,
        code: &str,
        ctx: &ChangeContext,
    ) -> Result<LanguageTag, CatalogRepositoryError> {
        self.ensure_vocabulary(Scope::Global, code, ctx, || LanguageTag {
            code: code.to_string(),
            name: code.to_string(),
            ..Default::default()
        })
        .await
    }

    pub async fn ensure_seat_type(
        &self,
        slug: &str,
        ctx: &ChangeContext,
    ) -> Result<SeatType, CatalogRepositoryError> {
        self.ensure_vocabulary(Scope::Global, slug, ctx, || SeatType {
            slug: slug.to_string(),
            name: slug.to_string(),
            ..Default::default()
        })
        .await
    }

    pub async fn ensure_mode(&self, slug: &str, ctx: &ChangeContext) -> Result<Mode, CatalogRepositoryError> {
        self.ensure_vocabulary(Scope::Global, slug, ctx, || Mode {
            slug: slug.to_string(),
            name: slug.to_string(),
            is_id_verified: matches!(slug, "verified" | "professional" | "credit"),
            certificate_type: Some(slug.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn ensure_level_type(
        &self,
        name: &str,
        ctx: &ChangeContext,
    ) -> Result<LevelType, CatalogRepositoryError> {
        self.ensure_vocabulary(Scope::Global, name, ctx, || LevelType {
            name: name.to_string(),
            ..Default::default()
        })
        .await
    }

    /// Saves a course type after checking its entitlement seat types against its run types.
    pub async fn save_course_type(
        &self,
        course_type: &CourseType,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<CourseType>, CatalogRepositoryError> {
        let mut run_types = Vec::with_capacity(course_type.course_run_type_ids.len());
        for id in &course_type.course_run_type_ids {
            let run_type = self.repo::<CourseRunType>().get(*id).await?.ok_or_else(|| {
                ValidationError::field("course_run_type_ids", format!("unknown run type {}", id))
            })?;
            run_types.push(run_type);
        }
        course_type.validate_entitlement_types(&run_types)?;
        self.apply(course_type, source, ctx).await
    }

    // Organizations and people

    pub async fn save_organization(
        &self,
        organization: &Organization,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<Organization>, CatalogRepositoryError> {
        if let Some(color) = &organization.organization_hex_color {
            validate_hex_color(color)?;
        }
        validate_html_field("description", organization.description.as_deref())?;
        validate_html_field("description_es", organization.description_es.as_deref())?;
        self.apply(organization, source, ctx).await
    }

    pub async fn save_person(
        &self,
        person: &Person,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<Person>, CatalogRepositoryError> {
        if person.uuid.is_nil() {
            return Err(ValidationError::field("uuid", "people are keyed by uuid").into());
        }
        validate_html_field("bio", person.bio.as_deref())?;
        if let Some(org_id) = person.position.as_ref().and_then(|p| p.organization_id) {
            self.ensure_partner_refs(EntityKind::Organization, &[org_id], person.partner_id)
                .await?;
        }
        self.apply(person, source, ctx).await
    }

    // Courses

    /// Saves a course, deriving its slug on first insert and remembering replaced slugs.
    #[instrument(skip(self, course, ctx), fields(key = %course.key))]
    pub async fn save_course(
        &self,
        course: &Course,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<Course>, CatalogRepositoryError> {
        validate_html_field("short_description", course.short_description.as_deref())?;
        validate_html_field("full_description", course.full_description.as_deref())?;
        let p = course.partner_id;
        self.ensure_partner_refs(EntityKind::Organization, &course.authoring_organization_ids, p)
            .await?;
        self.ensure_partner_refs(EntityKind::Organization, &course.sponsoring_organization_ids, p)
            .await?;
        self.ensure_partner_refs(EntityKind::Subject, &course.subject_ids, p)
            .await?;
        self.ensure_partner_refs(EntityKind::Prerequisite, &course.prerequisite_ids, p)
            .await?;
        if let Some(run_id) = course.canonical_course_run_id {
            self.ensure_partner_refs(EntityKind::CourseRun, &[run_id], p).await?;
        }

        let existing = self
            .repo::<Course>()
            .get_by_natural_key(course.scope(), &course.key, course.draft)
            .await?;
        let previous_slug = existing.as_ref().and_then(|c| c.url_slug.clone());

        let mut course = course.clone();
        match (&course.url_slug, &previous_slug) {
            (None, Some(slug)) => course.url_slug = Some(slug.clone()),
            (None, None) => course.url_slug = Some(self.derive_slug(&course).await?),
            (Some(slug), _) => self.ensure_slug_free(&course, slug).await?,
        }

        let outcome = self.apply(&course, source, ctx).await?;
        if let (Some(old), Some(new)) = (&previous_slug, &outcome.entity().url_slug) {
            if old != new {
                self.store
                    .record_historical_slug(p, outcome.entity().id, old)
                    .await?;
                debug!(old, new, "Course slug changed");
            }
        }
        Ok(outcome)
    }

    async fn sibling_slugs(&self, course: &Course) -> Result<HashSet<String>, CatalogRepositoryError> {
        let filter = RecordFilter {
            draft: Some(course.draft),
            ..RecordFilter::partner(course.partner_id).including_retired()
        };
        Ok(self
            .repo::<Course>()
            .list(&filter)
            .await?
            .into_iter()
            .filter(|c| c.key != course.key)
            .filter_map(|c| c.url_slug)
            .collect())
    }

    async fn derive_slug(&self, course: &Course) -> Result<String, CatalogRepositoryError> {
        let mut base = slugify(course.title.as_deref().unwrap_or_default());
        if base.is_empty() {
            base = slugify(&course.key);
        }
        let taken = self.sibling_slugs(course).await?;
        Ok(unique_slug(&base, |candidate| taken.contains(candidate)))
    }

    async fn ensure_slug_free(&self, course: &Course, slug: &str) -> Result<(), CatalogRepositoryError> {
        if self.sibling_slugs(course).await?.contains(slug) {
            return Err(CatalogRepositoryError::conflict(format!(
                "slug '{}' is already used by another course",
                slug
            )));
        }
        Ok(())
    }

    /// Resolves a course by its current slug, falling back to slugs it used to have.
    pub async fn find_course_by_slug(
        &self,
        partner_id: i64,
        slug: &str,
    ) -> Result<Option<Course>, CatalogRepositoryError> {
        let current = self
            .repo::<Course>()
            .list_by_partner(partner_id)
            .await?
            .into_iter()
            .find(|c| c.url_slug.as_deref() == Some(slug));
        if current.is_some() {
            return Ok(current);
        }
        match self.store.find_course_by_historical_slug(partner_id, slug).await? {
            Some(id) => self.repo::<Course>().get(id).await,
            None => Ok(None),
        }
    }

    pub async fn save_course_run(
        &self,
        run: &CourseRun,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<CourseRun>, CatalogRepositoryError> {
        self.ensure_partner_refs(EntityKind::Course, &[run.course_id], run.partner_id)
            .await?;
        self.ensure_partner_refs(EntityKind::Person, &run.staff_ids, run.partner_id)
            .await?;
        self.apply(run, source, ctx).await
    }

    pub async fn save_seat(
        &self,
        seat: &Seat,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<Seat>, CatalogRepositoryError> {
        self.ensure_partner_refs(EntityKind::CourseRun, &[seat.course_run_id], seat.partner_id)
            .await?;
        self.apply(seat, source, ctx).await
    }

    pub async fn save_entitlement(
        &self,
        entitlement: &CourseEntitlement,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<CourseEntitlement>, CatalogRepositoryError> {
        self.ensure_partner_refs(EntityKind::Course, &[entitlement.course_id], entitlement.partner_id)
            .await?;
        self.apply(entitlement, source, ctx).await
    }

    /// Courses of a partner with at least one currently active official run.
    pub async fn active_courses(
        &self,
        partner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Course>, CatalogRepositoryError> {
        let active: HashSet<i64> = self
            .repo::<CourseRun>()
            .list_by_partner(partner_id)
            .await?
            .into_iter()
            .filter(|run| run.is_active_at(now))
            .map(|run| run.course_id)
            .collect();
        Ok(self
            .repo::<Course>()
            .list_by_partner(partner_id)
            .await?
            .into_iter()
            .filter(|course| active.contains(&course.id))
            .collect())
    }

    // Programs

    #[instrument(skip(self, program, ctx), fields(uuid = %program.uuid))]
    pub async fn save_program(
        &self,
        program: &Program,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<Program>, CatalogRepositoryError> {
        if program.uuid.is_nil() {
            return Err(ValidationError::field("uuid", "programs are keyed by uuid").into());
        }
        validate_html_field("overview", program.overview.as_deref())?;
        let p = program.partner_id;
        self.ensure_partner_refs(EntityKind::Course, &program.course_ids, p).await?;
        self.ensure_partner_refs(EntityKind::Organization, &program.authoring_organization_ids, p)
            .await?;
        self.ensure_partner_refs(
            EntityKind::Organization,
            &program.credit_backing_organization_ids,
            p,
        )
        .await?;

        let member_runs: HashSet<i64> = self
            .repo::<CourseRun>()
            .list(&RecordFilter::partner(p).including_retired())
            .await?
            .into_iter()
            .filter(|run| program.course_ids.contains(&run.course_id))
            .map(|run| run.id)
            .collect();
        if let Some(run_id) = program
            .excluded_course_run_ids
            .iter()
            .find(|id| !member_runs.contains(id))
        {
            return Err(ValidationError::constraint(format!(
                "excluded run {} does not belong to any course of the program",
                run_id
            ))
            .into());
        }

        if program.status.requires_unique_slug() {
            if let Some(slug) = program.marketing_slug.as_deref().filter(|s| !s.is_empty()) {
                let clash = self
                    .repo::<Program>()
                    .list_by_partner(p)
                    .await?
                    .into_iter()
                    .any(|other| {
                        other.uuid != program.uuid
                            && other.status.requires_unique_slug()
                            && other.marketing_slug.as_deref() == Some(slug)
                    });
                if clash {
                    return Err(CatalogRepositoryError::conflict(format!(
                        "marketing slug '{}' is already used by another program",
                        slug
                    )));
                }
            }
        }

        self.apply(program, source, ctx).await
    }

    /// Runs of the program's courses minus its excluded runs, in course order.
    pub async fn resolved_program_runs(
        &self,
        program: &Program,
    ) -> Result<Vec<CourseRun>, CatalogRepositoryError> {
        let mut runs = self
            .repo::<CourseRun>()
            .list_by_partner(program.partner_id)
            .await?;
        runs.retain(|run| {
            program.course_ids.contains(&run.course_id)
                && !program.excluded_course_run_ids.contains(&run.id)
        });
        runs.sort_by_key(|run| {
            (
                program.course_ids.iter().position(|id| *id == run.course_id),
                run.start,
                run.id,
            )
        });
        Ok(runs)
    }

    pub async fn save_skill_validation_configuration(
        &self,
        config: &SkillValidationConfiguration,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<SkillValidationConfiguration>, CatalogRepositoryError> {
        config.validate()?;
        if let Some(course_id) = config.course_id {
            self.ensure_partner_refs(EntityKind::Course, &[course_id], config.partner_id)
                .await?;
        }
        if let Some(org_id) = config.organization_id {
            self.ensure_partner_refs(EntityKind::Organization, &[org_id], config.partner_id)
                .await?;
        }
        self.apply(config, None, ctx).await
    }

    // Catalogs

    pub async fn save_catalog(
        &self,
        catalog: &Catalog,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<Catalog>, CatalogRepositoryError> {
        if catalog.name.trim().is_empty() {
            return Err(ValidationError::field("name", "must not be blank").into());
        }
        self.apply(catalog, None, ctx).await
    }

    pub async fn get_catalog(&self, id: i64) -> Result<Option<Catalog>, CatalogRepositoryError> {
        self.repo::<Catalog>().get(id).await
    }

    // Drafts

    /// Returns the draft twin of `official`, creating it if absent.
    pub async fn ensure_draft<E: Draftable>(
        &self,
        official: &E,
        ctx: &ChangeContext,
    ) -> Result<E, CatalogRepositoryError> {
        if let Some(draft) = self.draft_version(official).await? {
            return Ok(draft);
        }
        Ok(self.apply(&official.twin(true), None, ctx).await?.into_entity())
    }

    pub async fn official_version<E: Draftable>(&self, draft: &E) -> Result<Option<E>, CatalogRepositoryError> {
        self.repo::<E>()
            .get_by_natural_key(draft.scope(), &draft.natural_key(), false)
            .await
    }

    pub async fn draft_version<E: Draftable>(&self, official: &E) -> Result<Option<E>, CatalogRepositoryError> {
        self.repo::<E>()
            .get_by_natural_key(official.scope(), &official.natural_key(), true)
            .await
    }

    // Deletes

    async fn remove(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
        changes: &mut Vec<CatalogChange>,
    ) -> Result<(), CatalogRepositoryError> {
        if let Some(record) = self.store.delete(kind, id, ctx).await? {
            changes.push(CatalogChange::from_record(&record, ChangeOp::Deleted));
        }
        Ok(())
    }

    async fn ensure_not_in_programs(
        &self,
        partner_id: i64,
        what: String,
        references: impl Fn(&Program) -> bool,
    ) -> Result<(), CatalogRepositoryError> {
        let programs = self
            .repo::<Program>()
            .list(&RecordFilter::partner(partner_id).including_retired())
            .await?;
        if let Some(program) = programs.iter().find(|p| references(p)) {
            return Err(CatalogRepositoryError::delete_blocked(format!(
                "{} is referenced by program {}",
                what, program.uuid
            )));
        }
        Ok(())
    }

    async fn cascade_run(
        &self,
        run: &CourseRun,
        ctx: &ChangeContext,
        changes: &mut Vec<CatalogChange>,
    ) -> Result<(), CatalogRepositoryError> {
        let seats = self
            .repo::<Seat>()
            .list(&RecordFilter::partner(run.partner_id).including_retired())
            .await?;
        for seat in seats.iter().filter(|s| s.course_run_id == run.id) {
            self.remove(EntityKind::Seat, seat.id, ctx, changes).await?;
        }
        self.remove(EntityKind::CourseRun, run.id, ctx, changes).await
    }

    /// Deletes a course with its runs, seats and entitlements.
    pub async fn delete_course(&self, id: i64, ctx: &ChangeContext) -> Result<Option<Course>, CatalogRepositoryError> {
        let Some(course) = self.repo::<Course>().get(id).await? else {
            return Ok(None);
        };
        let p = course.partner_id;
        self.ensure_not_in_programs(p, format!("course {}", course.key), |program| {
            program.course_ids.contains(&id)
        })
        .await?;

        let all = RecordFilter::partner(p).including_retired();
        let mut changes = Vec::new();
        for run in self.repo::<CourseRun>().list(&all).await? {
            if run.course_id == id {
                self.cascade_run(&run, ctx, &mut changes).await?;
            }
        }
        for entitlement in self.repo::<CourseEntitlement>().list(&all).await? {
            if entitlement.course_id == id {
                self.remove(EntityKind::CourseEntitlement, entitlement.id, ctx, &mut changes)
                    .await?;
            }
        }
        for config in self.repo::<SkillValidationConfiguration>().list(&all).await? {
            if config.course_id == Some(id) {
                self.remove(EntityKind::SkillValidationConfiguration, config.id, ctx, &mut changes)
                    .await?;
            }
        }
        self.remove(EntityKind::Course, id, ctx, &mut changes).await?;

        info!(key = %course.key, rows = changes.len(), "Deleted course");
        self.publish(changes).await;
        Ok(Some(course))
    }

    /// Deletes a run and its seats.
    pub async fn delete_course_run(
        &self,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<Option<CourseRun>, CatalogRepositoryError> {
        let Some(run) = self.repo::<CourseRun>().get(id).await? else {
            return Ok(None);
        };
        self.ensure_not_in_programs(run.partner_id, format!("course run {}", run.key), |program| {
            program.excluded_course_run_ids.contains(&id)
        })
        .await?;

        let mut changes = Vec::new();
        self.cascade_run(&run, ctx, &mut changes).await?;
        self.publish(changes).await;
        Ok(Some(run))
    }

    /// Deletes an organization and drops it from the courses that list it.
    pub async fn delete_organization(
        &self,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<Option<Organization>, CatalogRepositoryError> {
        let Some(organization) = self.repo::<Organization>().get(id).await? else {
            return Ok(None);
        };
        let p = organization.partner_id;
        self.ensure_not_in_programs(p, format!("organization {}", organization.key), |program| {
            program.authoring_organization_ids.contains(&id)
                || program.credit_backing_organization_ids.contains(&id)
        })
        .await?;

        for mut course in self.repo::<Course>().list(&RecordFilter::partner(p)).await? {
            let before = course.authoring_organization_ids.len() + course.sponsoring_organization_ids.len();
            course.authoring_organization_ids.retain(|org| *org != id);
            course.sponsoring_organization_ids.retain(|org| *org != id);
            if course.authoring_organization_ids.len() + course.sponsoring_organization_ids.len() != before {
                self.apply(&course, None, ctx).await?;
            }
        }

        let mut changes = Vec::new();
        let all = RecordFilter::partner(p).including_retired();
        for config in self.repo::<SkillValidationConfiguration>().list(&all).await? {
            if config.organization_id == Some(id) {
                self.remove(EntityKind::SkillValidationConfiguration, config.id, ctx, &mut changes)
                    .await?;
            }
        }
        self.remove(EntityKind::Organization, id, ctx, &mut changes).await?;
        self.publish(changes).await;
        Ok(Some(organization))
    }

    /// Deletes a person and drops them from run staff lists.
    pub async fn delete_person(&self, id: i64, ctx: &ChangeContext) -> Result<Option<Person>, CatalogRepositoryError> {
        let Some(person) = self.repo::<Person>().get(id).await? else {
            return Ok(None);
        };
        for mut run in self
            .repo::<CourseRun>()
            .list(&RecordFilter::partner(person.partner_id))
            .await?
        {
            if run.staff_ids.contains(&id) {
                run.staff_ids.retain(|staff| *staff != id);
                self.apply(&run, None, ctx).await?;
            }
        }

        let mut changes = Vec::new();
        self.remove(EntityKind::Person, id, ctx, &mut changes).await?;
        self.publish(changes).await;
        Ok(Some(person))
    }

    /// Hard-deletes a row of any kind, applying the cascade rules of its kind.
    ///
    /// Returns whether a row was deleted.
    pub async fn delete_by_kind(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<bool, CatalogRepositoryError> {
        let deleted = match kind {
            EntityKind::Course => self.delete_course(id, ctx).await?.is_some(),
            EntityKind::CourseRun => self.delete_course_run(id, ctx).await?.is_some(),
            EntityKind::Organization => self.delete_organization(id, ctx).await?.is_some(),
            EntityKind::Person => self.delete_person(id, ctx).await?.is_some(),
            _ => {
                let mut changes = Vec::new();
                self.remove(kind, id, ctx, &mut changes).await?;
                let deleted = !changes.is_empty();
                self.publish(changes).await;
                deleted
            }
        };
        Ok(deleted)
    }

    /// Hides a row from listings and search; the next upsert of its key revives it.
    pub async fn retire_by_kind(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<bool, CatalogRepositoryError> {
        match self.store.retire(kind, id, ctx).await? {
            Some(record) => {
                self.publish(vec![CatalogChange::from_record(&record, ChangeOp::Deleted)])
                    .await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // History maintenance

    /// Collapses consecutive change rows that differ only in `modified`, keeping the earliest.
    #[instrument(skip(self))]
    pub async fn dedupe_history(&self, kind: EntityKind) -> Result<u64, CatalogRepositoryError> {
        let rows = self.store.list_history(kind).await?;
        let redundant = redundant_history(&rows);
        if redundant.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.delete_history(kind, &redundant).await?;
        info!(kind = %kind, deleted, "Removed duplicate history rows");
        Ok(deleted)
    }

    /// Rewrites `history_user` for each mapping. Unknown usernames update zero rows.
    pub async fn replace_usernames(
        &self,
        replacements: &[UsernameReplacement],
    ) -> Result<Vec<ReplacedUsername>, CatalogRepositoryError> {
        let mut results = Vec::with_capacity(replacements.len());
        for replacement in replacements {
            let rows_updated = self
                .store
                .replace_history_user(&replacement.current_username, &replacement.new_username)
                .await?;
            info!(
                current = %replacement.current_username,
                new = %replacement.new_username,
                rows_updated,
                "Replaced username in history"
            );
            results.push(ReplacedUsername {
                current_username: replacement.current_username.clone(),
                new_username: replacement.new_username.clone(),
                rows_updated,
            });
        }
        Ok(results)
    }

    pub async fn history(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> Result<Vec<HistoryRecord>, CatalogRepositoryError> {
        self.store.history(kind, id).await
    }
}

/// History ids of `~` rows identical to the last kept row of the same entity, ignoring `modified`.
///
/// `rows` must be ordered by entity, then date.
fn redundant_history(rows: &[HistoryRecord]) -> Vec<i64> {
    let mut redundant = Vec::new();
    let mut kept: Option<&HistoryRecord> = None;
    for row in rows {
        if let Some(previous) = kept {
            let same_entity = previous.entity_id == row.entity_id;
            if same_entity && row.history_type == HistoryType::Changed {
                let diff = diff_fields(
                    &object_fields(previous.snapshot.clone()),
                    &object_fields(row.snapshot.clone()),
                    &["modified"],
                );
                if !diff.is_changed() {
                    redundant.push(row.history_id);
                    continue;
                }
            }
        }
        kept = Some(row);
    }
    redundant
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(history_id: i64, entity_id: i64, history_type: HistoryType, data: serde_json::Value) -> HistoryRecord {
        HistoryRecord {
            history_id,
            kind: EntityKind::Course,
            entity_id,
            history_type,
            history_date: Utc::now(),
            history_user: None,
            change_reason: None,
            snapshot: data,
        }
    }

    #[test]
    fn test_redundant_history_keeps_earliest() {
        let rows = vec![
            row(1, 1, HistoryType::Created, json!({"title": "A", "modified": "1"})),
            row(2, 1, HistoryType::Changed, json!({"title": "A", "modified": "2"})),
            row(3, 1, HistoryType::Changed, json!({"title": "A", "modified": "3"})),
            row(4, 1, HistoryType::Changed, json!({"title": "B", "modified": "4"})),
            row(5, 2, HistoryType::Created, json!({"title": "B", "modified": "4"})),
        ];
        assert_eq!(redundant_history(&rows), vec![2, 3]);
    }

    #[test]
    fn test_delete_rows_are_never_redundant() {
        let rows = vec![
            row(1, 1, HistoryType::Changed, json!({"title": "A"})),
            row(2, 1, HistoryType::Deleted, json!({"title": "A"})),
        ];
        assert!(redundant_history(&rows).is_empty());
    }
}
