//! Publishes committed catalog changes to the message bus.

use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use tracing::{debug, error};

use discovery_repository::{
    CatalogChange, CatalogRepositoryError, CatalogService, ChangeListener, ChangeOp,
};
use discovery_shared::{
    CatalogEntity, Course, CourseRun, EntityKind, Organization, Program,
};

use crate::errors::EventError;
use crate::pb::EntityDeleted;
use crate::projection::{course_changed, course_run_changed, organization_changed, program_changed};
use crate::publisher::{EventPublisher, OutgoingEvent};
use crate::topics::{topic_name, EventAction, EventEntity};

impl From<CatalogRepositoryError> for EventError {
    fn from(e: CatalogRepositoryError) -> Self {
        Self::Projection(e.to_string())
    }
}

impl From<serde_json::Error> for EventError {
    fn from(e: serde_json::Error) -> Self {
        Self::Projection(e.to_string())
    }
}

fn encode(message: &impl Message) -> Result<Vec<u8>, EventError> {
    let mut payload = Vec::with_capacity(message.encoded_len());
    message.encode(&mut payload)?;
    Ok(payload)
}

/// Change listener that turns official course, run, organization and
/// program changes into bus events. Draft rows are not broadcast.
pub struct ChangeBroadcaster {
    publisher: Arc<dyn EventPublisher>,
}

impl ChangeBroadcaster {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    async fn partner_code(
        catalog: &CatalogService,
        partner_id: Option<i64>,
    ) -> Result<String, EventError> {
        let Some(id) = partner_id else {
            return Ok(String::new());
        };
        Ok(catalog
            .list_partners()
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .map(|p| p.short_code)
            .unwrap_or_default())
    }

    async fn organizations(
        catalog: &CatalogService,
        ids: &[i64],
    ) -> Result<Vec<Organization>, EventError> {
        let repo = catalog.repo::<Organization>();
        let mut organizations = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(org) = repo.get(*id).await? {
                organizations.push(org);
            }
        }
        Ok(organizations)
    }

    /// Builds the event for `change`, or `None` for kinds without topics.
    pub async fn build_event(
        &self,
        change: &CatalogChange,
        catalog: &CatalogService,
    ) -> Result<Option<OutgoingEvent>, EventError> {
        let Some(entity) = EventEntity::from_kind(change.kind) else {
            return Ok(None);
        };
        let partner = Self::partner_code(catalog, change.partner_id).await?;

        if change.op == ChangeOp::Deleted {
            let key = match change.kind {
                EntityKind::Course => change.decode::<Course>()?.natural_key(),
                EntityKind::CourseRun => change.decode::<CourseRun>()?.natural_key(),
                EntityKind::Organization => change.decode::<Organization>()?.natural_key(),
                _ => change.uuid.to_string(),
            };
            let payload = encode(&EntityDeleted {
                uuid: change.uuid.to_string(),
                key,
                partner,
            })?;
            return Ok(Some(OutgoingEvent {
                topic: topic_name(entity, EventAction::Delete),
                key: change.uuid.to_string(),
                payload,
                event_type: "deleted".to_string(),
            }));
        }

        let payload = match entity {
            EventEntity::Course => {
                let course: Course = change.decode()?;
                let orgs = Self::organizations(catalog, &course.authoring_organization_ids).await?;
                encode(&course_changed(&course, &partner, &orgs))?
            }
            EventEntity::CourseRun => {
                let run: CourseRun = change.decode()?;
                let course = catalog.repo::<Course>().get(run.course_id).await?;
                encode(&course_run_changed(&run, course.as_ref(), &partner))?
            }
            EventEntity::Organization => {
                let organization: Organization = change.decode()?;
                encode(&organization_changed(&organization, &partner))?
            }
            EventEntity::Program => {
                let program: Program = change.decode()?;
                let course_repo = catalog.repo::<Course>();
                let mut courses = Vec::with_capacity(program.course_ids.len());
                for id in &program.course_ids {
                    if let Some(course) = course_repo.get(*id).await? {
                        courses.push(course);
                    }
                }
                let runs = catalog
                    .resolved_program_runs(&program)
                    .await?
                    .into_iter()
                    .map(|run| {
                        let course_uuid = courses
                            .iter()
                            .find(|c| c.id == run.course_id)
                            .map(|c| c.uuid.to_string())
                            .unwrap_or_default();
                        (run, course_uuid)
                    })
                    .collect::<Vec<_>>();
                let orgs =
                    Self::organizations(catalog, &program.authoring_organization_ids).await?;
                encode(&program_changed(&program, &partner, &courses, &runs, &orgs))?
            }
        };

        Ok(Some(OutgoingEvent {
            topic: topic_name(entity, EventAction::Change),
            key: change.uuid.to_string(),
            payload,
            event_type: match change.op {
                ChangeOp::Created => "created",
                _ => "updated",
            }
            .to_string(),
        }))
    }
}

#[async_trait]
impl ChangeListener for ChangeBroadcaster {
    fn name(&self) -> &'static str {
        "event_broadcaster"
    }

    async fn on_change(&self, change: &CatalogChange, catalog: &CatalogService) -> anyhow::Result<()> {
        if change.draft {
            return Ok(());
        }
        let Some(event) = self.build_event(change, catalog).await? else {
            return Ok(());
        };
        if let Err(e) = self.publisher.publish(&event) {
            error!(topic = %event.topic, key = %event.key, error = %e, "Failed to publish change event");
            return Err(e.into());
        }
        debug!(topic = %event.topic, key = %event.key, "Published change event");
        Ok(())
    }
}
