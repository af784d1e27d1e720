use std::sync::Arc;

use async_trait::async_trait;
use discovery_clients::{MarketingSource, ProgramPublication, ProgramRecord, MARKETING_SITE};
use discovery_shared::{CourseRun, EntityKind, Program, ProgramStatus, ProgramType};
use tracing::{error, info, warn};

use crate::errors::LoaderError;
use crate::loader::{KindTally, Loader, LoaderContext, Written};
use crate::outcome::{RefreshOutcome, WriteStatus};

/// Programs from the marketing site.
///
/// With `publish_program_to_marketing_site` on, every program this loader
/// creates or changes is pushed back to the marketing site once saved.
pub struct ProgramsLoader {
    source: Arc<dyn MarketingSource>,
}

impl ProgramsLoader {
    pub fn new(source: Arc<dyn MarketingSource>) -> Self {
        Self { source }
    }

    async fn save(&self, ctx: &LoaderContext, record: ProgramRecord) -> Result<(Written, Program), LoaderError> {
        let status = match record.status.as_deref() {
            Some(status) => ProgramStatus::parse(status)
                .ok_or_else(|| LoaderError::rejected(format!("unknown program status '{}'", status)))?,
            None => ProgramStatus::default(),
        };

        let mut course_ids = Vec::with_capacity(record.courses.len());
        for key in &record.courses {
            course_ids.push(ctx.ensure_course(key).await?.id);
        }

        let mut excluded_course_run_ids = Vec::with_capacity(record.excluded_course_runs.len());
        for key in &record.excluded_course_runs {
            match ctx.find::<CourseRun>(key).await? {
                Some(run) => excluded_course_run_ids.push(run.id),
                None => warn!(program = %record.uuid, run = %key, "Ignoring unknown excluded run"),
            }
        }

        let base = ctx
            .find::<Program>(&record.uuid.to_string())
            .await?
            .unwrap_or_else(|| Program {
                partner_id: ctx.partner_id(),
                uuid: record.uuid,
                ..Default::default()
            });
        let program = Program {
            title: record.title,
            subtitle: record.subtitle,
            status,
            program_type: record.program_type.map(|slug| ProgramType {
                name: record.type_name.unwrap_or_else(|| slug.clone()),
                slug,
            }),
            authoring_organization_ids: ctx.ensure_organizations(&record.authoring_organizations).await?,
            credit_backing_organization_ids: ctx
                .ensure_organizations(&record.credit_backing_organizations)
                .await?,
            course_ids,
            excluded_course_run_ids,
            expected_learning_items: record.expected_learning_items,
            faq: record.faq,
            job_outlook_items: record.job_outlook_items,
            video_url: record.video_url,
            overview: record.overview,
            min_hours_effort_per_week: record.min_hours_effort_per_week,
            max_hours_effort_per_week: record.max_hours_effort_per_week,
            weeks_to_complete: record.weeks_to_complete,
            banner_image_url: record.banner_image_url,
            card_image_url: record.card_image_url,
            marketing_slug: record.marketing_slug,
            order_courses_by_start_date: record.order_courses_by_start_date.unwrap_or(false),
            ..base
        };
        let saved = ctx
            .catalog
            .save_program(&program, Some(MARKETING_SITE), &ctx.change)
            .await?;
        Ok((Written::new(&saved), saved.into_entity()))
    }

    /// Pushes a saved program to the marketing site. Failures are logged only.
    async fn publish(&self, program: &Program) {
        let publication = ProgramPublication {
            uuid: program.uuid,
            title: program.title.clone(),
            subtitle: program.subtitle.clone(),
            status: program.status.as_str().to_string(),
            program_type: program.program_type.as_ref().map(|t| t.slug.clone()),
            marketing_slug: program.marketing_slug.clone(),
        };
        if let Err(e) = self.source.publish_program(&publication).await {
            error!(program = %program.uuid, error = %e, "Failed to publish program to marketing site");
        }
    }
}

#[async_trait]
impl Loader for ProgramsLoader {
    fn name(&self) -> &'static str {
        "programs"
    }

    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError> {
        let listing = self.source.list_programs().await?;
        let mut tally = KindTally::new(EntityKind::Program);
        tally.reject(&listing.rejections);
        let publish = ctx.settings.flags.publish_program_to_marketing_site;

        let writes: Vec<_> = listing
            .records
            .into_iter()
            .map(|record| {
                let key = record.uuid.to_string();
                async move { (key, self.save(ctx, record).await) }
            })
            .collect();
        for (key, result) in ctx.run_writes(writes).await {
            tally.observe(key.clone());
            let result = match result {
                Ok((written, program)) => {
                    if publish && written.status != WriteStatus::Unchanged {
                        self.publish(&program).await;
                    }
                    Ok(written)
                }
                Err(e) => Err(e),
            };
            tally.apply(&key, result);
        }

        tally.flush(outcome);
        ctx.prune::<Program>(MARKETING_SITE, &tally, outcome).await?;
        info!(partner = %ctx.partner.short_code, counts = %tally.outcome, "Loaded programs");
        Ok(())
    }
}
