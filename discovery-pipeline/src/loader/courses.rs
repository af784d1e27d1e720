use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use discovery_clients::{
    CourseRunRecord, CoursesSource, MarketingCourseRecord, MarketingSource, COURSES_API,
};
use discovery_shared::{
    Course, CourseRun, EntityKind, OfacRestriction, PacingType, Prerequisite, Subject,
};
use tracing::{debug, info};

use crate::errors::LoaderError;
use crate::loader::{course_org, KindTally, Loader, LoaderContext, Written};
use crate::outcome::RefreshOutcome;

/// Course shells and their runs from the courses API.
///
/// Courses are derived from run keys. The courses API only fills fields a
/// course does not have yet, so marketing copy written by
/// [`CourseMarketingLoader`] is never overwritten.
pub struct CoursesLoader {
    source: Arc<dyn CoursesSource>,
}

impl CoursesLoader {
    pub fn new(source: Arc<dyn CoursesSource>) -> Self {
        Self { source }
    }

    async fn save_course(
        &self,
        ctx: &LoaderContext,
        key: &str,
        run: &CourseRunRecord,
    ) -> Result<(Written, i64), LoaderError> {
        let mut course = ctx.find::<Course>(key).await?.unwrap_or_else(|| Course {
            partner_id: ctx.partner_id(),
            key: key.to_string(),
            ..Default::default()
        });
        if course.title.is_none() {
            course.title = run.name.clone();
        }
        if course.short_description.is_none() {
            course.short_description = run.short_description.clone();
        }
        if course.card_image_url.is_none() {
            course.card_image_url = run.image_url();
        }
        if course.authoring_organization_ids.is_empty() {
            let org = run.org.as_deref().or_else(|| course_org(key));
            if let Some(org) = org {
                course.authoring_organization_ids = vec![ctx.ensure_organization(org).await?.id];
            }
        }

        let saved = ctx
            .catalog
            .save_course(&course, Some(COURSES_API), &ctx.change)
            .await?;
        let id = saved.entity().id;
        Ok((Written::new(&saved), id))
    }

    async fn save_run(
        &self,
        ctx: &LoaderContext,
        course_ids: &HashMap<String, i64>,
        record: CourseRunRecord,
    ) -> Result<Written, LoaderError> {
        let course_key = record
            .course_key()
            .ok_or_else(|| LoaderError::rejected(format!("malformed run key '{}'", record.id)))?;
        let pacing_type = match record.pacing.as_deref() {
            Some(pacing) => Some(
                PacingType::parse(pacing)
                    .ok_or_else(|| LoaderError::rejected(format!("unknown pacing '{}'", pacing)))?,
            ),
            None => None,
        };

        let course = match course_ids.get(&course_key) {
            Some(id) => ctx.catalog.repo::<Course>().require(*id).await?,
            None => ctx.ensure_course(&course_key).await?,
        };
        let language_id = match &record.language {
            Some(code) => Some(ctx.catalog.ensure_language(code, &ctx.change).await?.id),
            None => None,
        };

        let base = ctx.find::<CourseRun>(&record.id).await?.unwrap_or_else(|| CourseRun {
            partner_id: ctx.partner_id(),
            key: record.id.clone(),
            ..Default::default()
        });
        let title_override = record.name.clone().filter(|name| Some(name) != course.title.as_ref());
        let run = CourseRun {
            course_id: course.id,
            title_override,
            start: record.start,
            end: record.end,
            enrollment_start: record.enrollment_start,
            enrollment_end: record.enrollment_end,
            pacing_type: pacing_type.or(base.pacing_type),
            mobile_available: record.mobile_available.unwrap_or(false),
            hidden: record.hidden.unwrap_or(false),
            invitation_only: record.invitation_only.unwrap_or(false),
            has_ofac_restrictions: match record.has_ofac_restrictions {
                Some(flag) => OfacRestriction::from_flag(Some(flag)),
                None => base.has_ofac_restrictions,
            },
            language_id: language_id.or(base.language_id),
            card_image_url: record.image_url().or_else(|| base.card_image_url.clone()),
            ..base
        };
        let saved = ctx
            .catalog
            .save_course_run(&run, Some(COURSES_API), &ctx.change)
            .await?;
        Ok(Written::new(&saved))
    }
}

/// Course keys in upstream order, each with the first run listing it.
fn courses_of(runs: &[CourseRunRecord]) -> Vec<(String, &CourseRunRecord)> {
    let mut seen = HashSet::new();
    let mut courses = Vec::new();
    for run in runs {
        if let Some(key) = run.course_key() {
            if seen.insert(key.clone()) {
                courses.push((key, run));
            }
        }
    }
    courses
}

#[async_trait]
impl Loader for CoursesLoader {
    fn name(&self) -> &'static str {
        "courses"
    }

    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError> {
        let listing = self.source.list_course_runs().await?;

        let mut courses = KindTally::new(EntityKind::Course);
        let mut runs = KindTally::new(EntityKind::CourseRun);
        runs.reject(&listing.rejections);
        // A rejected run still vouches for its course.
        for rejection in &listing.rejections {
            if let Some(key) = rejection.key.as_deref().and_then(course_key_of) {
                courses.observe(key);
            }
        }

        let mut course_ids = HashMap::new();
        let writes: Vec<_> = courses_of(&listing.records)
            .into_iter()
            .map(|(key, run)| async move {
                let result = self.save_course(ctx, &key, run).await;
                (key, result)
            })
            .collect();
        for (key, result) in ctx.run_writes(writes).await {
            courses.observe(key.clone());
            let result = result.map(|(written, id)| {
                course_ids.insert(key.clone(), id);
                written
            });
            courses.apply(&key, result);
        }
        courses.flush(outcome);
        ctx.prune::<Course>(COURSES_API, &courses, outcome).await?;

        let course_ids = &course_ids;
        let writes: Vec<_> = listing
            .records
            .into_iter()
            .map(|record| {
                let key = record.id.clone();
                async move { (key, self.save_run(ctx, course_ids, record).await) }
            })
            .collect();
        for (key, result) in ctx.run_writes(writes).await {
            runs.observe(key.clone());
            runs.apply(&key, result);
        }
        runs.flush(outcome);
        ctx.prune::<CourseRun>(COURSES_API, &runs, outcome).await?;

        info!(
            partner = %ctx.partner.short_code,
            courses = %courses.outcome,
            runs = %runs.outcome,
            "Loaded courses and runs"
        );
        Ok(())
    }
}

fn course_key_of(run_key: &str) -> Option<String> {
    discovery_shared::keys::RunKey::parse(run_key).map(|k| k.course_key())
}

/// Marketing copy for courses the courses API already created.
///
/// Writes carry no source tag, so a course stays owned by the courses API
/// and is pruned only when the courses API stops listing it.
pub struct CourseMarketingLoader {
    source: Arc<dyn MarketingSource>,
}

impl CourseMarketingLoader {
    pub fn new(source: Arc<dyn MarketingSource>) -> Self {
        Self { source }
    }

    async fn save(&self, ctx: &LoaderContext, record: MarketingCourseRecord) -> Result<Written, LoaderError> {
        let mut course = ctx
            .find::<Course>(&record.key)
            .await?
            .ok_or_else(|| LoaderError::unresolved(format!("course '{}'", record.key)))?;

        let mut subject_ids = Vec::with_capacity(record.subjects.len());
        for slug in &record.subjects {
            let subject = ctx
                .find::<Subject>(slug)
                .await?
                .ok_or_else(|| LoaderError::unresolved(format!("subject '{}'", slug)))?;
            subject_ids.push(subject.id);
        }

        let mut prerequisite_ids = Vec::with_capacity(record.prerequisites.len());
        for name in &record.prerequisites {
            let prerequisite = ctx
                .catalog
                .ensure_vocabulary(ctx.scope(), name, &ctx.change, || Prerequisite {
                    partner_id: ctx.partner_id(),
                    name: name.clone(),
                    ..Default::default()
                })
                .await?;
            prerequisite_ids.push(prerequisite.id);
        }

        if let Some(level) = &record.level_type {
            course.level_type_id = Some(ctx.catalog.ensure_level_type(level, &ctx.change).await?.id);
        }
        if record.title.is_some() {
            course.title = record.title;
        }
        if record.short_description.is_some() {
            course.short_description = record.short_description;
        }
        if record.full_description.is_some() {
            course.full_description = record.full_description;
        }
        if record.card_image_url.is_some() {
            course.card_image_url = record.card_image_url;
        }
        course.subject_ids = subject_ids;
        course.prerequisite_ids = prerequisite_ids;
        course.expected_learning_items = record.expected_learning_items;
        course.sponsoring_organization_ids = ctx.ensure_organizations(&record.sponsors).await?;

        let saved = ctx.catalog.save_course(&course, None, &ctx.change).await?;
        debug!(key = %record.key, "Applied marketing copy");
        Ok(Written::new(&saved))
    }
}

#[async_trait]
impl Loader for CourseMarketingLoader {
    fn name(&self) -> &'static str {
        "course_marketing"
    }

    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError> {
        let listing = self.source.list_courses().await?;
        let mut tally = KindTally::new(EntityKind::Course);
        tally.reject(&listing.rejections);

        let writes: Vec<_> = listing
            .records
            .into_iter()
            .map(|record| {
                let key = record.key.clone();
                async move { (key, self.save(ctx, record).await) }
            })
            .collect();
        for (key, result) in ctx.run_writes(writes).await {
            tally.apply(&key, result);
        }

        tally.flush(outcome);
        info!(partner = %ctx.partner.short_code, counts = %tally.outcome, "Loaded course marketing copy");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_clients::Rejection;

    fn run(id: &str) -> CourseRunRecord {
        CourseRunRecord {
            id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_courses_are_derived_once_in_upstream_order() {
        let runs = vec![
            run("course-v1:MITx+0.111x+2T2015"),
            run("course-v1:HarvardX+CS50+1T2020"),
            run("course-v1:MITx+0.111x+3T2016"),
            run("not a key"),
        ];
        let courses: Vec<String> = courses_of(&runs).into_iter().map(|(k, _)| k).collect();
        assert_eq!(courses, vec!["MITx+0.111x", "HarvardX+CS50"]);
    }

    #[test]
    fn test_rejected_run_keys_map_to_courses() {
        let rejection = Rejection {
            index: 0,
            key: Some("MITx/6.002x/2012_Fall".into()),
            error: "bad date".into(),
        };
        assert_eq!(
            rejection.key.as_deref().and_then(course_key_of),
            Some("MITx/6.002x".to_string())
        );
    }
}
