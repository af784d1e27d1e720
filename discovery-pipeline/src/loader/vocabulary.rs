use std::sync::Arc;

use async_trait::async_trait;
use discovery_clients::{MarketingSource, MARKETING_SITE};
use discovery_shared::slug::slugify;
use discovery_shared::{EntityKind, LanguageTag, LevelType, Prerequisite, Subject};
use tracing::info;

use crate::errors::LoaderError;
use crate::loader::{KindTally, Loader, LoaderContext, Written};
use crate::outcome::RefreshOutcome;

/// Languages, level types, subjects and prerequisites from the marketing site.
///
/// Vocabulary rows are referenced by courses and never pruned.
pub struct VocabularyLoader {
    source: Arc<dyn MarketingSource>,
}

impl VocabularyLoader {
    pub fn new(source: Arc<dyn MarketingSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Loader for VocabularyLoader {
    fn name(&self) -> &'static str {
        "vocabulary"
    }

    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError> {
        let catalog = &ctx.catalog;

        let languages = self.source.list_languages().await?;
        let mut tally = KindTally::new(EntityKind::LanguageTag);
        tally.reject(&languages.rejections);
        for record in languages.records {
            let language = match ctx.find_global::<LanguageTag>(&record.code).await? {
                Some(existing) => LanguageTag {
                    name: record.name.clone().unwrap_or(existing.name.clone()),
                    ..existing
                },
                None => LanguageTag {
                    code: record.code.clone(),
                    name: record.name.clone().unwrap_or_else(|| record.code.clone()),
                    ..Default::default()
                },
            };
            let result = catalog
                .save_vocabulary(&language, Some(MARKETING_SITE), &ctx.change)
                .await
                .map(|saved| Written::new(&saved))
                .map_err(LoaderError::from);
            tally.apply(&record.code, result);
        }
        tally.flush(outcome);

        let levels = self.source.list_level_types().await?;
        let mut tally = KindTally::new(EntityKind::LevelType);
        tally.reject(&levels.rejections);
        for record in levels.records {
            let level = match ctx.find_global::<LevelType>(&record.name).await? {
                Some(existing) => LevelType {
                    sort_value: record.sort_value,
                    ..existing
                },
                None => LevelType {
                    name: record.name.clone(),
                    sort_value: record.sort_value,
                    ..Default::default()
                },
            };
            let result = catalog
                .save_vocabulary(&level, Some(MARKETING_SITE), &ctx.change)
                .await
                .map(|saved| Written::new(&saved))
                .map_err(LoaderError::from);
            tally.apply(&record.name, result);
        }
        tally.flush(outcome);

        let subjects = self.source.list_subjects().await?;
        let mut tally = KindTally::new(EntityKind::Subject);
        tally.reject(&subjects.rejections);
        for record in subjects.records {
            let slug = record.slug.clone().unwrap_or_else(|| slugify(&record.name));
            let base = ctx.find::<Subject>(&slug).await?.unwrap_or_else(|| Subject {
                partner_id: ctx.partner_id(),
                slug: slug.clone(),
                ..Default::default()
            });
            let subject = Subject {
                name: record.name,
                subtitle: record.subtitle,
                description: record.description,
                banner_image_url: record.banner_image_url,
                card_image_url: record.card_image_url,
                ..base
            };
            let result = catalog
                .save_vocabulary(&subject, Some(MARKETING_SITE), &ctx.change)
                .await
                .map(|saved| Written::new(&saved))
                .map_err(LoaderError::from);
            tally.apply(&slug, result);
        }
        tally.flush(outcome);

        let prerequisites = self.source.list_prerequisites().await?;
        let mut tally = KindTally::new(EntityKind::Prerequisite);
        tally.reject(&prerequisites.rejections);
        for record in prerequisites.records {
            let prerequisite = ctx
                .find::<Prerequisite>(&record.name)
                .await?
                .unwrap_or_else(|| Prerequisite {
                    partner_id: ctx.partner_id(),
                    name: record.name.clone(),
                    ..Default::default()
                });
            let result = catalog
                .save_vocabulary(&prerequisite, Some(MARKETING_SITE), &ctx.change)
                .await
                .map(|saved| Written::new(&saved))
                .map_err(LoaderError::from);
            tally.apply(&record.name, result);
        }
        tally.flush(outcome);

        info!(partner = %ctx.partner.short_code, "Loaded vocabularies");
        Ok(())
    }
}
