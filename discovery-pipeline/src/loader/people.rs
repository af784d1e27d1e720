use std::sync::Arc;

use async_trait::async_trait;
use discovery_clients::{MarketingSource, PersonRecord, MARKETING_SITE};
use discovery_shared::{EntityKind, Person, Position, SocialNetwork};
use tracing::info;

use crate::errors::LoaderError;
use crate::loader::{KindTally, Loader, LoaderContext, Written};
use crate::outcome::RefreshOutcome;

/// Instructors and staff from the marketing site, keyed by uuid.
pub struct PeopleLoader {
    source: Arc<dyn MarketingSource>,
}

impl PeopleLoader {
    pub fn new(source: Arc<dyn MarketingSource>) -> Self {
        Self { source }
    }

    async fn save(&self, ctx: &LoaderContext, record: PersonRecord) -> Result<Written, LoaderError> {
        let given_name = record
            .given_name
            .ok_or_else(|| LoaderError::rejected("person has no given name"))?;

        let position = match record.position {
            Some(position) => {
                let organization_id = match &position.organization {
                    Some(key) => Some(ctx.ensure_organization(key).await?.id),
                    None => None,
                };
                Some(Position {
                    title: position.title.unwrap_or_default(),
                    organization_id,
                    organization_override: position.organization_override,
                })
            }
            None => None,
        };

        let social_networks = record
            .social_networks
            .into_iter()
            .filter_map(|network| {
                network.url.map(|url| SocialNetwork {
                    kind: network.kind,
                    url,
                    title: network.title,
                })
            })
            .collect();

        let base = ctx
            .find::<Person>(&record.uuid.to_string())
            .await?
            .unwrap_or_else(|| Person {
                partner_id: ctx.partner_id(),
                uuid: record.uuid,
                ..Default::default()
            });
        let person = Person {
            given_name,
            family_name: record.family_name,
            bio: record.bio,
            profile_image_url: record.profile_image_url,
            position,
            social_networks,
            areas_of_expertise: record.areas_of_expertise,
            ..base
        };
        let saved = ctx
            .catalog
            .save_person(&person, Some(MARKETING_SITE), &ctx.change)
            .await?;
        Ok(Written::new(&saved))
    }
}

#[async_trait]
impl Loader for PeopleLoader {
    fn name(&self) -> &'static str {
        "people"
    }

    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError> {
        let listing = self.source.list_people().await?;
        let mut tally = KindTally::new(EntityKind::Person);
        tally.reject(&listing.rejections);

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
            tally.apply(&key, result);
        }

        tally.flush(outcome);
        ctx.prune::<Person>(MARKETING_SITE, &tally, outcome).await?;
        info!(partner = %ctx.partner.short_code, counts = %tally.outcome, "Loaded people");
        Ok(())
    }
}
