use std::sync::Arc;

use async_trait::async_trait;
use discovery_clients::{OrganizationRecord, OrganizationsSource, ORGANIZATIONS_API};
use discovery_shared::{EntityKind, Organization};
use tracing::info;

use crate::errors::LoaderError;
use crate::loader::{KindTally, Loader, LoaderContext, Written};
use crate::outcome::RefreshOutcome;

pub struct OrganizationsLoader {
    source: Arc<dyn OrganizationsSource>,
}

impl OrganizationsLoader {
    pub fn new(source: Arc<dyn OrganizationsSource>) -> Self {
        Self { source }
    }

    async fn save(&self, ctx: &LoaderContext, record: OrganizationRecord) -> Result<Written, LoaderError> {
        let base = ctx
            .find::<Organization>(&record.key)
            .await?
            .unwrap_or_else(|| Organization {
                partner_id: ctx.partner_id(),
                key: record.key.clone(),
                uuid: record.uuid.unwrap_or_default(),
                ..Default::default()
            });
        let organization = Organization {
            name: record.name,
            description: record.description,
            description_es: record.description_es,
            homepage_url: record.homepage_url,
            logo_image_url: record.logo_image_url,
            banner_image_url: record.banner_image_url,
            certificate_logo_image_url: record.certificate_logo_image_url,
            marketing_url_path: record.marketing_url_path,
            organization_hex_color: record.organization_hex_color,
            ..base
        };
        let saved = ctx
            .catalog
            .save_organization(&organization, Some(ORGANIZATIONS_API), &ctx.change)
            .await?;
        Ok(Written::new(&saved))
    }
}

#[async_trait]
impl Loader for OrganizationsLoader {
    fn name(&self) -> &'static str {
        "organizations"
    }

    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError> {
        let listing = self.source.list_organizations().await?;
        let mut tally = KindTally::new(EntityKind::Organization);
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
            tally.observe(key.clone());
            tally.apply(&key, result);
        }

        tally.flush(outcome);
        ctx.prune::<Organization>(ORGANIZATIONS_API, &tally, outcome).await?;
        info!(
            partner = %ctx.partner.short_code,
            seen = tally.seen.len(),
            counts = %tally.outcome,
            "Loaded organizations"
        );
        Ok(())
    }
}
