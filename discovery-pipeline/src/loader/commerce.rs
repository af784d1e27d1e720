use std::sync::Arc;

use async_trait::async_trait;
use discovery_clients::{
    CommerceCourseRecord, CommerceSource, EntitlementRecord, ProductRecord, StockRecord,
    ECOMMERCE_API,
};
use discovery_shared::{
    CatalogEntity, Course, CourseEntitlement, CourseRun, EntityKind, Seat, SeatType,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::errors::LoaderError;
use crate::loader::{KindTally, Loader, LoaderContext, Written};
use crate::outcome::RefreshOutcome;

pub const MASTERS_TYPE: &str = "masters";
pub const DEFAULT_CURRENCY: &str = "USD";
const ENROLLMENT_CODE_CLASS: &str = "Enrollment Code";

/// Price, currency and SKU of a stock record.
fn pricing(stock: Option<&StockRecord>) -> Result<(Decimal, String, Option<String>), LoaderError> {
    let stock = stock.ok_or_else(|| LoaderError::rejected("product has no stock record"))?;
    Ok((
        stock.price_excl_tax.unwrap_or(Decimal::ZERO),
        stock
            .price_currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        stock.partner_sku.clone(),
    ))
}

/// SKU of the enrollment-code product sold alongside seats of `seat_type`.
fn bulk_sku(course: &CommerceCourseRecord, seat_type: &str) -> Option<String> {
    course
        .products
        .iter()
        .filter(|p| p.product_class.as_deref() == Some(ENROLLMENT_CODE_CLASS))
        .find(|p| p.attribute("seat_type").as_deref() == Some(seat_type))
        .and_then(|p| p.stockrecord())
        .and_then(|s| s.partner_sku.clone())
}

/// Seats of every run listed by the commerce API.
pub struct SeatsLoader {
    source: Arc<dyn CommerceSource>,
}

impl SeatsLoader {
    pub fn new(source: Arc<dyn CommerceSource>) -> Self {
        Self { source }
    }

    async fn save(
        &self,
        ctx: &LoaderContext,
        run: &CourseRun,
        course: &CommerceCourseRecord,
        product: &ProductRecord,
    ) -> Result<Written, LoaderError> {
        let certificate_type = product.certificate_type();
        let (price, currency, sku) = pricing(product.stockrecord())?;
        let seat_type = ctx.catalog.ensure_seat_type(&certificate_type, &ctx.change).await?;
        let currency = ctx.catalog.ensure_currency(&currency, &ctx.change).await?;

        let candidate = Seat {
            partner_id: ctx.partner_id(),
            course_run_id: run.id,
            seat_type_id: seat_type.id,
            currency_id: currency.id,
            credit_provider: product.credit_provider(),
            ..Default::default()
        };
        let base = ctx
            .find::<Seat>(&candidate.natural_key())
            .await?
            .unwrap_or(candidate);
        let seat = Seat {
            price,
            sku,
            upgrade_deadline: product.expires,
            credit_hours: product.credit_hours(),
            bulk_sku: bulk_sku(course, &certificate_type),
            ..base
        };
        let saved = ctx
            .catalog
            .save_seat(&seat, Some(ECOMMERCE_API), &ctx.change)
            .await?;
        Ok(Written::new(&saved))
    }

    /// Keys of stored seats a failed `product` write still lists.
    ///
    /// The currency is part of the key and may be what failed to resolve, so
    /// every currency of the run's seat type and provider is kept.
    async fn listed_keys(
        &self,
        ctx: &LoaderContext,
        stored: &[Seat],
        run: &CourseRun,
        product: &ProductRecord,
    ) -> Result<Vec<String>, LoaderError> {
        let Some(seat_type) = ctx.find_global::<SeatType>(&product.certificate_type()).await? else {
            return Ok(Vec::new());
        };
        let provider = product.credit_provider();
        Ok(stored
            .iter()
            .filter(|seat| {
                seat.course_run_id == run.id
                    && seat.seat_type_id == seat_type.id
                    && seat.credit_provider == provider
            })
            .map(|seat| seat.natural_key())
            .collect())
    }
}

#[async_trait]
impl Loader for SeatsLoader {
    fn name(&self) -> &'static str {
        "seats"
    }

    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError> {
        let listing = self.source.list_courses().await?;
        let mut tally = KindTally::new(EntityKind::Seat);
        tally.reject(&listing.rejections);
        let masters_enabled = ctx.settings.flags.masters_course_mode_enabled;
        let stored = ctx
            .catalog
            .repo::<Seat>()
            .list_from_source(ctx.partner_id(), ECOMMERCE_API)
            .await?;

        for course in &listing.records {
            let Some(run) = ctx.find::<CourseRun>(&course.id).await? else {
                for product in course.seats() {
                    tally.apply(
                        &format!("{}:{}", course.id, product.certificate_type()),
                        Err(LoaderError::unresolved(format!("course run '{}'", course.id))),
                    );
                }
                continue;
            };

            let products: Vec<&ProductRecord> = course
                .seats()
                .filter(|product| {
                    let masters = product.certificate_type() == MASTERS_TYPE;
                    if masters && !masters_enabled {
                        debug!(run = %course.id, "Skipping masters seat");
                    }
                    !masters || masters_enabled
                })
                .collect();
            let run = &run;
            let writes: Vec<_> = products
                .into_iter()
                .map(|product| {
                    let label = format!("{}:{}", course.id, product.certificate_type());
                    async move { (label, product, self.save(ctx, run, course, product).await) }
                })
                .collect();
            for (label, product, result) in ctx.run_writes(writes).await {
                if result.is_err() {
                    for key in self.listed_keys(ctx, &stored, run, product).await? {
                        tally.observe(key);
                    }
                }
                tally.apply(&label, result);
            }
        }

        tally.flush(outcome);
        ctx.prune::<Seat>(ECOMMERCE_API, &tally, outcome).await?;
        info!(partner = %ctx.partner.short_code, counts = %tally.outcome, "Loaded seats");
        Ok(())
    }
}

/// Run-independent entitlements listed by the commerce API.
pub struct EntitlementsLoader {
    source: Arc<dyn CommerceSource>,
}

impl EntitlementsLoader {
    pub fn new(source: Arc<dyn CommerceSource>) -> Self {
        Self { source }
    }

    async fn save(&self, ctx: &LoaderContext, record: &EntitlementRecord) -> Result<Written, LoaderError> {
        let course_key = record
            .course_key()
            .ok_or_else(|| LoaderError::rejected("entitlement has no course_key"))?;
        let mode = record
            .certificate_type()
            .ok_or_else(|| LoaderError::rejected("entitlement has no certificate_type"))?;
        let (price, currency, sku) = pricing(record.stockrecord())?;

        let course = ctx.ensure_course(&course_key).await?;
        let mode = ctx.catalog.ensure_seat_type(&mode, &ctx.change).await?;
        let currency = ctx.catalog.ensure_currency(&currency, &ctx.change).await?;

        let candidate = CourseEntitlement {
            partner_id: ctx.partner_id(),
            course_id: course.id,
            mode_id: mode.id,
            ..Default::default()
        };
        let base = ctx
            .find::<CourseEntitlement>(&candidate.natural_key())
            .await?
            .unwrap_or(candidate);
        let entitlement = CourseEntitlement {
            price,
            currency_id: currency.id,
            sku,
            expires: record.expires,
            ..base
        };
        let saved = ctx
            .catalog
            .save_entitlement(&entitlement, Some(ECOMMERCE_API), &ctx.change)
            .await?;
        Ok(Written::new(&saved))
    }

    /// Key of the stored entitlement a failed `record` write still lists.
    async fn listed_key(
        &self,
        ctx: &LoaderContext,
        record: &EntitlementRecord,
    ) -> Result<Option<String>, LoaderError> {
        let (Some(course_key), Some(mode)) = (record.course_key(), record.certificate_type()) else {
            return Ok(None);
        };
        let Some(course) = ctx.find::<Course>(&course_key).await? else {
            return Ok(None);
        };
        let Some(mode) = ctx.find_global::<SeatType>(&mode).await? else {
            return Ok(None);
        };
        let candidate = CourseEntitlement {
            partner_id: ctx.partner_id(),
            course_id: course.id,
            mode_id: mode.id,
            ..Default::default()
        };
        Ok(Some(candidate.natural_key()))
    }
}

#[async_trait]
impl Loader for EntitlementsLoader {
    fn name(&self) -> &'static str {
        "entitlements"
    }

    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError> {
        let listing = self.source.list_entitlements().await?;
        let mut tally = KindTally::new(EntityKind::CourseEntitlement);
        tally.reject(&listing.rejections);
        let masters_enabled = ctx.settings.flags.masters_course_mode_enabled;

        let writes: Vec<_> = listing
            .records
            .iter()
            .filter(|record| {
                masters_enabled || record.certificate_type().as_deref() != Some(MASTERS_TYPE)
            })
            .map(|record| {
                let label = record
                    .course_key()
                    .unwrap_or_else(|| record.title.clone().unwrap_or_default());
                async move { (label, record, self.save(ctx, record).await) }
            })
            .collect();
        for (label, record, result) in ctx.run_writes(writes).await {
            if result.is_err() {
                if let Some(key) = self.listed_key(ctx, record).await? {
                    tally.observe(key);
                }
            }
            tally.apply(&label, result);
        }

        tally.flush(outcome);
        ctx.prune::<CourseEntitlement>(ECOMMERCE_API, &tally, outcome).await?;
        info!(partner = %ctx.partner.short_code, counts = %tally.outcome, "Loaded entitlements");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_clients::AttributeValue;
    use serde_json::json;
    use std::str::FromStr;

    fn enrollment_code(seat_type: &str, sku: &str) -> ProductRecord {
        ProductRecord {
            structure: Some("standalone".into()),
            product_class: Some(ENROLLMENT_CODE_CLASS.into()),
            attribute_values: vec![AttributeValue {
                name: "seat_type".into(),
                value: json!(seat_type),
            }],
            stockrecords: vec![StockRecord {
                partner_sku: Some(sku.into()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_pricing_defaults() {
        let stock = StockRecord {
            price_excl_tax: Some(Decimal::from_str("25.00").unwrap()),
            ..Default::default()
        };
        let (price, currency, sku) = pricing(Some(&stock)).unwrap();
        assert_eq!(price, Decimal::from_str("25.00").unwrap());
        assert_eq!(currency, "USD");
        assert!(sku.is_none());
        assert!(pricing(None).is_err());
    }

    #[test]
    fn test_bulk_sku_matches_seat_type() {
        let course = CommerceCourseRecord {
            id: "course-v1:MITx+0.111x+2T2015".into(),
            products: vec![enrollment_code("verified", "BULK-V"), enrollment_code("professional", "BULK-P")],
            ..Default::default()
        };
        assert_eq!(bulk_sku(&course, "verified").as_deref(), Some("BULK-V"));
        assert_eq!(bulk_sku(&course, "audit"), None);
    }
}
