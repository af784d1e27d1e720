//! Commerce/products API: seats and entitlements with their prices and SKUs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use discovery_shared::SourceEndpoint;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ClientError;
use crate::http::ApiClient;
use crate::normalize::{decode_records, FetchResult};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeValue {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StockRecord {
    pub price_currency: Option<String>,
    pub price_excl_tax: Option<Decimal>,
    pub partner_sku: Option<String>,
}

/// A product; seats are the `child` products of a course.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductRecord {
    pub structure: Option<String>,
    pub product_class: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attribute_values: Vec<AttributeValue>,
    #[serde(default)]
    pub stockrecords: Vec<StockRecord>,
}

impl ProductRecord {
    /// Attribute value rendered as a string.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attribute_values
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| match &a.value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
    }

    /// Seat type slug; products without one are audit seats.
    pub fn certificate_type(&self) -> String {
        self.attribute("certificate_type")
            .unwrap_or_else(|| "audit".to_string())
    }

    pub fn credit_provider(&self) -> Option<String> {
        self.attribute("credit_provider")
    }

    pub fn credit_hours(&self) -> Option<i32> {
        self.attribute("credit_hours").and_then(|h| h.parse().ok())
    }

    pub fn stockrecord(&self) -> Option<&StockRecord> {
        self.stockrecords.first()
    }

    pub fn is_seat(&self) -> bool {
        self.structure.as_deref() == Some("child")
    }
}

/// A course run as listed by the commerce API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommerceCourseRecord {
    /// Run key.
    pub id: String,
    pub name: Option<String>,
    pub verification_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

impl CommerceCourseRecord {
    pub fn seats(&self) -> impl Iterator<Item = &ProductRecord> {
        self.products.iter().filter(|p| p.is_seat())
    }
}

/// A course entitlement product.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntitlementRecord {
    pub title: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attribute_values: Vec<AttributeValue>,
    #[serde(default)]
    pub stockrecords: Vec<StockRecord>,
}

impl EntitlementRecord {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attribute_values
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_str().map(str::to_string))
    }

    pub fn course_key(&self) -> Option<String> {
        self.attribute("course_key")
    }

    pub fn certificate_type(&self) -> Option<String> {
        self.attribute("certificate_type")
    }

    pub fn stockrecord(&self) -> Option<&StockRecord> {
        self.stockrecords.first()
    }
}

#[async_trait]
pub trait CommerceSource: Send + Sync {
    async fn list_courses(&self) -> Result<FetchResult<CommerceCourseRecord>, ClientError>;

    async fn list_entitlements(&self) -> Result<FetchResult<EntitlementRecord>, ClientError>;
}

pub struct CommerceApiClient {
    api: ApiClient,
}

impl CommerceApiClient {
    pub fn new(endpoint: &SourceEndpoint) -> Result<Self, ClientError> {
        Ok(Self {
            api: ApiClient::new(endpoint)?,
        })
    }

    pub fn from_api(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CommerceSource for CommerceApiClient {
    async fn list_courses(&self) -> Result<FetchResult<CommerceCourseRecord>, ClientError> {
        let raw = self.api.get_all("courses/", &[("include_products", "true")]).await?;
        Ok(decode_records(raw, "id"))
    }

    async fn list_entitlements(&self) -> Result<FetchResult<EntitlementRecord>, ClientError> {
        let raw = self
            .api
            .get_all("products/", &[("product_class", "Course Entitlement")])
            .await?;
        Ok(decode_records(raw, "title"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_value;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_verified_seat_product() {
        let raw = normalize_value(json!({
            "id": "course-v1:MITx+0.111x+2T2015",
            "products": [
                {"structure": "parent", "attribute_values": []},
                {
                    "structure": "child",
                    "expires": "2017-01-01T12:00:00Z",
                    "attribute_values": [{"name": "certificate_type", "value": "verified"}],
                    "stockrecords": [{"price_currency": "EUR", "price_excl_tax": "25.00", "partner_sku": " ABC123 "}]
                }
            ]
        }));
        let course: CommerceCourseRecord = serde_json::from_value(raw).unwrap();
        let seats: Vec<_> = course.seats().collect();

        assert_eq!(seats.len(), 1);
        assert_eq!(seats[0].certificate_type(), "verified");
        let stock = seats[0].stockrecord().unwrap();
        assert_eq!(stock.price_currency.as_deref(), Some("EUR"));
        assert_eq!(stock.price_excl_tax, Some(Decimal::from_str("25.00").unwrap()));
        assert_eq!(stock.partner_sku.as_deref(), Some("ABC123"));
        assert_eq!(seats[0].expires.unwrap().to_rfc3339(), "2017-01-01T12:00:00+00:00");
    }

    #[test]
    fn test_credit_attributes() {
        let product: ProductRecord = serde_json::from_value(json!({
            "structure": "child",
            "attribute_values": [
                {"name": "certificate_type", "value": "credit"},
                {"name": "credit_provider", "value": "asu"},
                {"name": "credit_hours", "value": 3}
            ]
        }))
        .unwrap();
        assert_eq!(product.credit_provider().as_deref(), Some("asu"));
        assert_eq!(product.credit_hours(), Some(3));
    }

    #[test]
    fn test_missing_certificate_type_is_audit() {
        let product = ProductRecord {
            structure: Some("child".into()),
            ..Default::default()
        };
        assert_eq!(product.certificate_type(), "audit");
    }
}
