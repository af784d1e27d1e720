use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

use crate::types::EntityKind;

/// Uniqueness scope of a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Keys are unique within one partner.
    Partner(i64),
    /// Shared vocabulary, keys are unique across the whole catalog.
    Global,
}

impl Scope {
    pub fn partner_id(&self) -> Option<i64> {
        match self {
            Scope::Partner(id) => Some(*id),
            Scope::Global => None,
        }
    }
}

/// A row the catalog store knows how to persist.
///
/// Every implementor serializes with `id`, `uuid`, `created` and `modified`
/// fields; the store owns those columns and overwrites them on read.
pub trait CatalogEntity:
    Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    /// Store identity, `0` until the row has been saved.
    fn id(&self) -> i64;

    /// Stable external identifier, nil until assigned.
    fn uuid(&self) -> Uuid;

    fn scope(&self) -> Scope;

    /// Natural key the loader matches upstream records on.
    fn natural_key(&self) -> String;

    /// Draft rows share their natural key with an official twin.
    fn draft(&self) -> bool {
        false
    }
}

/// Kinds that exist as draft/official twins sharing a natural key and uuid.
pub trait Draftable: CatalogEntity {
    /// Copy of this row with the draft flag set as given and no store identity.
    fn twin(&self, draft: bool) -> Self;
}
