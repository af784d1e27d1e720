//! Physical index naming and the janitor's selection rule.

use chrono::{DateTime, NaiveDateTime, Utc};

pub const INDEX_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// `{alias}_{YYYYMMDDHHMMSS}` for the given instant.
pub fn timestamped_index_name(alias: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", alias, at.format(INDEX_TIMESTAMP_FORMAT))
}

/// Timestamp of a physical index belonging to `alias`, or `None` if the name
/// does not follow the naming scheme.
pub fn parse_index_timestamp(alias: &str, index: &str) -> Option<NaiveDateTime> {
    let stamp = index.strip_prefix(alias)?.strip_prefix('_')?;
    if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, INDEX_TIMESTAMP_FORMAT).ok()
}

/// Physical indices the janitor should delete.
///
/// Indices are ranked newest first and the first `retention` are kept. The
/// index bound to the alias is never selected, whatever its rank, and names
/// outside the naming scheme are ignored.
pub fn indices_to_prune(
    alias: &str,
    indices: &[String],
    live: Option<&str>,
    retention: usize,
) -> Vec<String> {
    let mut stamped: Vec<(NaiveDateTime, &String)> = indices
        .iter()
        .filter_map(|name| parse_index_timestamp(alias, name).map(|ts| (ts, name)))
        .collect();
    stamped.sort_by(|a, b| b.0.cmp(&a.0));

    stamped
        .into_iter()
        .skip(retention)
        .map(|(_, name)| name.clone())
        .filter(|name| Some(name.as_str()) != live)
        .collect()
}
