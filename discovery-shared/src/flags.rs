//! Typed feature switches.
//!
//! Switches are read once at the start of a task and passed down; nothing
//! mutates them while a task runs.

use std::env;
use tracing::warn;

/// Recognized feature switches. All default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run loader writes through a bounded worker pool.
    pub threaded_metadata_write: bool,
    /// Refresh distinct partners concurrently.
    pub parallel_refresh_pipeline: bool,
    /// Push created or updated programs to the partner's marketing site.
    pub publish_program_to_marketing_site: bool,
    /// Load `masters` seats and entitlements.
    pub masters_course_mode_enabled: bool,
    /// Recognized but inert.
    pub reduced_program_data: bool,
}

impl FeatureFlags {
    /// Reads `FEATURE_<NAME>` variables, e.g. `FEATURE_THREADED_METADATA_WRITE=true`.
    pub fn from_env() -> Self {
        Self {
            threaded_metadata_write: read_flag("FEATURE_THREADED_METADATA_WRITE"),
            parallel_refresh_pipeline: read_flag("FEATURE_PARALLEL_REFRESH_PIPELINE"),
            publish_program_to_marketing_site: read_flag(
                "FEATURE_PUBLISH_PROGRAM_TO_MARKETING_SITE",
            ),
            masters_course_mode_enabled: read_flag("FEATURE_MASTERS_COURSE_MODE_ENABLED"),
            reduced_program_data: read_flag("FEATURE_REDUCED_PROGRAM_DATA"),
        }
    }
}

fn read_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or_else(|| {
            warn!(flag = name, value = %value, "Unrecognized flag value, treating as off");
            false
        }),
        Err(_) => false,
    }
}

/// Parses the usual boolean spellings.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_off() {
        env::remove_var("FEATURE_THREADED_METADATA_WRITE");
        env::remove_var("FEATURE_MASTERS_COURSE_MODE_ENABLED");
        let flags = FeatureFlags::from_env();
        assert!(!flags.threaded_metadata_write);
        assert!(!flags.masters_course_mode_enabled);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_switches() {
        env::set_var("FEATURE_THREADED_METADATA_WRITE", "true");
        env::set_var("FEATURE_MASTERS_COURSE_MODE_ENABLED", "garbage");
        let flags = FeatureFlags::from_env();
        assert!(flags.threaded_metadata_write);
        assert!(!flags.masters_course_mode_enabled);
        env::remove_var("FEATURE_THREADED_METADATA_WRITE");
        env::remove_var("FEATURE_MASTERS_COURSE_MODE_ENABLED");
    }
}
