//! Course and run key parsing.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref OPAQUE_RUN_KEY: Regex =
        Regex::new(r"^course-v1:(?P<org>[^+]+)\+(?P<number>[^+]+)\+(?P<run>[^+]+)$").unwrap();
    static ref LEGACY_RUN_KEY: Regex =
        Regex::new(r"^(?P<org>[^/]+)/(?P<number>[^/]+)/(?P<run>[^/]+)$").unwrap();
}

/// Parts of a run key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunKey {
    pub org: String,
    pub number: String,
    pub run: String,
    legacy: bool,
}

impl RunKey {
    /// Parses `course-v1:ORG+NUM+RUN` or the legacy `ORG/NUM/RUN`.
    pub fn parse(key: &str) -> Option<Self> {
        let (caps, legacy) = match OPAQUE_RUN_KEY.captures(key) {
            Some(caps) => (caps, false),
            None => (LEGACY_RUN_KEY.captures(key)?, true),
        };
        Some(Self {
            org: caps["org"].to_string(),
            number: caps["number"].to_string(),
            run: caps["run"].to_string(),
            legacy,
        })
    }

    /// Key of the course this run belongs to.
    pub fn course_key(&self) -> String {
        if self.legacy {
            format!("{}/{}", self.org, self.number)
        } else {
            format!("{}+{}", self.org, self.number)
        }
    }
}
