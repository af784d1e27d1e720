//! Relevance boosting applied around every user query.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Deployment-wide function score settings.
///
/// `functions` is passed to the engine verbatim, so deployments can replace
/// the default policy with any function list the engine accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostConfig {
    pub boost: f64,
    pub boost_mode: String,
    pub score_mode: String,
    pub functions: Vec<Value>,
}

impl Default for BoostConfig {
    /// Favors self-paced runs, MicroMasters programs and runs starting soon.
    fn default() -> Self {
        Self {
            boost: 1.0,
            boost_mode: "sum".to_string(),
            score_mode: "sum".to_string(),
            functions: vec![
                json!({
                    "filter": { "term": { "pacing_type": "self_paced" } },
                    "weight": 1.0
                }),
                json!({
                    "filter": { "term": { "program_type": "micromasters" } },
                    "weight": 1.0
                }),
                json!({
                    "linear": {
                        "start": {
                            "origin": "now",
                            "scale": "1d",
                            "decay": 0.95
                        }
                    },
                    "weight": 5.0
                }),
            ],
        }
    }
}

impl BoostConfig {
    /// Parses a stored configuration document.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn wrap(&self, query: Value) -> Value {
        json!({
            "function_score": {
                "query": query,
                "functions": self.functions,
                "boost": self.boost,
                "boost_mode": self.boost_mode,
                "score_mode": self.score_mode
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = BoostConfig::default();
        let wrapped = config.wrap(json!({"match_all": {}}));
        let fs = &wrapped["function_score"];

        assert_eq!(fs["query"], json!({"match_all": {}}));
        assert_eq!(fs["functions"][0]["filter"]["term"]["pacing_type"], "self_paced");
        assert_eq!(fs["functions"][1]["filter"]["term"]["program_type"], "micromasters");
        assert_eq!(fs["functions"][2]["linear"]["start"]["scale"], "1d");
        assert_eq!(fs["boost_mode"], "sum");
    }

    #[test]
    fn test_from_json() {
        let config = BoostConfig::from_json(json!({
            "boost": 2.0,
            "boost_mode": "multiply",
            "score_mode": "max",
            "functions": []
        }))
        .unwrap();
        assert_eq!(config.boost, 2.0);
        assert!(config.functions.is_empty());
    }
}
