use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "discovery",
    version,
    about = "Course catalog discovery - refresh, index and serve",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Pull every configured partner's sources into the catalog
    Refresh {
        /// Only refresh these partner short codes (repeatable)
        #[arg(short, long = "partner")]
        partners: Vec<String>,
    },

    /// Build a fresh search index from the catalog and swap the alias onto it
    RebuildIndex,

    /// Delete old timestamped indices, keeping the newest ones
    PruneIndices {
        /// How many indices to keep, including the live one
        #[arg(short, long)]
        retention: Option<usize>,
    },

    /// Remove history rows that repeat the row before them
    DedupeHistory {
        /// Only this record kind, e.g. `courserun`
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Run the read API
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "API_BIND_ADDR")]
        bind: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("discovery").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_refresh_partners() {
        assert_eq!(
            parse(&["refresh", "--partner", "edx", "-p", "mitx"]),
            Command::Refresh {
                partners: vec!["edx".to_string(), "mitx".to_string()]
            }
        );
        assert_eq!(parse(&["refresh"]), Command::Refresh { partners: vec![] });
    }

    #[test]
    fn test_prune_and_dedupe_options() {
        assert_eq!(
            parse(&["prune-indices", "--retention", "2"]),
            Command::PruneIndices { retention: Some(2) }
        );
        assert_eq!(parse(&["prune-indices"]), Command::PruneIndices { retention: None });
        assert_eq!(
            parse(&["dedupe-history", "--kind", "courserun"]),
            Command::DedupeHistory {
                kind: Some("courserun".to_string())
            }
        );
        assert_eq!(parse(&["rebuild-index"]), Command::RebuildIndex);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Cli::try_parse_from(["discovery"]).is_err());
        assert!(Cli::try_parse_from(["discovery", "prune-indices", "--retention", "many"]).is_err());
        assert!(Cli::try_parse_from(["discovery", "reindex"]).is_err());
    }
}
