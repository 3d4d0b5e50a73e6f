//! Command-line interface definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ViewPulse - view tracking and trending analytics service
#[derive(Parser)]
#[command(name = "viewpulse")]
#[command(version)]
#[command(about = "View tracking, deduplication and trending analytics", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, short = 'c', global = true, default_value = crate::config::DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Run the daily aggregation job
    ///
    /// Without arguments aggregates yesterday (UTC).
    Aggregate {
        /// Aggregate a single date (YYYY-MM-DD)
        #[arg(long, conflicts_with_all = ["from", "to"])]
        date: Option<String>,

        /// First date of a backfill range (inclusive)
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Last date of a backfill range (inclusive)
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Re-derive every trending score from its counters
        #[arg(long, conflicts_with_all = ["date", "from", "to"])]
        repair_scores: bool,

        /// After aggregating, write the 30-day trending keywords JSON to this path
        #[arg(long, value_name = "PATH", conflicts_with = "repair_scores")]
        export_keywords: Option<PathBuf>,
    },

    /// Manage the content directory
    Content {
        #[command(subcommand)]
        action: ContentCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Content directory commands
#[derive(Subcommand)]
pub enum ContentCommands {
    /// Register a content item (updates title and visibility if it exists)
    Add {
        content_ref: String,
        title: String,

        /// Register as unpublished
        #[arg(long)]
        unpublished: bool,
    },

    /// Publish a content item
    Publish { content_ref: String },

    /// Hide a content item from tracking and trending
    Hide { content_ref: String },

    /// Show a content item and its counters
    Show { content_ref: String },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_serve() {
        let cli = Cli::try_parse_from(["viewpulse"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_parse_aggregate_range() {
        let cli = Cli::try_parse_from([
            "viewpulse",
            "-c",
            "prod.toml",
            "aggregate",
            "--from",
            "2026-03-01",
            "--to",
            "2026-03-07",
        ])
        .unwrap();
        assert_eq!(cli.config, "prod.toml");
        match cli.command {
            Some(Commands::Aggregate { from, to, date, .. }) => {
                assert_eq!(from.as_deref(), Some("2026-03-01"));
                assert_eq!(to.as_deref(), Some("2026-03-07"));
                assert!(date.is_none());
            }
            _ => panic!("expected aggregate"),
        }
    }

    #[test]
    fn test_parse_aggregate_export_keywords() {
        let cli = Cli::try_parse_from([
            "viewpulse",
            "aggregate",
            "--export-keywords",
            "public/trending-keywords.json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Aggregate {
                export_keywords, ..
            }) => {
                assert_eq!(
                    export_keywords,
                    Some(PathBuf::from("public/trending-keywords.json"))
                );
            }
            _ => panic!("expected aggregate"),
        }

        assert!(
            Cli::try_parse_from([
                "viewpulse",
                "aggregate",
                "--repair-scores",
                "--export-keywords",
                "k.json"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_aggregate_conflicts() {
        assert!(
            Cli::try_parse_from(["viewpulse", "aggregate", "--date", "2026-03-01", "--from", "2026-03-01", "--to", "2026-03-02"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["viewpulse", "aggregate", "--from", "2026-03-01"]).is_err());
    }

    #[test]
    fn test_parse_content_add() {
        let cli = Cli::try_parse_from([
            "viewpulse",
            "content",
            "add",
            "post-1",
            "Hello World",
            "--unpublished",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Content {
                action:
                    ContentCommands::Add {
                        content_ref,
                        title,
                        unpublished,
                    },
            }) => {
                assert_eq!(content_ref, "post-1");
                assert_eq!(title, "Hello World");
                assert!(unpublished);
            }
            _ => panic!("expected content add"),
        }
    }
}
