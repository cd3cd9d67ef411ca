//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use embedding_atlas::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Commands::Search { query, .. } => println!("searching for {query}"),
//!     _ => {}
//! }
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Path to config.yaml (defaults to the per-platform config directory).
    #[arg(long, global = true, env = "ATLAS_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database with the `articles` table. Overrides the config file.
    #[arg(long, global = true, env = "ATLAS_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Hugging Face id of the sentence encoder. Overrides the config file.
    #[arg(long, global = true, env = "ATLAS_MODEL")]
    pub model: Option<String>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that draws a map.
#[derive(Args, Debug, Clone, Default)]
pub struct MapOptions {
    /// Randomly sample at most this many articles.
    #[arg(long, short = 's', value_parser = parse_positive)]
    pub sample: Option<usize>,

    /// Also write the plot to this file (.html for a page, otherwise Plotly JSON).
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Skip drawing the map in the terminal.
    #[arg(long)]
    pub no_map: bool,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Write a default config file and create the article database.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },

    /// Draw the corpus map.
    #[clap(name = "map", alias = "m")]
    Map {
        #[command(flatten)]
        options: MapOptions,
    },

    /// Place one query on the map and list its nearest articles.
    #[clap(name = "search", alias = "s")]
    Search {
        /// Free-text query.
        query: String,

        /// Number of neighbours to highlight.
        #[arg(short = 'k', long, value_parser = parse_positive)]
        k: Option<usize>,

        #[command(flatten)]
        options: MapOptions,
    },

    /// Fit the map once, then answer queries from stdin until `exit`.
    #[clap(name = "interactive", alias = "i")]
    Interactive {
        /// Number of neighbours to highlight.
        #[arg(short = 'k', long, value_parser = parse_positive)]
        k: Option<usize>,

        #[command(flatten)]
        options: MapOptions,
    },

    /// Embed titles from a file (one per line) and add them to the database.
    Ingest {
        file: PathBuf,
    },

    /// Re-encode every stored title with the configured model.
    Reembed,
}

/// Counts and sample sizes must be at least one.
fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from(["atlas", "search", "rust ownership", "-k", "7", "--sample", "500"])
            .unwrap();
        match cli.command {
            Commands::Search { query, k, options } => {
                assert_eq!(query, "rust ownership");
                assert_eq!(k, Some(7));
                assert_eq!(options.sample, Some(500));
                assert!(options.out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_overrides() {
        let cli = Cli::try_parse_from(["atlas", "map", "--database-url", "x.db", "-o", "map.html"]).unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("x.db"));
        match cli.command {
            Commands::Map { options } => {
                assert_eq!(options.out, Some(PathBuf::from("map.html")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_zero_counts_rejected() {
        assert!(Cli::try_parse_from(["atlas", "map", "--sample", "0"]).is_err());
        assert!(Cli::try_parse_from(["atlas", "search", "q", "-k", "0"]).is_err());
        assert!(Cli::try_parse_from(["atlas", "interactive", "-k", "0"]).is_err());
        assert!(Cli::try_parse_from(["atlas", "map", "--sample", "-3"]).is_err());
        assert!(Cli::try_parse_from(["atlas", "map", "--sample", "1"]).is_ok());
    }

    #[test]
    fn test_neighbour_flag_documented() {
        use clap::CommandFactory;
        let cli = Cli::command();
        for name in ["search", "interactive"] {
            let sub = cli.find_subcommand(name).unwrap();
            let k = sub.get_arguments().find(|a| a.get_id() == "k").unwrap();
            assert_eq!(k.get_help().unwrap().to_string(), "Number of neighbours to highlight.");
        }
    }

    #[test]
    fn test_aliases() {
        let cli = Cli::try_parse_from(["atlas", "i", "-k", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Interactive { k: Some(3), .. }));
        let cli = Cli::try_parse_from(["atlas", "reembed"]).unwrap();
        assert!(matches!(cli.command, Commands::Reembed));
    }
}
