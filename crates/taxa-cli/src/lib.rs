//! Taxa CLI Library
//!
//! Command-line front end for taxonomy resolution:
//!
//! - **Descendants**: list every taxon below a given id (`taxa children`)
//! - **Cache**: show where the taxonomy dump is cached (`taxa cache-path`)

pub mod commands;
pub mod config;
pub mod error;
pub mod progress;

pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taxa_resolver::TaxonId;

/// Taxa - descendant lookup over the NCBI taxonomy
#[derive(Parser, Debug)]
#[command(name = "taxa")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Language for progress messages (e.g. "en", "de_DE")
    #[arg(long, env = "TAXA_LOCALE", default_value = "en", global = true)]
    pub locale: String,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Serve the taxonomy dump from a local mirror directory instead of FTP
    #[arg(long, global = true)]
    pub mirror: Option<PathBuf>,

    /// Directory for cached archives
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Cache policy: reuse, verify-md5 or refresh-if-newer
    #[arg(long, global = true)]
    pub cache_policy: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all descendants of a taxon
    Children {
        /// NCBI taxonomy id (e.g. 9604 for Hominidae)
        taxon_id: TaxonId,

        /// Print a JSON array instead of one id per line
        #[arg(long)]
        json: bool,
    },

    /// Print the cache location of the taxonomy dump
    CachePath,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_children_with_global_options() {
        let cli = Cli::try_parse_from([
            "taxa",
            "children",
            "9604",
            "--json",
            "--locale",
            "de",
            "--cache-policy",
            "verify-md5",
        ])
        .unwrap();

        assert_eq!(cli.locale, "de");
        assert_eq!(cli.cache_policy.as_deref(), Some("verify-md5"));
        match cli.command {
            Commands::Children { taxon_id, json } => {
                assert_eq!(taxon_id, 9604);
                assert!(json);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_numeric_taxon() {
        assert!(Cli::try_parse_from(["taxa", "children", "hominidae"]).is_err());
    }
}
