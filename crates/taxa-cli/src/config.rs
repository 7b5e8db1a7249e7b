//! Resolver configuration from CLI options
//!
//! Precedence, lowest to highest: defaults, `--config` file, `TAXA_*`
//! environment variables, command-line options.

use std::sync::Arc;
use taxa_resolver::{
    CachePolicy, Connector, FtpConnector, Locale, MirrorConnector, ResolverConfig,
    TaxonomyResolver,
};
use tracing::debug;

use crate::error::{CliError, Result};
use crate::Cli;

/// Build the resolver configuration for this invocation
pub fn resolver_config(cli: &Cli) -> Result<ResolverConfig> {
    let base = match &cli.config {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            ResolverConfig::from_toml_file(path)?
        },
        None => ResolverConfig::default(),
    };
    let mut config = base.merge_env()?;

    if let Some(dir) = &cli.cache_dir {
        config = config.with_cache_dir(dir);
    }
    if let Some(policy) = &cli.cache_policy {
        let policy: CachePolicy = policy
            .parse()
            .map_err(|_| CliError::Config(format!("unknown cache policy '{}'", policy)))?;
        config = config.with_cache_policy(policy);
    }

    Ok(config)
}

/// Connector selected by `--mirror`
pub fn connector(cli: &Cli) -> Arc<dyn Connector> {
    match &cli.mirror {
        Some(root) => Arc::new(MirrorConnector::new(root)),
        None => Arc::new(FtpConnector::new()),
    }
}

/// Resolver for this invocation
pub fn resolver(cli: &Cli) -> Result<TaxonomyResolver> {
    Ok(TaxonomyResolver::with_connector(resolver_config(cli)?, connector(cli)))
}

pub fn locale(cli: &Cli) -> Locale {
    Locale::from_tag(&cli.locale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;
    use std::io::Write;
    use std::path::PathBuf;
    use taxa_resolver::Language;

    #[test]
    #[serial]
    fn test_options_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ftp_host = \"ftp.example.org\"").unwrap();
        writeln!(file, "cache_dir = \"/from/file\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from([
            "taxa",
            "--config",
            path.as_str(),
            "--cache-dir",
            "/from/cli",
            "--cache-policy",
            "refresh-if-newer",
            "cache-path",
        ])
        .unwrap();
        let config = resolver_config(&cli).unwrap();

        assert_eq!(config.host(), "ftp.example.org");
        assert_eq!(config.cache_dir, PathBuf::from("/from/cli"));
        assert_eq!(config.cache_policy, CachePolicy::RefreshIfNewer);
    }

    #[test]
    #[serial]
    fn test_unknown_cache_policy_is_config_error() {
        let cli = Cli::try_parse_from(["taxa", "--cache-policy", "sometimes", "cache-path"]).unwrap();
        assert!(matches!(resolver_config(&cli), Err(CliError::Config(_))));
    }

    #[test]
    fn test_locale_from_option() {
        let cli = Cli::try_parse_from(["taxa", "--locale", "de_DE", "cache-path"]).unwrap();
        assert_eq!(locale(&cli).language(), Language::German);
    }
}
