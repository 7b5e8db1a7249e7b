//! `taxa cache-path` command implementation
//!
//! Prints where the configured archive is (or would be) cached.

use crate::config;
use crate::error::Result;
use crate::Cli;

pub fn run(cli: &Cli) -> Result<()> {
    let resolver = config::resolver(cli)?;
    println!("{}", resolver.cache_path().display());
    Ok(())
}
