//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod cache_path;
pub mod children;
