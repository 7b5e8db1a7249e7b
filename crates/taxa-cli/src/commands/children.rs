//! `taxa children` command implementation
//!
//! Resolves all descendants of a taxon. The pipeline blocks, so it runs on the
//! blocking thread pool while the runtime waits for either the result or
//! Ctrl-C, which cancels the run at its next stage boundary.

use taxa_resolver::{CancellationToken, TaxonId};
use tracing::warn;

use crate::config;
use crate::error::{CliError, Result};
use crate::progress::BarProgress;
use crate::Cli;

/// Resolve and print the descendants of `taxon_id`
pub async fn run(cli: &Cli, taxon_id: TaxonId, json: bool) -> Result<()> {
    let progress = if json {
        BarProgress::hidden()
    } else {
        BarProgress::new()
    };

    let ids = collect(cli, taxon_id, progress).await?;
    let output = render(&ids, json)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Sorted descendant ids of `taxon_id`
pub async fn collect(cli: &Cli, taxon_id: TaxonId, progress: BarProgress) -> Result<Vec<TaxonId>> {
    let resolver = config::resolver(cli)?;
    let locale = config::locale(cli);
    let token = CancellationToken::new();

    let mut worker = tokio::task::spawn_blocking({
        let token = token.clone();
        let progress = progress.clone();
        move || resolver.children_with_cancel(taxon_id, &progress, &locale, &token)
    });

    let joined = tokio::select! {
        joined = &mut worker => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, cancelling resolution");
            token.cancel();
            worker.await
        },
    };
    progress.finish();

    let descendants = joined.map_err(|e| CliError::Worker(e.to_string()))??;
    let mut ids: Vec<TaxonId> = descendants.into_iter().collect();
    ids.sort_unstable();
    Ok(ids)
}

/// One id per line, or a JSON array
pub fn render(ids: &[TaxonId], json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string(ids)?);
    }
    Ok(ids
        .iter()
        .map(TaxonId::to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lines() {
        assert_eq!(render(&[9605, 9606, 207598], false).unwrap(), "9605\n9606\n207598");
        assert_eq!(render(&[], false).unwrap(), "");
    }

    #[test]
    fn test_render_json() {
        assert_eq!(render(&[9605, 9606], true).unwrap(), "[9605,9606]");
        assert_eq!(render(&[], true).unwrap(), "[]");
    }
}
