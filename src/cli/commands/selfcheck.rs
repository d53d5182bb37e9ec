//! Checksum store validation command.

use std::process::ExitCode;
use tokio::runtime::Runtime;

use super::open_store;
use crate::config::{Config, StoreConfig};
use crate::error::Result;
use crate::store::StoreSummary;

/// Validate the store and print its record counts
pub fn cmd_selfcheck(rt: &Runtime, config: &Config) -> anyhow::Result<ExitCode> {
    let silent = config.logging.is_silent();
    match rt.block_on(selfcheck(&config.store)) {
        Ok(_) if silent => Ok(ExitCode::SUCCESS),
        Ok(summary) => {
            println!("Checksum store OK: {}", config.store.path.display());
            println!("Total records: {}", summary.total);
            println!("  flac: {}", summary.flac);
            println!("  mp3:  {}", summary.mp3);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if !silent {
                eprintln!("✗ {e}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Open (and therefore validate) the store, then count its records.
pub(crate) async fn selfcheck(config: &StoreConfig) -> Result<StoreSummary> {
    let store = open_store(config).await?;
    let summary = store.summary().await?;
    store.close().await;
    Ok(summary)
}
