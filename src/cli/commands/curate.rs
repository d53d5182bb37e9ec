//! Directory curation: record unseen files, verify known ones.

use std::path::Path;
use std::process::ExitCode;
use tokio::runtime::Runtime;

use super::open_store;
use crate::config::Config;
use crate::engine::{RunSummary, VerificationEngine};
use crate::error::{Result, ResultExt};
use crate::scanner;

/// Exit status when at least one payload changed.
const MISMATCH_EXIT: u8 = 2;

/// Curate a directory tree against the checksum store
pub fn cmd_curate(rt: &Runtime, dir: &Path, config: &Config) -> anyhow::Result<ExitCode> {
    let summary = rt.block_on(curate(dir, config))?;
    if !config.logging.is_silent() {
        print_summary(&summary);
    }

    if summary.has_mismatches() {
        Ok(ExitCode::from(MISMATCH_EXIT))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Open the store, walk `dir`, and run every discovered file through the engine.
pub(crate) async fn curate(dir: &Path, config: &Config) -> Result<RunSummary> {
    let store = open_store(&config.store).await?;
    let entries = scanner::scan(dir, &config.scan)
        .with_context(format!("scanning {}", dir.display()))?;

    let mut engine = VerificationEngine::new(store);
    engine.run(entries).await?;

    let (store, summary) = engine.into_parts();
    store.close().await;
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("Curate complete: {} files", summary.total());
    println!("  + Recorded:   {}", summary.recorded);
    println!("  ✓ Verified:   {}", summary.verified);
    println!("  - Skipped:    {}", summary.skipped.len());
    println!("  ✗ Mismatches: {}", summary.mismatches.len());

    if !summary.skipped.is_empty() {
        println!();
        println!("Skipped files:");
        for (path, reason) in summary.skipped.iter().take(10) {
            println!("  {} - {}", path.display(), reason);
        }
        if summary.skipped.len() > 10 {
            println!("  ... and {} more", summary.skipped.len() - 10);
        }
    }

    // Mismatches are always listed in full
    if summary.has_mismatches() {
        println!();
        println!("Payload mismatches:");
        for report in &summary.mismatches {
            println!("  {} ({})", report.path.display(), report.format);
            match &report.recorded_at {
                Some(at) => println!("    stored:  {} (recorded {at})", report.old),
                None => println!("    stored:  {}", report.old),
            }
            println!("    current: {}", report.new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChecksumStore, StoreError};
    use crate::test_utils::fixture_path;
    use tempfile::tempdir;

    fn config_for(store: &Path) -> Config {
        let mut config = Config::default();
        config.store.path = store.to_path_buf();
        config.store.allow_create = true;
        // Content probing is covered by the scanner's own tests
        config.scan.verify_magic = false;
        config
    }

    #[tokio::test]
    async fn test_curate_twice_then_detect_corruption() {
        let library = tempdir().unwrap();
        let state = tempdir().unwrap();
        for name in ["track.flac", "id3v1.mp3", "id3v24_footer_extended.mp3"] {
            std::fs::copy(fixture_path(name), library.path().join(name)).unwrap();
        }
        std::fs::write(library.path().join("cover.txt"), "not audio").unwrap();
        let config = config_for(&state.path().join("audit.db"));

        let first = curate(library.path(), &config).await.unwrap();
        assert_eq!(first.recorded, 3);
        assert!(!first.has_mismatches());

        let second = curate(library.path(), &config).await.unwrap();
        assert_eq!(second.recorded, 0);
        assert_eq!(second.verified, 3);

        let target = library.path().join("id3v1.mp3");
        let mut bytes = std::fs::read(&target).unwrap();
        bytes[500] ^= 0xff;
        std::fs::write(&target, bytes).unwrap();

        let third = curate(library.path(), &config).await.unwrap();
        assert_eq!(third.verified, 2);
        assert_eq!(third.mismatches.len(), 1);
        assert!(third.mismatches[0].path.ends_with("id3v1.mp3"));
    }

    #[tokio::test]
    async fn test_curate_refuses_missing_store_without_create() {
        let library = tempdir().unwrap();
        let state = tempdir().unwrap();
        let mut config = config_for(&state.path().join("absent.db"));
        config.store.allow_create = false;

        let err = curate(library.path(), &config).await.unwrap_err();
        assert!(err.to_string().contains("absent.db"));
        assert!(!state.path().join("absent.db").exists());
    }

    #[tokio::test]
    async fn test_curate_refuses_tampered_store() {
        let library = tempdir().unwrap();
        let state = tempdir().unwrap();
        std::fs::copy(fixture_path("track.flac"), library.path().join("track.flac")).unwrap();
        let store_path = state.path().join("audit.db");
        let config = config_for(&store_path);
        curate(library.path(), &config).await.unwrap();

        let mut bytes = std::fs::read(&store_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&store_path, bytes).unwrap();

        assert!(curate(library.path(), &config).await.is_err());
        assert!(matches!(
            ChecksumStore::open(&store_path, false).await,
            Err(StoreError::Invalid { .. })
        ));
    }
}
