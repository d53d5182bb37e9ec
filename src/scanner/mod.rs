use futures::stream::Stream;
use lofty::probe::Probe;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::model::Format;

/// Scans the given root directory recursively for audio files.
///
/// The root is canonicalized first so that yielded paths, and therefore
/// store keys, do not depend on how the root was spelled. Entries come out
/// sorted by file name within each directory.
pub fn scan(
    root: &Path,
    config: &ScanConfig,
) -> std::io::Result<impl Stream<Item = (PathBuf, Format)> + use<>> {
    let root = root.canonicalize()?;
    let config = config.clone();
    let (tx, rx) = mpsc::channel(100);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        let walker = WalkDir::new(&root)
            .follow_links(config.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(target: "scanner", error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(format) = classify(entry.path(), &config) else {
                continue;
            };

            // If the receiver is dropped, blocking_send fails and we stop scanning.
            if tx.blocking_send((entry.into_path(), format)).is_err() {
                break;
            }
        }
    });

    // Convert the mpsc Receiver into a Stream
    Ok(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

/// Decide whether `path` should be processed, and as which format.
///
/// The extension picks the format. With `verify_magic` on, the content must
/// be recognised as the same format.
pub fn classify(path: &Path, config: &ScanConfig) -> Option<Format> {
    let format = Format::from_path(path)?;
    if !config.formats.contains(&format) {
        return None;
    }

    if config.verify_magic {
        let detected = File::open(path)
            .and_then(|file| Probe::new(BufReader::new(file)).guess_file_type())
            .map(|probe| probe.file_type().and_then(Format::from_file_type));

        match detected {
            Ok(Some(found)) if found == format => {}
            Ok(found) => {
                warn!(
                    target: "scanner",
                    path = %path.display(),
                    expected = %format,
                    found = ?found,
                    "Content does not match extension, skipping"
                );
                return None;
            }
            Err(e) => {
                warn!(target: "scanner", path = %path.display(), error = %e, "Could not probe file, skipping");
                return None;
            }
        }
    }

    debug!(target: "scanner", path = %path.display(), %format, "Found file");
    Some(format)
}
