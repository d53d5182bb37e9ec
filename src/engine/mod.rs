//! Per-file payload verification.
//!
//! Reconciles freshly extracted payload digests against the checksum store.
//!
//! # Verification Flow
//!
//! ```text
//! 1. Extract the payload digest (failure -> Skipped)
//! 2. Look up the stored digest for the path
//! 3. No record       -> insert it         -> Recorded
//! 4. Record matches  -> nothing to do     -> Verified
//! 5. Record differs  -> report, keep old  -> Mismatch
//! ```
//!
//! Mismatches never overwrite the stored digest. They are logged at warn
//! level and collected in the [`RunSummary`] for the caller to report.

use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::extract::{self, ExtractError, PayloadDigest};
use crate::model::Format;
use crate::store::{ChecksumStore, StoreResult};

/// Terminal state of processing one file.
#[derive(Debug)]
pub enum Outcome {
    /// Payload could not be extracted; nothing was stored
    Skipped(ExtractError),
    /// First sighting; digest inserted
    Recorded(PayloadDigest),
    /// Digest matches the stored one
    Verified(PayloadDigest),
    /// Digest differs from the stored one
    Mismatch {
        old: PayloadDigest,
        new: PayloadDigest,
    },
}

impl Outcome {
    /// Short label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Skipped(_) => "skipped",
            Outcome::Recorded(_) => "recorded",
            Outcome::Verified(_) => "verified",
            Outcome::Mismatch { .. } => "mismatch",
        }
    }
}

/// A file whose payload no longer matches its stored digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchReport {
    pub path: PathBuf,
    pub format: Format,
    pub old: PayloadDigest,
    pub new: PayloadDigest,
    /// When the stored digest was first recorded
    pub recorded_at: Option<String>,
}

/// Outcome counts for a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub recorded: usize,
    pub verified: usize,
    /// Skipped files with the reason extraction failed
    pub skipped: Vec<(PathBuf, String)>,
    pub mismatches: Vec<MismatchReport>,
}

impl RunSummary {
    /// Total files processed.
    pub fn total(&self) -> usize {
        self.recorded + self.verified + self.skipped.len() + self.mismatches.len()
    }

    pub fn has_mismatches(&self) -> bool {
        !self.mismatches.is_empty()
    }
}

/// Drives files through extraction, lookup and reconciliation.
pub struct VerificationEngine {
    store: ChecksumStore,
    summary: RunSummary,
}

impl VerificationEngine {
    /// Create an engine over an opened, validated store.
    pub fn new(store: ChecksumStore) -> Self {
        Self {
            store,
            summary: RunSummary::default(),
        }
    }

    /// Process a single file.
    ///
    /// Extraction failures become [`Outcome::Skipped`]. Store failures are
    /// returned as errors and should end the run.
    pub async fn process(&mut self, path: &Path, format: Format) -> StoreResult<Outcome> {
        // Keys are stored as text; a lossy conversion would let distinct names collide
        let Some(key) = path.to_str() else {
            let err = ExtractError::unsupported(path, "file name is not valid UTF-8");
            return Ok(self.skip(path, format, err));
        };

        let current = match extract::extract(path, format) {
            Ok(digest) => digest,
            Err(e) => return Ok(self.skip(path, format, e)),
        };

        let outcome = match self.store.lookup(key).await? {
            None => {
                self.store.record(key, &current, format).await?;
                info!(target: "engine", path = %path.display(), %format, digest = %current, "Checksum recorded");
                self.summary.recorded += 1;
                Outcome::Recorded(current)
            }
            Some(stored) if stored == current => {
                debug!(target: "engine", path = %path.display(), digest = %current, "Checksum verified");
                self.summary.verified += 1;
                Outcome::Verified(current)
            }
            Some(stored) => {
                let recorded_at = self.store.get(key).await?.map(|record| record.recorded_at);
                warn!(
                    target: "engine",
                    path = %path.display(),
                    %format,
                    previous = %stored,
                    current = %current,
                    recorded_at = recorded_at.as_deref().unwrap_or("unknown"),
                    "Checksum mismatch"
                );
                self.summary.mismatches.push(MismatchReport {
                    path: path.to_path_buf(),
                    format,
                    old: stored,
                    new: current,
                    recorded_at,
                });
                Outcome::Mismatch {
                    old: stored,
                    new: current,
                }
            }
        };

        Ok(outcome)
    }

    fn skip(&mut self, path: &Path, format: Format, err: ExtractError) -> Outcome {
        info!(target: "engine", path = %path.display(), %format, error = %err, "Skipping file");
        self.summary.skipped.push((path.to_path_buf(), err.to_string()));
        Outcome::Skipped(err)
    }

    /// Process every `(path, format)` pair from `entries`, in order.
    pub async fn run<S>(&mut self, entries: S) -> StoreResult<&RunSummary>
    where
        S: Stream<Item = (PathBuf, Format)>,
    {
        let mut entries = std::pin::pin!(entries);
        while let Some((path, format)) = entries.next().await {
            let outcome = self.process(&path, format).await?;
            tracing::trace!(target: "engine", path = %path.display(), outcome = outcome.as_str());
        }

        info!(
            target: "engine",
            total = self.summary.total(),
            recorded = self.summary.recorded,
            verified = self.summary.verified,
            skipped = self.summary.skipped.len(),
            mismatches = self.summary.mismatches.len(),
            "Run complete"
        );
        Ok(&self.summary)
    }

    /// Counts accumulated so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// The underlying store.
    pub fn store(&self) -> &ChecksumStore {
        &self.store
    }

    /// Give back the store and the accumulated summary.
    pub fn into_parts(self) -> (ChecksumStore, RunSummary) {
        (self.store, self.summary)
    }
}
