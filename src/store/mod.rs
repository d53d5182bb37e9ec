//! Persistent, self-verifying checksum store.
//!
//! Uses SQLx with SQLite for the `checksums` table and a content-digest
//! sidecar (see [`sidecar`]) to detect changes made behind its back.
//!
//! # Validation
//!
//! Opening an existing store runs two checks, stopping at the first failure:
//! 1. `PRAGMA integrity_check` must report `ok` (structural damage)
//! 2. The SHA-256 of the store file must equal the sidecar's (silent drift)
//!
//! A store that fails either check is rejected with [`StoreError::Invalid`].
//!
//! # Example
//!
//! ```ignore
//! use music_audit::store::ChecksumStore;
//!
//! let mut store = ChecksumStore::open(Path::new("music_audit.db"), false).await?;
//! if store.lookup("/music/a.flac").await?.is_none() {
//!     store.record("/music/a.flac", &digest, Format::Flac).await?;
//! }
//! ```

pub mod sidecar;

use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::extract::PayloadDigest;
use crate::model::{ChecksumRecord, Format};

use sidecar::{SidecarState, StoreDigest};

/// Conventional store filename, resolved against the working directory.
pub const DEFAULT_STORE_NAME: &str = "music_audit.db";

/// SQLite primary result codes that indicate a damaged file.
const SQLITE_CORRUPT: i32 = 11;
const SQLITE_NOTADB: i32 = 26;

pub type StoreResult<T> = Result<T, StoreError>;

/// Checksum store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No store at a non-default location and creation was not allowed
    #[error("Checksum store not found: {} (creating a store here must be requested explicitly)", .0.display())]
    NotFound(PathBuf),

    /// Store exists but failed validation
    #[error("Checksum store {} is invalid: {reason}", path.display())]
    Invalid { path: PathBuf, reason: InvalidReason },

    /// SQLite could not open or create the store
    #[error("Could not connect to checksum store {}: {source}", path.display())]
    ConnectFailed {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Query failed on an open store
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Sidecar or store file could not be read or written
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a store was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    #[error("structural check failed: {0}")]
    Structural(String),

    #[error("digest sidecar is missing")]
    MissingSidecar,

    #[error("digest sidecar is unreadable: {0}")]
    MalformedSidecar(String),

    #[error("contents changed outside the store (expected digest {expected}, found {actual})")]
    DigestMismatch { expected: String, actual: String },

    #[error("record for {path} holds a malformed digest {digest:?}")]
    MalformedRecord { path: String, digest: String },
}

/// True if `path` names the conventional default store.
pub fn is_default_location(path: &Path) -> bool {
    let path = path.strip_prefix(".").unwrap_or(path);
    path == Path::new(DEFAULT_STORE_NAME)
}

/// Record counts by format.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// Total number of records
    pub total: i64,
    /// Records produced from FLAC signatures
    pub flac: i64,
    /// Records produced from MP3 payloads
    pub mp3: i64,
}

/// Handle to an open, validated checksum store.
///
/// Reads take `&self`; [`ChecksumStore::record`] takes `&mut self`, so a
/// single owner serializes every write.
#[derive(Debug)]
pub struct ChecksumStore {
    pool: SqlitePool,
    path: PathBuf,
    sidecar: PathBuf,
    /// Digest most recently written to the sidecar
    last_digest: Option<String>,
}

impl ChecksumStore {
    /// Open the store at `path`, creating it when permitted.
    ///
    /// A missing store is created if `allow_create` is set or `path` is the
    /// conventional default. An existing store must pass [`Self::validate`].
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if missing and creation was not allowed
    /// - [`StoreError::Invalid`] if the existing store fails validation
    /// - [`StoreError::ConnectFailed`] if SQLite cannot open the file
    pub async fn open(path: &Path, allow_create: bool) -> StoreResult<Self> {
        if path.is_file() {
            Self::open_existing(path).await
        } else if allow_create || is_default_location(path) {
            Self::create(path).await
        } else {
            Err(StoreError::NotFound(path.to_path_buf()))
        }
    }

    async fn create(path: &Path) -> StoreResult<Self> {
        info!(target: "store", path = %path.display(), "Creating new checksum store");

        let pool = connect(path, true)
            .await
            .map_err(|source| StoreError::ConnectFailed {
                path: path.to_path_buf(),
                source,
            })?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let mut store = Self::from_pool(pool, path);
        store.refresh_sidecar()?;
        Ok(store)
    }

    async fn open_existing(path: &Path) -> StoreResult<Self> {
        debug!(target: "store", path = %path.display(), "Opening existing checksum store");

        let pool = connect(path, false).await.map_err(|source| {
            if is_corruption(&source) {
                invalid(path, InvalidReason::Structural(source.to_string()))
            } else {
                StoreError::ConnectFailed {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut store = Self::from_pool(pool, path);
        let digest = store.validate().await?;
        store.last_digest = Some(digest);

        // Pending migrations run only on a store already proven intact
        sqlx::migrate!("./migrations").run(&store.pool).await?;
        store.refresh_sidecar()?;

        info!(target: "store", path = %path.display(), "Checksum store validated");
        Ok(store)
    }

    fn from_pool(pool: SqlitePool, path: &Path) -> Self {
        Self {
            pool,
            path: path.to_path_buf(),
            sidecar: sidecar::sidecar_path(path),
            last_digest: None,
        }
    }

    /// Store file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file location.
    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar
    }

    /// Run the structural and content-digest checks.
    ///
    /// Returns the live content digest on success.
    pub async fn validate(&self) -> StoreResult<String> {
        let rows: Vec<(String,)> = sqlx::query_as("PRAGMA integrity_check")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                if is_corruption(&e) {
                    invalid(&self.path, InvalidReason::Structural(e.to_string()))
                } else {
                    StoreError::Database(e)
                }
            })?;

        match rows.as_slice() {
            [(result,)] if result == "ok" => {}
            [] => {
                warn!(target: "store", path = %self.path.display(), "Integrity check returned nothing");
                return Err(self.invalid(InvalidReason::Structural(
                    "integrity check returned no result".into(),
                )));
            }
            problems => {
                let detail = problems
                    .iter()
                    .map(|(line,)| line.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!(target: "store", path = %self.path.display(), %detail, "Integrity check failed");
                return Err(self.invalid(InvalidReason::Structural(detail)));
            }
        }

        let recorded = match sidecar::load(&self.sidecar).map_err(|e| self.io(&self.sidecar, e))? {
            SidecarState::Present(record) => record,
            SidecarState::Missing => {
                warn!(target: "store", sidecar = %self.sidecar.display(), "Digest sidecar missing");
                return Err(self.invalid(InvalidReason::MissingSidecar));
            }
            SidecarState::Malformed(detail) => {
                return Err(self.invalid(InvalidReason::MalformedSidecar(detail)));
            }
        };

        if recorded.store != self.file_name() {
            debug!(
                target: "store",
                recorded = %recorded.store,
                actual = %self.file_name(),
                "Sidecar names a different store file; comparing digests anyway"
            );
        }

        let actual = self.content_digest()?;
        if recorded.digest != actual {
            warn!(
                target: "store",
                path = %self.path.display(),
                expected = %recorded.digest,
                actual = %actual,
                "Store contents drifted since last recorded change"
            );
            return Err(self.invalid(InvalidReason::DigestMismatch {
                expected: recorded.digest,
                actual,
            }));
        }

        Ok(actual)
    }

    /// Look up the stored digest for `path`.
    pub async fn lookup(&self, path: &str) -> StoreResult<Option<PayloadDigest>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT digest FROM checksums WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(digest,)| {
            digest.parse().map_err(|_| {
                self.invalid(InvalidReason::MalformedRecord {
                    path: path.to_string(),
                    digest,
                })
            })
        })
        .transpose()
    }

    /// Fetch the full record for `path`.
    pub async fn get(&self, path: &str) -> StoreResult<Option<ChecksumRecord>> {
        let record = sqlx::query_as::<_, ChecksumRecord>(
            "SELECT path, digest, format, recorded_at FROM checksums WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Insert a record unless one already exists for `path`.
    ///
    /// Existing records are never overwritten. After an insert the sidecar
    /// is rewritten before returning.
    ///
    /// # Returns
    ///
    /// True if a new record was inserted.
    pub async fn record(
        &mut self,
        path: &str,
        digest: &PayloadDigest,
        format: Format,
    ) -> StoreResult<bool> {
        let recorded_at = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO checksums (path, digest, format, recorded_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(path) DO NOTHING
            "#,
        )
        .bind(path)
        .bind(digest.to_hex())
        .bind(format.as_str())
        .bind(&recorded_at)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!(target: "store", path, %digest, %format, "Checksum inserted");
            self.refresh_sidecar()?;
        } else {
            debug!(target: "store", path, "Record already present, insert ignored");
        }
        Ok(inserted)
    }

    /// Record counts by format.
    pub async fn summary(&self) -> StoreResult<StoreSummary> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT format, COUNT(*) FROM checksums GROUP BY format")
                .fetch_all(&self.pool)
                .await?;

        let mut summary = StoreSummary::default();
        for (format, count) in rows {
            summary.total += count;
            match format.parse::<Format>() {
                Ok(Format::Flac) => summary.flac = count,
                Ok(Format::Mp3) => summary.mp3 = count,
                Err(_) => {}
            }
        }
        Ok(summary)
    }

    /// Close the connection pool, leaving the file quiescent.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Recompute the store digest and persist it if it changed.
    fn refresh_sidecar(&mut self) -> StoreResult<()> {
        let digest = self.content_digest()?;
        if self.last_digest.as_deref() == Some(digest.as_str()) {
            debug!(target: "store", "Store digest unchanged, sidecar left as is");
            return Ok(());
        }

        let record = StoreDigest {
            store: self.file_name(),
            digest: digest.clone(),
        };
        sidecar::save(&self.sidecar, &record).map_err(|e| self.io(&self.sidecar, e))?;
        debug!(target: "store", sidecar = %self.sidecar.display(), %digest, "Store digest updated");

        self.last_digest = Some(digest);
        Ok(())
    }

    fn content_digest(&self) -> StoreResult<String> {
        sidecar::digest_file(&self.path).map_err(|e| self.io(&self.path, e))
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn invalid(&self, reason: InvalidReason) -> StoreError {
        invalid(&self.path, reason)
    }

    fn io(&self, path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn invalid(path: &Path, reason: InvalidReason) -> StoreError {
    StoreError::Invalid {
        path: path.to_path_buf(),
        reason,
    }
}

/// Open a single-connection pool.
///
/// Rollback journaling with full sync means every committed write is in
/// the main file by the time the query returns.
async fn connect(path: &Path, create: bool) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Delete)
        .synchronous(SqliteSynchronous::Full);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// True for SQLite errors reporting a damaged or foreign file.
fn is_corruption(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    db.code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, SQLITE_CORRUPT | SQLITE_NOTADB))
        .unwrap_or(false)
}
