//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `curate`: Record and verify payload checksums for a directory tree
//! - `selfcheck`: Validate the checksum store
//! - `digest`: Print the payload digest of a single file

mod curate;
mod digest;
mod selfcheck;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::{Builder, Runtime};

use crate::config::{self, Config, ConfigError, LoggingConfig, StoreConfig};
use crate::error::{Error, Result, ResultExt};
use crate::model::Format;
use crate::store::ChecksumStore;

pub use curate::cmd_curate;
pub use digest::cmd_digest;
pub use selfcheck::cmd_selfcheck;

/// Music Audit CLI
#[derive(Debug, Parser)]
#[command(name = "music-audit", author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Turn off logging and reports; only the exit status is left
    #[arg(long, global = true, conflicts_with_all = ["debug", "quiet"])]
    pub silent: bool,

    /// Config file (default: the OS config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Checksum store location (overrides config)
    #[arg(long, global = true, value_name = "PATH", env = "MUSIC_AUDIT_DB")]
    pub database: Option<PathBuf>,

    /// Allow creating a store outside the default location
    #[arg(long, global = true)]
    pub create: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record new files and verify known ones under a directory
    Curate {
        /// Directory to walk
        dir: PathBuf,
    },
    /// Validate the checksum store and show record counts
    Selfcheck,
    /// Print the payload digest of one file
    Digest {
        /// Audio file
        file: PathBuf,
        /// Format to read the file as (default: from the extension)
        #[arg(short, long)]
        format: Option<Format>,
        /// Decode a FLAC file and check its audio against the declared signature
        #[arg(long)]
        verify: bool,
    },
}

impl Cli {
    /// Load the config file and apply command-line overrides.
    ///
    /// A file named with `--config` must exist and parse. A broken file at
    /// the default location is returned alongside the defaults instead, so
    /// it can be reported once logging is up.
    pub fn load_config(&self) -> Result<(Config, Option<ConfigError>)> {
        let (mut config, warning) = match &self.config {
            Some(path) if !path.is_file() => return Err(Error::not_found(path)),
            Some(path) => (config::load_from(path)?, None),
            None => match config::load() {
                Ok(config) => (config, None),
                Err(e) => (Config::default(), Some(e)),
            },
        };
        self.apply_to(&mut config);
        Ok((config, warning))
    }

    /// Apply command-line overrides on top of file configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.database {
            config.store.path = path.clone();
        }
        if self.create {
            config.store.allow_create = true;
        }
        if self.silent {
            config.logging.level = LoggingConfig::SILENT.to_string();
        } else if self.debug {
            config.logging.level = "debug".to_string();
        } else if self.quiet {
            config.logging.level = "warn".to_string();
        }
    }
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli, config: &Config) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Curate { dir } => cmd_curate(&runtime()?, dir, config),
        Commands::Selfcheck => cmd_selfcheck(&runtime()?, config),
        Commands::Digest {
            file,
            format,
            verify,
        } => cmd_digest(file, *format, *verify, config),
    }
}

/// Files are processed one at a time; a single thread drives everything.
fn runtime() -> std::io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Open the configured store, failing if it is missing or invalid.
pub(crate) async fn open_store(config: &StoreConfig) -> Result<ChecksumStore> {
    ChecksumStore::open(&config.path, config.allow_create)
        .await
        .with_context(format!("opening checksum store {}", config.path.display()))
}
