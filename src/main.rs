//! Music Audit - payload checksums for audio collections.
//!
//! Records a digest of each file's audio payload, excluding tags, and
//! reports files whose audio changed since they were first seen.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod model;
pub mod scanner;
pub mod store;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<ExitCode> {
    let args = cli::Cli::parse();

    let (config, load_error) = args.load_config()?;

    // Initialize logging; RUST_LOG takes precedence over config and flags
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("music_audit={}", config.logging.level)))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Some(e) = load_error {
        tracing::warn!("{e}; using default configuration");
    }

    cli::run_command(&args, &config)
}
