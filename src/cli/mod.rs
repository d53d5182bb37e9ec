//! Command-line interface for music-audit.
//!
//! This module provides commands for recording and verifying audio payload
//! checksums, checking the store itself, and digesting single files.

mod commands;

pub use commands::{Cli, Commands, run_command};
