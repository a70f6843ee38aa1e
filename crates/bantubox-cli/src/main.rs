//! # bb — BantuBox CLI
//!
//! Minimal daemon-less container runtime.
//! Runs a command inside an isolated root built from a local image tarball,
//! and manages the containers left on disk.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;

use crate::commands::{Cli, LogFormat};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match commands::execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {e:#}", bantubox_common::constants::BIN_NAME);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so they never mix with the contained command's stdout.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
