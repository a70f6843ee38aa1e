//! CLI command definitions and dispatch.

pub mod delete;
pub mod images;
pub mod list;
pub mod run;
pub mod stop;

use std::path::PathBuf;
use std::process::ExitCode;

use bantubox_common::config::BantuboxConfig;
use bantubox_common::constants::CONFIG_ENV;
use bantubox_runtime::engine::Runtime;
use clap::{Parser, Subcommand, ValueEnum};

/// BantuBox — minimal daemon-less container runtime.
#[derive(Parser, Debug)]
#[command(name = "bb", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file.
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Directory holding `<name>.tar` images.
    #[arg(long, global = true, env = "BANTUBOX_IMAGE_DIR")]
    pub image_dir: Option<PathBuf>,

    /// Directory holding one entry per container.
    #[arg(long, global = true, env = "BANTUBOX_CONTAINER_DIR")]
    pub container_dir: Option<PathBuf>,

    /// Mount point of the cgroup filesystem.
    #[arg(long, global = true, env = "BANTUBOX_CGROUP_ROOT")]
    pub cgroup_root: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output formats.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command in a new container and wait for it.
    Run(run::RunArgs),
    /// Stop containers and remove them.
    Stop(stop::StopArgs),
    /// List containers.
    List(list::ListArgs),
    /// Delete containers.
    Delete(delete::DeleteArgs),
    /// List local images.
    Images,
}

impl Cli {
    /// Resolves the configuration: flag or environment, then file, then
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn resolve_config(&self) -> anyhow::Result<BantuboxConfig> {
        let base = match &self.config {
            Some(path) => BantuboxConfig::load(path)?,
            None => BantuboxConfig::default(),
        };
        Ok(base.with_overrides(
            self.image_dir.clone(),
            self.container_dir.clone(),
            self.cgroup_root.clone(),
        ))
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a single-target
/// command fails. Batch commands report per-id failures themselves.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.resolve_config()?;
    tracing::debug!(?config, "configuration resolved");
    let runtime = Runtime::new(config);

    match cli.command {
        Command::Run(args) => run::execute(&runtime, args),
        Command::Stop(args) => Ok(stop::execute(&runtime, &args)),
        Command::List(args) => list::execute(&runtime, &args),
        Command::Delete(args) => Ok(delete::execute(&runtime, &args)),
        Command::Images => images::execute(&runtime),
    }
}
