//! `bb run` — Run a command in a new container.

use std::process::ExitCode;

use bantubox_common::constants::DEFAULT_IMAGE_NAME;
use bantubox_common::types::{MemoryLimit, ResourceLimits};
use bantubox_runtime::engine::{RunRequest, Runtime};
use clap::Args;

use crate::output;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Relative CPU weight on the legacy shares scale; 0 leaves it unset.
    #[arg(long, default_value_t = 0)]
    pub cpu_shares: u64,

    /// Memory limit, e.g. `128m`.
    #[arg(long)]
    pub memory: Option<String>,

    /// Memory plus swap limit, or `-1` for unlimited swap.
    #[arg(long, allow_hyphen_values = true)]
    pub memory_swap: Option<String>,

    /// Image to run, resolved as `<image-dir>/<name>.tar`.
    #[arg(short = 'i', long, default_value = DEFAULT_IMAGE_NAME)]
    pub image_name: String,

    /// Command and arguments to execute.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Executes the `run` command and forwards the container's exit status.
///
/// # Errors
///
/// Returns an error if the limits are invalid or the container cannot be
/// created or started.
pub fn execute(runtime: &Runtime, args: RunArgs) -> anyhow::Result<ExitCode> {
    let memory = MemoryLimit::from_flags(args.memory.as_deref(), args.memory_swap.as_deref())?;
    let request = RunRequest {
        image: args.image_name,
        command: args.command,
        limits: ResourceLimits {
            cpu_shares: args.cpu_shares,
            memory,
        },
    };

    let spec = runtime.create(request)?;
    eprintln!("{}", spec.id());
    let status = runtime.start(&spec)?;
    eprintln!("Container {} exited with status {}", spec.id(), status.code());
    Ok(ExitCode::from(output::exit_code(status.code())))
}
