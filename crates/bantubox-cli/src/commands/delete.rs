//! `bb delete` — Delete containers.

use std::process::ExitCode;
use std::time::Duration;

use bantubox_common::constants::DEFAULT_STOP_TIMEOUT_SECS;
use bantubox_runtime::engine::Runtime;
use clap::Args;

use crate::output;

/// Arguments for the `delete` command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Container IDs to delete.
    #[arg(required = true)]
    pub containers: Vec<String>,

    /// Stop running containers first instead of refusing.
    #[arg(short, long)]
    pub force: bool,

    /// Seconds to wait after SIGTERM when forcing.
    #[arg(short, long, default_value_t = DEFAULT_STOP_TIMEOUT_SECS)]
    pub timeout: u64,
}

/// Executes the `delete` command. Every id is attempted; failures are
/// reported per id.
pub fn execute(runtime: &Runtime, args: &DeleteArgs) -> ExitCode {
    let grace = Duration::from_secs(args.timeout);
    let ok = output::for_each_id(&args.containers, |id| {
        runtime.delete(id, args.force, grace)?;
        println!("{id}");
        Ok(())
    });
    output::batch_exit(ok)
}
