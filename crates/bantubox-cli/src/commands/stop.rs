//! `bb stop` — Stop containers and remove them.

use std::process::ExitCode;
use std::time::Duration;

use bantubox_common::constants::DEFAULT_STOP_TIMEOUT_SECS;
use bantubox_runtime::engine::Runtime;
use clap::Args;

use crate::output;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container IDs to stop.
    #[arg(required = true)]
    pub containers: Vec<String>,

    /// Seconds to wait after SIGTERM before sending SIGKILL.
    #[arg(short, long, default_value_t = DEFAULT_STOP_TIMEOUT_SECS)]
    pub timeout: u64,
}

/// Executes the `stop` command. Every id is attempted; failures are
/// reported per id.
pub fn execute(runtime: &Runtime, args: &StopArgs) -> ExitCode {
    let grace = Duration::from_secs(args.timeout);
    let ok = output::for_each_id(&args.containers, |id| {
        runtime.stop(id, grace)?;
        println!("{id}");
        Ok(())
    });
    output::batch_exit(ok)
}
