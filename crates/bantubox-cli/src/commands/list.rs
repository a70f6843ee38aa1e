//! `bb list` — List containers.

use std::process::ExitCode;

use bantubox_runtime::engine::Runtime;
use clap::Args;

use crate::output;

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only print container IDs.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Executes the `list` command.
///
/// # Errors
///
/// Returns an error if the container directory cannot be read.
pub fn execute(runtime: &Runtime, args: &ListArgs) -> anyhow::Result<ExitCode> {
    let containers = runtime.list()?;

    if args.quiet {
        for c in &containers {
            println!("{}", c.id);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if containers.is_empty() {
        println!("No containers found.");
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:<38} {:<8} {:<8} {:<12} {:<20} {}",
        "CONTAINER ID", "STATE", "PID", "IMAGE", "CREATED", "COMMAND"
    );
    for c in &containers {
        let (image, created, command) = c.metadata.as_ref().map_or_else(
            || ("-".to_string(), "-".to_string(), "-".to_string()),
            |m| {
                (
                    m.image.clone(),
                    m.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    output::truncate(&m.command.join(" "), 40),
                )
            },
        );
        println!(
            "{:<38} {:<8} {:<8} {:<12} {:<20} {}",
            c.id,
            c.state,
            c.pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
            image,
            created,
            command
        );
    }

    Ok(ExitCode::SUCCESS)
}
