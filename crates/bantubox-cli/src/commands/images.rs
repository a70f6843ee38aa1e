//! `bb images` — List local images.

use std::process::ExitCode;

use bantubox_runtime::engine::Runtime;

use crate::output;

/// Executes the `images` command.
///
/// # Errors
///
/// Returns an error if the image directory is absent or unreadable.
pub fn execute(runtime: &Runtime) -> anyhow::Result<ExitCode> {
    let images = runtime.images()?;
    if images.is_empty() {
        println!("No images found in {}.", runtime.config().image_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<24} {:<12} {}", "NAME", "SIZE", "CACHED");
    for image in &images {
        println!(
            "{:<24} {:<12} {}",
            image.name,
            output::format_bytes(image.size_bytes),
            if image.cached { "yes" } else { "no" }
        );
    }
    Ok(ExitCode::SUCCESS)
}
