//! Formatted output helpers for CLI commands.
//!
//! Provides human-readable byte formatting, column truncation, exit code
//! mapping, and per-id error reporting for batch commands.

use std::process::ExitCode;

use bantubox_common::constants::BIN_NAME;

/// Formats a byte count into a human-readable string (e.g., "128.0 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Shortens `text` to at most `max` characters, marking the cut with `...`.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Maps a container status onto a process exit code; anything outside
/// `0..=255` becomes `1`.
#[must_use]
pub fn exit_code(status: i32) -> u8 {
    u8::try_from(status).unwrap_or(1)
}

/// Runs `action` for every id, reporting failures tagged with the id
/// instead of stopping at the first one.
/// Returns whether every id succeeded.
pub fn for_each_id(ids: &[String], mut action: impl FnMut(&str) -> anyhow::Result<()>) -> bool {
    let mut ok = true;
    for id in ids {
        if let Err(e) = action(id) {
            eprintln!("{BIN_NAME}: {id}: {e:#}");
            ok = false;
        }
    }
    ok
}

/// Exit code of a batch command.
#[must_use]
pub fn batch_exit(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
