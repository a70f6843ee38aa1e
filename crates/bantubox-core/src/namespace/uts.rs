//! UTS namespace isolation.
//!
//! Allows the container to have its own hostname.

use bantubox_common::error::{BantuboxError, Result};

/// Sets the hostname inside the UTS namespace.
///
/// # Errors
///
/// Returns an error if `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname).map_err(|e| BantuboxError::HostnameFailure {
        hostname: hostname.to_string(),
        source: e.into(),
    })?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}
