//! Memory resource control.
//!
//! Writes the hard limit and the swap bound for either hierarchy. The
//! swap bound is requested as memory-plus-swap; the unified hierarchy
//! stores swap alone, so the memory share is subtracted there.

use std::path::Path;

use bantubox_common::error::Result;
use bantubox_common::types::{MemoryLimit, SwapLimit};

use super::{CgroupVersion, write_control_file};

/// Returns the `(file, value)` writes needed for `limit`, in order.
#[must_use]
pub fn memory_writes(version: CgroupVersion, limit: &MemoryLimit) -> Vec<(&'static str, String)> {
    let mut writes = Vec::with_capacity(2);
    match version {
        CgroupVersion::Unified => {
            writes.push(("memory.max", limit.limit_bytes.to_string()));
            match limit.swap {
                SwapLimit::Default => {}
                SwapLimit::Unlimited => writes.push(("memory.swap.max", "max".to_string())),
                SwapLimit::Total(total) => writes.push((
                    "memory.swap.max",
                    total.saturating_sub(limit.limit_bytes).to_string(),
                )),
            }
        }
        CgroupVersion::Legacy => {
            writes.push(("memory.limit_in_bytes", limit.limit_bytes.to_string()));
            match limit.swap {
                SwapLimit::Default => {}
                SwapLimit::Unlimited => writes.push(("memory.memsw.limit_in_bytes", "-1".to_string())),
                SwapLimit::Total(total) => {
                    writes.push(("memory.memsw.limit_in_bytes", total.to_string()));
                }
            }
        }
    }
    writes
}

/// Applies `limit` to the group at `cgroup_path`.
///
/// # Errors
///
/// Returns [`bantubox_common::error::BantuboxError::CgroupSetupFailure`] if
/// any control file cannot be written.
pub fn set_memory_limit(cgroup_path: &Path, version: CgroupVersion, limit: &MemoryLimit) -> Result<()> {
    for (file, value) in memory_writes(version, limit) {
        write_control_file(&cgroup_path.join(file), &value)?;
    }
    tracing::debug!(bytes = limit.limit_bytes, swap = ?limit.swap, "memory limit set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn unified_swap_is_total_minus_memory() {
        let limit = MemoryLimit {
            limit_bytes: 64 * MIB,
            swap: SwapLimit::Total(96 * MIB),
        };
        let writes = memory_writes(CgroupVersion::Unified, &limit);
        assert_eq!(
            writes,
            vec![
                ("memory.max", (64 * MIB).to_string()),
                ("memory.swap.max", (32 * MIB).to_string()),
            ]
        );
    }

    #[test]
    fn legacy_swap_is_total() {
        let limit = MemoryLimit {
            limit_bytes: 64 * MIB,
            swap: SwapLimit::Unlimited,
        };
        let writes = memory_writes(CgroupVersion::Legacy, &limit);
        assert_eq!(writes[1], ("memory.memsw.limit_in_bytes", "-1".to_string()));
    }

    #[test]
    fn default_swap_writes_memory_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let limit = MemoryLimit {
            limit_bytes: 128 * MIB,
            swap: SwapLimit::Default,
        };
        set_memory_limit(dir.path(), CgroupVersion::Unified, &limit).expect("write");
        let content = std::fs::read_to_string(dir.path().join("memory.max")).expect("read");
        assert_eq!(content, (128 * MIB).to_string());
        assert!(!dir.path().join("memory.swap.max").exists());
    }
}
