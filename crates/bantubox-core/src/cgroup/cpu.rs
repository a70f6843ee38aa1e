//! CPU resource control.
//!
//! Limits are always requested as legacy shares. The legacy hierarchy takes
//! them verbatim through `cpu.shares`; the unified hierarchy takes a
//! `cpu.weight` derived with a linear mapping of the share range onto the
//! weight range.

use std::path::Path;

use bantubox_common::error::Result;

use super::{CgroupVersion, write_control_file};

/// Smallest value the kernel accepts in `cpu.shares`.
pub const MIN_SHARES: u64 = 2;
/// Largest value the kernel accepts in `cpu.shares`.
pub const MAX_SHARES: u64 = 262_144;
/// Smallest `cpu.weight`.
pub const MIN_WEIGHT: u64 = 1;
/// Largest `cpu.weight`.
pub const MAX_WEIGHT: u64 = 10_000;

/// Clamps a share request into the range the kernel accepts.
#[must_use]
pub const fn clamp_shares(shares: u64) -> u64 {
    if shares < MIN_SHARES {
        MIN_SHARES
    } else if shares > MAX_SHARES {
        MAX_SHARES
    } else {
        shares
    }
}

/// Converts shares to a unified-hierarchy weight.
///
/// `weight = 1 + ((shares - 2) * 9999) / 262142`, applied after clamping,
/// so 2 maps to 1, 262144 to 10000, and the default 1024 to 39.
#[must_use]
pub const fn shares_to_weight(shares: u64) -> u64 {
    let shares = clamp_shares(shares);
    MIN_WEIGHT + ((shares - MIN_SHARES) * (MAX_WEIGHT - MIN_WEIGHT)) / (MAX_SHARES - MIN_SHARES)
}

/// Returns the file name and value written for a share request.
#[must_use]
pub const fn cpu_limit(version: CgroupVersion, shares: u64) -> (&'static str, u64) {
    match version {
        CgroupVersion::Legacy => ("cpu.shares", clamp_shares(shares)),
        CgroupVersion::Unified => ("cpu.weight", shares_to_weight(shares)),
    }
}

/// Writes the CPU limit for `shares` into the group at `cgroup_path`.
///
/// # Errors
///
/// Returns [`bantubox_common::error::BantuboxError::CgroupSetupFailure`] if
/// the control file cannot be written.
pub fn set_cpu_limit(cgroup_path: &Path, version: CgroupVersion, shares: u64) -> Result<u64> {
    let (file, value) = cpu_limit(version, shares);
    write_control_file(&cgroup_path.join(file), &value.to_string())?;
    tracing::debug!(shares, file, value, "CPU limit set");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_conversion_endpoints() {
        assert_eq!(shares_to_weight(2), 1);
        assert_eq!(shares_to_weight(262_144), 10_000);
    }

    #[test]
    fn weight_conversion_common_values() {
        assert_eq!(shares_to_weight(1024), 39);
        assert_eq!(shares_to_weight(512), 20);
    }

    #[test]
    fn out_of_range_shares_are_clamped() {
        assert_eq!(clamp_shares(1), 2);
        assert_eq!(clamp_shares(1_000_000), 262_144);
        assert_eq!(shares_to_weight(1), 1);
        assert_eq!(shares_to_weight(u64::MAX), 10_000);
    }

    #[test]
    fn legacy_writes_shares_verbatim() {
        assert_eq!(cpu_limit(CgroupVersion::Legacy, 512), ("cpu.shares", 512));
        assert_eq!(cpu_limit(CgroupVersion::Unified, 512), ("cpu.weight", 20));
    }

    #[test]
    fn set_cpu_limit_writes_weight_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let value = set_cpu_limit(dir.path(), CgroupVersion::Unified, 1024).expect("write");
        assert_eq!(value, 39);
        let content = std::fs::read_to_string(dir.path().join("cpu.weight")).expect("read");
        assert_eq!(content, "39");
    }
}
