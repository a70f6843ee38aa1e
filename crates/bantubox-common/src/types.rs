//! Domain primitive types used across the BantuBox workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BantuboxError, Result};

/// Unique identifier for a container instance.
///
/// Always a hyphenated UUID, which also guarantees the id is a single,
/// traversal-free path component under the container directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Generates a random (v4) container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parses a user-supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`BantuboxError::ContainerNotFound`] if `raw` is not a UUID,
    /// since no registry entry can exist under such a name.
    pub fn parse(raw: &str) -> Result<Self> {
        uuid::Uuid::parse_str(raw)
            .map(|u| Self(u.hyphenated().to_string()))
            .map_err(|_| BantuboxError::ContainerNotFound { id: raw.to_string() })
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Swap limit accompanying a memory limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapLimit {
    /// Leave the kernel default in place.
    Default,
    /// No bound on swap usage.
    Unlimited,
    /// Bound on memory plus swap, in bytes.
    Total(u64),
}

/// Memory bound for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLimit {
    /// Hard memory limit in bytes.
    pub limit_bytes: u64,
    /// Swap bound.
    pub swap: SwapLimit,
}

impl MemoryLimit {
    /// Builds a memory limit from the `--memory`/`--memory-swap` pair.
    ///
    /// `swap` follows the conventional semantics: memory plus swap in bytes,
    /// or `-1` for unlimited.
    ///
    /// # Errors
    ///
    /// Returns a config error if the swap total is below the memory limit
    /// or if a swap value is given without a memory limit.
    pub fn from_flags(memory: Option<&str>, swap: Option<&str>) -> Result<Option<Self>> {
        let Some(memory) = memory else {
            return match swap {
                Some(_) => Err(BantuboxError::Config {
                    message: "--memory-swap requires --memory".into(),
                }),
                None => Ok(None),
            };
        };
        let limit_bytes = parse_size(memory)?;
        let swap = match swap.map(str::trim) {
            None => SwapLimit::Default,
            Some("-1") => SwapLimit::Unlimited,
            Some(raw) => {
                let total = parse_size(raw)?;
                if total < limit_bytes {
                    return Err(BantuboxError::Config {
                        message: format!(
                            "--memory-swap ({total} bytes) must not be smaller than --memory ({limit_bytes} bytes)"
                        ),
                    });
                }
                SwapLimit::Total(total)
            }
        };
        Ok(Some(Self { limit_bytes, swap }))
    }
}

/// Resource limits for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU shares (relative weight, legacy scale). `0` means unset.
    pub cpu_shares: u64,
    /// Memory limit, if any.
    pub memory: Option<MemoryLimit>,
}

/// Parses a byte size such as `512`, `64k`, `128m`, or `1g` (binary multiples).
///
/// # Errors
///
/// Returns a config error if the value is not a non-negative integer with an
/// optional `k`, `m`, or `g` suffix.
pub fn parse_size(raw: &str) -> Result<u64> {
    let s = raw.trim().to_ascii_lowercase();
    let s = s.strip_suffix('b').unwrap_or(&s);
    let (digits, multiplier) = match s.chars().last() {
        Some('k') => (&s[..s.len() - 1], 1024),
        Some('m') => (&s[..s.len() - 1], 1024 * 1024),
        Some('g') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| BantuboxError::Config {
            message: format!("invalid size {raw:?}"),
        })
}

/// Observed state of a registered container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerState {
    /// The recorded process is alive.
    Running,
    /// The recorded process is gone; the entry remains until deleted.
    Exited,
    /// No PID has been recorded.
    Unknown,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for ContainerId {
    type Err = BantuboxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
