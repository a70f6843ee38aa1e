//! # bantubox-core
//!
//! Low-level Linux isolation primitives for the BantuBox runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: clone flags for PID, mount, UTS and network isolation,
//!   hostname setup, and the ordered mount-namespace protocol.
//! - **Filesystem**: copy-on-write overlay roots, pseudo-filesystem mounts,
//!   `/dev` population, and `pivot_root`.
//! - **Cgroups**: per-container CPU and memory limits on either the legacy
//!   or the unified hierarchy.
//! - **Processes**: liveness checks and signalling by PID.
//!
//! Every syscall failure is mapped onto the workspace error taxonomy so the
//! caller can abort before exec.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
pub mod process;
