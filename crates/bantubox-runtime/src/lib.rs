//! Container lifecycle management for the BantuBox runtime.
//!
//! [`engine::Runtime`] is the entry point: it resolves images, creates
//! registry entries, supervises the isolated child through
//! [`process`], and acts on [`state::ContainerRegistry`] for `stop`,
//! `list` and `delete`.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod container;
pub mod engine;
pub mod process;
pub mod state;
