//! # bantubox-image
//!
//! Image management for the BantuBox runtime.
//!
//! Handles:
//! - **Storage**: resolving `<image_dir>/<name>.tar` and caching its
//!   extracted template under `<image_dir>/<name>/rootfs`.
//! - **Layers**: unpacking tarballs with device entries filtered out.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod layer;
pub mod storage;
