// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # feagi-observability
//!
//! Logging infrastructure shared by the FEAGI vision crates, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: per-run log folders with daily rotation and retention cleanup

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known FEAGI vision crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "feagi-vision",
    "feagi-vision-core",
    "feagi-vision-engine",
    "feagi-config",
    "feagi-observability",
];

/// Tracing target of a crate (`feagi-vision-core` → `feagi_vision_core`)
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
