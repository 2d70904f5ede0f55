// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # FEAGI Vision Engine
//!
//! Executes vision pipelines built from `feagi-vision-core` operations.
//!
//! ## Architecture
//! - **[`VisionPipeline`]**: owns its buffer arenas and an ordered list of validated operations
//! - **[`ExecutionContext`]**: binds one pipeline at a time to a compute backend and runs frames
//! - **[`backend`]**: interchangeable backbones (sequential CPU, thread-pool CPU, WGPU)
//!
//! ## Usage
//! ```no_run
//! use feagi_vision_engine::{
//!     BackendConfig, BackendType, BarrierPolicy, ExecutionContext, VisionPipeline,
//! };
//!
//! # fn main() -> feagi_vision_core::Result<()> {
//! let mut pipeline = VisionPipeline::new("dog", 1)?;
//! // ... allocate slots, upload filters, push operations ...
//! let mut ctx = ExecutionContext::from_config(
//!     BackendType::CPU,
//!     0,
//!     &BackendConfig::default(),
//!     BarrierPolicy::Full,
//! )?;
//! ctx.bind(&pipeline)?;
//! let stats = ctx.run(&mut pipeline)?;
//! println!("{} operations in {:.1}us", stats.ops.len(), stats.total_us);
//! # Ok(())
//! # }
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod context;
pub mod pipeline;

pub use backend::{
    create_backend, is_gpu_available, select_backend, BackendConfig, BackendDecision, BackendType,
    CPUBackend, ComputeBackend, Parallelism,
};
#[cfg(feature = "gpu")]
pub use backend::WGPUBackend;
pub use context::{BarrierPolicy, ExecutionContext, KwtaRecord, OpTiming, RunStats};
pub use pipeline::VisionPipeline;
