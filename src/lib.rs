// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # FEAGI Vision
//!
//! Bio-inspired visual feature extraction for FEAGI: oriented edges, color
//! opponency, center-surround contrast and motion, computed by declarative
//! operation pipelines that run identically on every compute backend.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! feagi-vision = "0.0.1-beta.18"
//! ```
//!
//! ## Feature Flags
//! - **`gpu`**: WGPU compute backend
//! - **`tools`**: synthetic kernels and images for the `backend_compare` binary
//!
//! ## Usage
//!
//! ```rust,no_run
//! use feagi_vision::prelude::*;
//! use ndarray::Array2;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = feagi_vision::load_config_or_default(None)?;
//! let kernel = Array2::<f32>::zeros((12, 12)); // caller-supplied DoG kernel
//! let mut dog = DogGrey::configure(
//!     DogGreyParams::default(),
//!     Dims2::new(128, 128),
//!     1,
//!     kernel.view(),
//! )?;
//! let work_items = dog.pipeline().work_items();
//! let mut ctx = feagi_vision::settings::execution_context(&config, work_items)?;
//!
//! let image = ndarray::Array3::<f32>::zeros((1, 128, 128));
//! dog.set_image(0, image.view())?;
//! let stats = dog.run(&mut ctx)?;
//! println!("{} ops, output {:?}", stats.ops.len(), dog.output(0)?.dim());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  feagi-vision-core                                      │
//! │  (geometry, arenas, operations, operator bodies, KWTA)  │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  feagi-vision-engine                                    │
//! │  (pipelines, execution context, CPU / WGPU backends)    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  feagi-vision (this crate)                              │
//! │  (standard pipelines, configuration wiring)             │
//! └─────────────────────────────────────────────────────────┘
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod settings;
pub mod standard;

pub use feagi_config::{load_config, load_config_or_default, ConfigError, VisionConfig};
pub use feagi_vision_core as vision_core;
pub use feagi_vision_engine as engine;

/// Common imports for building and running vision pipelines
pub mod prelude {
    pub use crate::standard::{
        DogColor, DogColorParams, DogGrey, DogGreyParams, MotionDog, MotionDogParams,
        MotionSignal, StandardPipeline, V1cColor, V1cColorParams, V1cGrey, V1cParams,
        V1C_ROWS_GREY,
    };
    pub use feagi_vision_core::{
        Dims2, Geometry, KwtaParams, MotionDirection, MotionParams, NeighInhib, Operation,
        ScalarReduce, VisionError,
    };
    pub use feagi_vision_engine::{
        BackendConfig, BackendType, BarrierPolicy, ExecutionContext, RunStats, VisionPipeline,
    };
}
