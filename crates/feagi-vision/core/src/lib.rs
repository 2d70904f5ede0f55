// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # FEAGI Vision Core
//!
//! Backend-independent building blocks of the vision feature-extraction pipeline:
//! - **Geometry**: padded input / strided output extents derived from filter size
//! - **Registry**: six growable buffer arenas addressed by typed slot handles
//! - **Operations**: the closed vocabulary of vision operators
//! - **Operators**: per-row operator bodies shared by every execution backend
//! - **Inhibition**: FFFB layer/pool inhibition and the KWTA convergence loop
//! - **Motion**: fast/slow integrators and opponent (star) motion
//!
//! Nothing in this crate schedules work. The engine crate decides how rows are
//! distributed (sequentially, over a thread pool, or on an accelerator) through the
//! [`RowMap`] seam.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod color;
pub mod error;
pub mod exec;
pub mod geometry;
pub mod inhibition;
pub mod motion;
pub mod ops;
pub mod operators;
pub mod registry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{Result, VisionError};
pub use exec::{RowMap, SequentialRows};
pub use geometry::{Dims2, Geometry};
pub use inhibition::{
    Chans, ConvergenceState, FffbParams, InhibState, InhibVar, KwtaOutcome, KwtaParams,
    NeighInhib, Nxx1Params, PoolShape,
};
pub use motion::{MotionDirection, MotionParams};
pub use ops::{OpKind, Operation, ScalarReduce};
pub use registry::{
    Arena, ArenaKind, BufferRegistry, FilterSlot, ImageSlot, InhibSlot, KwtaSlot, ScalarSlot,
    SlotRef, Value4DSlot, ValueSlot, IMAGE_CHANNELS, POLARITIES,
};
