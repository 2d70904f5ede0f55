// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # CPU Backend
//!
//! Runs the shared host operator bodies. Output rows are either processed in order
//! on the calling thread or spread over a rayon pool; every row writes a disjoint
//! part of its output, so both backbones produce the same values.

use std::sync::Arc;

use feagi_vision_core::{
    operators, BufferRegistry, KwtaOutcome, Operation, Result, RowMap, VisionError,
};
use rayon::prelude::*;

use super::{BackendType, ComputeBackend};

/// How output rows are distributed
#[derive(Clone, Default)]
pub enum Parallelism {
    /// One row after another on the calling thread
    Sequential,
    /// Rayon's global pool
    #[default]
    Global,
    /// A dedicated pool with a fixed number of workers
    Pool(Arc<rayon::ThreadPool>),
}

impl std::fmt::Debug for Parallelism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parallelism::Sequential => write!(f, "Sequential"),
            Parallelism::Global => write!(f, "Global({})", rayon::current_num_threads()),
            Parallelism::Pool(pool) => write!(f, "Pool({})", pool.current_num_threads()),
        }
    }
}

impl Parallelism {
    /// Workers that may execute rows concurrently
    pub fn threads(&self) -> usize {
        match self {
            Parallelism::Sequential => 1,
            Parallelism::Global => rayon::current_num_threads(),
            Parallelism::Pool(pool) => pool.current_num_threads(),
        }
    }
}

impl RowMap for Parallelism {
    fn map_rows<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        match self {
            Parallelism::Sequential => items.into_iter().map(f).collect(),
            Parallelism::Global => items.into_par_iter().map(f).collect(),
            Parallelism::Pool(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
        }
    }
}

/// CPU backend over the host operator bodies
pub struct CPUBackend {
    /// Backend name for logging
    name: String,
    rows: Parallelism,
}

impl CPUBackend {
    /// Thread-pool backend on rayon's global pool
    pub fn new() -> Self {
        Self {
            name: format!("CPU (rayon, {} threads)", rayon::current_num_threads()),
            rows: Parallelism::Global,
        }
    }

    /// Single-threaded backend
    pub fn sequential() -> Self {
        Self {
            name: "CPU (sequential)".to_string(),
            rows: Parallelism::Sequential,
        }
    }

    /// Thread-pool backend with its own pool of `threads` workers
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(VisionError::Backend(
                "thread count must be at least 1".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("feagi-vision-{}", i))
            .build()
            .map_err(|e| VisionError::Backend(format!("Failed to build thread pool: {}", e)))?;
        Ok(Self {
            name: format!("CPU (rayon, {} threads)", threads),
            rows: Parallelism::Pool(Arc::new(pool)),
        })
    }

    pub fn parallelism(&self) -> &Parallelism {
        &self.rows
    }
}

impl Default for CPUBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CPUBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> BackendType {
        match self.rows {
            Parallelism::Sequential => BackendType::Sequential,
            _ => BackendType::CPU,
        }
    }

    fn dispatch(
        &mut self,
        op: &Operation,
        buffers: &mut BufferRegistry,
    ) -> Result<Vec<KwtaOutcome>> {
        operators::apply(op, buffers, &self.rows)
    }
}
