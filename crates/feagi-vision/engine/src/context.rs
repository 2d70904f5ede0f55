// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Execution Context
//!
//! A backend sees exactly one pipeline's buffers at a time. [`ExecutionContext::bind`]
//! makes a pipeline current, which is a full context switch: all infrastructure
//! (filter kernels, KWTA parameter tables) is uploaded to the backend. Image data
//! is not part of the switch; it is uploaded at the start of every run.
//!
//! A run blocks the calling thread until every operation has completed. The only
//! suspension points are the barriers between operations.

use std::time::Instant;

use ahash::AHashSet;
use feagi_vision_core::{KwtaOutcome, OpKind, Result, SlotRef, VisionError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::backend::{create_backend, BackendConfig, BackendType, ComputeBackend};
use crate::pipeline::VisionPipeline;

/// When the context waits for outstanding work between operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarrierPolicy {
    /// Barrier at every operation boundary
    #[default]
    Full,
    /// Barrier only before an operation that touches a slot with an outstanding
    /// conflicting access (read-after-write, write-after-read, write-after-write)
    DataDependent,
}

/// Wall time of one dispatched operation
#[derive(Debug, Clone, Serialize)]
pub struct OpTiming {
    pub index: usize,
    pub kind: OpKind,
    pub elapsed_us: f64,
}

/// KWTA convergence for one operation, one outcome per batch entry
#[derive(Debug, Clone)]
pub struct KwtaRecord {
    pub op_index: usize,
    pub outcomes: Vec<KwtaOutcome>,
}

/// Statistics for one run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub ops: Vec<OpTiming>,
    pub kwta: Vec<KwtaRecord>,
    pub barriers: usize,
    pub total_us: f64,
}

/// Slots with accesses not yet fenced by a barrier
#[derive(Debug, Default)]
struct Hazards {
    reads: AHashSet<SlotRef>,
    writes: AHashSet<SlotRef>,
}

impl Hazards {
    fn conflicts(&self, reads: &[SlotRef], writes: &[SlotRef]) -> bool {
        reads.iter().any(|s| self.writes.contains(s))
            || writes
                .iter()
                .any(|s| self.writes.contains(s) || self.reads.contains(s))
    }

    fn record(&mut self, reads: Vec<SlotRef>, writes: Vec<SlotRef>) {
        self.reads.extend(reads);
        self.writes.extend(writes);
    }

    fn clear(&mut self) {
        self.reads.clear();
        self.writes.clear();
    }
}

/// Binds pipelines to a compute backend and runs frames
pub struct ExecutionContext {
    backend: Box<dyn ComputeBackend>,
    /// `(pipeline id, pipeline version)` of the current pipeline
    bound: Option<(u64, u64)>,
    barrier: BarrierPolicy,
    switches: u64,
}

impl ExecutionContext {
    pub fn new(backend: Box<dyn ComputeBackend>, barrier: BarrierPolicy) -> Self {
        Self {
            backend,
            bound: None,
            barrier,
            switches: 0,
        }
    }

    /// Create the backend (auto-selecting when `backend_type` is `Auto`) and wrap it
    pub fn from_config(
        backend_type: BackendType,
        work_items: usize,
        config: &BackendConfig,
        barrier: BarrierPolicy,
    ) -> Result<Self> {
        Ok(Self::new(
            create_backend(backend_type, work_items, config)?,
            barrier,
        ))
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }

    pub fn barrier_policy(&self) -> BarrierPolicy {
        self.barrier
    }

    pub fn set_barrier_policy(&mut self, barrier: BarrierPolicy) {
        self.barrier = barrier;
    }

    /// Id of the current pipeline, if any
    pub fn bound_pipeline(&self) -> Option<u64> {
        self.bound.map(|(id, _)| id)
    }

    /// Number of context switches performed so far
    pub fn switches(&self) -> u64 {
        self.switches
    }

    pub fn is_bound(&self, pipeline: &VisionPipeline) -> bool {
        self.bound_pipeline() == Some(pipeline.id())
    }

    /// Make `pipeline` current.
    ///
    /// Cost: one upload of every filter kernel and KWTA parameter table in the
    /// pipeline. Rebinding the current pipeline at the same version is free.
    pub fn bind(&mut self, pipeline: &VisionPipeline) -> Result<()> {
        if self.bound == Some((pipeline.id(), pipeline.version())) {
            return Ok(());
        }
        let start = Instant::now();
        self.backend.upload_infrastructure(pipeline.buffers())?;
        let previous = self.bound_pipeline();
        self.bound = Some((pipeline.id(), pipeline.version()));
        self.switches += 1;
        info!(
            "Context switch to pipeline '{}' (id {}, version {}) on {} in {:.1}us (previous: {:?})",
            pipeline.name(),
            pipeline.id(),
            pipeline.version(),
            self.backend.backend_name(),
            start.elapsed().as_secs_f64() * 1e6,
            previous
        );
        Ok(())
    }

    /// Drop the current pipeline; the next run requires a new `bind`
    pub fn unbind(&mut self) {
        self.bound = None;
    }

    /// Run every operation of the bound pipeline once, for every batch entry.
    ///
    /// Fails with `NotBound` if `pipeline` is not the current pipeline. If the
    /// pipeline was reconfigured since it was bound, its infrastructure is
    /// re-uploaded first.
    pub fn run(&mut self, pipeline: &mut VisionPipeline) -> Result<RunStats> {
        match self.bound {
            Some((id, _)) if id != pipeline.id() => {
                return Err(VisionError::NotBound(pipeline.id()))
            }
            None => return Err(VisionError::NotBound(pipeline.id())),
            Some((_, version)) if version != pipeline.version() => {
                debug!(
                    "Pipeline '{}' changed since bind (version {} -> {}), resyncing",
                    pipeline.name(),
                    version,
                    pipeline.version()
                );
                self.backend.upload_infrastructure(pipeline.buffers())?;
                self.bound = Some((pipeline.id(), pipeline.version()));
            }
            Some(_) => {}
        }

        let mut stats = RunStats::default();
        if pipeline.is_empty() {
            return Ok(stats);
        }

        let start = Instant::now();
        self.backend.begin_frame(pipeline.buffers())?;

        let (ops, buffers, cursor) = pipeline.frame_parts();
        let mut hazards = Hazards::default();
        for (index, op) in ops.iter().enumerate() {
            let reads = op.inputs();
            let writes = op.outputs();
            let needs_barrier = match self.barrier {
                BarrierPolicy::Full => index > 0,
                BarrierPolicy::DataDependent => hazards.conflicts(&reads, &writes),
            };
            if needs_barrier {
                self.backend.barrier()?;
                hazards.clear();
                stats.barriers += 1;
            }
            hazards.record(reads, writes);

            *cursor = index;
            let op_start = Instant::now();
            let outcomes = self.backend.dispatch(op, buffers)?;
            let elapsed_us = op_start.elapsed().as_secs_f64() * 1e6;
            trace!(
                "[{}] op {} {:?} in {:.1}us",
                self.backend.backend_name(),
                index,
                op.kind(),
                elapsed_us
            );

            if !outcomes.is_empty() {
                for (b, outcome) in outcomes.iter().enumerate() {
                    trace!(
                        "KWTA op {} batch {}: {:?} (max del act {:.2e})",
                        index,
                        b,
                        outcome.state,
                        outcome.max_del_act
                    );
                }
                stats.kwta.push(KwtaRecord {
                    op_index: index,
                    outcomes,
                });
            }
            stats.ops.push(OpTiming {
                index,
                kind: op.kind(),
                elapsed_us,
            });
        }

        self.backend.barrier()?;
        self.backend.end_frame(buffers)?;
        stats.total_us = start.elapsed().as_secs_f64() * 1e6;
        debug!(
            "Run '{}': {} ops, {} barriers, {:.1}us",
            pipeline.name(),
            stats.ops.len(),
            stats.barriers,
            stats.total_us
        );
        Ok(stats)
    }
}
