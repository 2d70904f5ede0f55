// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Vision Pipeline
//!
//! A pipeline owns its buffer arenas and an ordered list of operations. All slots
//! are allocated and all operations appended during configuration; each operation
//! is validated against the arenas when it is pushed, so a run never meets an
//! out-of-range slot.
//!
//! The pipeline carries a version counter that moves whenever its infrastructure
//! changes (new slots, new operations, filter or KWTA uploads). Execution contexts
//! compare it with the version they last uploaded.

use std::sync::atomic::{AtomicU64, Ordering};

use feagi_vision_core::{
    BufferRegistry, Dims2, FilterSlot, ImageSlot, InhibSlot, KwtaParams, KwtaSlot, Operation,
    Result, ScalarReduce, ScalarSlot, Value4DSlot, ValueSlot, VisionError,
};
use ndarray::{ArrayView3, ArrayView4, Axis};
use serde_json::json;
use tracing::{debug, info};

static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(1);

/// Ordered operations over a private set of buffer arenas
#[derive(Debug)]
pub struct VisionPipeline {
    id: u64,
    name: String,
    buffers: BufferRegistry,
    ops: Vec<Operation>,
    current_op: usize,
    version: u64,
}

impl VisionPipeline {
    /// Empty pipeline with `batch` data-parallel copies
    pub fn new(name: impl Into<String>, batch: usize) -> Result<Self> {
        let name = name.into();
        let id = NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(pipeline = %name, id, batch, "created vision pipeline");
        Ok(Self {
            id,
            name,
            buffers: BufferRegistry::new(batch)?,
            ops: Vec::new(),
            current_op: 0,
            version: 0,
        })
    }

    /// Process-unique identity, stable for the life of the pipeline
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch(&self) -> usize {
        self.buffers.batch()
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Index of the operation being executed (or last executed)
    pub fn current_op(&self) -> usize {
        self.current_op
    }

    /// Disjoint borrows for one frame: the operations, the arenas and the step cursor
    pub(crate) fn frame_parts(&mut self) -> (&[Operation], &mut BufferRegistry, &mut usize) {
        (&self.ops, &mut self.buffers, &mut self.current_op)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    // ---- slot allocation -------------------------------------------------

    pub fn new_filters(&mut self, count: usize, size: Dims2) -> Result<FilterSlot> {
        self.touch();
        self.buffers.new_filters(count, size)
    }

    pub fn new_image(&mut self, size: Dims2) -> Result<ImageSlot> {
        self.touch();
        self.buffers.new_image(size)
    }

    pub fn new_values(&mut self, size: Dims2, features: usize) -> Result<ValueSlot> {
        self.touch();
        self.buffers.new_values(size, features)
    }

    pub fn new_values4d(&mut self, pools: Dims2, units: Dims2) -> Result<Value4DSlot> {
        self.touch();
        self.buffers.new_values4d(pools, units)
    }

    /// `count` consecutive scalar slots; returns the first
    pub fn new_scalars(&mut self, count: usize) -> Result<ScalarSlot> {
        self.touch();
        self.buffers.new_scalars(count)
    }

    pub fn new_inhibs(&mut self, pools: Dims2) -> Result<InhibSlot> {
        self.touch();
        self.buffers.new_inhibs(pools)
    }

    pub fn new_kwta(&mut self, params: KwtaParams) -> KwtaSlot {
        self.touch();
        self.buffers.new_kwta(params)
    }

    // ---- data in ---------------------------------------------------------

    /// Upload a kernel bank `[filter][Y][X]`
    pub fn set_filters(&mut self, slot: FilterSlot, kernels: ArrayView3<f32>) -> Result<()> {
        self.touch();
        self.buffers.set_filters(slot, kernels)
    }

    /// Place unpadded `[channel][Y][X]` content for one batch entry
    pub fn set_image(
        &mut self,
        slot: ImageSlot,
        batch: usize,
        content: ArrayView3<f32>,
        border: Dims2,
    ) -> Result<()> {
        self.buffers.set_image(slot, batch, content, border)
    }

    pub fn set_scalar(&mut self, slot: ScalarSlot, batch: usize, value: f32) -> Result<()> {
        self.buffers.set_scalar(slot, batch, value)
    }

    /// Reset every Values, Values4D, Scalars and inhibition buffer.
    ///
    /// Motion integrators keep their state in these arenas, so this restarts them.
    pub fn zero_state(&mut self) {
        self.buffers.zero_values();
        self.buffers.zero_scalars();
        self.buffers.zero_inhibs();
    }

    // ---- operations ------------------------------------------------------

    /// Validate and append an operation; returns its index
    pub fn push(&mut self, op: Operation) -> Result<usize> {
        op.validate(&self.buffers)?;
        debug!(
            pipeline = %self.name,
            index = self.ops.len(),
            kind = ?op.kind(),
            "appended operation"
        );
        self.ops.push(op);
        self.touch();
        Ok(self.ops.len() - 1)
    }

    /// Append both phases of a scalar reduction over a Values slot.
    ///
    /// Allocates `size.y` partial scalars and returns the scalar holding the result.
    pub fn push_scalar_reduction(
        &mut self,
        reduce: ScalarReduce,
        input: ValueSlot,
        size: Dims2,
        features: usize,
    ) -> Result<ScalarSlot> {
        let partials = self.new_scalars(size.y)?;
        let output = self.new_scalars(1)?;
        self.push(Operation::AggScalar {
            reduce,
            input,
            size,
            features,
            partials,
        })?;
        self.push(Operation::FinishScalar {
            reduce,
            partials,
            count: size.y,
            elements: size.area() * feagi_vision_core::POLARITIES * features,
            output,
        })?;
        Ok(output)
    }

    // ---- data out --------------------------------------------------------

    /// `[Y][X][polarity][feature]` view of one batch entry of a Values slot
    pub fn values(&self, slot: ValueSlot, batch: usize) -> Result<ArrayView4<'_, f32>> {
        self.buffers.values.check(slot.0)?;
        self.check_batch(batch)?;
        Ok(self.buffers.values.slot(slot.0).index_axis_move(Axis(0), batch))
    }

    /// `[poolY][poolX][unitY][unitX]` view of one batch entry of a Values4D slot
    pub fn values4d(&self, slot: Value4DSlot, batch: usize) -> Result<ArrayView4<'_, f32>> {
        self.buffers.values4d.check(slot.0)?;
        self.check_batch(batch)?;
        Ok(self
            .buffers
            .values4d
            .slot(slot.0)
            .index_axis_move(Axis(0), batch))
    }

    /// Every batch entry of an image slot, `[batch][channel][Y][X]`
    pub fn image(&self, slot: ImageSlot) -> Result<ArrayView4<'_, f32>> {
        self.buffers.images.check(slot.0)?;
        Ok(self.buffers.images.slot(slot.0))
    }

    pub fn scalar(&self, slot: ScalarSlot, batch: usize) -> Result<f32> {
        self.buffers.scalar(slot, batch)
    }

    fn check_batch(&self, batch: usize) -> Result<()> {
        if batch < self.batch() {
            Ok(())
        } else {
            Err(VisionError::InvalidParameter(format!(
                "batch index {} out of range ({} copies)",
                batch,
                self.batch()
            )))
        }
    }

    // ---- introspection ---------------------------------------------------

    /// Output elements produced by one run across every batch entry
    pub fn work_items(&self) -> usize {
        self.ops.iter().map(Operation::work_items).sum::<usize>() * self.batch()
    }

    /// Summary for logs and tools
    pub fn describe_json(&self) -> serde_json::Value {
        let ops: Vec<_> = self
            .ops
            .iter()
            .map(|op| {
                json!({
                    "kind": op.kind(),
                    "run_count": op.run_count(),
                    "work_items": op.work_items(),
                })
            })
            .collect();
        let b = &self.buffers;
        json!({
            "id": self.id,
            "name": self.name,
            "batch": self.batch(),
            "version": self.version,
            "arenas": {
                "filters": { "slots": b.filters.len(), "shape": b.filters.inner_shape() },
                "images": { "slots": b.images.len(), "shape": b.images.inner_shape() },
                "values": { "slots": b.values.len(), "shape": b.values.inner_shape() },
                "values4d": { "slots": b.values4d.len(), "shape": b.values4d.inner_shape() },
                "scalars": { "slots": b.scalars.len() },
                "inhibs": { "slots": b.inhibs.len(), "shape": b.inhibs.inner_shape() },
                "kwta_params": b.kwta_table().len(),
            },
            "operations": ops,
        })
    }

    /// Log a configuration summary at info level
    pub fn log_summary(&self) {
        let b = &self.buffers;
        info!(
            pipeline = %self.name,
            id = self.id,
            batch = self.batch(),
            ops = self.ops.len(),
            filters = b.filters.len(),
            images = b.images.len(),
            values = b.values.len(),
            values4d = b.values4d.len(),
            scalars = b.scalars.len(),
            inhibs = b.inhibs.len(),
            "vision pipeline configured"
        );
    }
}
