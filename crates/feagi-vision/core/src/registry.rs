// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Buffer Registry
//!
//! Six arenas hold every tensor a pipeline touches. Each arena is one dense
//! `ndarray` whose leading axis is the slot index:
//!
//! ```text
//! Filters   [slot][filter][Y][X]
//! Images    [slot][batch][channel(3)][Y][X]
//! Values    [slot][batch][Y][X][polarity(2)][feature]
//! Values4D  [slot][batch][poolY][poolX][unitY][unitX]
//! Scalars   [slot][batch]
//! Inhibs    [slot][batch][poolY + 1][poolX + 1][InhibVar]
//! ```
//!
//! Requesting a slot grows the trailing axes to the element-wise maximum of every
//! request so far. Growth reallocates and copies, so slots written before a grow keep
//! their logical content at the new strides. Inhibition records carry one extra row
//! and column: the layer-level record lives at `[poolY][poolX]`.

use ndarray::{
    s, Array, ArrayView, ArrayView3, ArrayViewMut, Axis, Dimension, Ix2, Ix4, Ix5, Ix6,
    RemoveAxis, Slice,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::geometry::Dims2;
use crate::inhibition::{InhibVar, KwtaParams};

/// On/off polarity axis length of the Values arena
pub const POLARITIES: usize = 2;

/// Channel axis length of the Images arena
pub const IMAGE_CHANNELS: usize = 3;

/// Arena identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArenaKind {
    Filters,
    Images,
    Values,
    Values4D,
    Scalars,
    Inhibs,
}

impl ArenaKind {
    pub fn name(&self) -> &'static str {
        match self {
            ArenaKind::Filters => "Filters",
            ArenaKind::Images => "Images",
            ArenaKind::Values => "Values",
            ArenaKind::Values4D => "Values4D",
            ArenaKind::Scalars => "Scalars",
            ArenaKind::Inhibs => "Inhibs",
        }
    }

    /// Number of entries expected in a shape hint for this arena
    pub fn hint_len(&self) -> usize {
        match self {
            ArenaKind::Filters => 3,  // [filters, y, x]
            ArenaKind::Images => 2,   // [y, x]
            ArenaKind::Values => 3,   // [y, x, features]
            ArenaKind::Values4D => 4, // [poolY, poolX, unitY, unitX]
            ArenaKind::Scalars => 1,  // [count]
            ArenaKind::Inhibs => 2,   // [poolY, poolX]
        }
    }
}

impl std::fmt::Display for ArenaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A slot in a specific arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub arena: ArenaKind,
    pub index: usize,
}

macro_rules! slot_handle {
    ($(#[$meta:meta])* $name:ident, $arena:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            pub const ARENA: ArenaKind = $arena;

            #[inline]
            pub fn index(self) -> usize {
                self.0
            }

            pub fn slot_ref(self) -> SlotRef {
                SlotRef {
                    arena: Self::ARENA,
                    index: self.0,
                }
            }

            /// Handle `n` slots further along the arena
            pub fn offset(self, n: usize) -> Self {
                Self(self.0 + n)
            }
        }
    };
}

slot_handle!(
    /// Filter kernel bank `[filter][Y][X]`
    FilterSlot,
    ArenaKind::Filters
);
slot_handle!(
    /// Image `[batch][channel][Y][X]`
    ImageSlot,
    ArenaKind::Images
);
slot_handle!(
    /// Value grid `[batch][Y][X][polarity][feature]`
    ValueSlot,
    ArenaKind::Values
);
slot_handle!(
    /// 4D output `[batch][poolY][poolX][unitY][unitX]`
    Value4DSlot,
    ArenaKind::Values4D
);
slot_handle!(
    /// Per-batch scalar
    ScalarSlot,
    ArenaKind::Scalars
);
slot_handle!(
    /// Inhibition state grid `[batch][poolY+1][poolX+1][var]`
    InhibSlot,
    ArenaKind::Inhibs
);

/// Index into the registry's KWTA parameter table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KwtaSlot(pub usize);

/// A growable arena: one dense array whose leading axis indexes slots
#[derive(Debug, Clone)]
pub struct Arena<D: Dimension> {
    kind: ArenaKind,
    data: Array<f32, D>,
    hints: Vec<Vec<usize>>,
    generation: u64,
}

impl<D: Dimension> Arena<D> {
    fn new(kind: ArenaKind, inner: &[usize]) -> Self {
        let mut dim = D::zeros(inner.len() + 1);
        dim.slice_mut()[1..].copy_from_slice(inner);
        Self {
            kind,
            data: Array::zeros(dim),
            hints: Vec::new(),
            generation: 0,
        }
    }

    pub fn kind(&self) -> ArenaKind {
        self.kind
    }

    /// Number of allocated slots
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incremented whenever the trailing axes grow (strides change)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Trailing axis extents shared by every slot
    pub fn inner_shape(&self) -> &[usize] {
        &self.data.shape()[1..]
    }

    /// Shape hint the slot was requested with
    pub fn hint(&self, index: usize) -> Option<&[usize]> {
        self.hints.get(index).map(Vec::as_slice)
    }

    pub fn data(&self) -> &Array<f32, D> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array<f32, D> {
        &mut self.data
    }

    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    pub fn check(&self, index: usize) -> Result<()> {
        if index < self.len() {
            Ok(())
        } else {
            Err(VisionError::SlotOutOfRange {
                arena: self.kind,
                index,
                count: self.len(),
            })
        }
    }

    /// Append `count` slots, growing the trailing axes to cover `inner_request`
    fn push(&mut self, count: usize, inner_request: &[usize], hint: &[usize]) -> usize {
        let first = self.len();
        let old_shape = self.data.shape().to_vec();
        let mut dim = self.data.raw_dim();
        let mut inner_grew = false;
        {
            let extents = dim.slice_mut();
            extents[0] = first + count;
            for (current, &requested) in extents[1..].iter_mut().zip(inner_request) {
                if requested > *current {
                    *current = requested;
                    inner_grew = true;
                }
            }
        }

        let mut grown = Array::zeros(dim);
        grown
            .slice_each_axis_mut(|ax| Slice::from(0..old_shape[ax.axis.index()]))
            .assign(&self.data);
        self.data = grown;

        for _ in 0..count {
            self.hints.push(hint.to_vec());
        }
        if inner_grew {
            self.generation += 1;
        }
        first
    }
}

impl<D: RemoveAxis> Arena<D> {
    /// View of one slot (panics on an index that was never validated)
    pub fn slot(&self, index: usize) -> ArrayView<'_, f32, D::Smaller> {
        self.data.index_axis(Axis(0), index)
    }

    pub fn slot_mut(&mut self, index: usize) -> ArrayViewMut<'_, f32, D::Smaller> {
        self.data.index_axis_mut(Axis(0), index)
    }
}

/// Owns every buffer of one pipeline
#[derive(Debug, Clone)]
pub struct BufferRegistry {
    batch: usize,
    pub filters: Arena<Ix4>,
    pub images: Arena<Ix5>,
    pub values: Arena<Ix6>,
    pub values4d: Arena<Ix6>,
    pub scalars: Arena<Ix2>,
    pub inhibs: Arena<Ix5>,
    kwta: Vec<KwtaParams>,
}

impl BufferRegistry {
    /// Create empty arenas for `batch` data-parallel copies
    pub fn new(batch: usize) -> Result<Self> {
        if batch == 0 {
            return Err(VisionError::InvalidParameter(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            batch,
            filters: Arena::new(ArenaKind::Filters, &[1, 1, 1]),
            images: Arena::new(ArenaKind::Images, &[batch, IMAGE_CHANNELS, 1, 1]),
            values: Arena::new(ArenaKind::Values, &[batch, 1, 1, POLARITIES, 1]),
            values4d: Arena::new(ArenaKind::Values4D, &[batch, 1, 1, 1, 1]),
            scalars: Arena::new(ArenaKind::Scalars, &[batch]),
            inhibs: Arena::new(ArenaKind::Inhibs, &[batch, 1, 1, InhibVar::COUNT]),
            kwta: Vec::new(),
        })
    }

    /// Number of data-parallel copies
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Request a slot in `kind`, growing the arena to fit `hint`.
    ///
    /// Returns the index of the new slot. For Scalars the hint is a count and the
    /// index of the first of that many consecutive slots is returned.
    pub fn new_slot(&mut self, kind: ArenaKind, hint: &[usize]) -> Result<usize> {
        if hint.len() != kind.hint_len() {
            return Err(VisionError::InvalidShapeHint {
                arena: kind,
                expected: kind.hint_len(),
                actual: hint.len(),
            });
        }
        if hint.iter().any(|&d| d == 0) {
            return Err(VisionError::InvalidParameter(format!(
                "{} shape hint {:?} has a zero extent",
                kind, hint
            )));
        }

        let b = self.batch;
        let index = match kind {
            ArenaKind::Filters => self.filters.push(1, &[hint[0], hint[1], hint[2]], hint),
            ArenaKind::Images => self
                .images
                .push(1, &[b, IMAGE_CHANNELS, hint[0], hint[1]], hint),
            ArenaKind::Values => self
                .values
                .push(1, &[b, hint[0], hint[1], POLARITIES, hint[2]], hint),
            ArenaKind::Values4D => self
                .values4d
                .push(1, &[b, hint[0], hint[1], hint[2], hint[3]], hint),
            ArenaKind::Scalars => self.scalars.push(hint[0], &[b], hint),
            ArenaKind::Inhibs => self.inhibs.push(
                1,
                &[b, hint[0] + 1, hint[1] + 1, InhibVar::COUNT],
                hint,
            ),
        };
        debug!(arena = %kind, index, ?hint, "allocated buffer slot");
        Ok(index)
    }

    pub fn new_filters(&mut self, count: usize, size: Dims2) -> Result<FilterSlot> {
        self.new_slot(ArenaKind::Filters, &[count, size.y, size.x])
            .map(FilterSlot)
    }

    pub fn new_image(&mut self, size: Dims2) -> Result<ImageSlot> {
        self.new_slot(ArenaKind::Images, &[size.y, size.x])
            .map(ImageSlot)
    }

    pub fn new_values(&mut self, size: Dims2, features: usize) -> Result<ValueSlot> {
        self.new_slot(ArenaKind::Values, &[size.y, size.x, features])
            .map(ValueSlot)
    }

    pub fn new_values4d(&mut self, pools: Dims2, units: Dims2) -> Result<Value4DSlot> {
        self.new_slot(ArenaKind::Values4D, &[pools.y, pools.x, units.y, units.x])
            .map(Value4DSlot)
    }

    /// First of `count` consecutive scalar slots
    pub fn new_scalars(&mut self, count: usize) -> Result<ScalarSlot> {
        self.new_slot(ArenaKind::Scalars, &[count]).map(ScalarSlot)
    }

    pub fn new_inhibs(&mut self, pools: Dims2) -> Result<InhibSlot> {
        self.new_slot(ArenaKind::Inhibs, &[pools.y, pools.x])
            .map(InhibSlot)
    }

    /// Register KWTA parameters; derived fields are refreshed first
    pub fn new_kwta(&mut self, mut params: KwtaParams) -> KwtaSlot {
        params.update();
        self.kwta.push(params);
        KwtaSlot(self.kwta.len() - 1)
    }

    pub fn kwta_params(&self, slot: KwtaSlot) -> Result<&KwtaParams> {
        self.kwta.get(slot.0).ok_or_else(|| {
            VisionError::InvalidOperation(format!(
                "KWTA parameter slot {} out of range ({} registered)",
                slot.0,
                self.kwta.len()
            ))
        })
    }

    pub fn kwta_table(&self) -> &[KwtaParams] {
        &self.kwta
    }

    pub fn arena_len(&self, kind: ArenaKind) -> usize {
        match kind {
            ArenaKind::Filters => self.filters.len(),
            ArenaKind::Images => self.images.len(),
            ArenaKind::Values => self.values.len(),
            ArenaKind::Values4D => self.values4d.len(),
            ArenaKind::Scalars => self.scalars.len(),
            ArenaKind::Inhibs => self.inhibs.len(),
        }
    }

    pub fn check(&self, slot: SlotRef) -> Result<()> {
        match slot.arena {
            ArenaKind::Filters => self.filters.check(slot.index),
            ArenaKind::Images => self.images.check(slot.index),
            ArenaKind::Values => self.values.check(slot.index),
            ArenaKind::Values4D => self.values4d.check(slot.index),
            ArenaKind::Scalars => self.scalars.check(slot.index),
            ArenaKind::Inhibs => self.inhibs.check(slot.index),
        }
    }

    /// Shape hint the slot was requested with
    pub fn hint(&self, slot: SlotRef) -> Option<&[usize]> {
        match slot.arena {
            ArenaKind::Filters => self.filters.hint(slot.index),
            ArenaKind::Images => self.images.hint(slot.index),
            ArenaKind::Values => self.values.hint(slot.index),
            ArenaKind::Values4D => self.values4d.hint(slot.index),
            ArenaKind::Scalars => self.scalars.hint(slot.index),
            ArenaKind::Inhibs => self.inhibs.hint(slot.index),
        }
    }

    /// Sum of arena generations; changes whenever any arena re-strides
    pub fn generation(&self) -> u64 {
        self.filters.generation()
            + self.images.generation()
            + self.values.generation()
            + self.values4d.generation()
            + self.scalars.generation()
            + self.inhibs.generation()
    }

    /// Write a kernel bank `[filter][Y][X]` into a filter slot, zeroing the remainder
    pub fn set_filters(&mut self, slot: FilterSlot, kernels: ArrayView3<f32>) -> Result<()> {
        self.filters.check(slot.0)?;
        let (n, y, x) = kernels.dim();
        let hint = self.filters.hint(slot.0).map(<[usize]>::to_vec).unwrap_or_default();
        if hint.len() != 3 || n > hint[0] || y > hint[1] || x > hint[2] {
            return Err(VisionError::ShapeMismatch(format!(
                "kernels [{}][{}][{}] do not fit filter slot {} {:?}",
                n, y, x, slot.0, hint
            )));
        }
        let mut dst = self.filters.slot_mut(slot.0);
        dst.fill(0.0);
        dst.slice_mut(s![..n, ..y, ..x]).assign(&kernels);
        Ok(())
    }

    /// Place unpadded content `[channel][Y][X]` inside an image slot, offset by `border`.
    ///
    /// The border region is zeroed; padding operations fill it in.
    pub fn set_image(
        &mut self,
        slot: ImageSlot,
        batch: usize,
        content: ArrayView3<f32>,
        border: Dims2,
    ) -> Result<()> {
        self.images.check(slot.0)?;
        self.check_batch(batch)?;
        let (c, y, x) = content.dim();
        let hint = self.images.hint(slot.0).map(<[usize]>::to_vec).unwrap_or_default();
        if c > IMAGE_CHANNELS
            || hint.len() != 2
            || y + 2 * border.y > hint[0]
            || x + 2 * border.x > hint[1]
        {
            return Err(VisionError::ShapeMismatch(format!(
                "image content [{}][{}][{}] with border {} does not fit image slot {} {:?}",
                c, y, x, border, slot.0, hint
            )));
        }
        let mut dst = self.images.slot_mut(slot.0);
        let mut dst = dst.index_axis_mut(Axis(0), batch);
        dst.fill(0.0);
        dst.slice_mut(s![..c, border.y..border.y + y, border.x..border.x + x])
            .assign(&content);
        Ok(())
    }

    pub fn set_scalar(&mut self, slot: ScalarSlot, batch: usize, value: f32) -> Result<()> {
        self.scalars.check(slot.0)?;
        self.check_batch(batch)?;
        self.scalars.data_mut()[[slot.0, batch]] = value;
        Ok(())
    }

    pub fn scalar(&self, slot: ScalarSlot, batch: usize) -> Result<f32> {
        self.scalars.check(slot.0)?;
        self.check_batch(batch)?;
        Ok(self.scalars.data()[[slot.0, batch]])
    }

    /// Reset Values and Values4D (restarts any integrated state held there)
    pub fn zero_values(&mut self) {
        self.values.zero();
        self.values4d.zero();
    }

    pub fn zero_scalars(&mut self) {
        self.scalars.zero();
    }

    pub fn zero_inhibs(&mut self) {
        self.inhibs.zero();
    }

    fn check_batch(&self, batch: usize) -> Result<()> {
        if batch < self.batch {
            Ok(())
        } else {
            Err(VisionError::InvalidParameter(format!(
                "batch index {} out of range ({} copies)",
                batch, self.batch
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_trailing_dims_are_elementwise_max() {
        let mut reg = BufferRegistry::new(2).unwrap();
        reg.new_values(Dims2::new(10, 4), 2).unwrap();
        reg.new_values(Dims2::new(3, 8), 1).unwrap();
        reg.new_values(Dims2::new(5, 5), 6).unwrap();
        assert_eq!(reg.values.len(), 3);
        assert_eq!(reg.values.inner_shape(), &[2, 8, 10, POLARITIES, 6]);
    }

    #[test]
    fn test_grow_preserves_written_values() {
        let mut reg = BufferRegistry::new(1).unwrap();
        let first = reg.new_values(Dims2::new(2, 2), 1).unwrap();
        reg.values.slot_mut(first.0)[[0, 1, 1, 0, 0]] = 3.5;
        reg.values.slot_mut(first.0)[[0, 0, 0, 1, 0]] = -1.25;
        let generation = reg.values.generation();

        reg.new_values(Dims2::new(7, 9), 4).unwrap();
        assert!(reg.values.generation() > generation);
        assert_eq!(reg.values.slot(first.0)[[0, 1, 1, 0, 0]], 3.5);
        assert_eq!(reg.values.slot(first.0)[[0, 0, 0, 1, 0]], -1.25);
        assert_eq!(reg.values.slot(first.0)[[0, 6, 8, 0, 3]], 0.0);
    }

    #[test]
    fn test_scalars_allocate_consecutive_slots() {
        let mut reg = BufferRegistry::new(3).unwrap();
        let a = reg.new_scalars(4).unwrap();
        let b = reg.new_scalars(1).unwrap();
        assert_eq!(a, ScalarSlot(0));
        assert_eq!(b, ScalarSlot(4));
        assert_eq!(reg.scalars.data().dim(), (5, 3));
    }

    #[test]
    fn test_inhibs_reserve_layer_record() {
        let mut reg = BufferRegistry::new(1).unwrap();
        reg.new_inhibs(Dims2::new(6, 4)).unwrap();
        assert_eq!(reg.inhibs.inner_shape(), &[1, 5, 7, InhibVar::COUNT]);
    }

    #[test]
    fn test_bad_hints_rejected() {
        let mut reg = BufferRegistry::new(1).unwrap();
        assert!(matches!(
            reg.new_slot(ArenaKind::Values, &[1, 2]),
            Err(VisionError::InvalidShapeHint { expected: 3, actual: 2, .. })
        ));
        assert!(matches!(
            reg.new_slot(ArenaKind::Images, &[0, 2]),
            Err(VisionError::InvalidParameter(_))
        ));
        assert!(BufferRegistry::new(0).is_err());
    }

    #[test]
    fn test_slot_check() {
        let mut reg = BufferRegistry::new(1).unwrap();
        let slot = reg.new_image(Dims2::splat(4)).unwrap();
        assert!(reg.check(slot.slot_ref()).is_ok());
        let err = reg.check(ImageSlot(5).slot_ref()).unwrap_err();
        assert_eq!(
            err,
            VisionError::SlotOutOfRange {
                arena: ArenaKind::Images,
                index: 5,
                count: 1
            }
        );
    }

    #[test]
    fn test_set_image_offsets_by_border() {
        let mut reg = BufferRegistry::new(2).unwrap();
        let slot = reg.new_image(Dims2::splat(6)).unwrap();
        let content = Array3::from_elem((1, 2, 2), 1.0f32);
        reg.set_image(slot, 1, content.view(), Dims2::splat(2)).unwrap();
        let img = reg.images.slot(slot.0);
        assert_eq!(img[[1, 0, 2, 2]], 1.0);
        assert_eq!(img[[1, 0, 3, 3]], 1.0);
        assert_eq!(img[[1, 0, 1, 1]], 0.0);
        assert_eq!(img[[0, 0, 2, 2]], 0.0);

        let too_big = Array3::from_elem((1, 4, 4), 1.0f32);
        assert!(reg.set_image(slot, 0, too_big.view(), Dims2::splat(2)).is_err());
    }

    #[test]
    fn test_set_filters_checks_shape() {
        let mut reg = BufferRegistry::new(1).unwrap();
        let slot = reg.new_filters(2, Dims2::splat(3)).unwrap();
        let kernels = Array3::from_elem((2, 3, 3), 0.5f32);
        reg.set_filters(slot, kernels.view()).unwrap();
        assert_eq!(reg.filters.slot(slot.0)[[1, 2, 2]], 0.5);
        let wrong = Array3::from_elem((3, 3, 3), 0.5f32);
        assert!(matches!(
            reg.set_filters(slot, wrong.view()),
            Err(VisionError::ShapeMismatch(_))
        ));
    }
}
