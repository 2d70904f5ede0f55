// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Geometry Model
//!
//! Relates the padded input image, the filter footprint and the strided output grid:
//!
//! ```text
//! FilterLeft  = floor(FilterSize / 2)
//! FilterRight = FilterSize - FilterLeft
//! Border      = max(Border, FilterRight)
//! InputSize   = ContentSize + 2 * Border
//! OutputSize  = (InputSize - 2 * Border) / Spacing
//! ```
//!
//! Output cell `(y, x)` reads the filter window whose top-left corner sits at
//! `Border + (y, x) * Spacing - FilterLeft` in padded input coordinates. Because
//! `Border >= FilterRight`, every window lies inside the padded input and operator
//! bodies never bounds-check.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

/// Two-dimensional extent or offset (x = columns, y = rows)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dims2 {
    pub x: usize,
    pub y: usize,
}

impl Dims2 {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Same value on both axes
    pub const fn splat(v: usize) -> Self {
        Self { x: v, y: v }
    }

    pub const fn area(&self) -> usize {
        self.x * self.y
    }

    /// Element-wise maximum
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// True when both axes fit inside `other`
    pub fn fits_in(&self, other: &Self) -> bool {
        self.x <= other.x && self.y <= other.y
    }
}

impl std::fmt::Display for Dims2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Input/output extents and padding for one filtering stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Geometry {
    /// Padded input extent (content plus border on both sides)
    pub input_size: Dims2,
    /// Strided output extent
    pub output_size: Dims2,
    pub border: Dims2,
    pub spacing: Dims2,
    pub filter_size: Dims2,
    pub filter_left: Dims2,
    pub filter_right: Dims2,
}

impl Geometry {
    /// Configure border, spacing and filter footprint (sizes are bound later)
    pub fn new(border: Dims2, spacing: Dims2, filter_size: Dims2) -> Result<Self> {
        let mut geom = Self::default();
        geom.configure(border, spacing, filter_size)?;
        Ok(geom)
    }

    /// Configure and bind the content size in one step
    pub fn with_content(
        border: Dims2,
        spacing: Dims2,
        filter_size: Dims2,
        content: Dims2,
    ) -> Result<Self> {
        let mut geom = Self::new(border, spacing, filter_size)?;
        geom.bind_input_size(content)?;
        Ok(geom)
    }

    /// Derive filter halves and raise the border to cover the right half.
    ///
    /// Idempotent: configuring twice with the same arguments yields the same geometry.
    pub fn configure(&mut self, border: Dims2, spacing: Dims2, filter_size: Dims2) -> Result<()> {
        if spacing.x == 0 || spacing.y == 0 {
            return Err(VisionError::InvalidGeometry(format!(
                "spacing must be positive on both axes, got {}",
                spacing
            )));
        }
        self.spacing = spacing;
        self.filter_size = filter_size;
        self.filter_left = Dims2::new(filter_size.x / 2, filter_size.y / 2);
        self.filter_right = Dims2::new(
            filter_size.x - self.filter_left.x,
            filter_size.y - self.filter_left.y,
        );
        self.border = border.max(self.filter_right);
        Ok(())
    }

    /// Bind the unpadded content size and derive input and output extents
    pub fn bind_input_size(&mut self, content: Dims2) -> Result<()> {
        if self.spacing.x == 0 || self.spacing.y == 0 {
            return Err(VisionError::InvalidGeometry(
                "geometry must be configured before binding an input size".to_string(),
            ));
        }
        let output = Dims2::new(content.x / self.spacing.x, content.y / self.spacing.y);
        if output.x == 0 || output.y == 0 {
            return Err(VisionError::InvalidGeometry(format!(
                "content {} is smaller than spacing {}",
                content, self.spacing
            )));
        }
        self.input_size = Dims2::new(
            content.x + 2 * self.border.x,
            content.y + 2 * self.border.y,
        );
        self.output_size = output;
        Ok(())
    }

    /// Unpadded content extent
    pub fn content_size(&self) -> Dims2 {
        Dims2::new(
            self.input_size.x.saturating_sub(2 * self.border.x),
            self.input_size.y.saturating_sub(2 * self.border.y),
        )
    }

    /// Top-left corner `(row, col)` of the filter window for output cell `(y, x)`
    #[inline]
    pub fn window_origin(&self, y: usize, x: usize) -> (usize, usize) {
        (
            self.border.y + y * self.spacing.y - self.filter_left.y,
            self.border.x + x * self.spacing.x - self.filter_left.x,
        )
    }
}
