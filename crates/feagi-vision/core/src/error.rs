// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for vision pipeline configuration and execution

use crate::registry::ArenaKind;

/// Errors raised while configuring or running a vision pipeline.
///
/// Configuration problems (geometry, slots, shapes) are reported when a slot is
/// requested or an operation is appended, never in the middle of a run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisionError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("{arena} slot {index} out of range ({count} allocated)")]
    SlotOutOfRange {
        arena: ArenaKind,
        index: usize,
        count: usize,
    },

    #[error("Invalid shape hint for {arena}: expected {expected} dimensions, got {actual}")]
    InvalidShapeHint {
        arena: ArenaKind,
        expected: usize,
        actual: usize,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Pipeline {0} is not bound to this execution context")]
    NotBound(u64),

    #[error("Invalid backend: {0}")]
    InvalidBackend(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for vision operations
pub type Result<T> = std::result::Result<T, VisionError>;
