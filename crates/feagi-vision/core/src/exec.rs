// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Row-distribution seam between operator bodies and execution backends.
//!
//! Operators are written as "compute one output row" functions. A [`RowMap`] decides
//! whether those rows run one after another or across a thread pool. Results come
//! back in input order, so any reduction done afterwards is deterministic.

/// Maps a function over independent work items, preserving order
pub trait RowMap: Sync {
    fn map_rows<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send;
}

/// Runs every row on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialRows;

impl RowMap for SequentialRows {
    fn map_rows<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        items.into_iter().map(f).collect()
    }
}
