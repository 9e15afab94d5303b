//! Batching: growable vertex/index streams and the per-frame draw command list.
//!
//! # Invariants
//! - Growth never drops or reorders previously appended data.
//! - Buffers only grow during single-threaded submission; consumers borrow them immutably.
//! - A reduced batch covers exactly the same index ranges as before reduction.

mod buffers;
mod commands;

pub use buffers::{GrowableBuffer, IndexDataBuffer, ModelVertex, VertexDataBuffer};
pub use commands::{DrawCommand, DrawCommands};

use std::collections::TryReserveError;

/// Errors from batch buffer growth.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("buffer growth to {requested} elements failed: {source}")]
    OutOfMemory {
        requested: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("range {start}..{end} outside buffer of length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}

pub fn crate_info() -> &'static str {
    "isoraster-batch v0.1.0"
}
