//! Raster: fixed-point scanline fills of flat, Gouraud and textured triangles.
//!
//! Triangles submitted during a scene are packed into per-kind record arrays
//! tagged with a shared submission index. `end_scene` hands the arrays to a
//! backend, which resolves them into the pixel surface.
//!
//! # Invariants
//! - Opaque overlap resolves as painter order: the latest submission wins.
//! - Alpha triangles are blended after every opaque triangle, in submission order.
//! - No fill ever writes outside the surface or into the right border column.
//! - Sequential and parallel backends produce identical pixels for the same queue.

mod backend;
mod command;
mod config;
mod context;
mod edge;
mod fill;
mod packed;
mod parallel;
mod queue;
mod sink;

pub use backend::{PassStats, RasterBackend, SequentialBackend, Tables, draw_command};
pub use command::{
    AlphaShape, AlphaTriangle, FlatTriangle, GouraudTriangle, TexturedTriangle, TriangleCommand,
    TriangleKind,
};
pub use config::RasterConfig;
pub use context::{FrameStats, Rasterizer};
pub use edge::{AttrScale, EdgeInput, ScanlineFill, walk_triangle};
pub use fill::{fill_alpha, fill_flat, fill_gouraud, fill_textured};
pub use packed::{
    AlphaRecord, FlatRecord, GouraudRecord, MAX_TRIANGLE_INDEX, PackedRecord, TexturedRecord,
    as_words,
};
pub use parallel::ParallelBackend;
pub use queue::{OpaqueInOrder, Queued, TriangleQueue};
pub use sink::{BlendSink, CoverageSink, DepthSink, PixelSink, ResolveSink, SurfaceSink};

use isoraster_batch::BatchError;
use isoraster_common::SurfaceError;
use isoraster_palette::PaletteError;

/// Errors from rasterizer setup and frame resolution.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("palette error: {0}")]
    Palette(#[from] PaletteError),
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("buffer allocation failed: {0}")]
    OutOfMemory(#[from] std::collections::TryReserveError),
    #[error("raster worker panicked")]
    WorkerPanicked,
    #[error("raster worker channel disconnected")]
    WorkerDisconnected,
    #[error("end_scene called without start_scene")]
    SceneNotStarted,
}

pub fn crate_info() -> &'static str {
    "isoraster-raster v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("raster"));
    }
}
