//! Scene: models, terrain tiles and the frame batcher that turns them into
//! rasterizer submissions.
//!
//! # Invariants
//! - Face `i` of a model always occupies vertices `3 * i .. 3 * i + 3` of its vertex block.
//! - A model is emitted at most once per frame; repeat draws reuse its start index.
//! - Cached vertex data only exists for models marked cacheable by the current scene.
//! - Commands are projected in submission order so painter's ordering holds.

mod batcher;
mod demo;
mod model;
mod projection;
mod tile;
mod vertex;

pub use batcher::{SceneBatcher, SceneConfig, SceneryTile};
pub use demo::{DEMO_TEXTURES, DemoScene, Placement};
pub use model::{Face, FaceKind, Model, ModelRegistry};
pub use projection::{
    FlushStats, NEAR_Z, Projection, place_vertex, project_commands, texture_basis, yaw_radians,
};
pub use tile::{
    HIDDEN_COLOR, Heightmap, OverlayTriangle, TILE_SIZE, TileOverlay, TileUnderlay,
    add_tile_overlay, add_tile_underlay,
};
pub use vertex::{add_model_vertex_data, planar_tex_coords};

use isoraster_batch::BatchError;
use isoraster_cache::ModelHandle;
use isoraster_common::SurfaceError;
use isoraster_raster::RasterError;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("model {0:?} is not registered")]
    UnknownModel(ModelHandle),
    #[error("face {face} is invalid: {reason}")]
    InvalidModel { face: usize, reason: String },
    #[error("tile ({x}, {z}) is outside the heightmap")]
    TileOutOfRange { x: u32, z: u32 },
    #[error("overlay triangle {triangle} references a missing vertex")]
    InvalidOverlay { triangle: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("model json: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn crate_info() -> &'static str {
    "isoraster-scene v0.1.0"
}
