//! Palette and texture lookup tables consumed read-only by the rasterizer.
//!
//! Colors are addressed by a packed 16-bit code: 6 bits hue, 3 bits
//! saturation, 7 bits luminance. Textures are 128x128 texel grids stored as
//! four pre-shaded bands per layer.
//!
//! # Invariants
//! - The palette always has 65536 entries matching the current brightness.
//! - Every texture layer is rebuilt whenever its source or the brightness changes.

mod palette;
mod texture;

pub use palette::{PALETTE_SIZE, Palette, adjust_brightness, hsl_to_rgb};
pub use texture::{
    LAYER_TEXELS, SHADE_BANDS, TEXTURE_SIZE, TEXTURE_TEXELS, TextureAtlas, TextureLayer,
    TextureSet, TextureSource,
};

/// Errors from palette and texture table maintenance.
#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
    #[error("brightness must be finite and positive, got {0}")]
    InvalidBrightness(f64),
    #[error("texture id {id} out of range (atlas holds {count})")]
    TextureOutOfRange { id: u32, count: u32 },
    #[error("texture {id} has no source texels")]
    MissingSource { id: u32 },
    #[error("texture source has {actual} texels, expected {expected}")]
    TexelCount { expected: usize, actual: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn crate_info() -> &'static str {
    "isoraster-palette v0.1.0"
}
