//! Common: viewport geometry, the pixel surface and packed RGB helpers.
//!
//! # Invariants
//! - A pixel surface always holds exactly `width * height` packed `0xRRGGBB` values.
//! - The rightmost column is the border column; rasterized spans never reach it.

mod surface;
mod types;

pub use surface::{PixelSurface, SurfaceError};
pub use types::{Viewport, blend_rgb, rgb_channels};

pub fn crate_info() -> &'static str {
    "isoraster-common v0.1.0"
}
