use serde::{Deserialize, Serialize};

/// Screen-space geometry the rasterizer clips and addresses against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Horizontal projection center, used as the texture-plane origin column.
    pub center_x: i32,
    /// Vertical projection center, used as the texture-plane origin row.
    pub center_y: i32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            center_x: (width / 2) as i32,
            center_y: (height / 2) as i32,
        }
    }

    pub fn with_center(mut self, center_x: i32, center_y: i32) -> Self {
        self.center_x = center_x;
        self.center_y = center_y;
        self
    }

    /// Last addressable column; spans are clipped to `[0, bound_x)`.
    pub fn bound_x(&self) -> i32 {
        self.width as i32 - 1
    }

    /// Rows `>= bound_bottom` are never written.
    pub fn bound_bottom(&self) -> i32 {
        self.height as i32
    }

    /// Row stride in pixels.
    pub fn stride(&self) -> i32 {
        self.width as i32
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(512, 334)
    }
}

/// Split a packed `0xRRGGBB` value into channels.
pub fn rgb_channels(rgb: u32) -> [u8; 3] {
    [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8]
}

/// Composite `src` over `dst` with an 8-bit opacity, per channel:
/// `src * a / 255 + dst * (255 - a) / 255`.
pub fn blend_rgb(src: u32, dst: u32, opacity: u8) -> u32 {
    let a = opacity as u32;
    let inv = 255 - a;
    let mut out = 0;
    for shift in [16, 8, 0] {
        let s = (src >> shift) & 0xff;
        let d = (dst >> shift) & 0xff;
        let c = s * a / 255 + d * inv / 255;
        out |= c.min(0xff) << shift;
    }
    out
}
