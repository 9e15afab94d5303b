use sha2::{Digest, Sha256};
use std::collections::TryReserveError;

use crate::types::{Viewport, rgb_channels};

/// Errors from pixel surface allocation.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("pixel surface allocation failed: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

/// A flat framebuffer of packed `0xRRGGBB` pixels, row-major, stride = width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSurface {
    viewport: Viewport,
    pixels: Vec<u32>,
}

impl PixelSurface {
    pub fn new(viewport: Viewport) -> Result<Self, SurfaceError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(SurfaceError::InvalidDimensions {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let count = viewport.pixel_count();
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(count)?;
        pixels.resize(count, 0);
        Ok(Self { viewport, pixels })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn width(&self) -> u32 {
        self.viewport.width
    }

    pub fn height(&self) -> u32 {
        self.viewport.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.viewport.width || y >= self.viewport.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.viewport.width as usize + x as usize)
            .copied()
    }

    /// Write one pixel. Returns false when out of bounds.
    pub fn set(&mut self, x: u32, y: u32, rgb: u32) -> bool {
        if x >= self.viewport.width || y >= self.viewport.height {
            return false;
        }
        let width = self.viewport.width as usize;
        match self.pixels.get_mut(y as usize * width + x as usize) {
            Some(px) => {
                *px = rgb;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, rgb: u32) {
        self.pixels.fill(rgb);
    }

    /// Paint the 1-pixel right border column.
    pub fn draw_right_border(&mut self, rgb: u32) {
        let width = self.viewport.width as usize;
        for row in self.pixels.chunks_exact_mut(width) {
            if let Some(px) = row.last_mut() {
                *px = rgb;
            }
        }
    }

    /// Number of pixels that differ from `rgb`.
    pub fn count_not(&self, rgb: u32) -> usize {
        self.pixels.iter().filter(|&&p| p != rgb).count()
    }

    /// SHA-256 over the little-endian pixel words, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.viewport.width.to_le_bytes());
        hasher.update(self.viewport.height.to_le_bytes());
        for px in &self.pixels {
            hasher.update(px.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Interleaved 8-bit RGB bytes, suitable for image encoders.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 3);
        for &px in &self.pixels {
            out.extend_from_slice(&rgb_channels(px));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_rejects_zero_size() {
        let err = PixelSurface::new(Viewport::new(0, 10)).unwrap_err();
        assert!(matches!(err, SurfaceError::InvalidDimensions { .. }));
    }

    #[test]
    fn surface_set_and_get() {
        let mut surface = PixelSurface::new(Viewport::new(4, 3)).unwrap();
        assert!(surface.set(3, 2, 0xabcdef));
        assert!(!surface.set(4, 0, 1));
        assert_eq!(surface.get(3, 2), Some(0xabcdef));
        assert_eq!(surface.pixels()[2 * 4 + 3], 0xabcdef);
        assert_eq!(surface.get(0, 3), None);
    }

    #[test]
    fn right_border_touches_last_column_only() {
        let mut surface = PixelSurface::new(Viewport::new(5, 4)).unwrap();
        surface.draw_right_border(0x111111);
        for y in 0..4 {
            assert_eq!(surface.get(4, y), Some(0x111111));
            assert_eq!(surface.get(3, y), Some(0));
        }
        assert_eq!(surface.count_not(0), 4);
    }

    #[test]
    fn digest_tracks_content() {
        let mut a = PixelSurface::new(Viewport::new(8, 8)).unwrap();
        let b = a.clone();
        assert_eq!(a.digest(), b.digest());
        a.set(1, 1, 0xff);
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn rgb8_export_layout() {
        let mut surface = PixelSurface::new(Viewport::new(2, 1)).unwrap();
        surface.set(1, 0, 0x102030);
        assert_eq!(surface.to_rgb8(), vec![0, 0, 0, 0x10, 0x20, 0x30]);
    }
}
