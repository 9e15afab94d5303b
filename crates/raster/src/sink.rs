use std::sync::atomic::{AtomicU32, Ordering};

use isoraster_common::blend_rgb;

/// Destination for span writes. `offset` is `row * stride + column`.
///
/// Offsets outside the target are ignored.
pub trait PixelSink {
    fn plot(&mut self, offset: i32, rgb: u32);
}

#[inline]
fn slot<T>(items: &[T], offset: i32) -> Option<&T> {
    usize::try_from(offset).ok().and_then(|i| items.get(i))
}

/// Direct overwrite of a pixel slice.
pub struct SurfaceSink<'a> {
    pixels: &'a mut [u32],
}

impl<'a> SurfaceSink<'a> {
    pub fn new(pixels: &'a mut [u32]) -> Self {
        Self { pixels }
    }
}

impl PixelSink for SurfaceSink<'_> {
    #[inline]
    fn plot(&mut self, offset: i32, rgb: u32) {
        if let Some(px) = usize::try_from(offset)
            .ok()
            .and_then(|i| self.pixels.get_mut(i))
        {
            *px = rgb;
        }
    }
}

/// Blends over the existing pixel with a fixed opacity.
pub struct BlendSink<'a> {
    pixels: &'a mut [u32],
    opacity: u8,
}

impl<'a> BlendSink<'a> {
    pub fn new(pixels: &'a mut [u32], opacity: u8) -> Self {
        Self { pixels, opacity }
    }
}

impl PixelSink for BlendSink<'_> {
    #[inline]
    fn plot(&mut self, offset: i32, rgb: u32) {
        if let Some(px) = usize::try_from(offset)
            .ok()
            .and_then(|i| self.pixels.get_mut(i))
        {
            *px = blend_rgb(rgb, *px, self.opacity);
        }
    }
}

/// Depth pre-pass: records the highest key covering each pixel.
///
/// Keys are `submission index + 1`, so zero means uncovered and the latest
/// submission wins, as in painter order.
pub struct DepthSink<'a> {
    depth: &'a [AtomicU32],
    key: u32,
}

impl<'a> DepthSink<'a> {
    pub fn new(depth: &'a [AtomicU32], key: u32) -> Self {
        Self { depth, key }
    }
}

impl PixelSink for DepthSink<'_> {
    #[inline]
    fn plot(&mut self, offset: i32, _rgb: u32) {
        if let Some(d) = slot(self.depth, offset) {
            d.fetch_max(self.key, Ordering::Relaxed);
        }
    }
}

/// Color pass: writes only where this triangle won the depth pre-pass.
pub struct ResolveSink<'a> {
    depth: &'a [AtomicU32],
    color: &'a [AtomicU32],
    key: u32,
}

impl<'a> ResolveSink<'a> {
    pub fn new(depth: &'a [AtomicU32], color: &'a [AtomicU32], key: u32) -> Self {
        Self { depth, color, key }
    }
}

impl PixelSink for ResolveSink<'_> {
    #[inline]
    fn plot(&mut self, offset: i32, rgb: u32) {
        let (Some(d), Some(c)) = (slot(self.depth, offset), slot(self.color, offset)) else {
            return;
        };
        if d.load(Ordering::Relaxed) == self.key {
            c.store(rgb, Ordering::Relaxed);
        }
    }
}

/// Records every plotted offset; used to compare coverage.
#[derive(Debug, Default)]
pub struct CoverageSink {
    pub offsets: Vec<i32>,
}

impl PixelSink for CoverageSink {
    fn plot(&mut self, offset: i32, _rgb: u32) {
        self.offsets.push(offset);
    }
}
