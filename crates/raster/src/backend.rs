use isoraster_common::{PixelSurface, Viewport};
use isoraster_palette::{Palette, TextureAtlas};

use crate::RasterError;
use crate::command::TriangleCommand;
use crate::fill::{fill_alpha, fill_flat, fill_gouraud, fill_textured};
use crate::queue::TriangleQueue;
use crate::sink::{BlendSink, PixelSink, SurfaceSink};

/// Lookup tables read by every fill. Shared immutably across workers.
#[derive(Debug, Clone, Copy)]
pub struct Tables<'a> {
    pub palette: &'a Palette,
    pub atlas: &'a TextureAtlas,
}

/// Rasterize one command into `sink`.
///
/// Returns `false` when a textured command names a layer the atlas cannot
/// resolve; nothing is written in that case.
pub fn draw_command<S: PixelSink>(
    command: &TriangleCommand,
    viewport: &Viewport,
    tables: &Tables<'_>,
    sink: &mut S,
) -> bool {
    match command {
        TriangleCommand::Flat(t) => fill_flat(t, viewport, sink),
        TriangleCommand::Gouraud(t) => fill_gouraud(t, viewport, tables.palette, sink),
        TriangleCommand::Textured(t) => match tables.atlas.layer(t.texture_id) {
            Ok(layer) => fill_textured(t, viewport, layer, sink),
            Err(err) => {
                tracing::trace!(texture = t.texture_id, %err, "textured triangle skipped");
                return false;
            }
        },
        TriangleCommand::Alpha(a) => fill_alpha(&a.shape, viewport, tables.palette, sink),
    }
    true
}

/// Counts from one frame's rasterization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub opaque: usize,
    pub alpha: usize,
    /// Textured triangles whose layer could not be resolved.
    pub skipped: usize,
}

/// Execution strategy for one frame of queued triangles.
///
/// Every backend runs the same fills and must produce the same pixels for
/// the same queue. Alpha triangles are always blended afterwards, one at a
/// time, in submission order.
pub trait RasterBackend: Send {
    fn name(&self) -> &'static str;

    /// Called when the surface is recreated at a new size.
    fn resize(&mut self, _viewport: Viewport) -> Result<(), RasterError> {
        Ok(())
    }

    fn rasterize(
        &mut self,
        queue: &TriangleQueue,
        tables: &Tables<'_>,
        surface: &mut PixelSurface,
    ) -> Result<PassStats, RasterError>;
}

/// Blend the alpha queue over the surface.
pub(crate) fn blend_alpha_queue(
    queue: &TriangleQueue,
    tables: &Tables<'_>,
    surface: &mut PixelSurface,
) -> usize {
    let viewport = surface.viewport();
    let mut drawn = 0;
    for (_, command) in queue.alpha_in_order() {
        let TriangleCommand::Alpha(alpha) = &command else {
            continue;
        };
        let mut sink = BlendSink::new(surface.pixels_mut(), alpha.opacity());
        fill_alpha(&alpha.shape, &viewport, tables.palette, &mut sink);
        drawn += 1;
    }
    drawn
}

/// Painter-order rasterization on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialBackend;

impl SequentialBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RasterBackend for SequentialBackend {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn rasterize(
        &mut self,
        queue: &TriangleQueue,
        tables: &Tables<'_>,
        surface: &mut PixelSurface,
    ) -> Result<PassStats, RasterError> {
        let viewport = surface.viewport();
        let mut stats = PassStats::default();
        {
            let mut sink = SurfaceSink::new(surface.pixels_mut());
            for (_, command) in queue.opaque_in_order() {
                if draw_command(&command, &viewport, tables, &mut sink) {
                    stats.opaque += 1;
                } else {
                    stats.skipped += 1;
                }
            }
        }
        stats.alpha = blend_alpha_queue(queue, tables, surface);
        Ok(stats)
    }
}
