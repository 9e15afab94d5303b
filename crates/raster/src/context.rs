use std::time::{Duration, Instant};

use glam::IVec3;
use isoraster_common::{PixelSurface, Viewport};
use isoraster_palette::{Palette, TextureAtlas, TextureSource};

use crate::RasterError;
use crate::backend::{RasterBackend, SequentialBackend, Tables};
use crate::command::{
    AlphaShape, AlphaTriangle, FlatTriangle, GouraudTriangle, TexturedTriangle, TriangleCommand,
};
use crate::config::RasterConfig;
use crate::queue::{Queued, TriangleQueue};

/// Summary of the last completed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub backend: &'static str,
    pub opaque: usize,
    pub alpha: usize,
    /// Textured triangles dropped at raster time.
    pub skipped: usize,
    /// Submissions refused while the scene was open.
    pub rejected: usize,
    pub elapsed: Duration,
}

/// Owns every buffer and table one viewport needs.
///
/// Triangles are queued between [`start_scene`](Self::start_scene) and
/// [`end_scene`](Self::end_scene); the surface is only written inside
/// `end_scene`, so a borrowed surface always holds a complete frame.
pub struct Rasterizer {
    config: RasterConfig,
    viewport: Viewport,
    palette: Palette,
    atlas: TextureAtlas,
    surface: PixelSurface,
    queue: TriangleQueue,
    backend: Box<dyn RasterBackend>,
    rendering_scene: bool,
    alpha: u8,
    frame: u64,
    rejected: usize,
    warned_full: bool,
    pending_error: Option<RasterError>,
    last_frame: FrameStats,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("viewport", &self.viewport)
            .field("backend", &self.backend.name())
            .field("rendering_scene", &self.rendering_scene)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl Rasterizer {
    pub fn new(config: RasterConfig) -> Result<Self, RasterError> {
        Self::with_backend(config, Box::new(SequentialBackend::new()))
    }

    pub fn with_backend(
        config: RasterConfig,
        mut backend: Box<dyn RasterBackend>,
    ) -> Result<Self, RasterError> {
        config.validate()?;
        let viewport = config.viewport();
        let palette = Palette::new(config.brightness)?;
        let atlas = TextureAtlas::new(config.texture_count, config.brightness)?;
        let mut surface = PixelSurface::new(viewport)?;
        surface.draw_right_border(config.border_color);
        let queue = TriangleQueue::new(config.initial_capacity, config.max_triangles)?;
        backend.resize(viewport)?;
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            backend = backend.name(),
            "rasterizer created"
        );
        Ok(Self {
            config,
            viewport,
            palette,
            atlas,
            surface,
            queue,
            backend,
            rendering_scene: false,
            alpha: 0,
            frame: 0,
            rejected: 0,
            warned_full: false,
            pending_error: None,
            last_frame: FrameStats::default(),
        })
    }

    /// Open a frame: queue positions reset to zero.
    pub fn start_scene(&mut self) {
        self.queue.clear();
        self.rejected = 0;
        self.warned_full = false;
        self.pending_error = None;
        self.rendering_scene = true;
    }

    /// Rasterize everything queued since `start_scene` and close the frame.
    pub fn end_scene(&mut self) -> Result<&FrameStats, RasterError> {
        if !self.rendering_scene {
            return Err(RasterError::SceneNotStarted);
        }
        self.rendering_scene = false;
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        self.frame += 1;
        let _span = tracing::info_span!("raster_frame", frame = self.frame).entered();
        let started = Instant::now();

        if self.config.clear_each_frame {
            self.surface.clear(0);
        }
        let tables = Tables {
            palette: &self.palette,
            atlas: &self.atlas,
        };
        let pass = self
            .backend
            .rasterize(&self.queue, &tables, &mut self.surface)?;
        self.surface.draw_right_border(self.config.border_color);

        self.last_frame = FrameStats {
            frame: self.frame,
            backend: self.backend.name(),
            opaque: pass.opaque,
            alpha: pass.alpha,
            skipped: pass.skipped,
            rejected: self.rejected,
            elapsed: started.elapsed(),
        };
        tracing::trace!(
            opaque = pass.opaque,
            alpha = pass.alpha,
            skipped = pass.skipped,
            rejected = self.rejected,
            "frame rasterized"
        );
        Ok(&self.last_frame)
    }

    pub fn is_rendering_scene(&self) -> bool {
        self.rendering_scene
    }

    /// Translucency for following flat and Gouraud submissions; 0 is opaque.
    pub fn set_alpha(&mut self, alpha: u8) {
        self.alpha = alpha;
    }

    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    /// Queue a flat triangle. Returns whether the legacy path should also draw it.
    pub fn fill_triangle(
        &mut self,
        x0: i32,
        x1: i32,
        x2: i32,
        y0: i32,
        y1: i32,
        y2: i32,
        color: u32,
    ) -> bool {
        let tri = FlatTriangle {
            x: [x0, x1, x2],
            y: [y0, y1, y2],
            color,
        };
        let command = match self.alpha {
            0 => TriangleCommand::Flat(tri),
            alpha => TriangleCommand::Alpha(AlphaTriangle {
                alpha,
                shape: AlphaShape::Flat(tri),
            }),
        };
        self.submit(command)
    }

    /// Queue a Gouraud triangle with palette codes per vertex.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_gouraud_triangle(
        &mut self,
        x_a: i32,
        x_b: i32,
        x_c: i32,
        y_a: i32,
        y_b: i32,
        y_c: i32,
        color_a: i32,
        color_b: i32,
        color_c: i32,
    ) -> bool {
        let tri = GouraudTriangle {
            x: [x_a, x_b, x_c],
            y: [y_a, y_b, y_c],
            colors: [color_a, color_b, color_c],
        };
        let command = match self.alpha {
            0 => TriangleCommand::Gouraud(tri),
            alpha => TriangleCommand::Alpha(AlphaTriangle {
                alpha,
                shape: AlphaShape::Gouraud(tri),
            }),
        };
        self.submit(command)
    }

    /// Queue a perspective-textured triangle. The alpha state does not apply.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_textured_triangle(
        &mut self,
        x_a: i32,
        x_b: i32,
        x_c: i32,
        y_a: i32,
        y_b: i32,
        y_c: i32,
        shade_a: i32,
        shade_b: i32,
        shade_c: i32,
        origin_x: i32,
        origin_y: i32,
        origin_z: i32,
        tx_b: i32,
        tx_c: i32,
        ty_b: i32,
        ty_c: i32,
        tz_b: i32,
        tz_c: i32,
        texture_id: u32,
    ) -> bool {
        self.submit(TriangleCommand::Textured(TexturedTriangle {
            x: [x_a, x_b, x_c],
            y: [y_a, y_b, y_c],
            shades: [shade_a, shade_b, shade_c],
            origin: IVec3::new(origin_x, origin_y, origin_z),
            basis_b: IVec3::new(tx_b, ty_b, tz_b),
            basis_c: IVec3::new(tx_c, ty_c, tz_c),
            texture_id,
        }))
    }

    /// Queue any command as is. Returns the legacy path signal: `true` when
    /// the triangle was not queued, otherwise `legacy_raster_enabled`.
    pub fn submit(&mut self, command: TriangleCommand) -> bool {
        if !self.rendering_scene {
            return true;
        }
        if let TriangleCommand::Textured(t) = &command {
            if !self.atlas.contains(t.texture_id) {
                tracing::warn!(
                    texture = t.texture_id,
                    count = self.atlas.count(),
                    "textured triangle rejected: texture id out of range"
                );
                self.rejected += 1;
                return true;
            }
        }
        match self.queue.push(&command) {
            Ok(Queued::Accepted(_)) => self.config.legacy_raster_enabled,
            Ok(Queued::Full) => {
                if !self.warned_full {
                    self.warned_full = true;
                    tracing::warn!(
                        kind = command.kind().name(),
                        limit = self.queue.max_per_kind(),
                        "triangle rejected: per-kind limit reached"
                    );
                }
                self.rejected += 1;
                true
            }
            Err(err) => {
                if self.pending_error.is_none() {
                    self.pending_error = Some(err.into());
                }
                true
            }
        }
    }

    /// Recompute the palette and every texture layer.
    pub fn set_brightness(&mut self, brightness: f64) -> Result<(), RasterError> {
        self.palette.set_brightness(brightness)?;
        self.atlas.set_brightness(brightness)?;
        self.config.brightness = brightness;
        Ok(())
    }

    pub fn set_texture(&mut self, id: u32, source: TextureSource) -> Result<(), RasterError> {
        Ok(self.atlas.set_texture(id, source)?)
    }

    /// Rebuild one texture layer from its stored source.
    pub fn update_texture(&mut self, id: u32) -> Result<(), RasterError> {
        Ok(self.atlas.update_texture(id)?)
    }

    /// Recreate the surface at a new size and redraw the border column.
    ///
    /// A configured projection center is kept; otherwise it follows the new size.
    /// On error the previous surface, viewport and config stay in effect.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RasterError> {
        let config = RasterConfig {
            width,
            height,
            ..self.config.clone()
        };
        config.validate()?;
        let viewport = config.viewport();
        let mut surface = PixelSurface::new(viewport)?;
        surface.draw_right_border(config.border_color);
        self.backend.resize(viewport)?;
        // the old surface is dropped only once the new size is fully in place
        self.surface = surface;
        self.viewport = viewport;
        self.config = config;
        tracing::debug!(width, height, "viewport resized");
        Ok(())
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn atlas(&self) -> &TextureAtlas {
        &self.atlas
    }

    /// Triangles queued in the open (or last) frame.
    pub fn queue(&self) -> &TriangleQueue {
        &self.queue
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn last_frame(&self) -> &FrameStats {
        &self.last_frame
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}
