use glam::IVec3;
use isoraster_batch::{DrawCommands, IndexDataBuffer, VertexDataBuffer};
use isoraster_cache::{DEFAULT_PANEL_MAX_IDLE, ModelCache, ModelHandle, PanelCache};
use isoraster_common::{PixelSurface, Viewport};
use isoraster_raster::Rasterizer;
use serde::{Deserialize, Serialize};

use crate::SceneError;
use crate::model::Model;
use crate::projection::{FlushStats, Projection, project_commands};
use crate::tile::{Heightmap, TileOverlay, TileUnderlay, add_tile_overlay, add_tile_underlay};
use crate::vertex::add_model_vertex_data;

/// Buffer sizes and eviction thresholds for a [`SceneBatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub vertex_capacity: usize,
    pub index_capacity: usize,
    pub command_capacity: usize,
    /// Frames a panel surface may go unused before `end_frame` drops it.
    pub panel_max_idle: u64,
    /// When set, cached model data idle for longer is swept at `end_frame`.
    pub model_cache_max_idle: Option<u64>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 1024,
            index_capacity: 2048,
            command_capacity: 1024,
            panel_max_idle: DEFAULT_PANEL_MAX_IDLE,
            model_cache_max_idle: None,
        }
    }
}

/// Static models found on one tile of a loaded scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneryTile {
    pub wall_a: Option<ModelHandle>,
    pub wall_b: Option<ModelHandle>,
    pub wall_decoration: Option<ModelHandle>,
    pub ground_decoration: Option<ModelHandle>,
    #[serde(default)]
    pub locs: Vec<ModelHandle>,
}

impl SceneryTile {
    pub fn models(&self) -> impl Iterator<Item = ModelHandle> + '_ {
        [
            self.wall_a,
            self.wall_b,
            self.wall_decoration,
            self.ground_decoration,
        ]
        .into_iter()
        .flatten()
        .chain(self.locs.iter().copied())
    }
}

/// Model currently between `start_draw_model` and `end_draw_model`.
#[derive(Debug, Clone, Copy)]
struct OpenModel {
    start_index: u32,
    element_offset: usize,
}

/// Per-frame geometry batch.
///
/// Models emit their vertices once per frame into a shared stream; every
/// draw appends index triples and closes with a draw command carrying the
/// model's world position and yaw. Static scenery is captured into the model
/// cache on first draw and replayed afterwards.
pub struct SceneBatcher {
    config: SceneConfig,
    vertices: VertexDataBuffer,
    indices: IndexDataBuffer,
    commands: DrawCommands,
    cache: ModelCache,
    panels: PanelCache<u32, PixelSurface>,
    frame: u64,
    drawing_scene: bool,
    open_model: Option<OpenModel>,
    eye: IVec3,
}

impl std::fmt::Debug for SceneBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneBatcher")
            .field("frame", &self.frame)
            .field("vertices", &self.vertices.pos())
            .field("indices", &self.indices.pos())
            .field("commands", &self.commands.len())
            .field("cached_models", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl SceneBatcher {
    pub fn new(config: SceneConfig) -> Result<Self, SceneError> {
        Ok(Self {
            vertices: VertexDataBuffer::with_capacity(config.vertex_capacity)?,
            indices: IndexDataBuffer::with_capacity(config.index_capacity)?,
            commands: DrawCommands::with_capacity(config.command_capacity)?,
            cache: ModelCache::new(),
            panels: PanelCache::new(config.panel_max_idle),
            frame: 0,
            drawing_scene: false,
            open_model: None,
            eye: IVec3::ZERO,
            config,
        })
    }

    /// Advance the frame counter and drop last frame's commands.
    pub fn start_frame(&mut self) {
        self.frame += 1;
        self.commands.reset();
        self.cache.clear_start_indices();
        tracing::trace!(frame = self.frame, "scene frame started");
    }

    /// Rewind the vertex and index streams for a new scene pass.
    pub fn start_draw_scene(&mut self) {
        self.drawing_scene = true;
        self.vertices.clear();
        self.indices.clear();
        self.cache.clear_start_indices();
        self.open_model = None;
    }

    pub fn end_draw_scene(&mut self) {
        self.drawing_scene = false;
        self.open_model = None;
    }

    pub fn is_drawing_scene(&self) -> bool {
        self.drawing_scene
    }

    /// World position that model-relative draw positions are offset by.
    pub fn set_eye(&mut self, eye: IVec3) {
        self.eye = eye;
    }

    pub fn eye(&self) -> IVec3 {
        self.eye
    }

    /// Make `model`'s vertices available for `draw_model_triangle`.
    ///
    /// A model already emitted this frame reuses its vertices. Otherwise
    /// cached data is replayed, cacheable models are generated and captured,
    /// and everything else is generated.
    pub fn start_draw_model(&mut self, handle: ModelHandle, model: &Model) -> Result<(), SceneError> {
        if !self.drawing_scene {
            return Ok(());
        }
        let element_offset = self.indices.pos();
        if let Some(start_index) = self.cache.start_index(handle) {
            self.open_model = Some(OpenModel {
                start_index,
                element_offset,
            });
            return Ok(());
        }
        if !model.lit {
            self.open_model = None;
            return Ok(());
        }

        let start = self.vertices.pos();
        let start_index = start as u32;
        self.cache.set_start_index(handle, start_index);
        self.open_model = Some(OpenModel {
            start_index,
            element_offset,
        });

        if let Some(data) = self.cache.replay(handle, self.frame) {
            self.vertices.add_data(data)?;
        } else if self.cache.is_cacheable(handle) {
            add_model_vertex_data(&mut self.vertices, model)?;
            let captured = self.vertices.capture(start, self.vertices.pos())?;
            self.cache.insert(handle, self.frame, captured);
        } else {
            add_model_vertex_data(&mut self.vertices, model)?;
        }
        Ok(())
    }

    /// Queue face `index` of the open model. Returns whether it was queued.
    pub fn draw_model_triangle(&mut self, index: u32) -> Result<bool, SceneError> {
        let Some(open) = self.open_model.filter(|_| self.drawing_scene) else {
            return Ok(false);
        };
        let start = open.start_index as i32 + index as i32 * 3;
        self.indices.add_indices(&[start, start + 1, start + 2])?;
        Ok(true)
    }

    /// Close the open model with a command at `relative + eye`.
    pub fn end_draw_model(&mut self, yaw: i32, relative: IVec3) -> Result<(), SceneError> {
        let Some(open) = self.open_model.take() else {
            return Ok(());
        };
        let count = self.indices.pos() - open.element_offset;
        if count > 0 {
            self.commands.add_command(
                relative + self.eye,
                yaw,
                open.element_offset as u32,
                count as u32,
            )?;
        }
        Ok(())
    }

    /// Draw every face of `model`.
    pub fn draw_model(
        &mut self,
        handle: ModelHandle,
        model: &Model,
        yaw: i32,
        relative: IVec3,
    ) -> Result<(), SceneError> {
        self.start_draw_model(handle, model)?;
        for face in 0..model.face_count() as u32 {
            self.draw_model_triangle(face)?;
        }
        self.end_draw_model(yaw, relative)
    }

    /// Capture `model` into the cache without leaving it in the vertex stream.
    ///
    /// Returns whether new data was stored.
    pub fn warm_model(&mut self, handle: ModelHandle, model: &Model) -> Result<bool, SceneError> {
        if self.cache.contains(handle) {
            return Ok(false);
        }
        let start = self.vertices.pos();
        add_model_vertex_data(&mut self.vertices, model)?;
        let captured = self.vertices.capture(start, self.vertices.pos());
        self.vertices.rewind(start);
        let stored = self.cache.insert(handle, self.frame, captured?);
        if stored {
            tracing::debug!(model = handle.0, frame = self.frame, "model cache warmed");
        }
        Ok(stored)
    }

    /// Queue the underlay of one tile as a command at the origin.
    pub fn draw_tile_underlay(
        &mut self,
        heights: &Heightmap,
        underlay: &TileUnderlay,
        tile_x: u32,
        tile_z: u32,
    ) -> Result<usize, SceneError> {
        let offset = self.indices.pos();
        let added = add_tile_underlay(
            &mut self.vertices,
            &mut self.indices,
            heights,
            underlay,
            tile_x,
            tile_z,
        )?;
        self.commands
            .add_command(IVec3::ZERO, 0, offset as u32, added as u32)?;
        Ok(added)
    }

    /// Queue the overlay on one tile as a command at the origin.
    pub fn draw_tile_overlay(
        &mut self,
        overlay: &TileOverlay,
        tile_x: u32,
        tile_z: u32,
    ) -> Result<usize, SceneError> {
        let offset = self.indices.pos();
        let added = add_tile_overlay(&mut self.vertices, &mut self.indices, overlay, tile_x, tile_z)?;
        self.commands
            .add_command(IVec3::ZERO, 0, offset as u32, added as u32)?;
        Ok(added)
    }

    /// Forget cached data and mark the static models of the new scene cacheable.
    pub fn on_scene_loaded<'a>(&mut self, tiles: impl IntoIterator<Item = &'a SceneryTile>) {
        self.cache.clear();
        for tile in tiles {
            for handle in tile.models() {
                self.cache.mark_cacheable(handle);
            }
        }
        tracing::debug!(
            cacheable = self.cache.cacheable_count(),
            "scene loaded"
        );
    }

    pub fn on_scene_reset(&mut self) {
        self.cache.clear_start_indices();
        self.cache.clear();
        tracing::debug!("scene reset");
    }

    /// Surface backing UI panel `key` at `width` x `height`.
    ///
    /// Created on first use and recreated when the requested size changes.
    pub fn panel_surface(
        &mut self,
        key: u32,
        width: u32,
        height: u32,
    ) -> Result<&mut PixelSurface, SceneError> {
        let viewport = Viewport::new(width, height);
        let surface = self.panels.get_or_try_rebuild_with(
            key,
            self.frame,
            |surface| surface.viewport() == viewport,
            || PixelSurface::new(viewport),
        )?;
        Ok(surface)
    }

    /// Drop idle panel surfaces (and idle cache entries when configured).
    ///
    /// Returns the number of panel surfaces evicted.
    pub fn end_frame(&mut self) -> usize {
        let evicted = self.panels.evict_stale(self.frame);
        if let Some(max_idle) = self.config.model_cache_max_idle {
            self.cache.sweep(self.frame, max_idle);
        }
        evicted
    }

    /// Reduce this frame's commands and rasterize them through `projection`.
    pub fn flush(&mut self, projection: &Projection, raster: &mut Rasterizer) -> FlushStats {
        self.commands.reduce();
        let stats = project_commands(
            self.vertices.vertices(),
            self.indices.indices(),
            self.commands.active(),
            projection,
            raster,
        );
        tracing::trace!(
            commands = stats.commands,
            triangles = stats.triangles,
            culled = stats.culled,
            "scene batch flushed"
        );
        stats
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn vertices(&self) -> &VertexDataBuffer {
        &self.vertices
    }

    pub fn indices(&self) -> &IndexDataBuffer {
        &self.indices
    }

    pub fn commands(&self) -> &DrawCommands {
        &self.commands
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }
}
