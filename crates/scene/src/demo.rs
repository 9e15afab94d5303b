//! Small deterministic scene used by the command-line tool and tests.

use glam::IVec3;
use isoraster_cache::ModelHandle;
use isoraster_common::Viewport;

use crate::SceneError;
use crate::batcher::{SceneBatcher, SceneryTile};
use crate::model::{Face, Model, ModelRegistry};
use crate::projection::Projection;
use crate::tile::{HIDDEN_COLOR, Heightmap, OverlayTriangle, TILE_SIZE, TileOverlay, TileUnderlay};

/// Texture ids the demo models reference.
pub const DEMO_TEXTURES: std::ops::Range<u32> = 0..4;

/// A model drawn at a tile center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub model: ModelHandle,
    pub tile: (u32, u32),
    pub yaw: i32,
}

#[derive(Debug, Clone)]
pub struct DemoScene {
    pub registry: ModelRegistry,
    pub heights: Heightmap,
    pub underlays: Vec<(u32, u32, TileUnderlay)>,
    pub overlays: Vec<(u32, u32, TileOverlay)>,
    pub scenery: Vec<SceneryTile>,
    pub placements: Vec<Placement>,
}

fn grass(x: u32, z: u32) -> i32 {
    // hue 17, sat 4, lightness varies per tile
    (17 << 10) | (4 << 7) | (40 + ((x * 7 + z * 3) % 12) as i32)
}

fn path_overlay(tile_x: u32, tile_z: u32, heights: &Heightmap) -> TileOverlay {
    let x0 = tile_x as i32 * TILE_SIZE;
    let z0 = tile_z as i32 * TILE_SIZE;
    let corner = |dx: u32, dz: u32| {
        let y = heights.corner(tile_x + dx, tile_z + dz).unwrap_or(0);
        IVec3::new(x0 + dx as i32 * TILE_SIZE, y, z0 + dz as i32 * TILE_SIZE)
    };
    let sand = (7 << 10) | (3 << 7) | 70;
    TileOverlay {
        vertices: vec![corner(0, 0), corner(1, 0), corner(1, 1), corner(0, 1)],
        triangles: vec![
            OverlayTriangle {
                vertices: [0, 1, 2],
                colors: [sand, sand + 4, sand + 8],
                texture_id: None,
            },
            OverlayTriangle {
                vertices: [0, 2, 3],
                colors: [24, 32, 40],
                texture_id: Some(2),
            },
            OverlayTriangle {
                vertices: [1, 2, 3],
                colors: [HIDDEN_COLOR; 3],
                texture_id: None,
            },
        ],
        flat: true,
    }
}

impl DemoScene {
    /// A `size` x `size` tile patch with walls, crates and a few figures.
    pub fn build(size: u32) -> Result<Self, SceneError> {
        let size = size.max(2);
        let heights = Heightmap::from_fn(size, size, |x, z| {
            (((x * 37 + z * 11) % 5) as i32 - 2) * 6
        });

        let mut registry = ModelRegistry::new();
        let wall = registry.register(Model::cuboid(
            IVec3::new(TILE_SIZE, 240, 24),
            (30 << 10) | (1 << 7) | 60,
        ))?;
        let crate_model = registry.register(Model::textured_cuboid(IVec3::splat(96), 0, 24))?;
        let barrel = registry.register(Model::textured_cuboid(IVec3::new(64, 112, 64), 1, 16))?;
        let figure = registry.register(Model::cuboid(
            IVec3::new(48, 180, 32),
            (45 << 10) | (5 << 7) | 50,
        ))?;
        let mut ghost = Model::cuboid(IVec3::new(56, 200, 40), (60 << 10) | (2 << 7) | 90);
        for face in &mut ghost.faces {
            *face = Face {
                alpha: 120,
                ..*face
            };
        }
        let ghost = registry.register(ghost)?;

        let mut underlays = Vec::new();
        let mut overlays = Vec::new();
        for x in 0..size {
            for z in 0..size {
                underlays.push((x, z, TileUnderlay::uniform(grass(x, z))));
                if x == z {
                    overlays.push((x, z, path_overlay(x, z, &heights)));
                }
            }
        }

        let mut scenery = Vec::new();
        let mut placements = Vec::new();
        for x in 0..size {
            let z = size - 1;
            scenery.push(SceneryTile {
                wall_a: Some(wall),
                ..SceneryTile::default()
            });
            placements.push(Placement {
                model: wall,
                tile: (x, z),
                yaw: 0,
            });
        }
        for (i, x) in (1..size).step_by(3).enumerate() {
            let model = if i % 2 == 0 { crate_model } else { barrel };
            scenery.push(SceneryTile {
                locs: vec![model],
                ..SceneryTile::default()
            });
            placements.push(Placement {
                model,
                tile: (x, size / 3),
                yaw: (i as i32 * 256) & 0x7ff,
            });
        }
        placements.push(Placement {
            model: figure,
            tile: (size / 2, size / 2),
            yaw: 384,
        });
        placements.push(Placement {
            model: figure,
            tile: (size / 2 + 1, size / 2),
            yaw: 1024,
        });
        placements.push(Placement {
            model: ghost,
            tile: (size / 2, size / 2 + 1),
            yaw: 0,
        });

        Ok(Self {
            registry,
            heights,
            underlays,
            overlays,
            scenery,
            placements,
        })
    }

    /// Camera south of the patch looking north and down.
    pub fn camera(&self, viewport: Viewport) -> Projection {
        let extent = self.heights.width() as i32 * TILE_SIZE;
        Projection::new(IVec3::new(extent / 2, -900, -300), 0, 320, viewport)
    }

    fn tile_center(&self, (x, z): (u32, u32)) -> IVec3 {
        let y = self.heights.corner(x, z).unwrap_or(0);
        IVec3::new(
            x as i32 * TILE_SIZE + TILE_SIZE / 2,
            y,
            z as i32 * TILE_SIZE + TILE_SIZE / 2,
        )
    }

    /// Register static scenery with `batcher`'s cache.
    pub fn load_into(&self, batcher: &mut SceneBatcher) {
        batcher.on_scene_loaded(&self.scenery);
    }

    /// Record one full frame of geometry: ground, then overlays, then models.
    pub fn draw(&self, batcher: &mut SceneBatcher, eye: IVec3) -> Result<(), SceneError> {
        batcher.set_eye(eye);
        batcher.start_frame();
        batcher.start_draw_scene();
        for (x, z, underlay) in &self.underlays {
            batcher.draw_tile_underlay(&self.heights, underlay, *x, *z)?;
        }
        for (x, z, overlay) in &self.overlays {
            batcher.draw_tile_overlay(overlay, *x, *z)?;
        }
        for placement in &self.placements {
            let model = self.registry.get(placement.model)?;
            let relative = self.tile_center(placement.tile) - eye;
            batcher.draw_model(placement.model, model, placement.yaw, relative)?;
        }
        batcher.end_draw_scene();
        Ok(())
    }
}
