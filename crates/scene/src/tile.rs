use glam::IVec3;
use isoraster_batch::{IndexDataBuffer, VertexDataBuffer};
use serde::{Deserialize, Serialize};

use crate::SceneError;

/// Color marking a tile corner or overlay triangle as not drawn.
pub const HIDDEN_COLOR: i32 = 12_345_678;

/// World units per tile edge.
pub const TILE_SIZE: i32 = 128;

/// Corner heights of a `width` x `depth` tile grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heightmap {
    width: u32,
    depth: u32,
    /// `(width + 1) * (depth + 1)` corner heights, x-major.
    heights: Vec<i32>,
}

impl Heightmap {
    pub fn flat(width: u32, depth: u32, height: i32) -> Self {
        Self::from_fn(width, depth, |_, _| height)
    }

    /// Build from a function of corner coordinates.
    pub fn from_fn(width: u32, depth: u32, f: impl Fn(u32, u32) -> i32) -> Self {
        let mut heights = Vec::with_capacity(((width + 1) * (depth + 1)) as usize);
        for x in 0..=width {
            for z in 0..=depth {
                heights.push(f(x, z));
            }
        }
        Self {
            width,
            depth,
            heights,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Height of corner `(x, z)`; corners run from 0 to the tile count inclusive.
    pub fn corner(&self, x: u32, z: u32) -> Option<i32> {
        if x > self.width || z > self.depth {
            return None;
        }
        self.heights
            .get((x * (self.depth + 1) + z) as usize)
            .copied()
    }

    fn tile_corners(&self, tile_x: u32, tile_z: u32) -> Result<[i32; 4], SceneError> {
        let out_of_range = SceneError::TileOutOfRange {
            x: tile_x,
            z: tile_z,
        };
        if tile_x >= self.width || tile_z >= self.depth {
            return Err(out_of_range);
        }
        let h = |x, z| self.corner(x, z).ok_or(SceneError::TileOutOfRange { x, z });
        Ok([
            h(tile_x, tile_z)?,
            h(tile_x + 1, tile_z)?,
            h(tile_x + 1, tile_z + 1)?,
            h(tile_x, tile_z + 1)?,
        ])
    }
}

/// Ground quad of one tile, colored per corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileUnderlay {
    pub southwest_color: i32,
    pub southeast_color: i32,
    pub northeast_color: i32,
    pub northwest_color: i32,
    #[serde(default)]
    pub texture_id: Option<u32>,
    /// Flat tiles map the north-east triangle with its own corner coordinates.
    #[serde(default)]
    pub flat: bool,
}

impl TileUnderlay {
    pub fn uniform(color: i32) -> Self {
        Self {
            southwest_color: color,
            southeast_color: color,
            northeast_color: color,
            northwest_color: color,
            texture_id: None,
            flat: true,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.southwest_color == HIDDEN_COLOR && self.northeast_color == HIDDEN_COLOR
    }
}

/// One overlay triangle over the overlay's vertex list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayTriangle {
    pub vertices: [u32; 3],
    pub colors: [i32; 3],
    #[serde(default)]
    pub texture_id: Option<u32>,
}

/// Shaped ground overlay (paths, water edges) in world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileOverlay {
    pub vertices: Vec<IVec3>,
    pub triangles: Vec<OverlayTriangle>,
    #[serde(default)]
    pub flat: bool,
}

impl TileOverlay {
    fn textured(&self) -> bool {
        self.triangles.iter().any(|t| t.texture_id.is_some())
    }
}

fn texture_index(id: Option<u32>) -> i32 {
    id.map_or(-1, |t| t as i32)
}

/// Append the underlay of tile `(tile_x, tile_z)`. Returns the indices added.
///
/// The north-east triangle is drawn unless its color is hidden, then the
/// south-west one likewise.
pub fn add_tile_underlay(
    vertices: &mut VertexDataBuffer,
    indices: &mut IndexDataBuffer,
    heights: &Heightmap,
    underlay: &TileUnderlay,
    tile_x: u32,
    tile_z: u32,
) -> Result<usize, SceneError> {
    if underlay.is_hidden() {
        return Ok(0);
    }
    let [y00, y10, y11, y01] = heights.tile_corners(tile_x, tile_z)?;
    let x0 = tile_x as i32 * TILE_SIZE;
    let x1 = x0 + TILE_SIZE;
    let z0 = tile_z as i32 * TILE_SIZE;
    let z1 = z0 + TILE_SIZE;
    let texture = texture_index(underlay.texture_id);
    let start = indices.pos();

    if underlay.northeast_color != HIDDEN_COLOR {
        let uv = if underlay.flat {
            [(1.0, 1.0), (0.0, 1.0), (1.0, 0.0)]
        } else {
            [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]
        };
        let corners = [
            (x1, y11, z1, underlay.northeast_color),
            (x0, y01, z1, underlay.northwest_color),
            (x1, y10, z0, underlay.southeast_color),
        ];
        let mut tri = [0; 3];
        for (slot, ((x, y, z, color), (u, v))) in tri.iter_mut().zip(corners.into_iter().zip(uv)) {
            *slot = vertices.add_vertex(x, y, z, color, 0xff, texture, u, v)?;
        }
        indices.add_indices(&tri)?;
    }
    if underlay.southwest_color != HIDDEN_COLOR {
        let corners = [
            (x0, y00, z0, underlay.southwest_color, 0.0, 0.0),
            (x1, y10, z0, underlay.southeast_color, 1.0, 0.0),
            (x0, y01, z1, underlay.northwest_color, 0.0, 1.0),
        ];
        let mut tri = [0; 3];
        for (slot, (x, y, z, color, u, v)) in tri.iter_mut().zip(corners) {
            *slot = vertices.add_vertex(x, y, z, color, 0xff, texture, u, v)?;
        }
        indices.add_indices(&tri)?;
    }
    Ok(indices.pos() - start)
}

/// Append the overlay on tile `(tile_x, tile_z)`. Returns the indices added.
///
/// Untextured triangles with a hidden first color are skipped. Texture
/// coordinates are tile-relative; non-flat overlays use the coordinates of
/// vertices 0, 1 and 3 for every triangle.
pub fn add_tile_overlay(
    vertices: &mut VertexDataBuffer,
    indices: &mut IndexDataBuffer,
    overlay: &TileOverlay,
    tile_x: u32,
    tile_z: u32,
) -> Result<usize, SceneError> {
    let offset_x = tile_x as i32 * TILE_SIZE;
    let offset_z = tile_z as i32 * TILE_SIZE;
    let tex_coords: Vec<(f32, f32)> = if overlay.textured() {
        overlay
            .vertices
            .iter()
            .map(|v| {
                (
                    (v.x - offset_x) as f32 / TILE_SIZE as f32,
                    (v.z - offset_z) as f32 / TILE_SIZE as f32,
                )
            })
            .collect()
    } else {
        Vec::new()
    };
    let uv = |i: usize| tex_coords.get(i).copied().unwrap_or((0.0, 0.0));
    let start = indices.pos();

    for (index, triangle) in overlay.triangles.iter().enumerate() {
        if triangle.texture_id.is_none() && triangle.colors[0] == HIDDEN_COLOR {
            continue;
        }
        let texture = texture_index(triangle.texture_id);
        let corner_uv = if overlay.flat {
            triangle.vertices.map(|v| uv(v as usize))
        } else {
            [uv(0), uv(1), uv(3)]
        };
        let mut tri = [0; 3];
        for i in 0..3 {
            let p = overlay
                .vertices
                .get(triangle.vertices[i] as usize)
                .ok_or(SceneError::InvalidOverlay { triangle: index })?;
            let (u, v) = corner_uv[i];
            tri[i] = vertices.add_vertex(p.x, p.y, p.z, triangle.colors[i], 0xff, texture, u, v)?;
        }
        indices.add_indices(&tri)?;
    }
    Ok(indices.pos() - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffers() -> (VertexDataBuffer, IndexDataBuffer) {
        (
            VertexDataBuffer::with_capacity(8).unwrap(),
            IndexDataBuffer::with_capacity(8).unwrap(),
        )
    }

    #[test]
    fn heightmap_corners() {
        let map = Heightmap::from_fn(2, 3, |x, z| (x * 10 + z) as i32);
        assert_eq!(map.corner(2, 3), Some(23));
        assert_eq!(map.corner(3, 0), None);
        assert!(map.tile_corners(2, 0).is_err());
        assert_eq!(map.tile_corners(1, 2).unwrap(), [12, 22, 23, 13]);
    }

    #[test]
    fn underlay_emits_two_triangles() {
        let (mut v, mut i) = buffers();
        let heights = Heightmap::flat(4, 4, -10);
        let added =
            add_tile_underlay(&mut v, &mut i, &heights, &TileUnderlay::uniform(99), 1, 2).unwrap();
        assert_eq!(added, 6);
        assert_eq!(i.indices(), &[0, 1, 2, 3, 4, 5]);
        let first = v.vertices()[0];
        assert_eq!(first.position, [256.0, -10.0, 384.0]);
        assert_eq!(first.tex_coord, [1.0, 1.0]);
    }

    #[test]
    fn hidden_corners_are_skipped() {
        let (mut v, mut i) = buffers();
        let heights = Heightmap::flat(1, 1, 0);
        let hidden = TileUnderlay::uniform(HIDDEN_COLOR);
        assert_eq!(add_tile_underlay(&mut v, &mut i, &heights, &hidden, 0, 0).unwrap(), 0);

        let half = TileUnderlay {
            northeast_color: HIDDEN_COLOR,
            ..TileUnderlay::uniform(5)
        };
        assert_eq!(add_tile_underlay(&mut v, &mut i, &heights, &half, 0, 0).unwrap(), 3);
        assert_eq!(v.vertices()[0].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn underlay_outside_grid_is_an_error() {
        let (mut v, mut i) = buffers();
        let heights = Heightmap::flat(2, 2, 0);
        let result = add_tile_underlay(&mut v, &mut i, &heights, &TileUnderlay::uniform(1), 2, 0);
        assert!(matches!(result, Err(SceneError::TileOutOfRange { x: 2, z: 0 })));
    }

    #[test]
    fn overlay_skips_hidden_untextured() {
        let (mut v, mut i) = buffers();
        let overlay = TileOverlay {
            vertices: vec![
                IVec3::new(128, 0, 128),
                IVec3::new(256, 0, 128),
                IVec3::new(256, 0, 256),
                IVec3::new(128, 0, 256),
            ],
            triangles: vec![
                OverlayTriangle {
                    vertices: [0, 1, 2],
                    colors: [HIDDEN_COLOR; 3],
                    texture_id: None,
                },
                OverlayTriangle {
                    vertices: [0, 2, 3],
                    colors: [HIDDEN_COLOR; 3],
                    texture_id: Some(4),
                },
            ],
            flat: true,
        };
        assert_eq!(add_tile_overlay(&mut v, &mut i, &overlay, 1, 1).unwrap(), 3);
        let uvs: Vec<[f32; 2]> = v.vertices().iter().map(|v| v.tex_coord).collect();
        assert_eq!(uvs, vec![[0.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        assert_eq!(v.vertices()[0].texture_id(), Some(4));
    }

    #[test]
    fn overlay_bad_vertex_is_an_error() {
        let (mut v, mut i) = buffers();
        let overlay = TileOverlay {
            vertices: vec![IVec3::ZERO],
            triangles: vec![OverlayTriangle {
                vertices: [0, 0, 5],
                colors: [1; 3],
                texture_id: None,
            }],
            flat: false,
        };
        assert!(matches!(
            add_tile_overlay(&mut v, &mut i, &overlay, 0, 0),
            Err(SceneError::InvalidOverlay { triangle: 0 })
        ));
    }
}
