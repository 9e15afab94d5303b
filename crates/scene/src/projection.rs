use std::f64::consts::TAU;

use glam::{DVec3, IVec3};
use isoraster_batch::{DrawCommand, ModelVertex};
use isoraster_common::Viewport;
use isoraster_raster::Rasterizer;

/// Triangles with any corner nearer than this are culled.
pub const NEAR_Z: i32 = 50;

/// Perspective scale as a shift: screen = center + (view << 9) / z.
const ZOOM_SHIFT: u32 = 9;

/// Angle units per full turn.
const ANGLE_UNITS: i32 = 2048;

/// Radians of a model yaw in angle units, measured the other way round.
pub fn yaw_radians(yaw: i32) -> f64 {
    ((ANGLE_UNITS - yaw) & (ANGLE_UNITS - 1)) as f64 * TAU / ANGLE_UNITS as f64
}

fn camera_radians(angle: i32) -> f64 {
    (angle & (ANGLE_UNITS - 1)) as f64 * TAU / ANGLE_UNITS as f64
}

/// Camera placement for turning world coordinates into screen triangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub camera: IVec3,
    /// Rotation about the vertical axis, in angle units.
    pub yaw: i32,
    /// Downward tilt, in angle units.
    pub pitch: i32,
    pub viewport: Viewport,
}

impl Projection {
    pub fn new(camera: IVec3, yaw: i32, pitch: i32, viewport: Viewport) -> Self {
        Self {
            camera,
            yaw,
            pitch,
            viewport,
        }
    }

    /// World position into camera space; z grows away from the camera.
    pub fn to_view(&self, world: DVec3) -> DVec3 {
        let d = world - self.camera.as_dvec3();
        let (ys, yc) = camera_radians(self.yaw).sin_cos();
        let (ps, pc) = camera_radians(self.pitch).sin_cos();
        let x = d.z * ys + d.x * yc;
        let z = d.z * yc - d.x * ys;
        let y = d.y * pc - z * ps;
        let z = d.y * ps + z * pc;
        DVec3::new(x, y, z)
    }

    /// Screen pixel of an integer view position, or `None` in front of the near plane.
    pub fn to_screen(&self, view: IVec3) -> Option<(i32, i32)> {
        if view.z < NEAR_Z {
            return None;
        }
        Some((
            self.viewport.center_x + (view.x << ZOOM_SHIFT) / view.z,
            self.viewport.center_y + (view.y << ZOOM_SHIFT) / view.z,
        ))
    }
}

/// Model vertex rotated by `yaw` and moved to `position`.
pub fn place_vertex(vertex: &ModelVertex, yaw: i32, position: IVec3) -> DVec3 {
    let [x, y, z] = vertex.position.map(f64::from);
    let (s, c) = yaw_radians(yaw).sin_cos();
    DVec3::new(c * x - s * z, y, s * x + c * z) + position.as_dvec3()
}

/// View-space `P`, `M`, `N` points where texture coordinates are (0, 0),
/// (1, 0) and (0, 1), recovered from three corners and their coordinates.
///
/// Falls back to the corners themselves when the coordinates are degenerate.
pub fn texture_basis(corners: [DVec3; 3], tex_coords: [[f32; 2]; 3]) -> [DVec3; 3] {
    let [a, b, c] = corners;
    let [ta, tb, tc] = tex_coords.map(|t| [f64::from(t[0]), f64::from(t[1])]);
    let (du1, dv1) = (tb[0] - ta[0], tb[1] - ta[1]);
    let (du2, dv2) = (tc[0] - ta[0], tc[1] - ta[1]);
    let det = du1 * dv2 - du2 * dv1;
    if det.abs() < 1e-9 {
        return corners;
    }
    let at = |u: f64, v: f64| {
        let (du, dv) = (u - ta[0], v - ta[1]);
        let s = (du * dv2 - dv * du2) / det;
        let t = (dv * du1 - du * dv1) / det;
        a + (b - a) * s + (c - a) * t
    };
    [at(0.0, 0.0), at(1.0, 0.0), at(0.0, 1.0)]
}

/// Counters from projecting one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub commands: usize,
    pub triangles: usize,
    /// Triangles the rasterizer signalled for the legacy path.
    pub legacy: usize,
    /// Triangles dropped at the near plane or for bad indices.
    pub culled: usize,
}

fn round(v: DVec3) -> IVec3 {
    v.round().as_ivec3()
}

/// Feed the triangles of `commands` through `projection` into `raster`.
///
/// Untextured triangles become Gouraud triangles using the vertex alpha of
/// their first corner; textured ones are submitted opaque. The rasterizer's
/// alpha state is restored afterwards.
pub fn project_commands<'a>(
    vertices: &[ModelVertex],
    indices: &[i32],
    commands: impl IntoIterator<Item = &'a DrawCommand>,
    projection: &Projection,
    raster: &mut Rasterizer,
) -> FlushStats {
    let mut stats = FlushStats::default();
    let previous_alpha = raster.alpha();

    for command in commands {
        if command.count == 0 {
            continue;
        }
        stats.commands += 1;
        let start = command.offset as usize;
        let end = start.checked_add(command.count as usize);
        let Some(range) = end.and_then(|end| indices.get(start..end)) else {
            stats.culled += command.count as usize / 3;
            continue;
        };
        for tri in range.chunks_exact(3) {
            stats.triangles += 1;
            let corners = [tri[0], tri[1], tri[2]].map(|i| vertices.get(i as usize));
            let [Some(a), Some(b), Some(c)] = corners else {
                stats.culled += 1;
                continue;
            };
            let model = [a, b, c];
            let view =
                model.map(|v| projection.to_view(place_vertex(v, command.yaw, command.position)));
            let fixed = view.map(round);
            let [Some(sa), Some(sb), Some(sc)] = fixed.map(|v| projection.to_screen(v)) else {
                stats.culled += 1;
                continue;
            };

            let legacy = match a.texture_id() {
                Some(texture_id) => {
                    let basis = texture_basis(view, model.map(|v| v.tex_coord)).map(round);
                    let [p, m, n] = basis;
                    raster.set_alpha(0);
                    raster.fill_textured_triangle(
                        sa.0,
                        sb.0,
                        sc.0,
                        sa.1,
                        sb.1,
                        sc.1,
                        a.hsl_code(),
                        b.hsl_code(),
                        c.hsl_code(),
                        p.x,
                        p.y,
                        p.z,
                        m.x,
                        n.x,
                        m.y,
                        n.y,
                        m.z,
                        n.z,
                        texture_id,
                    )
                }
                None => {
                    raster.set_alpha(a.transparency());
                    raster.fill_gouraud_triangle(
                        sa.0,
                        sb.0,
                        sc.0,
                        sa.1,
                        sb.1,
                        sc.1,
                        a.hsl_code(),
                        b.hsl_code(),
                        c.hsl_code(),
                    )
                }
            };
            if legacy {
                stats.legacy += 1;
            }
        }
    }
    raster.set_alpha(previous_alpha);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-6
    }

    #[test]
    fn yaw_wraps_and_reverses() {
        assert_eq!(yaw_radians(0), 0.0);
        assert!((yaw_radians(512) - 3.0 * TAU / 4.0).abs() < 1e-12);
        assert!((yaw_radians(1536) - TAU / 4.0).abs() < 1e-12);
        assert_eq!(yaw_radians(2048), yaw_radians(0));
    }

    #[test]
    fn unrotated_camera_is_translation() {
        let projection = Projection::new(IVec3::new(10, 20, 30), 0, 0, Viewport::new(100, 80));
        let view = projection.to_view(DVec3::new(15.0, 20.0, 530.0));
        assert!(approx(view, DVec3::new(5.0, 0.0, 500.0)));
        assert_eq!(projection.to_screen(IVec3::new(5, 0, 512)), Some((55, 40)));
        assert_eq!(projection.to_screen(IVec3::new(5, 0, 10)), None);
    }

    #[test]
    fn place_vertex_turns_a_quarter() {
        let v = ModelVertex::new(100, 7, 0, 0, 0xff, -1, 0.0, 0.0);
        let placed = place_vertex(&v, 1536, IVec3::new(1, 2, 3));
        assert!(approx(placed, DVec3::new(1.0, 9.0, 103.0)));
    }

    #[test]
    fn texture_basis_recovers_mapping_points() {
        let p = DVec3::new(0.0, 0.0, 500.0);
        let m = DVec3::new(128.0, 0.0, 500.0);
        let n = DVec3::new(0.0, 128.0, 520.0);
        let c = p + (m - p) * 0.5 + (n - p) * 0.75;
        let basis = texture_basis([m, n, c], [[1.0, 0.0], [0.0, 1.0], [0.5, 0.75]]);
        assert!(approx(basis[0], p));
        assert!(approx(basis[1], m));
        assert!(approx(basis[2], n));
    }

    #[test]
    fn degenerate_tex_coords_fall_back_to_corners() {
        let corners = [DVec3::X, DVec3::Y, DVec3::Z];
        assert_eq!(texture_basis(corners, [[0.0, 0.0]; 3]), corners);
    }
}
