use glam::{DVec3, IVec3};
use isoraster_batch::{BatchError, VertexDataBuffer};

use crate::model::Model;

/// Texture coordinates of `corners` in the plane spanned by a `P`, `M`, `N`
/// mapping, where `M` lies at u = 1 and `N` at v = 1.
pub fn planar_tex_coords(mapping: [IVec3; 3], corners: [IVec3; 3]) -> [[f32; 2]; 3] {
    let p = mapping[0].as_dvec3();
    let m = mapping[1].as_dvec3() - p;
    let n = mapping[2].as_dvec3() - p;
    let normal = m.cross(n);

    let u_axis = n.cross(normal);
    let v_axis = m.cross(normal);
    let u_scale = 1.0 / u_axis.dot(m);
    let v_scale = 1.0 / v_axis.dot(n);

    corners.map(|corner| {
        let d: DVec3 = corner.as_dvec3() - p;
        [
            (u_axis.dot(d) * u_scale) as f32,
            (v_axis.dot(d) * v_scale) as f32,
        ]
    })
}

/// Append three vertices per face of `model`. Returns the number added.
///
/// Flat faces repeat their first corner color. Textured faces carry the face
/// color as texture id and planar coordinates from their mapping. Unlit
/// models add nothing; faces with out-of-range vertex indices collapse to
/// a degenerate triangle so face `i` always starts at vertex `3 * i`.
pub fn add_model_vertex_data(
    buffer: &mut VertexDataBuffer,
    model: &Model,
) -> Result<usize, BatchError> {
    if !model.lit {
        return Ok(0);
    }
    let start = buffer.pos();
    let corners_of = |ids: [u32; 3]| -> Option<[IVec3; 3]> {
        let vertex = |i: u32| model.vertices.get(i as usize).copied();
        Some([vertex(ids[0])?, vertex(ids[1])?, vertex(ids[2])?])
    };

    for face in &model.faces {
        let kind = face.kind();
        let corners = corners_of(face.vertices).unwrap_or([IVec3::ZERO; 3]);
        let mut colors = face.colors;
        if kind.is_flat() {
            colors = [colors[0]; 3];
        }
        let alpha = 0xff - face.alpha;

        let mut texture_id = -1;
        let mut tex_coords = [[0.0f32; 2]; 3];
        if kind.is_textured() {
            let mapping = model
                .texture_mappings
                .get(face.mapping())
                .and_then(|&m| corners_of(m));
            if let Some(mapping) = mapping {
                texture_id = face.color;
                tex_coords = planar_tex_coords(mapping, corners);
            }
        }

        for ((corner, color), [u, v]) in corners.into_iter().zip(colors).zip(tex_coords) {
            buffer.add_vertex(corner.x, corner.y, corner.z, color, alpha, texture_id, u, v)?;
        }
    }
    Ok(buffer.pos() - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Face;

    fn approx(a: [f32; 2], b: [f32; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-5 && (a[1] - b[1]).abs() < 1e-5
    }

    #[test]
    fn mapping_corners_land_on_unit_coords() {
        let mapping = [IVec3::ZERO, IVec3::new(128, 0, 0), IVec3::new(0, 0, 128)];
        let uv = planar_tex_coords(
            mapping,
            [IVec3::ZERO, IVec3::new(128, 0, 0), IVec3::new(64, 0, 128)],
        );
        assert!(approx(uv[0], [0.0, 0.0]));
        assert!(approx(uv[1], [1.0, 0.0]));
        assert!(approx(uv[2], [0.5, 1.0]));
    }

    #[test]
    fn skewed_mapping_is_affine() {
        let mapping = [
            IVec3::new(10, 5, 0),
            IVec3::new(74, 5, 40),
            IVec3::new(10, 105, 0),
        ];
        let mid = IVec3::new(42, 55, 20);
        let uv = planar_tex_coords(mapping, [mid, mapping[1], mapping[2]]);
        assert!(approx(uv[0], [0.5, 0.5]));
        assert!(approx(uv[1], [1.0, 0.0]));
        assert!(approx(uv[2], [0.0, 1.0]));
    }

    #[test]
    fn flat_faces_repeat_first_color() {
        let model = Model {
            vertices: vec![IVec3::ZERO, IVec3::X, IVec3::Z],
            faces: vec![
                Face {
                    colors: [5, 6, 7],
                    ..Face::flat([0, 1, 2], 5)
                },
                Face::gouraud([0, 1, 2], [5, 6, 7]),
            ],
            ..Model::default()
        };
        let mut buffer = VertexDataBuffer::with_capacity(2).unwrap();
        assert_eq!(add_model_vertex_data(&mut buffer, &model).unwrap(), 6);
        let codes: Vec<i32> = buffer.vertices().iter().map(|v| v.hsl_code()).collect();
        assert_eq!(codes, vec![5, 5, 5, 5, 6, 7]);
        assert!(buffer.vertices().iter().all(|v| v.texture_id().is_none()));
    }

    #[test]
    fn face_alpha_becomes_vertex_opacity() {
        let model = Model {
            vertices: vec![IVec3::ZERO, IVec3::X, IVec3::Z],
            faces: vec![Face {
                alpha: 55,
                ..Face::gouraud([0, 1, 2], [1, 1, 1])
            }],
            ..Model::default()
        };
        let mut buffer = VertexDataBuffer::with_capacity(4).unwrap();
        add_model_vertex_data(&mut buffer, &model).unwrap();
        assert!(buffer.vertices().iter().all(|v| v.transparency() == 55));
    }

    #[test]
    fn textured_faces_carry_texture_and_coords() {
        let model = Model::textured_cuboid(IVec3::splat(128), 7, 16);
        let mut buffer = VertexDataBuffer::with_capacity(8).unwrap();
        let added = add_model_vertex_data(&mut buffer, &model).unwrap();
        assert_eq!(added, model.face_count() * 3);
        let first = &buffer.vertices()[..3];
        assert!(first.iter().all(|v| v.texture_id() == Some(7)));
        // first corner is the mapping origin
        assert!(approx(first[0].tex_coord, [0.0, 0.0]));
        assert!(approx(first[1].tex_coord, [1.0, 0.0]));
    }

    #[test]
    fn unlit_models_add_nothing() {
        let model = Model {
            lit: false,
            ..Model::cuboid(IVec3::splat(32), 3)
        };
        let mut buffer = VertexDataBuffer::with_capacity(4).unwrap();
        assert_eq!(add_model_vertex_data(&mut buffer, &model).unwrap(), 0);
        assert_eq!(buffer.pos(), 0);
    }
}
