use std::path::Path;

use glam::IVec3;
use isoraster_cache::ModelHandle;
use serde::{Deserialize, Serialize};

use crate::SceneError;

/// How a face is colored, from the low two bits of its info word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    Gouraud,
    Flat,
    Textured,
    FlatTextured,
}

impl FaceKind {
    pub fn from_info(info: i32) -> Self {
        match info & 3 {
            0 => FaceKind::Gouraud,
            1 => FaceKind::Flat,
            2 => FaceKind::Textured,
            _ => FaceKind::FlatTextured,
        }
    }

    pub fn is_flat(self) -> bool {
        matches!(self, FaceKind::Flat | FaceKind::FlatTextured)
    }

    pub fn is_textured(self) -> bool {
        matches!(self, FaceKind::Textured | FaceKind::FlatTextured)
    }
}

/// One model triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub vertices: [u32; 3],
    /// Lit color per corner: palette codes, or lightness for textured faces.
    pub colors: [i32; 3],
    /// Texture id for textured faces.
    #[serde(default)]
    pub color: i32,
    /// Kind in bits 0..2, texture mapping index above.
    #[serde(default)]
    pub info: i32,
    /// Face translucency; 0 is opaque.
    #[serde(default)]
    pub alpha: u8,
}

impl Face {
    pub fn gouraud(vertices: [u32; 3], colors: [i32; 3]) -> Self {
        Self {
            vertices,
            colors,
            color: 0,
            info: 0,
            alpha: 0,
        }
    }

    pub fn flat(vertices: [u32; 3], color: i32) -> Self {
        Self {
            info: 1,
            ..Self::gouraud(vertices, [color; 3])
        }
    }

    /// Textured face mapped through `texture_mappings[mapping]`.
    pub fn textured(vertices: [u32; 3], shades: [i32; 3], texture_id: i32, mapping: u32) -> Self {
        Self {
            vertices,
            colors: shades,
            color: texture_id,
            info: 2 | ((mapping as i32) << 2),
            alpha: 0,
        }
    }

    pub fn kind(&self) -> FaceKind {
        FaceKind::from_info(self.info)
    }

    pub fn mapping(&self) -> usize {
        (self.info >> 2) as usize
    }
}

/// Indexed triangle model in world units (one tile is 128).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub vertices: Vec<IVec3>,
    pub faces: Vec<Face>,
    /// Texture space `P`, `M`, `N` vertex triples; `M` is u = 1 and `N` is v = 1.
    #[serde(default)]
    pub texture_mappings: Vec<[u32; 3]>,
    /// Unlit models carry no corner colors and generate no vertices.
    #[serde(default = "default_lit")]
    pub lit: bool,
}

fn default_lit() -> bool {
    true
}

impl Default for Model {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            texture_mappings: Vec::new(),
            lit: true,
        }
    }
}

impl Model {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check every face and mapping index against the vertex list.
    pub fn validate(&self) -> Result<(), SceneError> {
        let vertex_count = self.vertices.len();
        let in_range = |i: u32| (i as usize) < vertex_count;
        for (index, face) in self.faces.iter().enumerate() {
            if !face.vertices.iter().all(|&v| in_range(v)) {
                return Err(SceneError::InvalidModel {
                    face: index,
                    reason: format!("vertex index out of range ({vertex_count} vertices)"),
                });
            }
            if face.kind().is_textured() {
                let mapping = self.texture_mappings.get(face.mapping()).ok_or_else(|| {
                    SceneError::InvalidModel {
                        face: index,
                        reason: format!("texture mapping {} missing", face.mapping()),
                    }
                })?;
                if !mapping.iter().all(|&v| in_range(v)) {
                    return Err(SceneError::InvalidModel {
                        face: index,
                        reason: "texture mapping vertex out of range".into(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Axis-aligned box standing on the origin, `size` wide, tall and deep.
    ///
    /// Sides get a lightness ramp around `hsl` so adjacent faces differ.
    pub fn cuboid(size: IVec3, hsl: i32) -> Self {
        let (hx, hz) = (size.x / 2, size.z / 2);
        // y grows downwards; the top sits at -size.y
        let vertices = vec![
            IVec3::new(-hx, 0, -hz),
            IVec3::new(hx, 0, -hz),
            IVec3::new(hx, 0, hz),
            IVec3::new(-hx, 0, hz),
            IVec3::new(-hx, -size.y, -hz),
            IVec3::new(hx, -size.y, -hz),
            IVec3::new(hx, -size.y, hz),
            IVec3::new(-hx, -size.y, hz),
        ];
        let shade = |delta: i32| (hsl & !0x7f) | ((hsl & 0x7f) + delta).clamp(0, 127);
        let quads: [([u32; 4], i32); 5] = [
            ([4, 5, 6, 7], 12),
            ([0, 1, 5, 4], 0),
            ([1, 2, 6, 5], -8),
            ([2, 3, 7, 6], -16),
            ([3, 0, 4, 7], -4),
        ];
        let mut faces = Vec::with_capacity(quads.len() * 2);
        for ([a, b, c, d], delta) in quads {
            let top = shade(delta);
            let bottom = shade(delta - 6);
            faces.push(Face::gouraud([a, b, c], [bottom, bottom, top]));
            faces.push(Face::gouraud([a, c, d], [bottom, top, top]));
        }
        Self {
            vertices,
            faces,
            texture_mappings: Vec::new(),
            lit: true,
        }
    }

    /// Texture every face of a [`Model::cuboid`] with `texture_id`.
    pub fn textured_cuboid(size: IVec3, texture_id: i32, lightness: i32) -> Self {
        let mut model = Self::cuboid(size, 0);
        model.texture_mappings.clear();
        for pair in 0..model.faces.len() / 2 {
            let first = model.faces[pair * 2];
            let second = model.faces[pair * 2 + 1];
            let [a, b, _] = first.vertices;
            let d = second.vertices[2];
            let mapping = model.texture_mappings.len() as u32;
            model.texture_mappings.push([a, b, d]);
            let shades = [lightness, lightness + 8, lightness + 16];
            model.faces[pair * 2] = Face::textured(first.vertices, shades, texture_id, mapping);
            model.faces[pair * 2 + 1] = Face::textured(second.vertices, shades, texture_id, mapping);
        }
        model
    }

    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let file = std::fs::File::open(path)?;
        let model: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        model.validate()?;
        Ok(model)
    }
}

/// Arena of registered models addressed by [`ModelHandle`].
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a model under the next handle.
    pub fn register(&mut self, model: Model) -> Result<ModelHandle, SceneError> {
        model.validate()?;
        let handle = ModelHandle(self.models.len() as u32);
        self.models.push(model);
        Ok(handle)
    }

    pub fn get(&self, handle: ModelHandle) -> Result<&Model, SceneError> {
        self.models
            .get(handle.index())
            .ok_or(SceneError::UnknownModel(handle))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelHandle, &Model)> {
        self.models
            .iter()
            .enumerate()
            .map(|(i, m)| (ModelHandle(i as u32), m))
    }
}
