use glam::IVec3;

/// Single-color triangle; `color` is a packed `0xRRGGBB` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatTriangle {
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub color: u32,
}

/// Gouraud triangle; `colors` are palette codes interpolated across the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GouraudTriangle {
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub colors: [i32; 3],
}

/// Perspective-textured triangle.
///
/// `origin` is the camera-space position of the texture's first corner;
/// `basis_b` and `basis_c` are the camera-space positions of the other two
/// corners, from which the `u`/`v`/`w` plane equations are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexturedTriangle {
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub shades: [i32; 3],
    pub origin: IVec3,
    pub basis_b: IVec3,
    pub basis_c: IVec3,
    pub texture_id: u32,
}

/// Shape of a translucent triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaShape {
    Flat(FlatTriangle),
    Gouraud(GouraudTriangle),
}

/// Translucent flat or Gouraud triangle, blended over opaque geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaTriangle {
    /// Translucency; 0 is opaque. Blend opacity is `255 - alpha`.
    pub alpha: u8,
    pub shape: AlphaShape,
}

impl AlphaTriangle {
    pub fn opacity(&self) -> u8 {
        255 - self.alpha
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriangleKind {
    Flat,
    Gouraud,
    Textured,
    Alpha,
}

impl TriangleKind {
    pub const ALL: [TriangleKind; 4] = [
        TriangleKind::Flat,
        TriangleKind::Gouraud,
        TriangleKind::Textured,
        TriangleKind::Alpha,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TriangleKind::Flat => "flat",
            TriangleKind::Gouraud => "gouraud",
            TriangleKind::Textured => "textured",
            TriangleKind::Alpha => "alpha",
        }
    }
}

/// One triangle of any kind, in screen-space pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangleCommand {
    Flat(FlatTriangle),
    Gouraud(GouraudTriangle),
    Textured(TexturedTriangle),
    Alpha(AlphaTriangle),
}

impl TriangleCommand {
    pub fn kind(&self) -> TriangleKind {
        match self {
            TriangleCommand::Flat(_) => TriangleKind::Flat,
            TriangleCommand::Gouraud(_) => TriangleKind::Gouraud,
            TriangleCommand::Textured(_) => TriangleKind::Textured,
            TriangleCommand::Alpha(_) => TriangleKind::Alpha,
        }
    }

    pub fn xs(&self) -> [i32; 3] {
        match self {
            TriangleCommand::Flat(t) => t.x,
            TriangleCommand::Gouraud(t) => t.x,
            TriangleCommand::Textured(t) => t.x,
            TriangleCommand::Alpha(a) => match &a.shape {
                AlphaShape::Flat(t) => t.x,
                AlphaShape::Gouraud(t) => t.x,
            },
        }
    }

    pub fn ys(&self) -> [i32; 3] {
        match self {
            TriangleCommand::Flat(t) => t.y,
            TriangleCommand::Gouraud(t) => t.y,
            TriangleCommand::Textured(t) => t.y,
            TriangleCommand::Alpha(a) => match &a.shape {
                AlphaShape::Flat(t) => t.y,
                AlphaShape::Gouraud(t) => t.y,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_opacity_inverts_translucency() {
        let tri = FlatTriangle {
            x: [0, 4, 0],
            y: [0, 0, 4],
            color: 0xffffff,
        };
        let alpha = AlphaTriangle {
            alpha: 64,
            shape: AlphaShape::Flat(tri),
        };
        assert_eq!(alpha.opacity(), 191);
        let cmd = TriangleCommand::Alpha(alpha);
        assert_eq!(cmd.kind(), TriangleKind::Alpha);
        assert_eq!(cmd.xs(), [0, 4, 0]);
        assert_eq!(cmd.ys(), [0, 0, 4]);
    }

    #[test]
    fn kind_names_are_distinct() {
        let mut names: Vec<_> = TriangleKind::ALL.iter().map(|k| k.name()).collect();
        names.dedup();
        assert_eq!(names.len(), 4);
    }
}
