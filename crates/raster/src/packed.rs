//! Fixed-width `u32` records for the per-kind triangle arrays.
//!
//! Layouts are stable so the word streams can be handed to an external
//! consumer unchanged.

use bytemuck::{Pod, Zeroable};
use glam::IVec3;

use crate::command::{
    AlphaShape, AlphaTriangle, FlatTriangle, GouraudTriangle, TexturedTriangle, TriangleCommand,
};

/// Largest submission index an alpha header can carry (23 bits).
pub const MAX_TRIANGLE_INDEX: u32 = (1 << 23) - 1;

const ALPHA_FLAT_BIT: u32 = 1 << 31;

/// `[index, x0, x1, x2, y0, y1, y2, color]`
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct FlatRecord {
    pub index: u32,
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub color: u32,
}

/// `[index, xA, xB, xC, yA, yB, yC, colorA, colorB, colorC]`
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct GouraudRecord {
    pub index: u32,
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub colors: [i32; 3],
}

/// `[index, xA..xC, yA..yC, shadeA..C, originX..Z, txB, txC, tyB, tyC, tzB, tzC, textureId]`
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct TexturedRecord {
    pub index: u32,
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub shades: [i32; 3],
    pub origin: [i32; 3],
    pub tx: [i32; 2],
    pub ty: [i32; 2],
    pub tz: [i32; 2],
    pub texture_id: u32,
}

/// `[header, xA..xC, yA..yC, c0, c1, c2]` with header `(flat << 31) | (alpha << 23) | index`.
///
/// Flat records carry their color in `c0` and zero in the other two slots.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct AlphaRecord {
    pub header: u32,
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub colors: [i32; 3],
}

/// Records in a per-kind array, addressed by submission index.
pub trait PackedRecord: Pod {
    /// Record size in `u32` words.
    const WORDS: usize;

    fn index(&self) -> u32;

    fn decode(&self) -> TriangleCommand;
}

impl FlatRecord {
    pub fn encode(index: u32, tri: &FlatTriangle) -> Self {
        Self {
            index,
            x: tri.x,
            y: tri.y,
            color: tri.color,
        }
    }
}

impl PackedRecord for FlatRecord {
    const WORDS: usize = 8;

    fn index(&self) -> u32 {
        self.index
    }

    fn decode(&self) -> TriangleCommand {
        TriangleCommand::Flat(FlatTriangle {
            x: self.x,
            y: self.y,
            color: self.color,
        })
    }
}

impl GouraudRecord {
    pub fn encode(index: u32, tri: &GouraudTriangle) -> Self {
        Self {
            index,
            x: tri.x,
            y: tri.y,
            colors: tri.colors,
        }
    }
}

impl PackedRecord for GouraudRecord {
    const WORDS: usize = 10;

    fn index(&self) -> u32 {
        self.index
    }

    fn decode(&self) -> TriangleCommand {
        TriangleCommand::Gouraud(GouraudTriangle {
            x: self.x,
            y: self.y,
            colors: self.colors,
        })
    }
}

impl TexturedRecord {
    pub fn encode(index: u32, tri: &TexturedTriangle) -> Self {
        Self {
            index,
            x: tri.x,
            y: tri.y,
            shades: tri.shades,
            origin: tri.origin.to_array(),
            tx: [tri.basis_b.x, tri.basis_c.x],
            ty: [tri.basis_b.y, tri.basis_c.y],
            tz: [tri.basis_b.z, tri.basis_c.z],
            texture_id: tri.texture_id,
        }
    }
}

impl PackedRecord for TexturedRecord {
    const WORDS: usize = 20;

    fn index(&self) -> u32 {
        self.index
    }

    fn decode(&self) -> TriangleCommand {
        TriangleCommand::Textured(TexturedTriangle {
            x: self.x,
            y: self.y,
            shades: self.shades,
            origin: IVec3::from_array(self.origin),
            basis_b: IVec3::new(self.tx[0], self.ty[0], self.tz[0]),
            basis_c: IVec3::new(self.tx[1], self.ty[1], self.tz[1]),
            texture_id: self.texture_id,
        })
    }
}

impl AlphaRecord {
    pub fn encode(index: u32, tri: &AlphaTriangle) -> Self {
        let header = (index & MAX_TRIANGLE_INDEX) | (u32::from(tri.alpha) << 23);
        match &tri.shape {
            AlphaShape::Flat(t) => Self {
                header: header | ALPHA_FLAT_BIT,
                x: t.x,
                y: t.y,
                colors: [t.color as i32, 0, 0],
            },
            AlphaShape::Gouraud(t) => Self {
                header,
                x: t.x,
                y: t.y,
                colors: t.colors,
            },
        }
    }

    pub fn is_flat(&self) -> bool {
        self.header & ALPHA_FLAT_BIT != 0
    }

    pub fn alpha(&self) -> u8 {
        (self.header >> 23) as u8
    }
}

impl PackedRecord for AlphaRecord {
    const WORDS: usize = 10;

    fn index(&self) -> u32 {
        self.header & MAX_TRIANGLE_INDEX
    }

    fn decode(&self) -> TriangleCommand {
        let shape = if self.is_flat() {
            AlphaShape::Flat(FlatTriangle {
                x: self.x,
                y: self.y,
                color: self.colors[0] as u32,
            })
        } else {
            AlphaShape::Gouraud(GouraudTriangle {
                x: self.x,
                y: self.y,
                colors: self.colors,
            })
        };
        TriangleCommand::Alpha(AlphaTriangle {
            alpha: self.alpha(),
            shape,
        })
    }
}

/// View a record slice as its raw word stream.
pub fn as_words<R: PackedRecord>(records: &[R]) -> &[u32] {
    bytemuck::cast_slice(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_word_counts() {
        assert_eq!(std::mem::size_of::<FlatRecord>(), FlatRecord::WORDS * 4);
        assert_eq!(std::mem::size_of::<GouraudRecord>(), GouraudRecord::WORDS * 4);
        assert_eq!(std::mem::size_of::<TexturedRecord>(), TexturedRecord::WORDS * 4);
        assert_eq!(std::mem::size_of::<AlphaRecord>(), AlphaRecord::WORDS * 4);
    }

    #[test]
    fn flat_word_layout() {
        let tri = FlatTriangle {
            x: [1, 2, 3],
            y: [4, 5, 6],
            color: 0xff0000,
        };
        let records = [FlatRecord::encode(7, &tri)];
        assert_eq!(as_words(&records), &[7, 1, 2, 3, 4, 5, 6, 0xff0000]);
        assert_eq!(records[0].decode(), TriangleCommand::Flat(tri));
    }

    #[test]
    fn textured_word_layout_interleaves_basis() {
        let tri = TexturedTriangle {
            x: [1, 2, 3],
            y: [4, 5, 6],
            shades: [7, 8, 9],
            origin: IVec3::new(10, 11, 12),
            basis_b: IVec3::new(13, 15, 17),
            basis_c: IVec3::new(14, 16, 18),
            texture_id: 19,
        };
        let records = [TexturedRecord::encode(0, &tri)];
        let expected: Vec<u32> = (0..20).collect();
        assert_eq!(as_words(&records), expected.as_slice());
        assert_eq!(records[0].decode(), TriangleCommand::Textured(tri));
    }

    #[test]
    fn alpha_header_packs_flag_alpha_and_index() {
        let tri = AlphaTriangle {
            alpha: 0x80,
            shape: AlphaShape::Flat(FlatTriangle {
                x: [0, 1, 2],
                y: [3, 4, 5],
                color: 0x123456,
            }),
        };
        let record = AlphaRecord::encode(42, &tri);
        assert_eq!(record.header, (1 << 31) | (0x80 << 23) | 42);
        assert_eq!(record.colors, [0x123456, 0, 0]);
        assert_eq!(record.index(), 42);
        assert_eq!(record.decode(), TriangleCommand::Alpha(tri));
    }

    #[test]
    fn gouraud_alpha_keeps_three_colors() {
        let tri = AlphaTriangle {
            alpha: 1,
            shape: AlphaShape::Gouraud(GouraudTriangle {
                x: [0, 1, 2],
                y: [3, 4, 5],
                colors: [100, 200, 300],
            }),
        };
        let record = AlphaRecord::encode(MAX_TRIANGLE_INDEX, &tri);
        assert!(!record.is_flat());
        assert_eq!(record.alpha(), 1);
        assert_eq!(record.index(), MAX_TRIANGLE_INDEX);
        assert_eq!(as_words(&[record])[7..], [100, 200, 300]);
    }
}
