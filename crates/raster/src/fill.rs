//! Span fills and the per-kind triangle entry points.

use isoraster_common::Viewport;
use isoraster_palette::{Palette, TextureLayer};

use crate::command::{AlphaShape, FlatTriangle, GouraudTriangle, TexturedTriangle};
use crate::edge::{AttrScale, EdgeInput, ScanlineFill, walk_triangle};
use crate::sink::PixelSink;

/// Any vertex outside `[0, bound_x]` turns on horizontal span clipping.
fn needs_clip_x(x: &[i32; 3], bound_x: i32) -> bool {
    x.iter().any(|&v| v < 0 || v > bound_x)
}

struct FlatSpans<'s, S> {
    sink: &'s mut S,
    rgb: u32,
    clip_x: bool,
    bound_x: i32,
}

impl<S: PixelSink> ScanlineFill for FlatSpans<'_, S> {
    fn span(&mut self, mut x0: i32, mut x1: i32, _a0: i32, _a1: i32, offset: i32) {
        if self.clip_x {
            x1 = x1.min(self.bound_x);
            x0 = x0.max(0);
        }
        for x in x0..x1 {
            self.sink.plot(offset.wrapping_add(x), self.rgb);
        }
    }
}

pub fn fill_flat<S: PixelSink>(tri: &FlatTriangle, viewport: &Viewport, sink: &mut S) {
    let bound_x = viewport.bound_x();
    let mut spans = FlatSpans {
        sink,
        rgb: tri.color,
        clip_x: needs_clip_x(&tri.x, bound_x),
        bound_x,
    };
    let input = EdgeInput {
        x: tri.x,
        y: tri.y,
        attr: [0; 3],
    };
    walk_triangle(
        &input,
        AttrScale::NONE,
        viewport.bound_bottom(),
        viewport.stride(),
        &mut spans,
    );
}

struct GouraudSpans<'s, S> {
    sink: &'s mut S,
    palette: &'s Palette,
    clip_x: bool,
    bound_x: i32,
}

impl<S: PixelSink> ScanlineFill for GouraudSpans<'_, S> {
    /// Colors are sampled once per group of four pixels; the trailing
    /// partial group repeats the last sampled color.
    fn span(&mut self, mut x0: i32, mut x1: i32, mut c0: i32, c1: i32, offset: i32) {
        let step;
        let groups;
        if self.clip_x {
            let mut s = if x1 - x0 > 3 {
                c1.wrapping_sub(c0).wrapping_div(x1 - x0)
            } else {
                0
            };
            x1 = x1.min(self.bound_x);
            if x0 < 0 {
                c0 = c0.wrapping_sub(x0.wrapping_mul(s));
                x0 = 0;
            }
            if x0 >= x1 {
                return;
            }
            groups = (x1 - x0) >> 2;
            s <<= 2;
            step = s;
        } else if x0 < x1 {
            groups = (x1 - x0) >> 2;
            step = if groups > 0 {
                c1.wrapping_sub(c0).wrapping_mul(32768 / groups) >> 15
            } else {
                0
            };
        } else {
            return;
        }

        let mut at = offset.wrapping_add(x0);
        for _ in 0..groups {
            let rgb = self.palette.lookup(c0 >> 8);
            c0 = c0.wrapping_add(step);
            for _ in 0..4 {
                self.sink.plot(at, rgb);
                at += 1;
            }
        }
        let rest = (x1 - x0) & 3;
        if rest > 0 {
            let rgb = self.palette.lookup(c0 >> 8);
            for _ in 0..rest {
                self.sink.plot(at, rgb);
                at += 1;
            }
        }
    }
}

pub fn fill_gouraud<S: PixelSink>(
    tri: &GouraudTriangle,
    viewport: &Viewport,
    palette: &Palette,
    sink: &mut S,
) {
    let bound_x = viewport.bound_x();
    let mut spans = GouraudSpans {
        sink,
        palette,
        clip_x: needs_clip_x(&tri.x, bound_x),
        bound_x,
    };
    let input = EdgeInput {
        x: tri.x,
        y: tri.y,
        attr: tri.colors,
    };
    walk_triangle(
        &input,
        AttrScale::GOURAUD,
        viewport.bound_bottom(),
        viewport.stride(),
        &mut spans,
    );
}

/// One homogeneous texture coordinate plane: value at the projection
/// center, per-8-column stride and per-row step.
#[derive(Debug, Clone, Copy, Default)]
struct Plane {
    value: i32,
    stride: i32,
    row_step: i32,
}

impl Plane {
    fn new(value: i32, stride: i32, row_step: i32) -> Self {
        Self {
            value: value << 14,
            stride: stride << 8,
            row_step: row_step << 5,
        }
    }

    fn skip_rows(&mut self, rows: i32) {
        self.value = self.value.wrapping_add(self.row_step.wrapping_mul(rows));
    }

    fn next_row(&mut self) {
        self.value = self.value.wrapping_add(self.row_step);
    }
}

/// Texture coordinate at the next 8-column boundary.
#[inline]
fn project(u: i32, v: i32, w: i32, min_u: i32) -> Option<(i32, i32)> {
    let w = w >> 14;
    if w == 0 {
        return None;
    }
    Some((
        u.wrapping_div(w).clamp(min_u, 16256),
        v.wrapping_div(w),
    ))
}

struct TexturedSpans<'s, S> {
    sink: &'s mut S,
    layer: &'s TextureLayer,
    translucent: bool,
    clip_x: bool,
    bound_x: i32,
    center_x: i32,
    center_y: i32,
    u: Plane,
    v: Plane,
    w: Plane,
}

impl<S: PixelSink> TexturedSpans<'_, S> {
    #[inline]
    fn texel(&mut self, at: i32, cur_u: i32, cur_v: i32, shade_shift: u32) {
        let rgb = self
            .layer
            .texel((cur_v & 0x3f80).wrapping_add(cur_u >> 7))
            .wrapping_shr(shade_shift);
        if !self.translucent || rgb != 0 {
            self.sink.plot(at, rgb);
        }
    }
}

impl<S: PixelSink> ScanlineFill for TexturedSpans<'_, S> {
    fn begin(&mut self, top_row: i32) {
        let dy = top_row.wrapping_sub(self.center_y);
        self.u.skip_rows(dy);
        self.v.skip_rows(dy);
        self.w.skip_rows(dy);
    }

    fn span(&mut self, xa: i32, xb: i32, shade_a: i32, shade_b: i32, offset: i32) {
        self.textured_span(xa, xb, shade_a, shade_b, offset);
        self.u.next_row();
        self.v.next_row();
        self.w.next_row();
    }
}

impl<S: PixelSink> TexturedSpans<'_, S> {
    /// Perspective is corrected every 8 columns; the texel index is biased
    /// into one of four shade bands and the texel is shifted right by the
    /// remaining shade.
    fn textured_span(
        &mut self,
        mut xa: i32,
        mut xb: i32,
        mut shade_a: i32,
        shade_b: i32,
        offset: i32,
    ) {
        if xa >= xb {
            return;
        }
        let mut shade_step;
        let strides;
        if self.clip_x {
            shade_step = shade_b.wrapping_sub(shade_a).wrapping_div(xb - xa);
            xb = xb.min(self.bound_x);
            if xa < 0 {
                shade_a = shade_a.wrapping_sub(xa.wrapping_mul(shade_step));
                xa = 0;
            }
            if xa >= xb {
                return;
            }
            strides = (xb - xa) >> 3;
            shade_step <<= 12;
        } else if xb - xa > 7 {
            strides = (xb - xa) >> 3;
            shade_step = shade_b.wrapping_sub(shade_a).wrapping_mul(32768 / strides) >> 6;
        } else {
            strides = 0;
            shade_step = 0;
        }

        let mut shade = shade_a << 9;
        let mut at = offset.wrapping_add(xa);

        let dx = xa.wrapping_sub(self.center_x);
        let mut u = self.u.value.wrapping_add((self.u.stride >> 3).wrapping_mul(dx));
        let mut v = self.v.value.wrapping_add((self.v.stride >> 3).wrapping_mul(dx));
        let mut w = self.w.value.wrapping_add((self.w.stride >> 3).wrapping_mul(dx));

        let (mut cur_u, mut cur_v) = project(u, v, w, 0).unwrap_or((0, 0));
        u = u.wrapping_add(self.u.stride);
        v = v.wrapping_add(self.v.stride);
        w = w.wrapping_add(self.w.stride);
        let (mut next_u, mut next_v) = project(u, v, w, 7).unwrap_or((0, 0));
        let mut step_u = next_u.wrapping_sub(cur_u) >> 3;
        let mut step_v = next_v.wrapping_sub(cur_v) >> 3;
        cur_u = cur_u.wrapping_add(shade & 0x600000);
        let mut shade_shift = (shade >> 23) as u32;

        for _ in 0..strides {
            for _ in 0..8 {
                self.texel(at, cur_u, cur_v, shade_shift);
                at += 1;
                cur_u = cur_u.wrapping_add(step_u);
                cur_v = cur_v.wrapping_add(step_v);
            }
            cur_u = next_u;
            cur_v = next_v;
            u = u.wrapping_add(self.u.stride);
            v = v.wrapping_add(self.v.stride);
            w = w.wrapping_add(self.w.stride);
            if let Some((nu, nv)) = project(u, v, w, 7) {
                next_u = nu;
                next_v = nv;
            }
            step_u = next_u.wrapping_sub(cur_u) >> 3;
            step_v = next_v.wrapping_sub(cur_v) >> 3;
            shade = shade.wrapping_add(shade_step);
            cur_u = cur_u.wrapping_add(shade & 0x600000);
            shade_shift = (shade >> 23) as u32;
        }

        for _ in 0..((xb - xa) & 7) {
            self.texel(at, cur_u, cur_v, shade_shift);
            at += 1;
            cur_u = cur_u.wrapping_add(step_u);
            cur_v = cur_v.wrapping_add(step_v);
        }
    }
}

/// Fill a perspective-textured triangle from an already resolved layer.
pub fn fill_textured<S: PixelSink>(
    tri: &TexturedTriangle,
    viewport: &Viewport,
    layer: &TextureLayer,
    sink: &mut S,
) {
    let o = tri.origin;
    let vertical = o - tri.basis_b;
    let horizontal = tri.basis_c - o;
    let cross = |a: i32, b: i32, c: i32, d: i32| a.wrapping_mul(b).wrapping_sub(c.wrapping_mul(d));

    let u = Plane::new(
        cross(horizontal.x, o.y, horizontal.y, o.x),
        cross(horizontal.y, o.z, horizontal.z, o.y),
        cross(horizontal.z, o.x, horizontal.x, o.z),
    );
    let v = Plane::new(
        cross(vertical.x, o.y, vertical.y, o.x),
        cross(vertical.y, o.z, vertical.z, o.y),
        cross(vertical.z, o.x, vertical.x, o.z),
    );
    let w = Plane::new(
        cross(vertical.y, horizontal.x, vertical.x, horizontal.y),
        cross(vertical.z, horizontal.y, vertical.y, horizontal.z),
        cross(vertical.x, horizontal.z, vertical.z, horizontal.x),
    );

    let bound_x = viewport.bound_x();
    let mut spans = TexturedSpans {
        sink,
        layer,
        translucent: layer.is_translucent(),
        clip_x: needs_clip_x(&tri.x, bound_x),
        bound_x,
        center_x: viewport.center_x,
        center_y: viewport.center_y,
        u,
        v,
        w,
    };
    let input = EdgeInput {
        x: tri.x,
        y: tri.y,
        attr: tri.shades,
    };
    walk_triangle(
        &input,
        AttrScale::SHADE,
        viewport.bound_bottom(),
        viewport.stride(),
        &mut spans,
    );
}

/// Fill a translucent triangle; `sink` is expected to blend.
pub fn fill_alpha<S: PixelSink>(
    shape: &AlphaShape,
    viewport: &Viewport,
    palette: &Palette,
    sink: &mut S,
) {
    match shape {
        AlphaShape::Flat(t) => fill_flat(t, viewport, sink),
        AlphaShape::Gouraud(t) => fill_gouraud(t, viewport, palette, sink),
    }
}
