//! Canonical edge walk shared by every triangle kind.
//!
//! Vertices are integer pixel positions promoted to 16.16 fixed point. One
//! scalar attribute (Gouraud color or texture shade) is interpolated along the
//! edges with its own fixed-point scale. The walk finds the top vertex, splits
//! the triangle at the middle vertex and emits one span per row.
//!
//! All arithmetic wraps on overflow, matching 32-bit integer hardware.

/// Per-row span consumer.
pub trait ScanlineFill {
    /// Called once before the first span with the first row that is walked.
    fn begin(&mut self, _top_row: i32) {}

    /// Fill `[x0, x1)` on the row starting at `offset`. `a0`/`a1` are the
    /// edge attributes at the two ends, already scaled down for the span.
    fn span(&mut self, x0: i32, x1: i32, a0: i32, a1: i32, offset: i32);
}

/// Attribute scaling for one triangle kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrScale {
    /// Left shift applied to vertex attributes before stepping.
    pub edge_shift: u32,
    /// Right shift applied to edge accumulators before each span.
    pub span_shift: u32,
}

impl AttrScale {
    pub const NONE: AttrScale = AttrScale {
        edge_shift: 0,
        span_shift: 0,
    };
    /// Gouraud colors step in 17.15 and reach spans as `color << 8`.
    pub const GOURAUD: AttrScale = AttrScale {
        edge_shift: 15,
        span_shift: 7,
    };
    /// Texture shades step in 16.16 and reach spans as `shade << 8`.
    pub const SHADE: AttrScale = AttrScale {
        edge_shift: 16,
        span_shift: 8,
    };
}

/// Triangle as seen by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeInput {
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub attr: [i32; 3],
}

#[derive(Debug, Clone, Copy, Default)]
struct Step {
    x: i32,
    attr: i32,
}

fn step(x: &[i32; 3], y: &[i32; 3], attr: &[i32; 3], from: usize, to: usize, shift: u32) -> Step {
    let dy = y[to].wrapping_sub(y[from]);
    if dy == 0 {
        return Step::default();
    }
    Step {
        x: (x[to].wrapping_sub(x[from]) << 16).wrapping_div(dy),
        attr: (attr[to].wrapping_sub(attr[from]) << shift).wrapping_div(dy),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Acc {
    x: i32,
    attr: i32,
}

impl Acc {
    fn start(x: i32, attr: i32, shift: u32) -> Self {
        Self {
            x: x << 16,
            attr: attr << shift,
        }
    }

    #[inline]
    fn advance(&mut self, s: Step) {
        self.x = self.x.wrapping_add(s.x);
        self.attr = self.attr.wrapping_add(s.attr);
    }

    /// Move back to row 0 from a negative start row.
    fn pre_step(&mut self, s: Step, row: i32) {
        self.x = self.x.wrapping_sub(s.x.wrapping_mul(row));
        self.attr = self.attr.wrapping_sub(s.attr.wrapping_mul(row));
    }
}

/// Which vertex is on top and which is next, named by vertex order A, B, C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    TopANearB,
    TopANearC,
    TopBNearC,
    TopBNearA,
    TopCNearA,
    TopCNearB,
}

impl Split {
    fn vertices(self) -> (usize, usize, usize) {
        match self {
            Split::TopANearB => (0, 1, 2),
            Split::TopANearC => (0, 2, 1),
            Split::TopBNearC => (1, 2, 0),
            Split::TopBNearA => (1, 0, 2),
            Split::TopCNearA => (2, 0, 1),
            Split::TopCNearB => (2, 1, 0),
        }
    }

    /// Whether the top-to-far edge is the left side of the upper segment.
    ///
    /// The comparisons are fixed per case; adjacent triangles sharing an
    /// edge rely on them to meet without seams. `yt`/`yn` are the top and
    /// near rows after clipping to row 0.
    fn far_edge_left(self, yt: i32, yn: i32, ab: i32, bc: i32, ac: i32) -> bool {
        match self {
            Split::TopANearB => (yt != yn && ac < ab) || (yt == yn && ac > bc),
            Split::TopANearC => !((yt != yn && ac < ab) || (yt == yn && bc > ab)),
            Split::TopBNearC => (yt != yn && ab < bc) || (yt == yn && ab > ac),
            Split::TopBNearA => ab >= bc,
            Split::TopCNearA => bc < ac,
            Split::TopCNearB => bc >= ac,
        }
    }
}

/// Clip the two lower rows to `bound_bottom` and pick the walk order.
///
/// Returns `None` when the top row is at or below `bound_bottom`.
fn split(y: &mut [i32; 3], bound_bottom: i32) -> Option<Split> {
    let [ya, yb, yc] = *y;
    let (top, lower) = if ya <= yb && ya <= yc {
        (0, [1, 2])
    } else if yb <= yc {
        (1, [2, 0])
    } else {
        (2, [0, 1])
    };
    if y[top] >= bound_bottom {
        return None;
    }
    for i in lower {
        y[i] = y[i].min(bound_bottom);
    }
    Some(match top {
        0 if y[1] < y[2] => Split::TopANearB,
        0 => Split::TopANearC,
        1 if y[2] < y[0] => Split::TopBNearC,
        1 => Split::TopBNearA,
        _ if y[0] < y[1] => Split::TopCNearA,
        _ => Split::TopCNearB,
    })
}

/// Walk one triangle and feed every covered row to `fill`.
pub fn walk_triangle<F: ScanlineFill>(
    input: &EdgeInput,
    scale: AttrScale,
    bound_bottom: i32,
    stride: i32,
    fill: &mut F,
) {
    let x = input.x;
    let attr = input.attr;
    let shift = scale.edge_shift;
    // slopes use the unclipped rows
    let ab = step(&x, &input.y, &attr, 0, 1, shift);
    let bc = step(&x, &input.y, &attr, 1, 2, shift);
    let ac = step(&x, &input.y, &attr, 2, 0, shift);

    let mut y = input.y;
    let Some(split) = split(&mut y, bound_bottom) else {
        return;
    };
    let slope = |from: usize, to: usize| match (from.min(to), from.max(to)) {
        (0, 1) => ab,
        (1, 2) => bc,
        _ => ac,
    };

    let (t, n, f) = split.vertices();
    let (s_tn, s_tf, s_nf) = (slope(t, n), slope(t, f), slope(n, f));

    let mut yt = y[t];
    let mut yn = y[n];
    let yf = y[f];

    let mut tf = Acc::start(x[t], attr[t], shift);
    let mut tn = tf;
    if yt < 0 {
        tf.pre_step(s_tf, yt);
        tn.pre_step(s_tn, yt);
        yt = 0;
    }
    let mut near = Acc::start(x[n], attr[n], shift);
    if yn < 0 {
        near.pre_step(s_nf, yn);
        yn = 0;
    }

    let tf_left = split.far_edge_left(yt, yn, ab.x, bc.x, ac.x);
    fill.begin(yt);

    let span_shift = scale.span_shift;
    let emit = |fill: &mut F, far: Acc, other: Acc, offset: i32| {
        let (l, r) = if tf_left { (far, other) } else { (other, far) };
        fill.span(
            l.x >> 16,
            r.x >> 16,
            l.attr >> span_shift,
            r.attr >> span_shift,
            offset,
        );
    };

    let mut offset = yt.wrapping_mul(stride);
    for _ in 0..yn.wrapping_sub(yt) {
        emit(fill, tf, tn, offset);
        tf.advance(s_tf);
        tn.advance(s_tn);
        offset = offset.wrapping_add(stride);
    }
    for _ in 0..yf.wrapping_sub(yn) {
        emit(fill, tf, near, offset);
        tf.advance(s_tf);
        near.advance(s_nf);
        offset = offset.wrapping_add(stride);
    }
}
