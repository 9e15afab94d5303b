use isoraster_batch::{BatchError, GrowableBuffer};

use crate::command::{TriangleCommand, TriangleKind};
use crate::packed::{
    AlphaRecord, FlatRecord, GouraudRecord, MAX_TRIANGLE_INDEX, PackedRecord, TexturedRecord,
    as_words,
};

/// Result of queueing one triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queued {
    /// Stored with this submission index.
    Accepted(u32),
    /// The kind's array is at its limit; nothing was stored.
    Full,
}

/// Per-frame triangle storage: one packed record array per kind.
///
/// Every accepted triangle gets the next submission index, shared across
/// kinds, so the opaque arrays can be merged back into submission order.
#[derive(Debug)]
pub struct TriangleQueue {
    flat: GrowableBuffer<FlatRecord>,
    gouraud: GrowableBuffer<GouraudRecord>,
    textured: GrowableBuffer<TexturedRecord>,
    alpha: GrowableBuffer<AlphaRecord>,
    next_index: u32,
    max_per_kind: usize,
}

impl TriangleQueue {
    pub fn new(initial_capacity: usize, max_per_kind: usize) -> Result<Self, BatchError> {
        let capacity = initial_capacity.min(max_per_kind);
        Ok(Self {
            flat: GrowableBuffer::with_capacity(capacity)?,
            gouraud: GrowableBuffer::with_capacity(capacity)?,
            textured: GrowableBuffer::with_capacity(capacity)?,
            alpha: GrowableBuffer::with_capacity(capacity)?,
            next_index: 0,
            max_per_kind,
        })
    }

    /// Store a triangle under the next submission index.
    pub fn push(&mut self, command: &TriangleCommand) -> Result<Queued, BatchError> {
        if self.count(command.kind()) >= self.max_per_kind || self.next_index > MAX_TRIANGLE_INDEX
        {
            return Ok(Queued::Full);
        }
        let index = self.next_index;
        match command {
            TriangleCommand::Flat(t) => self.flat.push(FlatRecord::encode(index, t))?,
            TriangleCommand::Gouraud(t) => self.gouraud.push(GouraudRecord::encode(index, t))?,
            TriangleCommand::Textured(t) => self.textured.push(TexturedRecord::encode(index, t))?,
            TriangleCommand::Alpha(t) => self.alpha.push(AlphaRecord::encode(index, t))?,
        }
        self.next_index += 1;
        Ok(Queued::Accepted(index))
    }

    /// Drop every queued triangle; capacity is kept.
    pub fn clear(&mut self) {
        self.flat.clear();
        self.gouraud.clear();
        self.textured.clear();
        self.alpha.clear();
        self.next_index = 0;
    }

    pub fn count(&self, kind: TriangleKind) -> usize {
        match kind {
            TriangleKind::Flat => self.flat.len(),
            TriangleKind::Gouraud => self.gouraud.len(),
            TriangleKind::Textured => self.textured.len(),
            TriangleKind::Alpha => self.alpha.len(),
        }
    }

    pub fn opaque_count(&self) -> usize {
        self.flat.len() + self.gouraud.len() + self.textured.len()
    }

    pub fn alpha_count(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    pub fn max_per_kind(&self) -> usize {
        self.max_per_kind
    }

    pub fn flat(&self) -> &[FlatRecord] {
        self.flat.as_slice()
    }

    pub fn gouraud(&self) -> &[GouraudRecord] {
        self.gouraud.as_slice()
    }

    pub fn textured(&self) -> &[TexturedRecord] {
        self.textured.as_slice()
    }

    pub fn alpha(&self) -> &[AlphaRecord] {
        self.alpha.as_slice()
    }

    /// Raw word stream of one kind's records.
    pub fn as_words(&self, kind: TriangleKind) -> &[u32] {
        match kind {
            TriangleKind::Flat => as_words(self.flat.as_slice()),
            TriangleKind::Gouraud => as_words(self.gouraud.as_slice()),
            TriangleKind::Textured => as_words(self.textured.as_slice()),
            TriangleKind::Alpha => as_words(self.alpha.as_slice()),
        }
    }

    /// Opaque triangles in submission order, with their indices.
    pub fn opaque_in_order(&self) -> OpaqueInOrder<'_> {
        OpaqueInOrder {
            flat: self.flat.as_slice(),
            gouraud: self.gouraud.as_slice(),
            textured: self.textured.as_slice(),
        }
    }

    /// Alpha triangles in submission order.
    pub fn alpha_in_order(&self) -> impl Iterator<Item = (u32, TriangleCommand)> + '_ {
        self.alpha.iter().map(|r| (r.index(), r.decode()))
    }
}

/// Merge of the three opaque arrays by submission index.
#[derive(Debug, Clone)]
pub struct OpaqueInOrder<'a> {
    flat: &'a [FlatRecord],
    gouraud: &'a [GouraudRecord],
    textured: &'a [TexturedRecord],
}

fn head<R: PackedRecord>(records: &[R]) -> u32 {
    records.first().map_or(u32::MAX, R::index)
}

fn pop<R: PackedRecord>(records: &mut &[R]) -> Option<(u32, TriangleCommand)> {
    let (first, rest) = records.split_first()?;
    *records = rest;
    Some((first.index(), first.decode()))
}

impl Iterator for OpaqueInOrder<'_> {
    type Item = (u32, TriangleCommand);

    fn next(&mut self) -> Option<Self::Item> {
        let (f, g, t) = (head(self.flat), head(self.gouraud), head(self.textured));
        if f <= g && f <= t {
            pop(&mut self.flat)
        } else if g <= t {
            pop(&mut self.gouraud)
        } else {
            pop(&mut self.textured)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.flat.len() + self.gouraud.len() + self.textured.len();
        (n, Some(n))
    }
}
