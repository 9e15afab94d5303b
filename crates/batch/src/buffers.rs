use bytemuck::{Pod, Zeroable};

use crate::BatchError;

/// Append-only buffer that doubles its capacity when an append overflows.
///
/// `clear` and `truncate` rewind the write position but keep the allocation,
/// so steady-state frames do not reallocate.
#[derive(Debug, Clone)]
pub struct GrowableBuffer<T> {
    items: Vec<T>,
}

impl<T> Default for GrowableBuffer<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> GrowableBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Result<Self, BatchError> {
        let mut items = Vec::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|source| BatchError::OutOfMemory {
                requested: capacity,
                source,
            })?;
        Ok(Self { items })
    }

    /// Make room for `additional` more items, growing to twice the required size.
    pub fn grow_if_required(&mut self, additional: usize) -> Result<(), BatchError> {
        let required = self.items.len() + additional;
        if self.items.capacity() >= required {
            return Ok(());
        }
        let target = required.saturating_mul(2);
        self.items
            .try_reserve_exact(target - self.items.len())
            .map_err(|source| BatchError::OutOfMemory {
                requested: target,
                source,
            })?;
        tracing::trace!(capacity = self.items.capacity(), "buffer grown");
        Ok(())
    }

    pub fn push(&mut self, item: T) -> Result<(), BatchError> {
        self.grow_if_required(1)?;
        self.items.push(item);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Rewind the write position to `len`.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Copy> GrowableBuffer<T> {
    pub fn extend_from_slice(&mut self, items: &[T]) -> Result<(), BatchError> {
        self.grow_if_required(items.len())?;
        self.items.extend_from_slice(items);
        Ok(())
    }

    /// Copy of `start..end`, bounds-checked.
    pub fn copy_range(&self, start: usize, end: usize) -> Result<Vec<T>, BatchError> {
        self.items
            .get(start..end)
            .map(|s| s.to_vec())
            .ok_or(BatchError::RangeOutOfBounds {
                start,
                end,
                len: self.items.len(),
            })
    }
}

/// One generated vertex: 8 little-endian `f32` fields, 32 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    /// Packed HSL color code.
    pub hsl: f32,
    pub tex_coord: [f32; 2],
    /// Texture id + 1; zero means untextured.
    pub texture: f32,
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
}

impl ModelVertex {
    #[allow(clippy::too_many_arguments)]
    pub fn new(x: i32, y: i32, z: i32, hsl: i32, alpha: u8, texture_id: i32, u: f32, v: f32) -> Self {
        Self {
            position: [x as f32, y as f32, z as f32],
            hsl: hsl as f32,
            tex_coord: [u, v],
            texture: (texture_id + 1) as f32,
            alpha: alpha as f32 / 255.0,
        }
    }

    /// Texture id, or `None` when untextured.
    pub fn texture_id(&self) -> Option<u32> {
        let id = self.texture as i32 - 1;
        (id >= 0).then_some(id as u32)
    }

    pub fn hsl_code(&self) -> i32 {
        self.hsl as i32
    }

    /// Translucency in the rasterizer's convention (0 = opaque).
    pub fn transparency(&self) -> u8 {
        255 - (self.alpha.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

/// Vertex attribute stream shared by every model drawn in a frame.
#[derive(Debug, Clone, Default)]
pub struct VertexDataBuffer {
    vertices: GrowableBuffer<ModelVertex>,
}

impl VertexDataBuffer {
    pub const STRIDE: usize = std::mem::size_of::<ModelVertex>();

    pub fn with_capacity(vertices: usize) -> Result<Self, BatchError> {
        Ok(Self {
            vertices: GrowableBuffer::with_capacity(vertices)?,
        })
    }

    /// Current write position in vertices.
    pub fn pos(&self) -> usize {
        self.vertices.len()
    }

    /// Append one vertex and return its index.
    #[allow(clippy::too_many_arguments)]
    pub fn add_vertex(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        hsl: i32,
        alpha: u8,
        texture_id: i32,
        u: f32,
        v: f32,
    ) -> Result<i32, BatchError> {
        let index = self.vertices.len() as i32;
        self.vertices
            .push(ModelVertex::new(x, y, z, hsl, alpha, texture_id, u, v))?;
        Ok(index)
    }

    /// Append previously captured vertex data verbatim.
    pub fn add_data(&mut self, data: &[ModelVertex]) -> Result<(), BatchError> {
        self.vertices.extend_from_slice(data)
    }

    pub fn rewind(&mut self, pos: usize) {
        self.vertices.truncate(pos);
    }

    pub fn capture(&self, start: usize, end: usize) -> Result<Vec<ModelVertex>, BatchError> {
        self.vertices.copy_range(start, end)
    }

    pub fn vertices(&self) -> &[ModelVertex] {
        self.vertices.as_slice()
    }

    /// Raw bytes, `STRIDE` per vertex, for external upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.vertices.as_slice())
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }
}

/// Triangle index stream referencing [`VertexDataBuffer`] entries.
#[derive(Debug, Clone, Default)]
pub struct IndexDataBuffer {
    indices: GrowableBuffer<i32>,
}

impl IndexDataBuffer {
    pub fn with_capacity(indices: usize) -> Result<Self, BatchError> {
        Ok(Self {
            indices: GrowableBuffer::with_capacity(indices)?,
        })
    }

    pub fn pos(&self) -> usize {
        self.indices.len()
    }

    pub fn add_indices(&mut self, indices: &[i32]) -> Result<(), BatchError> {
        self.indices.extend_from_slice(indices)
    }

    pub fn indices(&self) -> &[i32] {
        self.indices.as_slice()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growable_keeps_all_entries_in_order() {
        let mut buf = GrowableBuffer::with_capacity(1024).unwrap();
        for i in 0..10_000u32 {
            buf.push(i).unwrap();
        }
        assert_eq!(buf.len(), 10_000);
        assert!(buf.capacity() >= 10_000);
        assert!(buf.iter().copied().eq(0..10_000));
    }

    #[test]
    fn growable_doubles_past_required() {
        let mut buf = GrowableBuffer::with_capacity(4).unwrap();
        buf.extend_from_slice(&[1u8, 2, 3, 4]).unwrap();
        buf.push(5).unwrap();
        assert!(buf.capacity() >= 10);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut buf = GrowableBuffer::with_capacity(16).unwrap();
        buf.extend_from_slice(&[7u16; 12]).unwrap();
        let cap = buf.capacity();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn copy_range_checks_bounds() {
        let mut buf = GrowableBuffer::with_capacity(4).unwrap();
        buf.extend_from_slice(&[1i32, 2, 3]).unwrap();
        assert_eq!(buf.copy_range(1, 3).unwrap(), vec![2, 3]);
        assert!(matches!(
            buf.copy_range(2, 5),
            Err(BatchError::RangeOutOfBounds { len: 3, .. })
        ));
    }

    #[test]
    fn vertex_layout_is_32_bytes() {
        assert_eq!(VertexDataBuffer::STRIDE, 32);
        let mut vb = VertexDataBuffer::with_capacity(1).unwrap();
        vb.add_vertex(1, 2, 3, 0x1234, 0xff, -1, 0.0, 0.0).unwrap();
        vb.add_vertex(4, 5, 6, 0x4321, 0x80, 7, 0.5, 1.0).unwrap();
        assert_eq!(vb.as_bytes().len(), 64);
        assert_eq!(vb.pos(), 2);

        let v = vb.vertices()[1];
        assert_eq!(v.position, [4.0, 5.0, 6.0]);
        assert_eq!(v.texture_id(), Some(7));
        assert_eq!(v.hsl_code(), 0x4321);
        assert_eq!(vb.vertices()[0].texture_id(), None);
        assert_eq!(vb.vertices()[0].transparency(), 0);
        assert_eq!(v.transparency(), 127);
    }

    #[test]
    fn vertex_capture_and_replay() {
        let mut vb = VertexDataBuffer::with_capacity(2).unwrap();
        for i in 0..3 {
            vb.add_vertex(i, i, i, 0, 0xff, -1, 0.0, 0.0).unwrap();
        }
        let captured = vb.capture(1, 3).unwrap();
        vb.rewind(1);
        assert_eq!(vb.pos(), 1);
        vb.add_data(&captured).unwrap();
        assert_eq!(vb.pos(), 3);
        assert_eq!(vb.vertices()[2].position, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn index_buffer_appends() {
        let mut ib = IndexDataBuffer::with_capacity(2).unwrap();
        ib.add_indices(&[0, 1, 2]).unwrap();
        ib.add_indices(&[3, 4, 5]).unwrap();
        assert_eq!(ib.pos(), 6);
        assert_eq!(ib.indices(), &[0, 1, 2, 3, 4, 5]);
    }
}
