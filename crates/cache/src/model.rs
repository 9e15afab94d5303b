use isoraster_batch::ModelVertex;
use serde::{Deserialize, Serialize};

/// Stable handle assigned when a model is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelHandle(pub u32);

impl ModelHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Vertex stream captured the first time a cacheable model was drawn.
#[derive(Debug, Clone)]
pub struct CachedVertexData {
    /// Frame the data was captured in.
    pub frame: u64,
    /// Last frame the data was replayed (or captured).
    pub last_frame_used: u64,
    pub data: Vec<ModelVertex>,
}

/// Counters since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCacheStats {
    pub hits: u64,
    pub captures: u64,
    pub evictions: u64,
}

/// Dense, handle-indexed model vertex cache.
///
/// Alongside the captured data it tracks which models are cacheable (static
/// scenery) and the per-frame start index of each model already emitted into
/// the live vertex stream.
#[derive(Debug, Default)]
pub struct ModelCache {
    entries: Vec<Option<CachedVertexData>>,
    cacheable: Vec<bool>,
    start_indices: Vec<Option<u32>>,
    emitted: Vec<ModelHandle>,
    stats: ModelCacheStats,
}

/// Handles at or above this index are refused by the dense tables.
pub const MAX_MODEL_HANDLES: usize = 1 << 16;

fn slot<T: Default>(items: &mut Vec<T>, handle: ModelHandle) -> Option<&mut T> {
    let index = handle.index();
    if index >= MAX_MODEL_HANDLES {
        tracing::warn!(handle = handle.0, max = MAX_MODEL_HANDLES, "model handle out of cache range");
        return None;
    }
    if index >= items.len() {
        items.resize_with(index + 1, T::default);
    }
    items.get_mut(index)
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false for handles beyond [`MAX_MODEL_HANDLES`].
    pub fn mark_cacheable(&mut self, handle: ModelHandle) -> bool {
        match slot(&mut self.cacheable, handle) {
            Some(cacheable) => {
                *cacheable = true;
                true
            }
            None => false,
        }
    }

    pub fn is_cacheable(&self, handle: ModelHandle) -> bool {
        self.cacheable.get(handle.index()).copied().unwrap_or(false)
    }

    pub fn cacheable_count(&self) -> usize {
        self.cacheable.iter().filter(|&&c| c).count()
    }

    pub fn contains(&self, handle: ModelHandle) -> bool {
        matches!(self.entries.get(handle.index()), Some(Some(_)))
    }

    pub fn get(&self, handle: ModelHandle) -> Option<&CachedVertexData> {
        self.entries.get(handle.index()).and_then(|e| e.as_ref())
    }

    /// Fetch data for replay, stamping it as used in `frame`.
    pub fn replay(&mut self, handle: ModelHandle, frame: u64) -> Option<&[ModelVertex]> {
        let entry = self.entries.get_mut(handle.index())?.as_mut()?;
        entry.last_frame_used = frame;
        self.stats.hits += 1;
        Some(&entry.data)
    }

    /// Store captured data. Existing entries are kept; empty data and
    /// out-of-range handles are ignored.
    pub fn insert(&mut self, handle: ModelHandle, frame: u64, data: Vec<ModelVertex>) -> bool {
        if data.is_empty() || self.contains(handle) {
            return false;
        }
        let Some(entry) = slot(&mut self.entries, handle) else {
            return false;
        };
        *entry = Some(CachedVertexData {
            frame,
            last_frame_used: frame,
            data,
        });
        self.stats.captures += 1;
        true
    }

    /// Number of cached models.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start index of a model already emitted this frame.
    pub fn start_index(&self, handle: ModelHandle) -> Option<u32> {
        self.start_indices.get(handle.index()).copied().flatten()
    }

    /// Out-of-range handles are not recorded, so their model is emitted again
    /// on the next draw.
    pub fn set_start_index(&mut self, handle: ModelHandle, index: u32) {
        let Some(entry) = slot(&mut self.start_indices, handle) else {
            return;
        };
        if entry.is_none() {
            self.emitted.push(handle);
        }
        *entry = Some(index);
    }

    /// Forget per-frame start indices.
    pub fn clear_start_indices(&mut self) {
        for handle in self.emitted.drain(..) {
            if let Some(entry) = self.start_indices.get_mut(handle.index()) {
                *entry = None;
            }
        }
    }

    /// Drop all captured data and the cacheable set.
    pub fn clear(&mut self) {
        let dropped = self.len();
        self.entries.clear();
        self.cacheable.clear();
        tracing::debug!(dropped, "model cache cleared");
    }

    /// Evict entries not used within `max_idle` frames of `frame`.
    pub fn sweep(&mut self, frame: u64, max_idle: u64) -> usize {
        let mut evicted = 0;
        for entry in &mut self.entries {
            let stale = entry
                .as_ref()
                .is_some_and(|e| frame.saturating_sub(e.last_frame_used) > max_idle);
            if stale {
                *entry = None;
                evicted += 1;
            }
        }
        self.stats.evictions += evicted as u64;
        if evicted > 0 {
            tracing::debug!(evicted, frame, "model cache swept");
        }
        evicted
    }

    pub fn stats(&self) -> &ModelCacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertices(n: i32) -> Vec<ModelVertex> {
        (0..n)
            .map(|i| ModelVertex::new(i, 0, 0, 0, 0xff, -1, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn insert_and_replay() {
        let mut cache = ModelCache::new();
        let h = ModelHandle(3);
        assert!(cache.insert(h, 1, vertices(6)));
        assert!(cache.contains(h));
        assert!(!cache.contains(ModelHandle(2)));

        let data = cache.replay(h, 4).unwrap();
        assert_eq!(data.len(), 6);
        let entry = cache.get(h).unwrap();
        assert_eq!(entry.frame, 1);
        assert_eq!(entry.last_frame_used, 4);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn insert_keeps_first_capture() {
        let mut cache = ModelCache::new();
        let h = ModelHandle(0);
        assert!(cache.insert(h, 1, vertices(3)));
        assert!(!cache.insert(h, 2, vertices(9)));
        assert_eq!(cache.get(h).unwrap().data.len(), 3);
    }

    #[test]
    fn empty_capture_not_stored() {
        let mut cache = ModelCache::new();
        assert!(!cache.insert(ModelHandle(1), 1, Vec::new()));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_is_wholesale() {
        let mut cache = ModelCache::new();
        cache.mark_cacheable(ModelHandle(1));
        cache.mark_cacheable(ModelHandle(5));
        cache.insert(ModelHandle(1), 1, vertices(3));
        assert_eq!(cache.cacheable_count(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.is_cacheable(ModelHandle(1)));
        assert_eq!(cache.cacheable_count(), 0);
    }

    #[test]
    fn start_indices_are_per_frame() {
        let mut cache = ModelCache::new();
        cache.set_start_index(ModelHandle(7), 42);
        cache.set_start_index(ModelHandle(7), 43);
        assert_eq!(cache.start_index(ModelHandle(7)), Some(43));
        assert_eq!(cache.start_index(ModelHandle(8)), None);
        cache.clear_start_indices();
        assert_eq!(cache.start_index(ModelHandle(7)), None);
    }

    #[test]
    fn out_of_range_handles_do_not_grow_tables() {
        let mut cache = ModelCache::new();
        let far = ModelHandle(u32::MAX);
        let edge = ModelHandle(MAX_MODEL_HANDLES as u32);
        assert!(!cache.mark_cacheable(far));
        assert!(!cache.insert(edge, 1, vertices(3)));
        cache.set_start_index(far, 9);
        assert!(!cache.is_cacheable(far));
        assert!(!cache.contains(edge));
        assert_eq!(cache.start_index(far), None);
        assert!(cache.entries.is_empty());
        assert!(cache.cacheable.is_empty());
        assert!(cache.start_indices.is_empty());
        cache.clear_start_indices();

        let last = ModelHandle(MAX_MODEL_HANDLES as u32 - 1);
        assert!(cache.mark_cacheable(last));
        assert!(cache.insert(last, 1, vertices(3)));
        assert_eq!(cache.entries.len(), MAX_MODEL_HANDLES);
    }

    #[test]
    fn sweep_evicts_idle_entries() {
        let mut cache = ModelCache::new();
        cache.insert(ModelHandle(0), 1, vertices(3));
        cache.insert(ModelHandle(1), 1, vertices(3));
        cache.replay(ModelHandle(1), 9);

        assert_eq!(cache.sweep(10, 5), 1);
        assert!(!cache.contains(ModelHandle(0)));
        assert!(cache.contains(ModelHandle(1)));
        assert_eq!(cache.stats().evictions, 1);
    }
}
