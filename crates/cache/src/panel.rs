use std::collections::BTreeMap;

/// Frames a panel resource may go unused before it is dropped.
pub const DEFAULT_PANEL_MAX_IDLE: u64 = 5;

#[derive(Debug, Clone)]
pub struct PanelEntry<T> {
    pub last_frame_used: u64,
    pub resource: T,
}

/// Resources backing UI panels, evicted when idle.
#[derive(Debug, Clone)]
pub struct PanelCache<K, T> {
    entries: BTreeMap<K, PanelEntry<T>>,
    max_idle: u64,
}

impl<K: Ord + Copy, T> Default for PanelCache<K, T> {
    fn default() -> Self {
        Self::new(DEFAULT_PANEL_MAX_IDLE)
    }
}

impl<K: Ord + Copy, T> PanelCache<K, T> {
    pub fn new(max_idle: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_idle,
        }
    }

    /// Fetch the resource for `key`, creating it on first use, and stamp it with `frame`.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        frame: u64,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<&mut T, E> {
        let entry = match self.entries.entry(key) {
            std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::btree_map::Entry::Vacant(e) => e.insert(PanelEntry {
                last_frame_used: frame,
                resource: create()?,
            }),
        };
        entry.last_frame_used = frame;
        Ok(&mut entry.resource)
    }

    /// Like [`get_or_try_insert_with`](Self::get_or_try_insert_with), but an
    /// existing resource that fails `fits` is rebuilt in place. A failed
    /// rebuild keeps the old resource.
    pub fn get_or_try_rebuild_with<E>(
        &mut self,
        key: K,
        frame: u64,
        fits: impl FnOnce(&T) -> bool,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<&mut T, E> {
        let entry = match self.entries.entry(key) {
            std::collections::btree_map::Entry::Occupied(e) => {
                let entry = e.into_mut();
                if !fits(&entry.resource) {
                    entry.resource = create()?;
                }
                entry
            }
            std::collections::btree_map::Entry::Vacant(e) => e.insert(PanelEntry {
                last_frame_used: frame,
                resource: create()?,
            }),
        };
        entry.last_frame_used = frame;
        Ok(&mut entry.resource)
    }

    pub fn get(&self, key: K) -> Option<&PanelEntry<T>> {
        self.entries.get(&key)
    }

    /// Drop every entry with `frame - last_frame_used > max_idle`.
    pub fn evict_stale(&mut self, frame: u64) -> usize {
        let before = self.entries.len();
        let max_idle = self.max_idle;
        self.entries
            .retain(|_, e| frame.saturating_sub(e.last_frame_used) <= max_idle);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, frame, "panel resources evicted");
        }
        evicted
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        self.entries.remove(&key).map(|e| e.resource)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_idle(&self) -> u64 {
        self.max_idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(value: u32) -> impl FnOnce() -> Result<u32, ()> {
        move || Ok(value)
    }

    #[test]
    fn creates_once_and_stamps_use() {
        let mut cache: PanelCache<u32, u32> = PanelCache::default();
        *cache.get_or_try_insert_with(1, 10, ok(5)).unwrap() += 1;
        let value = cache.get_or_try_insert_with(1, 12, ok(99)).unwrap();
        assert_eq!(*value, 6);
        assert_eq!(cache.get(1).unwrap().last_frame_used, 12);
    }

    #[test]
    fn rebuilds_resource_that_no_longer_fits() {
        let mut cache: PanelCache<u32, u32> = PanelCache::default();
        cache.get_or_try_rebuild_with(1, 1, |_| true, ok(16)).unwrap();
        let kept = cache.get_or_try_rebuild_with(1, 2, |&v| v == 16, ok(99)).unwrap();
        assert_eq!(*kept, 16);
        let rebuilt = cache.get_or_try_rebuild_with(1, 3, |&v| v == 32, ok(32)).unwrap();
        assert_eq!(*rebuilt, 32);
        assert_eq!(cache.get(1).unwrap().last_frame_used, 3);

        let failed = cache.get_or_try_rebuild_with(1, 4, |_| false, || Err("no memory"));
        assert_eq!(failed.unwrap_err(), "no memory");
        assert_eq!(cache.get(1).unwrap().resource, 32);
        assert_eq!(cache.get(1).unwrap().last_frame_used, 3);
    }

    #[test]
    fn evicts_after_five_idle_frames() {
        let mut cache: PanelCache<&str, u32> = PanelCache::default();
        cache.get_or_try_insert_with("chat", 1, ok(0)).unwrap();
        cache.get_or_try_insert_with("map", 3, ok(0)).unwrap();

        assert_eq!(cache.evict_stale(6), 0);
        assert_eq!(cache.evict_stale(7), 1);
        assert!(cache.get("chat").is_none());
        assert!(cache.get("map").is_some());
        assert_eq!(cache.evict_stale(9), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn creation_error_leaves_cache_untouched() {
        let mut cache: PanelCache<u8, u32> = PanelCache::new(2);
        let result = cache.get_or_try_insert_with(4, 0, || Err("no memory"));
        assert_eq!(result.unwrap_err(), "no memory");
        assert!(cache.is_empty());
    }
}
