/// View cache
///
/// A bounded map from (master view hash, multi-edit hash) to the view that
/// results from replaying the edit chain on the master. When full, the entry
/// inserted first is evicted; reads never reorder entries.
///
/// The map sits behind a `Mutex`, so one cache may be shared between threads.
/// Two callers that miss on the same key at the same time both compute the
/// view; the second `set` simply replaces the first.

use crate::view::View;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default number of cached views.
pub const DEFAULT_CAPACITY: usize = 100;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub master_hash: String,
    pub edit_hash: String,
}

impl CacheKey {
    pub fn new(master_hash: impl Into<String>, edit_hash: impl Into<String>) -> Self {
        CacheKey {
            master_hash: master_hash.into(),
            edit_hash: edit_hash.into(),
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, Arc<dyn View>>,
    order: VecDeque<CacheKey>,
}

#[derive(Debug)]
pub struct ViewCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ViewCache {
    pub fn new(capacity: usize) -> Self {
        ViewCache {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // The state is consistent after every statement, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<dyn View>> {
        self.state().entries.get(key).cloned()
    }

    pub fn set(&self, key: CacheKey, view: Arc<dyn View>) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.state();
        if state.entries.contains_key(&key) {
            state.entries.insert(key, view);
            return;
        }

        while state.order.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    log::trace!("view cache full, evicting {:?}", oldest);
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(key, view);
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_selection::ColumnSelection;
    use crate::route::Route;
    use crate::view::ViewWithData;
    use serde_json::json;

    fn view(n: i64) -> Arc<dyn View> {
        let selection = ColumnSelection::from_routes(&[Route::from_flat("/t/n").unwrap()]).unwrap();
        Arc::new(ViewWithData::new(selection, vec![vec![json!(n)]]).unwrap())
    }

    fn key(n: usize) -> CacheKey {
        CacheKey::new(format!("m{n}"), format!("e{n}"))
    }

    #[test]
    fn test_get_and_set() {
        let cache = ViewCache::new(4);
        assert!(cache.get(&key(1)).is_none());

        let v = view(1);
        cache.set(key(1), v.clone());
        let got = cache.get(&key(1)).unwrap();
        assert!(Arc::ptr_eq(&got, &v));
        assert!(cache.get(&CacheKey::new("m1", "e2")).is_none());
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let cache = ViewCache::new(2);
        cache.set(key(1), view(1));
        cache.set(key(2), view(2));

        // Reading does not refresh an entry
        assert!(cache.get(&key(1)).is_some());

        cache.set(key(3), view(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
        assert!(cache.get(&key(3)).is_some());
    }

    #[test]
    fn test_replacing_does_not_evict() {
        let cache = ViewCache::new(2);
        cache.set(key(1), view(1));
        cache.set(key(2), view(2));
        cache.set(key(1), view(9));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(1)).unwrap().rows()[0][0], json!(9));
    }

    #[test]
    fn test_zero_capacity_and_clear() {
        let cache = ViewCache::new(0);
        cache.set(key(1), view(1));
        assert!(cache.is_empty());

        let cache = ViewCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
        cache.set(key(1), view(1));
        cache.clear();
        assert!(cache.is_empty());
    }
}
