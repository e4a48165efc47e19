//! Per-function, per-address memoization of conversion results.

use crate::function::FunctionId;
use rustc_hash::FxHashMap;

/// A write-once memo table keyed by (function, address).
///
/// There is no invalidation. Results for a function are only valid for as
/// long as that function's instructions, and the stack heights reported for
/// it, do not change.
#[derive(Clone, Debug)]
pub struct ConversionCache<V> {
    entries: FxHashMap<(FunctionId, u64), V>,
}

impl<V> ConversionCache<V> {
    pub fn new() -> ConversionCache<V> {
        ConversionCache {
            entries: FxHashMap::default(),
        }
    }

    pub fn get(&self, function: FunctionId, address: u64) -> Option<&V> {
        self.entries.get(&(function, address))
    }

    pub fn contains(&self, function: FunctionId, address: u64) -> bool {
        self.entries.contains_key(&(function, address))
    }

    /// Store `value` for `function` and `address`.
    ///
    /// Returns false, leaving the existing entry in place, if a value was
    /// already stored for this key.
    pub fn insert(&mut self, function: FunctionId, address: u64, value: V) -> bool {
        if self.contains(function, address) {
            warn!(
                "conversion cache already holds {}:0x{:x}, keeping the first entry",
                function, address
            );
            return false;
        }
        self.entries.insert((function, address), value);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for ConversionCache<V> {
    fn default() -> ConversionCache<V> {
        ConversionCache::new()
    }
}

#[test]
fn write_once() {
    let f0 = FunctionId::new(0);
    let f1 = FunctionId::new(1);

    let mut cache = ConversionCache::new();
    assert!(cache.is_empty());
    assert!(cache.insert(f0, 0x1000, "first"));
    assert!(!cache.insert(f0, 0x1000, "second"));
    assert!(cache.insert(f1, 0x1000, "other function"));

    assert_eq!(cache.get(f0, 0x1000), Some(&"first"));
    assert_eq!(cache.get(f1, 0x1000), Some(&"other function"));
    assert_eq!(cache.get(f0, 0x1004), None);
    assert_eq!(cache.len(), 2);
}
