use std::collections::HashMap;
use std::hash::Hash;

/// Cumulative hit count per key.
///
/// Counts start at zero, grow by exactly one per [`increment`](Self::increment)
/// and only go back to zero through [`clear`](Self::clear). Nothing is ever
/// evicted, so memory grows with the number of distinct keys seen.
#[derive(Debug, Clone)]
pub struct CountStore<K> {
    counts: HashMap<K, u64>,
}

impl<K> Default for CountStore<K> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> CountStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one hit for `key` and return its new count.
    pub fn increment(&mut self, key: K) -> u64 {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Current count of `key`, 0 if it was never seen.
    pub fn count(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> + '_ {
        self.counts.iter().map(|(key, count)| (key, *count))
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}
