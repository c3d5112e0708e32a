use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A ranked `(key, count)` pair as handed out by [`TopKTracker::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankEntry<K> {
    pub key: K,
    pub count: u64,
}

/// What a full list does with a key that is not ranked yet but cleared the floor.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementStrategy {
    /// Overwrite the boundary entry in place, leaving its neighbours untouched.
    ///
    /// When the boundary is the tail (the new count equals the floor) this is
    /// an exact replacement of the most recently ranked tie. When the boundary
    /// sits higher up, the boundary's key is dropped even though lower-ranked
    /// keys survive below it.
    #[default]
    Overwrite,
    /// Evict the tail and link the new entry directly after the boundary.
    ///
    /// Identical to [`ReplacementStrategy::Overwrite`] when the boundary is
    /// the tail. The tracked counts then always equal the K largest counts.
    ShiftEvict,
}

/// Effect of a single [`TopKTracker::observe_outcome`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<K> {
    /// Nothing changed.
    Ignored,
    /// The key was already ranked; its count was refreshed in place.
    Updated,
    /// The key took a free slot.
    Inserted,
    /// The key displaced `evicted` from a full list.
    Replaced { evicted: K },
}

#[derive(Debug, Clone, Copy)]
struct Node<K> {
    entry: RankEntry<K>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded list of the highest-count keys, kept in descending count order.
///
/// Entries live in an arena of at most `capacity` nodes linked by index, so
/// repositioning an entry is O(1) once its new neighbour is known. Finding
/// that neighbour is a backward scan from the tail, O(K) worst case, which is
/// cheap because most observations land near the floor of the list.
///
/// The tracker does not count anything itself: callers hand it the key's new
/// cumulative count after every event (see [`crate::count_store::CountStore`]).
/// It is not synchronized; wrap it together with its count store behind one
/// lock when it is shared between threads.
pub struct TopKTracker<K> {
    capacity: usize,
    strategy: ReplacementStrategy,
    nodes: Vec<Node<K>>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Copy + Eq + fmt::Debug> TopKTracker<K> {
    /// Create a tracker keeping the top `capacity` keys, using
    /// [`ReplacementStrategy::Overwrite`] on a full list.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::with_strategy(capacity, ReplacementStrategy::default())
    }

    /// Create a tracker with an explicit full-list replacement strategy.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_strategy(capacity: usize, strategy: ReplacementStrategy) -> Self {
        assert!(capacity > 0, "top-k capacity must be positive");
        Self {
            capacity,
            strategy,
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn strategy(&self) -> ReplacementStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.capacity
    }

    /// Count of the lowest-ranked entry, or 0 while the list is empty.
    pub fn tail_count(&self) -> u64 {
        self.tail.map_or(0, |idx| self.nodes[idx].entry.count)
    }

    /// Feed the new cumulative `count` of `key`.
    pub fn observe(&mut self, key: K, count: u64) {
        self.observe_outcome(key, count);
    }

    /// Same as [`observe`](Self::observe), reporting what changed.
    pub fn observe_outcome(&mut self, key: K, count: u64) -> Outcome<K> {
        // A key below the floor of a full list cannot be ranked.
        if !self.is_full() || count >= self.tail_count() {
            self.update(key, count)
        } else {
            Outcome::Ignored
        }
    }

    /// Ranked entries from the highest count to the lowest.
    pub fn snapshot(&self) -> Vec<RankEntry<K>> {
        self.iter().copied().collect()
    }

    /// The first `k` ranked entries.
    pub fn top_k(&self, k: usize) -> Vec<RankEntry<K>> {
        self.iter().take(k).copied().collect()
    }

    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    pub fn reset(&mut self) {
        debug!("Resetting top-{} list ({} entries)", self.capacity, self.nodes.len());
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    fn update(&mut self, key: K, count: u64) -> Outcome<K> {
        if self.head.is_none() {
            let idx = self.push_node(key, count);
            self.link_front(idx);
            return Outcome::Inserted;
        }

        // Walk up from the tail: new and refreshed keys mostly belong near it.
        let mut boundary = None;
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            let entry = self.nodes[idx].entry;
            if entry.key == key {
                self.nodes[idx].entry.count = count;
                self.promote(idx, count);
                return Outcome::Updated;
            }
            if entry.count >= count {
                boundary = Some(idx);
                break;
            }
            cursor = self.nodes[idx].prev;
        }

        match boundary {
            Some(at) if !self.is_full() => {
                let idx = self.push_node(key, count);
                self.link_after(idx, at);
                self.log_if_filled();
                Outcome::Inserted
            }
            Some(at) => self.replace(Some(at), key, count),
            None if !self.is_full() => {
                let idx = self.push_node(key, count);
                self.link_back(idx);
                self.log_if_filled();
                Outcome::Inserted
            }
            // Outranks every entry of a full list, e.g. a tie evicted earlier
            // that came back with one more hit.
            None => self.replace(None, key, count),
        }
    }

    /// Move a refreshed entry up past every predecessor whose count it now
    /// reaches, stopping behind the first strictly greater one.
    fn promote(&mut self, idx: usize, count: u64) {
        let Some(head) = self.head else {
            return;
        };
        if head == idx {
            return;
        }
        if self.nodes[head].entry.count <= count {
            self.unlink(idx);
            self.link_front(idx);
            return;
        }

        let mut anchor = self.nodes[idx].prev;
        while let Some(at) = anchor {
            if self.nodes[at].entry.count > count {
                break;
            }
            anchor = self.nodes[at].prev;
        }

        if let Some(at) = anchor {
            if self.nodes[idx].prev != Some(at) {
                self.unlink(idx);
                self.link_after(idx, at);
            }
        }
    }

    /// Rank `key` in a full list, in front of `boundary` or at the head when
    /// there is none.
    fn replace(&mut self, boundary: Option<usize>, key: K, count: u64) -> Outcome<K> {
        let entry = RankEntry { key, count };
        let evicted = match self.strategy {
            ReplacementStrategy::Overwrite => {
                let Some(at) = boundary else {
                    return Outcome::Ignored;
                };
                let evicted = self.nodes[at].entry.key;
                if Some(at) != self.tail {
                    debug!(
                        "Overwrote non-tail boundary {:?} with {:?} (count {})",
                        evicted, key, count
                    );
                }
                self.nodes[at].entry = entry;
                evicted
            }
            ReplacementStrategy::ShiftEvict => {
                let Some(tail) = self.tail else {
                    return Outcome::Ignored;
                };
                let evicted = self.nodes[tail].entry.key;
                self.nodes[tail].entry = entry;
                match boundary {
                    Some(at) if at == tail => {}
                    Some(at) => {
                        self.unlink(tail);
                        self.link_after(tail, at);
                    }
                    None => {
                        self.unlink(tail);
                        self.link_front(tail);
                    }
                }
                evicted
            }
        };
        trace!("Evicted {:?} for {:?} (count {})", evicted, key, count);
        Outcome::Replaced { evicted }
    }

    fn log_if_filled(&self) {
        if self.is_full() {
            debug!(
                "Top-{} list is full, floor count is {}",
                self.capacity,
                self.tail_count()
            );
        }
    }

    // ─── Arena links ─────────────────────────────────────────────────

    fn push_node(&mut self, key: K, count: u64) -> usize {
        self.nodes.push(Node {
            entry: RankEntry { key, count },
            prev: None,
            next: None,
        });
        self.nodes.len() - 1
    }

    fn unlink(&mut self, idx: usize) {
        let Node { prev, next, .. } = self.nodes[idx];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn link_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        match self.head {
            Some(h) => self.nodes[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn link_after(&mut self, idx: usize, at: usize) {
        let next = self.nodes[at].next;
        self.nodes[idx].prev = Some(at);
        self.nodes[idx].next = next;
        self.nodes[at].next = Some(idx);
        match next {
            Some(n) => self.nodes[n].prev = Some(idx),
            None => self.tail = Some(idx),
        }
    }

    fn link_back(&mut self, idx: usize) {
        match self.tail {
            Some(t) => self.link_after(idx, t),
            None => self.link_front(idx),
        }
    }
}

/// Iterator over ranked entries, head to tail.
pub struct Iter<'a, K> {
    nodes: &'a [Node<K>],
    cursor: Option<usize>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a RankEntry<K>;

    fn next(&mut self) -> Option<Self::Item> {
        let nodes = self.nodes;
        let node = &nodes[self.cursor?];
        self.cursor = node.next;
        Some(&node.entry)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(tracker: &TopKTracker<u32>) -> Vec<(u32, u64)> {
        tracker.iter().map(|e| (e.key, e.count)).collect()
    }

    /// Replays keys through a local count map, the way the orchestrator does.
    fn feed(
        tracker: &mut TopKTracker<u32>,
        counts: &mut std::collections::HashMap<u32, u64>,
        keys: &[u32],
    ) {
        for &key in keys {
            let count = counts.entry(key).or_insert(0);
            *count += 1;
            tracker.observe(key, *count);
        }
    }

    #[test]
    fn test_empty_tracker() {
        let tracker = TopKTracker::<u32>::new(3);
        assert!(tracker.is_empty());
        assert!(!tracker.is_full());
        assert_eq!(tracker.tail_count(), 0);
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        let _ = TopKTracker::<u32>::new(0);
    }

    #[test]
    fn test_first_observation_is_inserted() {
        let mut tracker = TopKTracker::new(3);
        assert_eq!(tracker.observe_outcome(7, 1), Outcome::Inserted);
        assert_eq!(ranked(&tracker), vec![(7, 1)]);
        assert_eq!(tracker.tail_count(), 1);
    }

    #[test]
    fn test_tie_break_keeps_first_seen() {
        let mut tracker = TopKTracker::new(5);
        tracker.observe(1, 1);
        tracker.observe(2, 1);
        tracker.observe(3, 1);
        assert_eq!(ranked(&tracker), vec![(1, 1), (2, 1), (3, 1)]);
    }

    #[test]
    fn test_refreshed_entry_moves_to_front() {
        let mut tracker = TopKTracker::new(5);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[1, 2, 3, 3]);
        // 3 ties the head at 2 > 1, so it jumps to the front
        assert_eq!(ranked(&tracker), vec![(3, 2), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_refreshed_entry_moves_behind_strictly_greater() {
        let mut tracker = TopKTracker::new(5);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[1, 1, 1, 2, 2, 3, 4, 4]);
        // 4 reaches 2: passes 3 (1) and 2 (2), stops behind 1 (3)
        assert_eq!(ranked(&tracker), vec![(1, 3), (4, 2), (2, 2), (3, 1)]);
    }

    #[test]
    fn test_refreshed_entry_stays_behind_greater_predecessor() {
        let mut tracker = TopKTracker::new(5);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[1, 1, 1, 2]);
        assert_eq!(tracker.observe_outcome(2, 2), Outcome::Updated);
        assert_eq!(ranked(&tracker), vec![(1, 3), (2, 2)]);
    }

    #[test]
    fn test_gate_ignores_below_floor() {
        let mut tracker = TopKTracker::new(2);
        tracker.observe(1, 5);
        tracker.observe(2, 3);
        let before = tracker.snapshot();

        assert_eq!(tracker.observe_outcome(3, 2), Outcome::Ignored);
        assert_eq!(tracker.snapshot(), before);
    }

    #[test]
    fn test_full_list_replaces_tail_on_tie() {
        let mut tracker = TopKTracker::new(2);
        tracker.observe(1, 2);
        tracker.observe(2, 1);

        assert_eq!(tracker.observe_outcome(3, 1), Outcome::Replaced { evicted: 2 });
        assert_eq!(ranked(&tracker), vec![(1, 2), (3, 1)]);
    }

    #[test]
    fn test_overwrite_drops_boundary_instead_of_tail() {
        let mut tracker = TopKTracker::new(2);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[1, 1, 2, 3]);
        assert_eq!(ranked(&tracker), vec![(1, 2), (3, 1)]);

        // 2 comes back with count 2; the boundary is 1 (count 2), not the tail
        assert_eq!(tracker.observe_outcome(2, 2), Outcome::Replaced { evicted: 1 });
        assert_eq!(ranked(&tracker), vec![(2, 2), (3, 1)]);
    }

    #[test]
    fn test_shift_evict_drops_tail() {
        let mut tracker = TopKTracker::with_strategy(2, ReplacementStrategy::ShiftEvict);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[1, 1, 2, 3]);
        assert_eq!(ranked(&tracker), vec![(1, 2), (3, 1)]);

        assert_eq!(tracker.observe_outcome(2, 2), Outcome::Replaced { evicted: 3 });
        assert_eq!(ranked(&tracker), vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_shift_evict_links_after_boundary() {
        let mut tracker = TopKTracker::with_strategy(4, ReplacementStrategy::ShiftEvict);
        tracker.observe(1, 9);
        tracker.observe(2, 5);
        tracker.observe(3, 2);
        tracker.observe(4, 1);

        assert_eq!(tracker.observe_outcome(5, 4), Outcome::Replaced { evicted: 4 });
        assert_eq!(ranked(&tracker), vec![(1, 9), (2, 5), (5, 4), (3, 2)]);
        assert_eq!(tracker.len(), 4);
    }

    #[test]
    fn test_append_when_count_exceeds_all_entries() {
        let mut tracker = TopKTracker::new(3);
        tracker.observe(1, 1);
        tracker.observe(2, 5);
        // No boundary on a non-full list appends at the low end
        assert_eq!(ranked(&tracker), vec![(1, 1), (2, 5)]);
    }

    #[test]
    fn test_overwrite_ignores_key_outranking_full_list() {
        let mut tracker = TopKTracker::new(2);
        let mut counts = Default::default();
        // 2 loses its slot to 3 on a tie, then comes back above everyone
        feed(&mut tracker, &mut counts, &[1, 2, 3, 2]);
        assert_eq!(ranked(&tracker), vec![(1, 1), (3, 1)]);
        assert_eq!(tracker.observe_outcome(2, 3), Outcome::Ignored);
        assert_eq!(ranked(&tracker), vec![(1, 1), (3, 1)]);
    }

    #[test]
    fn test_shift_evict_promotes_key_outranking_full_list() {
        let mut tracker = TopKTracker::with_strategy(2, ReplacementStrategy::ShiftEvict);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[1, 2, 3, 2]);
        assert_eq!(ranked(&tracker), vec![(2, 2), (1, 1)]);
    }

    #[test]
    fn test_single_slot_shift_evict() {
        let mut tracker = TopKTracker::with_strategy(1, ReplacementStrategy::ShiftEvict);
        tracker.observe(1, 1);
        assert_eq!(tracker.observe_outcome(2, 3), Outcome::Replaced { evicted: 1 });
        assert_eq!(ranked(&tracker), vec![(2, 3)]);
    }

    #[test]
    fn test_snapshot_is_non_destructive() {
        let mut tracker = TopKTracker::new(3);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[4, 5, 4, 6]);
        assert_eq!(tracker.snapshot(), tracker.snapshot());
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_top_k_truncates() {
        let mut tracker = TopKTracker::new(4);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[1, 1, 1, 2, 2, 3, 4]);
        let top = tracker.top_k(2);
        assert_eq!(
            top,
            vec![RankEntry { key: 1, count: 3 }, RankEntry { key: 2, count: 2 }]
        );
        assert_eq!(tracker.top_k(10).len(), 4);
    }

    #[test]
    fn test_reset_empties_list() {
        let mut tracker = TopKTracker::new(2);
        let mut counts = Default::default();
        feed(&mut tracker, &mut counts, &[1, 2, 3]);
        tracker.reset();
        assert!(tracker.snapshot().is_empty());
        assert_eq!(tracker.tail_count(), 0);

        tracker.observe(9, 1);
        assert_eq!(ranked(&tracker), vec![(9, 1)]);
    }

    #[test]
    fn test_arena_bounded_by_capacity() {
        for strategy in [ReplacementStrategy::Overwrite, ReplacementStrategy::ShiftEvict] {
            let mut tracker = TopKTracker::with_strategy(8, strategy);
            let arena = tracker.nodes.capacity();
            assert!(arena >= 8);

            let mut counts = Default::default();
            let keys: Vec<u32> = (0..2_000u32).map(|i| (i * 7919) % 61).collect();
            feed(&mut tracker, &mut counts, &keys);
            assert_eq!(tracker.len(), 8);
            // Nodes are recycled once full, never reallocated
            assert_eq!(tracker.nodes.capacity(), arena);
        }
    }
}
