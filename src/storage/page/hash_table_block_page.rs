use crate::buffer::PAGE_SIZE;
use crate::container::hash::KeyComparator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never written. Ends a probe sequence.
    Empty,
    /// Written once and later removed. Probes continue past it.
    Tombstone,
    Live,
}

impl SlotState {
    pub fn is_occupied(&self) -> bool {
        !matches!(self, SlotState::Empty)
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, SlotState::Live)
    }
}

/// Largest slot count whose two bitmaps and slot array fit in one page.
pub fn max_block_capacity(key_size: usize, value_size: usize) -> usize {
    let slot_size = key_size + value_size;
    let mut capacity = (PAGE_SIZE * 8) / (slot_size * 8 + 2);
    while capacity > 0 && block_bytes(capacity, slot_size) > PAGE_SIZE {
        capacity -= 1;
    }
    capacity
}

fn bitmap_len(block_capacity: usize) -> usize {
    block_capacity.div_ceil(8)
}

fn block_bytes(block_capacity: usize, slot_size: usize) -> usize {
    2 * bitmap_len(block_capacity) + block_capacity * slot_size
}

/// Fixed array of key/value slots.
///
/// Slots are claimed in order and never released outside a resize, so the
/// occupied slots of a block always form a prefix.
///
/// Block page format:
///  ----------------------------------------------------------------------
/// | OCCUPIED BITMAP | READABLE BITMAP | KEY(1) + VALUE(1) | ... | KEY(n) + VALUE(n)
///  ----------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct HashTableBlockPage<K, V> {
    states: Vec<SlotState>,
    // Some for every occupied slot, tombstones keep their old pair.
    array: Vec<Option<(K, V)>>,
}

impl<K, V> HashTableBlockPage<K, V>
where
    K: Clone,
    V: Clone + PartialEq,
{
    pub fn new(block_capacity: usize) -> Self {
        Self {
            states: vec![SlotState::Empty; block_capacity],
            array: vec![None; block_capacity],
        }
    }

    pub(crate) fn from_slots(slots: Vec<(SlotState, Option<(K, V)>)>) -> Self {
        let (states, array) = slots.into_iter().unzip();
        Self { states, array }
    }

    pub fn block_capacity(&self) -> usize {
        self.states.len()
    }

    pub fn slot_state(&self, bucket_ind: usize) -> SlotState {
        self.states[bucket_ind]
    }

    pub fn is_occupied(&self, bucket_ind: usize) -> bool {
        self.states[bucket_ind].is_occupied()
    }

    pub fn is_readable(&self, bucket_ind: usize) -> bool {
        self.states[bucket_ind].is_readable()
    }

    pub fn entry_at(&self, bucket_ind: usize) -> Option<&(K, V)> {
        self.array[bucket_ind].as_ref()
    }

    pub fn key_at(&self, bucket_ind: usize) -> Option<&K> {
        self.entry_at(bucket_ind).map(|(key, _)| key)
    }

    pub fn value_at(&self, bucket_ind: usize) -> Option<&V> {
        self.entry_at(bucket_ind).map(|(_, value)| value)
    }

    /// Writes into a never-used slot. Returns false if the slot was occupied.
    pub fn insert_at(&mut self, bucket_ind: usize, key: K, value: V) -> bool {
        if self.is_occupied(bucket_ind) {
            return false;
        }
        self.states[bucket_ind] = SlotState::Live;
        self.array[bucket_ind] = Some((key, value));
        true
    }

    /// Turns a live slot into a tombstone. Returns false if it was not live.
    pub fn remove_at(&mut self, bucket_ind: usize) -> bool {
        if !self.is_readable(bucket_ind) {
            return false;
        }
        self.states[bucket_ind] = SlotState::Tombstone;
        true
    }

    pub fn first_unoccupied(&self) -> Option<usize> {
        self.states.iter().position(|state| !state.is_occupied())
    }

    pub fn has_unoccupied(&self) -> bool {
        self.first_unoccupied().is_some()
    }

    pub fn is_full(&self) -> bool {
        !self.has_unoccupied()
    }

    pub fn num_readable(&self) -> usize {
        self.states.iter().filter(|s| s.is_readable()).count()
    }

    pub fn num_tombstones(&self) -> usize {
        self.states
            .iter()
            .filter(|s| **s == SlotState::Tombstone)
            .count()
    }

    pub fn live_entries(&self) -> impl Iterator<Item = &(K, V)> + '_ {
        self.states
            .iter()
            .zip(self.array.iter())
            .filter(|(state, _)| state.is_readable())
            .filter_map(|(_, entry)| entry.as_ref())
    }

    /// Appends every live value stored under `key`.
    pub fn collect_values<C: KeyComparator<K>>(&self, key: &K, cmp: &C, result: &mut Vec<V>) {
        for (k, v) in self.live_entries() {
            if cmp.compare(k, key).is_eq() {
                result.push(v.clone());
            }
        }
    }

    pub fn find<C: KeyComparator<K>>(&self, key: &K, value: &V, cmp: &C) -> Option<usize> {
        (0..self.block_capacity()).find(|&i| {
            self.is_readable(i)
                && self.value_at(i) == Some(value)
                && self.key_at(i).is_some_and(|k| cmp.compare(k, key).is_eq())
        })
    }

    pub fn contains<C: KeyComparator<K>>(&self, key: &K, value: &V, cmp: &C) -> bool {
        self.find(key, value, cmp).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::hash::OrdComparator;

    #[test]
    fn max_block_capacity_fits_page() {
        for (k, v) in [(4, 4), (8, 8), (4, 8), (16, 8), (64, 8)] {
            let capacity = max_block_capacity(k, v);
            assert!(block_bytes(capacity, k + v) <= PAGE_SIZE);
            assert!(block_bytes(capacity + 1, k + v) > PAGE_SIZE);
        }
        assert_eq!(max_block_capacity(4, 4), 496);
    }

    #[test]
    fn tombstone_keeps_slot_occupied() {
        let mut block = HashTableBlockPage::<i32, i32>::new(2);
        assert!(block.insert_at(0, 1, 100));
        assert!(!block.insert_at(0, 2, 200));
        assert!(block.remove_at(0));
        assert!(!block.remove_at(0));

        assert_eq!(block.slot_state(0), SlotState::Tombstone);
        // a tombstone keeps its bytes until the slot is reused by a resize
        assert_eq!(block.key_at(0), Some(&1));
        assert_eq!(block.value_at(0), Some(&100));
        assert_eq!(block.key_at(1), None);
        assert!(block.is_occupied(0));
        assert!(!block.is_readable(0));
        assert_eq!(block.first_unoccupied(), Some(1));
        assert_eq!(block.num_tombstones(), 1);
        assert_eq!(block.num_readable(), 0);
    }

    #[test]
    fn full_block_counts_tombstones() {
        let mut block = HashTableBlockPage::<i32, i32>::new(2);
        block.insert_at(0, 1, 100);
        block.insert_at(1, 2, 200);
        block.remove_at(1);
        assert!(block.is_full());
        assert!(!block.has_unoccupied());
    }

    #[test]
    fn lookup_skips_tombstones_and_other_values() {
        let mut block = HashTableBlockPage::<i32, i32>::new(4);
        block.insert_at(0, 1, 100);
        block.insert_at(1, 1, 101);
        block.insert_at(2, 2, 200);
        block.remove_at(0);

        let mut values = Vec::new();
        block.collect_values(&1, &OrdComparator, &mut values);
        assert_eq!(values, vec![101]);

        assert!(!block.contains(&1, &100, &OrdComparator));
        assert!(block.contains(&1, &101, &OrdComparator));
        assert_eq!(block.find(&2, &200, &OrdComparator), Some(2));
        assert_eq!(block.find(&2, &201, &OrdComparator), None);
    }
}
