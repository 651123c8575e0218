use crate::buffer::{PageId, PAGE_SIZE};
use crate::error::{QuillHashError, QuillHashResult};

/// page_id (4) + capacity (8) + block_capacity (4) + num_blocks (4)
pub const HEADER_FIXED_SIZE: usize = 20;
pub const HEADER_MAX_BLOCK_IDS: usize = (PAGE_SIZE - HEADER_FIXED_SIZE) / 4;

/// Metadata page of a linear probing hash table.
///
/// The order of `block_page_ids` is the probe ring: block `i` is followed by
/// block `(i + 1) % num_blocks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashTableHeaderPage {
    pub page_id: PageId,
    pub capacity: u64,
    pub block_capacity: u32,
    pub block_page_ids: Vec<PageId>,
}

impl HashTableHeaderPage {
    pub fn new(page_id: PageId, block_capacity: u32) -> Self {
        Self {
            page_id,
            capacity: 0,
            block_capacity,
            block_page_ids: Vec::new(),
        }
    }

    pub fn get_size(&self) -> usize {
        self.capacity as usize
    }

    pub fn set_size(&mut self, capacity: usize) {
        self.capacity = capacity as u64;
    }

    pub fn num_blocks(&self) -> usize {
        self.block_page_ids.len()
    }

    pub fn get_block_page_id(&self, index: usize) -> Option<PageId> {
        self.block_page_ids.get(index).copied()
    }

    pub fn add_block_page_id(&mut self, page_id: PageId) -> QuillHashResult<()> {
        if self.block_page_ids.len() >= HEADER_MAX_BLOCK_IDS {
            return Err(QuillHashError::Storage(format!(
                "hash table header {} cannot hold more than {} block ids",
                self.page_id, HEADER_MAX_BLOCK_IDS
            )));
        }
        self.block_page_ids.push(page_id);
        Ok(())
    }

    /// Forgets the current block list so a resize can append a new one.
    pub fn reset_block_page_ids(&mut self) {
        self.block_page_ids.clear();
    }

    /// `capacity == num_blocks * block_capacity`, at least one block, no repeats.
    pub fn validate(&self) -> QuillHashResult<()> {
        if self.block_capacity == 0 || self.block_page_ids.is_empty() {
            return Err(QuillHashError::Storage(format!(
                "hash table header {} has no blocks",
                self.page_id
            )));
        }
        let expected = self.block_page_ids.len() as u64 * self.block_capacity as u64;
        if self.capacity != expected {
            return Err(QuillHashError::Storage(format!(
                "hash table header {} capacity {} does not match {} blocks of {}",
                self.page_id,
                self.capacity,
                self.block_page_ids.len(),
                self.block_capacity
            )));
        }
        let mut seen = self.block_page_ids.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.block_page_ids.len() {
            return Err(QuillHashError::Storage(format!(
                "hash table header {} lists a block page twice",
                self.page_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_block_page_id_respects_page_limit() {
        let mut header = HashTableHeaderPage::new(1, 4);
        for id in 0..HEADER_MAX_BLOCK_IDS as u32 {
            header.add_block_page_id(id + 2).unwrap();
        }
        assert_eq!(header.num_blocks(), HEADER_MAX_BLOCK_IDS);
        assert!(header.add_block_page_id(u32::MAX).is_err());
    }

    #[test]
    fn reset_keeps_capacity_until_set() {
        let mut header = HashTableHeaderPage::new(1, 4);
        header.add_block_page_id(2).unwrap();
        header.set_size(4);
        header.reset_block_page_ids();
        assert_eq!(header.num_blocks(), 0);
        assert_eq!(header.get_size(), 4);
        assert_eq!(header.get_block_page_id(0), None);
    }

    #[test]
    fn validate_catches_inconsistent_headers() {
        let mut header = HashTableHeaderPage::new(1, 4);
        assert!(header.validate().is_err());

        header.add_block_page_id(2).unwrap();
        header.add_block_page_id(3).unwrap();
        header.set_size(4);
        assert!(header.validate().is_err());

        header.set_size(8);
        header.validate().unwrap();

        header.block_page_ids[1] = 2;
        assert!(header.validate().is_err());
    }
}
