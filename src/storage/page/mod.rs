mod hash_table_block_page;
mod hash_table_header_page;

pub use hash_table_block_page::{max_block_capacity, HashTableBlockPage, SlotState};
pub use hash_table_header_page::{HashTableHeaderPage, HEADER_MAX_BLOCK_IDS};

use crate::buffer::PageId;

/// Location of a tuple: the page holding it and its slot on that page.
#[derive(derive_new::new, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_num)
    }
}
