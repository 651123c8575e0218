use derive_with::With;

use crate::buffer::BUFFER_POOL_SIZE;

#[derive(Debug, Clone, Copy, With)]
pub struct BufferPoolConfig {
    pub buffer_pool_size: usize,
    pub lru_k_k: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig {
            buffer_pool_size: BUFFER_POOL_SIZE,
            lru_k_k: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, With)]
pub struct HashTableConfig {
    /// Slots per block page. `None` packs as many slots as fit in a page.
    pub block_capacity: Option<usize>,
    /// Upper bound on grow-and-retry rounds for a single insert.
    pub max_resize_rounds: usize,
}

impl Default for HashTableConfig {
    fn default() -> Self {
        HashTableConfig {
            block_capacity: None,
            max_resize_rounds: 32,
        }
    }
}
