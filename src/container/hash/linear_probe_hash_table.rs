use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::RwLock;

use crate::buffer::{BufferEngine, BufferManager, PageId};
use crate::config::HashTableConfig;
use crate::container::hash::{KeyComparator, KeyHasher, OrdComparator, XxHasher};
use crate::error::{QuillHashError, QuillHashResult};
use crate::storage::codec::{FixedCodec, HashTableBlockPageCodec, HashTableHeaderPageCodec};
use crate::storage::page::{
    max_block_capacity, HashTableBlockPage, HashTableHeaderPage, HEADER_MAX_BLOCK_IDS,
};

/// Point-in-time counters gathered by [`LinearProbeHashTable::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTableStats {
    pub capacity: usize,
    pub num_blocks: usize,
    pub live: usize,
    pub tombstones: usize,
}

enum InsertOutcome {
    Inserted,
    Duplicate,
    Full { capacity: usize },
}

/// Disk-backed hash index with linear probing across block pages.
///
/// A key hashes to a block, and probing walks the header's block list as a
/// ring. Every persistent byte lives in buffer pool pages: one header page
/// plus `num_blocks` block pages.
///
/// Locking: `table_latch` is taken shared by lookups, inserts and removes,
/// and exclusively by resize. It guards the block list only. Slot contents
/// are guarded by the block page's own latch, which a write guard holds for
/// the whole read-modify-write of that block. At most one page is pinned at
/// any time by a table operation.
pub struct LinearProbeHashTable<K, V, C = OrdComparator, H = XxHasher, B = BufferManager> {
    name: String,
    buffer: Arc<B>,
    header_page_id: PageId,
    block_capacity: usize,
    comparator: C,
    hasher: H,
    config: HashTableConfig,
    table_latch: RwLock<()>,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, C, H, B> LinearProbeHashTable<K, V, C, H, B>
where
    K: FixedCodec,
    V: FixedCodec + PartialEq,
    C: KeyComparator<K>,
    H: KeyHasher<K>,
    B: BufferEngine,
{
    pub fn new(
        name: impl Into<String>,
        buffer: Arc<B>,
        comparator: C,
        num_slots: usize,
        hasher: H,
    ) -> QuillHashResult<Self> {
        Self::new_with_config(
            name,
            buffer,
            comparator,
            num_slots,
            hasher,
            HashTableConfig::default(),
        )
    }

    /// Allocates a header page and enough block pages for `num_slots`
    /// (rounded up to whole blocks, at least one).
    pub fn new_with_config(
        name: impl Into<String>,
        buffer: Arc<B>,
        comparator: C,
        num_slots: usize,
        hasher: H,
        config: HashTableConfig,
    ) -> QuillHashResult<Self> {
        let block_capacity = Self::resolve_block_capacity(config.block_capacity)?;
        let num_blocks = num_slots.div_ceil(block_capacity).max(1);
        if num_blocks > HEADER_MAX_BLOCK_IDS {
            return Err(QuillHashError::Storage(format!(
                "{} slots need {} blocks, a header holds at most {}",
                num_slots, num_blocks, HEADER_MAX_BLOCK_IDS
            )));
        }

        let header_page_id = buffer.new_page()?.page_id();
        let table = Self {
            name: name.into(),
            buffer,
            header_page_id,
            block_capacity,
            comparator,
            hasher,
            config,
            table_latch: RwLock::new(()),
            _marker: PhantomData,
        };

        let block_page_ids = match table.allocate_blocks(num_blocks) {
            Ok(ids) => ids,
            Err(e) => {
                table.discard_pages(&[header_page_id]);
                return Err(e);
            }
        };
        let mut header = HashTableHeaderPage::new(header_page_id, block_capacity as u32);
        for page_id in block_page_ids.iter() {
            header.add_block_page_id(*page_id)?;
        }
        header.set_size(num_blocks * block_capacity);
        if let Err(e) = table.write_header(&header) {
            table.discard_pages(&block_page_ids);
            table.discard_pages(&[header_page_id]);
            return Err(e);
        }

        debug!(
            "created hash table {} (header {}, {} blocks x {} slots)",
            table.name, header_page_id, num_blocks, block_capacity
        );
        Ok(table)
    }

    /// Reattaches to a table previously created on `buffer`.
    pub fn open(
        name: impl Into<String>,
        buffer: Arc<B>,
        header_page_id: PageId,
        comparator: C,
        hasher: H,
    ) -> QuillHashResult<Self> {
        Self::open_with_config(
            name,
            buffer,
            header_page_id,
            comparator,
            hasher,
            HashTableConfig::default(),
        )
    }

    /// The block capacity always comes from the header; the one in `config`
    /// is ignored.
    pub fn open_with_config(
        name: impl Into<String>,
        buffer: Arc<B>,
        header_page_id: PageId,
        comparator: C,
        hasher: H,
        config: HashTableConfig,
    ) -> QuillHashResult<Self> {
        let header = {
            let guard = buffer.fetch_page_read(header_page_id)?;
            HashTableHeaderPageCodec::decode(guard.data())?.0
        };
        if header.page_id != header_page_id {
            return Err(QuillHashError::Storage(format!(
                "page {} is not a hash table header (records page id {})",
                header_page_id, header.page_id
            )));
        }
        header.validate()?;
        let block_capacity = header.block_capacity as usize;
        if block_capacity > max_block_capacity(K::ENCODED_SIZE, V::ENCODED_SIZE) {
            return Err(QuillHashError::Storage(format!(
                "header {} declares {} slots per block, too many for this key/value type",
                header_page_id, block_capacity
            )));
        }

        let name = name.into();
        debug!(
            "opened hash table {} (header {}, {} blocks x {} slots)",
            name,
            header_page_id,
            header.num_blocks(),
            block_capacity
        );
        Ok(Self {
            name,
            buffer,
            header_page_id,
            block_capacity,
            comparator,
            hasher,
            config,
            table_latch: RwLock::new(()),
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }

    /// Capacity in slots.
    pub fn get_size(&self) -> QuillHashResult<usize> {
        let _table = self.table_latch.read();
        Ok(self.read_header()?.get_size())
    }

    pub fn num_blocks(&self) -> QuillHashResult<usize> {
        let _table = self.table_latch.read();
        Ok(self.read_header()?.num_blocks())
    }

    /// Block page ids in probe order.
    pub fn block_page_ids(&self) -> QuillHashResult<Vec<PageId>> {
        let _table = self.table_latch.read();
        Ok(self.read_header()?.block_page_ids)
    }

    /// Every live value stored under `key`, in probe order.
    pub fn get_value(&self, key: &K) -> QuillHashResult<Vec<V>> {
        let _table = self.table_latch.read();
        let header = self.read_header()?;
        let num_blocks = header.num_blocks();
        let start = self.block_index(key, num_blocks);

        let mut result = Vec::new();
        for step in 0..num_blocks {
            let block_index = (start + step) % num_blocks;
            let block = self.read_block(&header, block_index)?;
            block.collect_values(key, &self.comparator, &mut result);
            if block.has_unoccupied() {
                trace!(
                    "{}: lookup stops at block {} after {} steps",
                    self.name,
                    block_index,
                    step + 1
                );
                break;
            }
        }
        Ok(result)
    }

    /// Returns `false` if the exact pair is already present. Grows the table
    /// when every block is full.
    pub fn insert(&self, key: &K, value: &V) -> QuillHashResult<bool> {
        let mut rounds = 0;
        loop {
            let observed_capacity = {
                let _table = self.table_latch.read();
                let header = self.read_header()?;
                match self.insert_inner(&header, key, value)? {
                    InsertOutcome::Inserted => return Ok(true),
                    InsertOutcome::Duplicate => return Ok(false),
                    InsertOutcome::Full { capacity } => capacity,
                }
            };

            if rounds >= self.config.max_resize_rounds {
                return Err(QuillHashError::CapacityExhausted {
                    capacity: observed_capacity,
                    rounds,
                });
            }
            rounds += 1;
            debug!(
                "{}: no free slot at capacity {}, resizing (round {})",
                self.name, observed_capacity, rounds
            );
            self.resize(observed_capacity)?;
        }
    }

    /// Tombstones the exact pair. Returns `false` if it is not present.
    pub fn remove(&self, key: &K, value: &V) -> QuillHashResult<bool> {
        let _table = self.table_latch.read();
        let header = self.read_header()?;
        let num_blocks = header.num_blocks();
        let start = self.block_index(key, num_blocks);

        for step in 0..num_blocks {
            let block_index = (start + step) % num_blocks;
            let page_id = Self::block_page_id(&header, block_index)?;
            let mut guard = self.buffer.fetch_page_write(page_id)?;
            let (mut block, _) =
                HashTableBlockPageCodec::decode::<K, V>(guard.data(), self.block_capacity)?;

            if let Some(slot) = block.find(key, value, &self.comparator) {
                block.remove_at(slot);
                guard.overwrite(&HashTableBlockPageCodec::encode(&block));
                trace!("{}: removed slot {} of block {}", self.name, slot, page_id);
                return Ok(true);
            }
            if block.has_unoccupied() {
                break;
            }
        }
        Ok(false)
    }

    /// Doubles the block count and rehashes every live entry, unless the
    /// table has already grown to twice `observed_capacity`.
    pub fn resize(&self, observed_capacity: usize) -> QuillHashResult<()> {
        let _table = self.table_latch.write();
        let mut header = self.read_header()?;
        if header.get_size() >= observed_capacity.saturating_mul(2) {
            debug!(
                "{}: capacity {} already covers {}, skipping resize",
                self.name,
                header.get_size(),
                observed_capacity
            );
            return Ok(());
        }

        let old_page_ids = header.block_page_ids.clone();
        let new_num_blocks = old_page_ids.len() * 2;
        if new_num_blocks > HEADER_MAX_BLOCK_IDS {
            return Err(QuillHashError::Storage(format!(
                "{}: cannot grow to {} blocks, a header holds at most {}",
                self.name, new_num_blocks, HEADER_MAX_BLOCK_IDS
            )));
        }

        let mut entries = Vec::new();
        for block_index in 0..old_page_ids.len() {
            let block = self.read_block(&header, block_index)?;
            entries.extend(block.live_entries().cloned());
        }

        let new_page_ids = self.allocate_blocks(new_num_blocks)?;
        header.reset_block_page_ids();
        for page_id in new_page_ids.iter() {
            header.add_block_page_id(*page_id)?;
        }
        header.set_size(new_num_blocks * self.block_capacity);

        // The new blocks are unreachable until the header is written, so a
        // failure up to that point leaves the old table untouched.
        if let Err(e) = self
            .rehash_into(&header, &entries)
            .and_then(|_| self.write_header(&header))
        {
            self.discard_pages(&new_page_ids);
            return Err(e);
        }

        // Committed. Failing to free an old block only leaks that page.
        self.discard_pages(&old_page_ids);

        debug!(
            "{}: resized to {} blocks ({} slots), moved {} entries",
            self.name,
            new_num_blocks,
            header.get_size(),
            entries.len()
        );
        Ok(())
    }

    pub fn stats(&self) -> QuillHashResult<HashTableStats> {
        let _table = self.table_latch.read();
        let header = self.read_header()?;
        let mut stats = HashTableStats {
            capacity: header.get_size(),
            num_blocks: header.num_blocks(),
            live: 0,
            tombstones: 0,
        };
        for block_index in 0..header.num_blocks() {
            let block = self.read_block(&header, block_index)?;
            stats.live += block.num_readable();
            stats.tombstones += block.num_tombstones();
        }
        Ok(stats)
    }

    /// Probes from the key's home block to the first block with a free slot,
    /// checking every block on the way for the exact pair. Blocks only lose
    /// free slots between resizes, so an existing pair is always on this path.
    /// Caller holds `table_latch` in either mode.
    fn insert_inner(
        &self,
        header: &HashTableHeaderPage,
        key: &K,
        value: &V,
    ) -> QuillHashResult<InsertOutcome> {
        let num_blocks = header.num_blocks();
        let start = self.block_index(key, num_blocks);

        for step in 0..num_blocks {
            let block_index = (start + step) % num_blocks;
            let page_id = Self::block_page_id(header, block_index)?;
            let mut guard = self.buffer.fetch_page_write(page_id)?;
            let (mut block, _) =
                HashTableBlockPageCodec::decode::<K, V>(guard.data(), self.block_capacity)?;

            if block.contains(key, value, &self.comparator) {
                return Ok(InsertOutcome::Duplicate);
            }
            if let Some(slot) = block.first_unoccupied() {
                block.insert_at(slot, key.clone(), value.clone());
                guard.overwrite(&HashTableBlockPageCodec::encode(&block));
                trace!(
                    "{}: inserted into slot {} of block {} after {} steps",
                    self.name,
                    slot,
                    page_id,
                    step + 1
                );
                return Ok(InsertOutcome::Inserted);
            }
        }
        Ok(InsertOutcome::Full {
            capacity: header.get_size(),
        })
    }

    fn rehash_into(&self, header: &HashTableHeaderPage, entries: &[(K, V)]) -> QuillHashResult<()> {
        for (key, value) in entries.iter() {
            if let InsertOutcome::Full { capacity } = self.insert_inner(header, key, value)? {
                return Err(QuillHashError::Internal(format!(
                    "{}: rehash of {} entries overflowed capacity {}",
                    self.name,
                    entries.len(),
                    capacity
                )));
            }
        }
        Ok(())
    }

    fn resolve_block_capacity(requested: Option<usize>) -> QuillHashResult<usize> {
        let max_capacity = max_block_capacity(K::ENCODED_SIZE, V::ENCODED_SIZE);
        if max_capacity == 0 {
            return Err(QuillHashError::Storage(format!(
                "a {}-byte key/value pair does not fit in a block page",
                K::ENCODED_SIZE + V::ENCODED_SIZE
            )));
        }
        match requested {
            None => Ok(max_capacity),
            Some(0) => Err(QuillHashError::Internal(
                "block capacity must be positive".to_string(),
            )),
            Some(capacity) if capacity > max_capacity => Err(QuillHashError::Storage(format!(
                "block capacity {} exceeds the {} slots that fit in a page",
                capacity, max_capacity
            ))),
            Some(capacity) => Ok(capacity),
        }
    }

    fn block_index(&self, key: &K, num_blocks: usize) -> usize {
        (self.hasher.hash(key) % num_blocks as u64) as usize
    }

    fn block_page_id(header: &HashTableHeaderPage, block_index: usize) -> QuillHashResult<PageId> {
        header.get_block_page_id(block_index).ok_or_else(|| {
            QuillHashError::Internal(format!(
                "block index {} out of range for {} blocks",
                block_index,
                header.num_blocks()
            ))
        })
    }

    fn read_header(&self) -> QuillHashResult<HashTableHeaderPage> {
        let guard = self.buffer.fetch_page_read(self.header_page_id)?;
        let (header, _) = HashTableHeaderPageCodec::decode(guard.data())?;
        Ok(header)
    }

    fn write_header(&self, header: &HashTableHeaderPage) -> QuillHashResult<()> {
        let mut guard = self.buffer.fetch_page_write(self.header_page_id)?;
        guard.overwrite(&HashTableHeaderPageCodec::encode(header));
        Ok(())
    }

    fn read_block(
        &self,
        header: &HashTableHeaderPage,
        block_index: usize,
    ) -> QuillHashResult<HashTableBlockPage<K, V>> {
        let page_id = Self::block_page_id(header, block_index)?;
        let guard = self.buffer.fetch_page_read(page_id)?;
        let (block, _) = HashTableBlockPageCodec::decode(guard.data(), self.block_capacity)?;
        Ok(block)
    }

    /// All-or-nothing: pages allocated before a failure are deleted again.
    fn allocate_blocks(&self, count: usize) -> QuillHashResult<Vec<PageId>> {
        let empty = HashTableBlockPageCodec::encode(&HashTableBlockPage::<K, V>::new(
            self.block_capacity,
        ));
        let mut page_ids = Vec::with_capacity(count);
        for _ in 0..count {
            match self.buffer.new_page() {
                Ok(mut guard) => {
                    guard.overwrite(&empty);
                    page_ids.push(guard.page_id());
                }
                Err(e) => {
                    self.discard_pages(&page_ids);
                    return Err(e);
                }
            }
        }
        Ok(page_ids)
    }

    fn discard_pages(&self, page_ids: &[PageId]) {
        for page_id in page_ids {
            match self.buffer.delete_page(*page_id) {
                Ok(true) => {}
                Ok(false) => warn!("{}: page {} still pinned, leaking it", self.name, page_id),
                Err(e) => warn!("{}: failed to delete page {}: {}", self.name, page_id, e),
            }
        }
    }
}
