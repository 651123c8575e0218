//! BufferManager coordinates pinning, replacement, and dirty tracking over a shared BufferPool.

use std::sync::Arc;

use dashmap::DashSet;
use log::{debug, trace, warn};
use parking_lot::{Mutex, RwLock};

use crate::buffer::buffer_pool::{BufferPool, FrameId};
use crate::buffer::engine::{BufferEngine, ReadGuardRef, WriteGuardRef};
use crate::buffer::page::{self, PageId, ReadPageGuard, WritePageGuard, INVALID_PAGE_ID};
use crate::config::BufferPoolConfig;
use crate::error::{QuillHashError, QuillHashResult};
use crate::storage::disk_manager::DiskManager;
use crate::utils::cache::lru_k::LruKReplacer;
use crate::utils::cache::Replacer;

/// Page cache in front of a `DiskManager`.
///
/// `latch` serializes page-table bookkeeping (lookup, load, pin, unpin,
/// evict, delete). Frame latches are only ever taken after `latch` has been
/// released, so a thread holding a page latch may always call back in.
#[derive(Debug)]
pub struct BufferManager {
    pool: Arc<BufferPool>,
    replacer: RwLock<LruKReplacer>,
    latch: Mutex<()>,
    dirty_pages: DashSet<PageId>,
}

impl BufferManager {
    pub fn new(num_pages: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self::new_with_config(
            BufferPoolConfig {
                buffer_pool_size: num_pages,
                ..Default::default()
            },
            disk_manager,
        )
    }

    pub fn new_with_config(config: BufferPoolConfig, disk_manager: Arc<DiskManager>) -> Self {
        let pool = Arc::new(BufferPool::new_with_config(config, disk_manager));
        let replacer = RwLock::new(LruKReplacer::with_k(pool.capacity(), config.lru_k_k));

        Self {
            pool,
            replacer,
            latch: Mutex::new(()),
            dirty_pages: DashSet::new(),
        }
    }

    pub fn buffer_pool(&self) -> Arc<BufferPool> {
        self.pool.clone()
    }

    pub fn dirty_page_ids(&self) -> Vec<PageId> {
        self.dirty_pages.iter().map(|entry| *entry.key()).collect()
    }

    /// Current pin count of a resident page, `None` if it is not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let _latch = self.latch.lock();
        self.pool
            .lookup_frame(page_id)
            .map(|frame_id| self.pool.frame_meta(frame_id).pin_count)
    }

    /// Sum of pins over every frame; zero once all guards are gone.
    pub fn total_pin_count(&self) -> u64 {
        let _latch = self.latch.lock();
        (0..self.pool.capacity())
            .map(|frame_id| self.pool.frame_meta(frame_id).pin_count as u64)
            .sum()
    }

    pub fn new_page(self: &Arc<Self>) -> QuillHashResult<WritePageGuard> {
        let (page_id, frame_id) = {
            let _latch = self.latch.lock();
            let frame_id = self.allocate_frame(INVALID_PAGE_ID)?;
            let page_id = match self.pool.allocate_page_id() {
                Ok(page_id) => page_id,
                Err(e) => {
                    self.pool.push_free_frame(frame_id);
                    return Err(e);
                }
            };
            self.pool.insert_mapping(page_id, frame_id);
            {
                let mut meta = self.pool.frame_meta(frame_id);
                meta.page_id = page_id;
                meta.pin_count = 1;
                meta.is_dirty = false;
            }
            self.pool.reset_frame(frame_id);
            self.replacer_record_access(frame_id)?;
            self.mark_non_evictable(frame_id)?;
            (page_id, frame_id)
        };
        trace!("new page {} in frame {}", page_id, frame_id);
        Ok(page::new_write_guard(Arc::clone(self), page_id, frame_id))
    }

    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<ReadPageGuard> {
        let frame_id = self.pin_frame(page_id)?;
        Ok(page::new_read_guard(Arc::clone(self), page_id, frame_id))
    }

    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<WritePageGuard> {
        let frame_id = self.pin_frame(page_id)?;
        Ok(page::new_write_guard(Arc::clone(self), page_id, frame_id))
    }

    /// Releases one pin on `page_id`. Returns `false` if the page is not
    /// resident or was not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> QuillHashResult<bool> {
        let _latch = self.latch.lock();
        let Some(frame_id) = self.pool.lookup_frame(page_id) else {
            warn!("unpin of non-resident page {}", page_id);
            return Ok(false);
        };
        let mut meta = self.pool.frame_meta(frame_id);
        if meta.pin_count == 0 {
            warn!("unpin of page {} with pin count 0", page_id);
            return Ok(false);
        }
        meta.pin_count -= 1;
        if is_dirty {
            meta.is_dirty = true;
            self.dirty_pages.insert(page_id);
        }
        if meta.pin_count == 0 {
            drop(meta);
            self.mark_evictable(frame_id)?;
        }
        Ok(true)
    }

    pub fn flush_page(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<bool> {
        {
            let _latch = self.latch.lock();
            let Some(frame_id) = self.pool.lookup_frame(page_id) else {
                return Ok(false);
            };
            if !self.pool.frame_meta(frame_id).is_dirty {
                self.dirty_pages.remove(&page_id);
                return Ok(false);
            }
        }

        // Holding a read guard keeps writers out while the bytes go to disk.
        let guard = self.fetch_page_read(page_id)?;
        self.pool.write_frame_to_disk(page_id, guard.frame_id())?;
        self.pool.frame_meta(guard.frame_id()).is_dirty = false;
        self.dirty_pages.remove(&page_id);
        drop(guard);
        Ok(true)
    }

    pub fn flush_all_pages(self: &Arc<Self>) -> QuillHashResult<()> {
        for page_id in self.dirty_page_ids() {
            self.flush_page(page_id)?;
        }
        self.pool.disk_manager().sync()
    }

    /// Drops `page_id` from the cache and returns its id to the disk
    /// manager. Returns `false` while the page is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> QuillHashResult<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }
        let _latch = self.latch.lock();
        if let Some(frame_id) = self.pool.lookup_frame(page_id) {
            if self.pool.frame_meta(frame_id).pin_count > 0 {
                debug!("delete_page: page {} is still pinned", page_id);
                return Ok(false);
            }
            self.pool.remove_mapping(page_id);
            self.pool.reset_frame(frame_id);
            self.pool.clear_frame_meta(frame_id);
            self.replacer.write().remove(frame_id);
            self.pool.push_free_frame(frame_id);
        }
        self.dirty_pages.remove(&page_id);
        self.pool.deallocate_page_id(page_id)?;
        trace!("deleted page {}", page_id);
        Ok(true)
    }

    /// Pins `page_id`, loading it into a frame if needed.
    fn pin_frame(&self, page_id: PageId) -> QuillHashResult<FrameId> {
        if page_id == INVALID_PAGE_ID {
            return Err(QuillHashError::page_unavailable(page_id, "invalid page id"));
        }

        let _latch = self.latch.lock();
        let frame_id = match self.pool.lookup_frame(page_id) {
            Some(frame_id) => frame_id,
            None => {
                let frame_id = self.allocate_frame(page_id)?;
                if let Err(e) = self.pool.load_page_into_frame(page_id, frame_id) {
                    self.pool.clear_frame_meta(frame_id);
                    self.pool.push_free_frame(frame_id);
                    return Err(e);
                }
                self.pool.insert_mapping(page_id, frame_id);
                frame_id
            }
        };
        self.pool.frame_meta(frame_id).pin_count += 1;
        self.replacer_record_access(frame_id)?;
        self.mark_non_evictable(frame_id)?;
        Ok(frame_id)
    }

    /// Must be called with `latch` held.
    fn allocate_frame(&self, for_page: PageId) -> QuillHashResult<FrameId> {
        if let Some(frame_id) = self.pool.pop_free_frame() {
            return Ok(frame_id);
        }
        self.evict_victim_frame(for_page)
    }

    fn evict_victim_frame(&self, for_page: PageId) -> QuillHashResult<FrameId> {
        let victim = match self.replacer.write().evict() {
            Some(frame_id) => frame_id,
            None => {
                return Err(QuillHashError::page_unavailable(
                    for_page,
                    "buffer pool is full and no page can be evicted",
                ))
            }
        };

        let (page_id, is_dirty) = {
            let meta = self.pool.frame_meta(victim);
            debug_assert_eq!(meta.pin_count, 0);
            (meta.page_id, meta.is_dirty)
        };

        if page_id != INVALID_PAGE_ID {
            if is_dirty {
                if let Err(e) = self.pool.write_frame_to_disk(page_id, victim) {
                    warn!("failed to write back page {} on eviction: {}", page_id, e);
                    let mut rep = self.replacer.write();
                    let _ = rep.record_access(victim);
                    let _ = rep.set_evictable(victim, true);
                    return Err(e);
                }
                self.dirty_pages.remove(&page_id);
            }
            self.pool.remove_mapping(page_id);
            trace!("evicted page {} from frame {}", page_id, victim);
        }

        self.pool.clear_frame_meta(victim);
        self.pool.reset_frame(victim);
        Ok(victim)
    }

    fn replacer_record_access(&self, frame_id: FrameId) -> QuillHashResult<()> {
        self.replacer.write().record_access(frame_id)
    }

    fn mark_evictable(&self, frame_id: FrameId) -> QuillHashResult<()> {
        self.replacer.write().set_evictable(frame_id, true)
    }

    fn mark_non_evictable(&self, frame_id: FrameId) -> QuillHashResult<()> {
        self.replacer.write().set_evictable(frame_id, false)
    }
}

impl BufferEngine for BufferManager {
    fn new_page(self: &Arc<Self>) -> QuillHashResult<WriteGuardRef> {
        Ok(Box::new(BufferManager::new_page(self)?))
    }

    fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<ReadGuardRef> {
        Ok(Box::new(BufferManager::fetch_page_read(self, page_id)?))
    }

    fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<WriteGuardRef> {
        Ok(Box::new(BufferManager::fetch_page_write(self, page_id)?))
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> QuillHashResult<bool> {
        BufferManager::unpin_page(self, page_id, is_dirty)
    }

    fn delete_page(&self, page_id: PageId) -> QuillHashResult<bool> {
        BufferManager::delete_page(self, page_id)
    }

    fn flush_page(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<bool> {
        BufferManager::flush_page(self, page_id)
    }

    fn flush_all_pages(self: &Arc<Self>) -> QuillHashResult<()> {
        BufferManager::flush_all_pages(self)
    }
}
