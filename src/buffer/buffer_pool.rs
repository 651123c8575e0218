//! Low-level buffer pool responsible for frame storage, page table, and disk I/O.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::page::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::config::BufferPoolConfig;
use crate::error::{QuillHashError, QuillHashResult};
use crate::storage::disk_manager::DiskManager;

pub type FrameId = usize;

pub const BUFFER_POOL_SIZE: usize = 5000;

/// Shared page bytes of one frame; the lock doubles as the page latch.
pub type FrameData = Arc<RwLock<Box<[u8]>>>;

#[derive(Debug, Default, Clone)]
pub struct FrameMeta {
    pub page_id: PageId,
    pub pin_count: u32,
    pub is_dirty: bool,
}

#[derive(Debug)]
pub struct BufferPool {
    frames: Vec<FrameData>,
    meta: Vec<Mutex<FrameMeta>>,
    page_table: DashMap<PageId, FrameId>,
    free_list: Mutex<VecDeque<FrameId>>,
    disk_manager: Arc<DiskManager>,
}

impl BufferPool {
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
        let num_pages = config.buffer_pool_size;
        let mut free_list = VecDeque::with_capacity(num_pages);
        let mut meta = Vec::with_capacity(num_pages);
        let mut frames = Vec::with_capacity(num_pages);
        for frame_id in 0..num_pages {
            free_list.push_back(frame_id);
            meta.push(Mutex::new(FrameMeta::default()));
            frames.push(Arc::new(RwLock::new(
                vec![0u8; PAGE_SIZE].into_boxed_slice(),
            )));
        }

        Self {
            frames,
            meta,
            page_table: DashMap::new(),
            free_list: Mutex::new(free_list),
            disk_manager,
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, frame_id: FrameId) -> &FrameData {
        &self.frames[frame_id]
    }

    pub fn frame_meta(&self, frame_id: FrameId) -> MutexGuard<'_, FrameMeta> {
        self.meta[frame_id].lock()
    }

    pub fn clear_frame_meta(&self, frame_id: FrameId) {
        let mut meta = self.meta[frame_id].lock();
        *meta = FrameMeta::default();
    }

    pub fn pop_free_frame(&self) -> Option<FrameId> {
        self.free_list.lock().pop_front()
    }

    pub fn has_free_frame(&self) -> bool {
        !self.free_list.lock().is_empty()
    }

    pub fn push_free_frame(&self, frame_id: FrameId) {
        self.free_list.lock().push_back(frame_id);
    }

    pub fn insert_mapping(&self, page_id: PageId, frame_id: FrameId) {
        self.page_table.insert(page_id, frame_id);
    }

    pub fn remove_mapping(&self, page_id: PageId) {
        self.page_table.remove(&page_id);
    }

    pub fn lookup_frame(&self, page_id: PageId) -> Option<FrameId> {
        self.page_table.get(&page_id).map(|entry| *entry.value())
    }

    /// Reads `page_id` from disk into an unpinned frame.
    pub fn load_page_into_frame(&self, page_id: PageId, frame_id: FrameId) -> QuillHashResult<()> {
        let page_bytes = self.disk_manager.read_page(page_id)?;
        {
            let mut data = self.frames[frame_id].write();
            let len = PAGE_SIZE.min(page_bytes.len());
            data[..len].copy_from_slice(&page_bytes[..len]);
            if len < PAGE_SIZE {
                data[len..].fill(0);
            }
        }
        let mut meta = self.meta[frame_id].lock();
        meta.page_id = page_id;
        meta.is_dirty = false;
        meta.pin_count = 0;
        Ok(())
    }

    /// Copies the frame under its shared latch and writes it to `page_id`.
    pub fn write_frame_to_disk(&self, page_id: PageId, frame_id: FrameId) -> QuillHashResult<()> {
        let bytes = {
            let data = self.frames[frame_id].read();
            Bytes::copy_from_slice(&data[..])
        };
        self.write_page_to_disk(page_id, bytes)
    }

    pub fn write_page_to_disk(&self, page_id: PageId, bytes: Bytes) -> QuillHashResult<()> {
        self.disk_manager.write_page_bytes(page_id, bytes)
    }

    pub fn allocate_page_id(&self) -> QuillHashResult<PageId> {
        let page_id = self.disk_manager.allocate_page()?;
        if page_id == INVALID_PAGE_ID {
            return Err(QuillHashError::Internal(
                "DiskManager returned INVALID_PAGE_ID".to_string(),
            ));
        }
        Ok(page_id)
    }

    pub fn deallocate_page_id(&self, page_id: PageId) -> QuillHashResult<()> {
        self.disk_manager.deallocate_page(page_id)
    }

    pub fn disk_manager(&self) -> Arc<DiskManager> {
        self.disk_manager.clone()
    }

    pub fn reset_frame(&self, frame_id: FrameId) {
        self.frames[frame_id].write().fill(0);
    }
}
