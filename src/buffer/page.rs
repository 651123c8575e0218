use log::warn;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;
use std::sync::Arc;

use crate::buffer::buffer_pool::FrameMeta;
use crate::buffer::engine::{BufferReadGuard, BufferWriteGuard};
use crate::buffer::{BufferManager, FrameId};

pub type PageId = u32;

pub const INVALID_PAGE_ID: PageId = 0;
pub const PAGE_SIZE: usize = 4096;

type FrameReadLatch = ArcRwLockReadGuard<RawRwLock, Box<[u8]>>;
type FrameWriteLatch = ArcRwLockWriteGuard<RawRwLock, Box<[u8]>>;

/// A pinned page held under its frame's shared latch.
///
/// Dropping the guard releases the latch first and then unpins the page,
/// so a page is never unpinned while its latch is still held.
#[derive(Debug)]
pub struct ReadPageGuard {
    bpm: Arc<BufferManager>,
    page_id: PageId,
    frame_id: FrameId,
    latch: Option<FrameReadLatch>,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn data(&self) -> &[u8] {
        match &self.latch {
            Some(latch) => &latch[..],
            None => &[],
        }
    }

    pub fn pin_count(&self) -> u32 {
        self.meta_snapshot().pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.meta_snapshot().is_dirty
    }

    pub fn meta_snapshot(&self) -> FrameMeta {
        self.bpm.buffer_pool().frame_meta(self.frame_id).clone()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        drop(self.latch.take());
        if let Err(e) = self.bpm.unpin_page(self.page_id, false) {
            warn!("Failed to unpin page {}: {}", self.page_id, e);
        }
    }
}

/// A pinned page held under its frame's exclusive latch.
#[derive(Debug)]
pub struct WritePageGuard {
    bpm: Arc<BufferManager>,
    page_id: PageId,
    frame_id: FrameId,
    latch: Option<FrameWriteLatch>,
    is_dirty: bool,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn data(&self) -> &[u8] {
        match &self.latch {
            Some(latch) => &latch[..],
            None => &[],
        }
    }

    /// Mutable access to the page bytes; marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        match &mut self.latch {
            Some(latch) => &mut latch[..],
            None => &mut [],
        }
    }

    pub fn overwrite(&mut self, data: &[u8]) {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        self.data_mut().copy_from_slice(data);
    }

    pub fn pin_count(&self) -> u32 {
        self.meta_snapshot().pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty || self.meta_snapshot().is_dirty
    }

    pub fn meta_snapshot(&self) -> FrameMeta {
        self.bpm.buffer_pool().frame_meta(self.frame_id).clone()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        drop(self.latch.take());
        if let Err(e) = self.bpm.unpin_page(self.page_id, self.is_dirty) {
            warn!("Failed to unpin page {}: {}", self.page_id, e);
        }
    }
}

impl BufferReadGuard for ReadPageGuard {
    fn page_id(&self) -> PageId {
        ReadPageGuard::page_id(self)
    }

    fn data(&self) -> &[u8] {
        ReadPageGuard::data(self)
    }

    fn is_dirty(&self) -> bool {
        ReadPageGuard::is_dirty(self)
    }

    fn pin_count(&self) -> u32 {
        ReadPageGuard::pin_count(self)
    }
}

impl BufferReadGuard for WritePageGuard {
    fn page_id(&self) -> PageId {
        WritePageGuard::page_id(self)
    }

    fn data(&self) -> &[u8] {
        WritePageGuard::data(self)
    }

    fn is_dirty(&self) -> bool {
        WritePageGuard::is_dirty(self)
    }

    fn pin_count(&self) -> u32 {
        WritePageGuard::pin_count(self)
    }
}

impl BufferWriteGuard for WritePageGuard {
    fn data_mut(&mut self) -> &mut [u8] {
        WritePageGuard::data_mut(self)
    }

    fn overwrite(&mut self, data: &[u8]) {
        WritePageGuard::overwrite(self, data)
    }
}

/// Takes the frame's shared latch. The caller must already hold a pin.
pub(crate) fn new_read_guard(
    bpm: Arc<BufferManager>,
    page_id: PageId,
    frame_id: FrameId,
) -> ReadPageGuard {
    let latch = bpm.buffer_pool().frame(frame_id).read_arc();
    ReadPageGuard {
        bpm,
        page_id,
        frame_id,
        latch: Some(latch),
    }
}

/// Takes the frame's exclusive latch. The caller must already hold a pin.
pub(crate) fn new_write_guard(
    bpm: Arc<BufferManager>,
    page_id: PageId,
    frame_id: FrameId,
) -> WritePageGuard {
    let latch = bpm.buffer_pool().frame(frame_id).write_arc();
    WritePageGuard {
        bpm,
        page_id,
        frame_id,
        latch: Some(latch),
        is_dirty: false,
    }
}
