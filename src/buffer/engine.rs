use crate::buffer::PageId;
use crate::error::QuillHashResult;
use std::sync::Arc;

/// Trait that abstracts the read access surface of a buffered page guard.
pub trait BufferReadGuard {
    fn page_id(&self) -> PageId;
    fn data(&self) -> &[u8];
    fn is_dirty(&self) -> bool;
    fn pin_count(&self) -> u32;
}

/// Trait that abstracts the write access surface of a buffered page guard.
pub trait BufferWriteGuard: BufferReadGuard {
    fn data_mut(&mut self) -> &mut [u8];
    fn overwrite(&mut self, data: &[u8]);
}

/// Boxed read guard alias used across the crate.
pub type ReadGuardRef = Box<dyn BufferReadGuard>;

/// Boxed write guard alias used across the crate.
pub type WriteGuardRef = Box<dyn BufferWriteGuard>;

/// Buffer pool surface consumed by the hash table.
///
/// Every guard handed out holds one pin and releases it exactly once when
/// dropped. `unpin_page` is exposed for callers that manage pins by hand and
/// is what guards call internally.
pub trait BufferEngine: Send + Sync + Sized + 'static {
    fn new_page(self: &Arc<Self>) -> QuillHashResult<WriteGuardRef>;
    fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<ReadGuardRef>;
    fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<WriteGuardRef>;
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> QuillHashResult<bool>;
    fn delete_page(&self, page_id: PageId) -> QuillHashResult<bool>;
    fn flush_page(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<bool>;
    fn flush_all_pages(self: &Arc<Self>) -> QuillHashResult<()>;
}
