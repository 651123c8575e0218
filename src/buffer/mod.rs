pub mod buffer_manager;
pub mod buffer_pool;
pub mod engine;
pub mod page;

pub use buffer_manager::BufferManager;
pub use buffer_pool::{BufferPool, FrameId, FrameMeta, BUFFER_POOL_SIZE};
pub use engine::{BufferEngine, BufferReadGuard, BufferWriteGuard, ReadGuardRef, WriteGuardRef};
pub use page::{PageId, ReadPageGuard, WritePageGuard, INVALID_PAGE_ID, PAGE_SIZE};
