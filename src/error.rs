use thiserror::Error;

use crate::buffer::PageId;

pub type QuillHashResult<T, E = QuillHashError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum QuillHashError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Page {page_id} unavailable: {reason}")]
    PageUnavailable { page_id: PageId, reason: String },

    #[error("Hash table capacity exhausted after {rounds} resize rounds (capacity {capacity})")]
    CapacityExhausted { capacity: usize, rounds: usize },
}

impl QuillHashError {
    pub fn page_unavailable(page_id: PageId, reason: impl Into<String>) -> Self {
        QuillHashError::PageUnavailable {
            page_id,
            reason: reason.into(),
        }
    }

    pub fn is_page_unavailable(&self) -> bool {
        matches!(self, QuillHashError::PageUnavailable { .. })
    }
}
