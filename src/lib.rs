pub mod buffer;
pub mod config;
pub mod container;
pub mod error;
pub mod storage;
pub mod utils;

pub use container::hash::{HashTableStats, LinearProbeHashTable};
pub use error::{QuillHashError, QuillHashResult};
