mod common;
mod fixed;
mod hash_table_page;

pub use common::CommonCodec;
pub use fixed::FixedCodec;
pub use hash_table_page::{HashTableBlockPageCodec, HashTableHeaderPageCodec};

// data + consumed offset
pub type DecodedData<T> = (T, usize);
