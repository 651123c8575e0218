mod comparator;
mod generic_key;
mod hash_function;
mod linear_probe_hash_table;

pub use comparator::{GenericComparator, KeyComparator, OrdComparator};
pub use generic_key::GenericKey;
pub use hash_function::{KeyHasher, XxHasher};
pub use linear_probe_hash_table::{HashTableStats, LinearProbeHashTable};
