use std::cmp::Ordering;

use crate::container::hash::GenericKey;

/// Total order over keys. Only `Ordering::Equal` matters to the hash table.
pub trait KeyComparator<K>: Send + Sync {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering;
}

impl<K, F> KeyComparator<K> for F
where
    F: Fn(&K, &K) -> Ordering + Send + Sync,
{
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering {
        self(lhs, rhs)
    }
}

/// Uses the key's own `Ord`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdComparator;

impl<K: Ord> KeyComparator<K> for OrdComparator {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering {
        lhs.cmp(rhs)
    }
}

/// Bytewise comparison of opaque fixed-width keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericComparator;

impl<const N: usize> KeyComparator<GenericKey<N>> for GenericComparator {
    fn compare(&self, lhs: &GenericKey<N>, rhs: &GenericKey<N>) -> Ordering {
        lhs.as_bytes().cmp(rhs.as_bytes())
    }
}
