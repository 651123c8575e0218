use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::storage::codec::FixedCodec;

/// Stable hash over keys. Equal keys must hash equally across calls and
/// across process restarts, since block placement is persisted.
pub trait KeyHasher<K>: Send + Sync {
    fn hash(&self, key: &K) -> u64;
}

impl<K, F> KeyHasher<K> for F
where
    F: Fn(&K) -> u64 + Send + Sync,
{
    fn hash(&self, key: &K) -> u64 {
        self(key)
    }
}

/// xxh3 over the key's fixed-width encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct XxHasher {
    seed: u64,
}

impl XxHasher {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl<K: FixedCodec> KeyHasher<K> for XxHasher {
    fn hash(&self, key: &K) -> u64 {
        xxh3_64_with_seed(&key.encode(), self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::hash::GenericKey;

    #[test]
    fn xx_hasher_is_stable_and_seeded() {
        let hasher = XxHasher::default();
        assert_eq!(hasher.hash(&42i32), hasher.hash(&42i32));
        assert_ne!(hasher.hash(&42i32), hasher.hash(&43i32));
        assert_ne!(
            KeyHasher::<i32>::hash(&XxHasher::with_seed(1), &42),
            KeyHasher::<i32>::hash(&XxHasher::with_seed(2), &42)
        );
    }

    #[test]
    fn hash_depends_on_encoding_only() {
        let hasher = XxHasher::default();
        let key = GenericKey::<8>::from_i64(7);
        assert_eq!(hasher.hash(&key), hasher.hash(&7i64));
    }

    #[test]
    fn closures_are_hashers() {
        let constant = |_: &i32| 7u64;
        assert_eq!(constant.hash(&1), 7);
        assert_eq!(constant.hash(&2), 7);
    }
}
