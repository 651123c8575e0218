use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use quill_hash::buffer::{
    BufferEngine, BufferManager, PageId, ReadGuardRef, WriteGuardRef, INVALID_PAGE_ID,
};
use quill_hash::config::{BufferPoolConfig, HashTableConfig};
use quill_hash::container::hash::{OrdComparator, XxHasher};
use quill_hash::storage::disk_manager::DiskManager;
use quill_hash::{LinearProbeHashTable, QuillHashError, QuillHashResult};

fn buffer_manager(path: &std::path::Path, frames: usize) -> Arc<BufferManager> {
    let disk_manager = Arc::new(DiskManager::try_new(path).unwrap());
    let config = BufferPoolConfig::default().with_buffer_pool_size(frames);
    Arc::new(BufferManager::new_with_config(config, disk_manager))
}

fn block_config(block_capacity: usize) -> HashTableConfig {
    HashTableConfig::default().with_block_capacity(Some(block_capacity))
}

#[test]
fn table_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("restart.db");

    let header_page_id = {
        let bpm = buffer_manager(&path, 8);
        let table: LinearProbeHashTable<i64, i64> = LinearProbeHashTable::new_with_config(
            "restart",
            bpm.clone(),
            OrdComparator,
            8,
            XxHasher::default(),
            block_config(8),
        )
        .unwrap();
        for key in 0..500i64 {
            assert!(table.insert(&key, &(key * key)).unwrap());
        }
        for key in (0..500i64).step_by(5) {
            assert!(table.remove(&key, &(key * key)).unwrap());
        }
        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.total_pin_count(), 0);
        table.header_page_id()
    };

    let bpm = buffer_manager(&path, 8);
    let table: LinearProbeHashTable<i64, i64> = LinearProbeHashTable::open(
        "restart",
        bpm.clone(),
        header_page_id,
        OrdComparator,
        XxHasher::default(),
    )
    .unwrap();
    assert_eq!(table.block_capacity(), 8);
    for key in 0..500i64 {
        let expected = if key % 5 == 0 { vec![] } else { vec![key * key] };
        assert_eq!(table.get_value(&key).unwrap(), expected);
    }
    let stats = table.stats().unwrap();
    assert_eq!(stats.live, 400);
    assert_eq!(stats.tombstones, 100);
    assert_eq!(stats.capacity, stats.num_blocks * 8);
}

#[test]
fn random_operations_match_a_model() {
    let temp_dir = TempDir::new().unwrap();
    let bpm = buffer_manager(&temp_dir.path().join("model.db"), 16);
    let table: LinearProbeHashTable<i32, i32> = LinearProbeHashTable::new_with_config(
        "model",
        bpm.clone(),
        OrdComparator,
        4,
        XxHasher::default(),
        block_config(4),
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut model: HashMap<i32, HashSet<i32>> = HashMap::new();
    for _ in 0..3000 {
        let key = rng.random_range(0..64);
        let value = rng.random_range(0..4);
        match rng.random_range(0..3) {
            0 => {
                let expected = model.entry(key).or_default().insert(value);
                assert_eq!(table.insert(&key, &value).unwrap(), expected);
            }
            1 => {
                let expected = model.get_mut(&key).is_some_and(|vals| vals.remove(&value));
                assert_eq!(table.remove(&key, &value).unwrap(), expected);
            }
            _ => {
                let mut found = table.get_value(&key).unwrap();
                found.sort();
                let mut expected: Vec<i32> = model
                    .get(&key)
                    .map(|vals| vals.iter().copied().collect())
                    .unwrap_or_default();
                expected.sort();
                assert_eq!(found, expected);
            }
        }
    }

    let live: usize = model.values().map(|vals| vals.len()).sum();
    assert_eq!(table.stats().unwrap().live, live);
    assert_eq!(bpm.total_pin_count(), 0);
}

#[test]
fn concurrent_mixed_workload_on_a_small_pool() {
    let temp_dir = TempDir::new().unwrap();
    let bpm = buffer_manager(&temp_dir.path().join("mixed.db"), 16);
    let table: LinearProbeHashTable<i64, i64> = LinearProbeHashTable::new_with_config(
        "mixed",
        bpm.clone(),
        OrdComparator,
        4,
        XxHasher::default(),
        block_config(8),
    )
    .unwrap();

    let num_threads = 8;
    let per_thread = 150i64;
    let barrier = Barrier::new(num_threads);
    thread::scope(|s| {
        for t in 0..num_threads as i64 {
            let table = &table;
            let barrier = &barrier;
            s.spawn(move || {
                let base = t * per_thread;
                barrier.wait();
                for key in base..base + per_thread {
                    assert!(table.insert(&key, &t).unwrap());
                }
                for key in (base..base + per_thread).filter(|k| k % 3 == 0) {
                    assert!(table.remove(&key, &t).unwrap());
                }
                for key in base..base + per_thread {
                    let expected = if key % 3 == 0 { vec![] } else { vec![t] };
                    assert_eq!(table.get_value(&key).unwrap(), expected);
                }
            });
        }
    });

    let total = num_threads as i64 * per_thread;
    let live = (0..total).filter(|k| k % 3 != 0).count();
    assert_eq!(table.stats().unwrap().live, live);
    assert_eq!(bpm.total_pin_count(), 0);
}

/// Wraps a buffer manager and refuses page access once a budget runs out.
struct FaultInjector {
    inner: Arc<BufferManager>,
    budget: AtomicI64,
    refuse_deletes: AtomicBool,
}

impl FaultInjector {
    fn new(inner: Arc<BufferManager>) -> Self {
        Self {
            inner,
            budget: AtomicI64::new(i64::MAX),
            refuse_deletes: AtomicBool::new(false),
        }
    }

    fn allow(&self, accesses: i64) {
        self.budget.store(accesses, Ordering::SeqCst);
    }

    fn charge(&self, page_id: PageId) -> QuillHashResult<()> {
        if self.budget.fetch_sub(1, Ordering::SeqCst) <= 0 {
            return Err(QuillHashError::page_unavailable(page_id, "injected fault"));
        }
        Ok(())
    }
}

impl BufferEngine for FaultInjector {
    fn new_page(self: &Arc<Self>) -> QuillHashResult<WriteGuardRef> {
        self.charge(INVALID_PAGE_ID)?;
        BufferEngine::new_page(&self.inner)
    }

    fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<ReadGuardRef> {
        self.charge(page_id)?;
        BufferEngine::fetch_page_read(&self.inner, page_id)
    }

    fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<WriteGuardRef> {
        self.charge(page_id)?;
        BufferEngine::fetch_page_write(&self.inner, page_id)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> QuillHashResult<bool> {
        self.inner.unpin_page(page_id, is_dirty)
    }

    fn delete_page(&self, page_id: PageId) -> QuillHashResult<bool> {
        if self.refuse_deletes.load(Ordering::SeqCst) {
            return Err(QuillHashError::Storage(format!(
                "injected delete failure for page {}",
                page_id
            )));
        }
        self.inner.delete_page(page_id)
    }

    fn flush_page(self: &Arc<Self>, page_id: PageId) -> QuillHashResult<bool> {
        self.inner.flush_page(page_id)
    }

    fn flush_all_pages(self: &Arc<Self>) -> QuillHashResult<()> {
        self.inner.flush_all_pages()
    }
}

#[test]
fn failed_page_access_leaves_table_consistent() {
    let temp_dir = TempDir::new().unwrap();
    let inner = buffer_manager(&temp_dir.path().join("faults.db"), 32);
    let engine = Arc::new(FaultInjector::new(inner.clone()));
    let table: LinearProbeHashTable<i32, i32, OrdComparator, XxHasher, FaultInjector> =
        LinearProbeHashTable::new_with_config(
            "faults",
            engine.clone(),
            OrdComparator,
            4,
            XxHasher::default(),
            block_config(4),
        )
        .unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut model = HashSet::new();
    let mut failures = 0;
    for key in 0..200 {
        engine.allow(rng.random_range(0..16));
        let result = if key % 4 == 3 && !model.is_empty() {
            let victim = key - 3;
            table
                .remove(&victim, &victim)
                .map(|removed| (removed, victim, false))
        } else {
            table.insert(&key, &key).map(|inserted| (inserted, key, true))
        };
        engine.allow(i64::MAX);

        match result {
            Ok((true, k, true)) => assert!(model.insert(k)),
            Ok((removed, k, false)) => assert_eq!(removed, model.remove(&k)),
            Ok((false, k, true)) => panic!("fresh key {} reported as duplicate", k),
            Err(e) => {
                assert!(e.is_page_unavailable(), "unexpected error {}", e);
                failures += 1;
            }
        }
        assert_eq!(inner.total_pin_count(), 0);
    }
    assert!(failures > 0);

    for key in 0..200 {
        let expected = if model.contains(&key) { vec![key] } else { vec![] };
        assert_eq!(table.get_value(&key).unwrap(), expected);
    }
    assert_eq!(table.stats().unwrap().live, model.len());
}

#[test]
fn resize_succeeds_when_old_blocks_cannot_be_freed() {
    let temp_dir = TempDir::new().unwrap();
    let inner = buffer_manager(&temp_dir.path().join("leak.db"), 16);
    let engine = Arc::new(FaultInjector::new(inner.clone()));
    let table: LinearProbeHashTable<i32, i32, OrdComparator, XxHasher, FaultInjector> =
        LinearProbeHashTable::new_with_config(
            "leak",
            engine.clone(),
            OrdComparator,
            8,
            XxHasher::default(),
            block_config(4),
        )
        .unwrap();
    for key in 0..8 {
        assert!(table.insert(&key, &key).unwrap());
    }
    let old_blocks = table.block_page_ids().unwrap();

    engine.refuse_deletes.store(true, Ordering::SeqCst);
    // the ninth pair finds every slot taken and grows the table
    assert!(table.insert(&8, &8).unwrap());
    engine.refuse_deletes.store(false, Ordering::SeqCst);

    assert_eq!(table.get_size().unwrap(), 16);
    let new_blocks = table.block_page_ids().unwrap();
    assert_eq!(new_blocks.len(), 4);
    assert!(new_blocks.iter().all(|id| !old_blocks.contains(id)));
    for key in 0..9 {
        assert_eq!(table.get_value(&key).unwrap(), vec![key]);
    }
    assert_eq!(inner.total_pin_count(), 0);
}
