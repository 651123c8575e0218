use std::collections::{HashMap, VecDeque};

use crate::buffer::FrameId;
use crate::error::{QuillHashError, QuillHashResult};
use crate::utils::cache::Replacer;

#[derive(Debug)]
struct LruKNode {
    // Logical timestamps of the last k accesses, oldest first.
    history: VecDeque<u64>,
    is_evictable: bool,
}

/// LRU-K replacement: evicts the evictable frame whose k-th most recent
/// access is furthest in the past. Frames with fewer than k accesses have an
/// infinite backward k-distance and go first, oldest first access first.
#[derive(Debug)]
pub struct LruKReplacer {
    k: usize,
    capacity: usize,
    current_timestamp: u64,
    node_store: HashMap<FrameId, LruKNode>,
    evictable_size: usize,
}

impl LruKReplacer {
    pub fn with_k(capacity: usize, k: usize) -> Self {
        assert!(k > 0, "k must be greater than 0");
        Self {
            k,
            capacity,
            current_timestamp: 0,
            node_store: HashMap::with_capacity(capacity),
            evictable_size: 0,
        }
    }

    fn check_frame(&self, frame_id: FrameId) -> QuillHashResult<()> {
        if frame_id >= self.capacity {
            return Err(QuillHashError::Internal(format!(
                "frame id {} out of replacer capacity {}",
                frame_id, self.capacity
            )));
        }
        Ok(())
    }
}

impl Replacer for LruKReplacer {
    fn new(capacity: usize) -> Self {
        Self::with_k(capacity, 2)
    }

    fn record_access(&mut self, frame_id: FrameId) -> QuillHashResult<()> {
        self.check_frame(frame_id)?;
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;

        let k = self.k;
        let node = self.node_store.entry(frame_id).or_insert_with(|| LruKNode {
            history: VecDeque::with_capacity(k),
            is_evictable: false,
        });
        node.history.push_back(timestamp);
        if node.history.len() > k {
            node.history.pop_front();
        }
        Ok(())
    }

    fn evict(&mut self) -> Option<FrameId> {
        let mut victim: Option<(FrameId, bool, u64)> = None;
        for (frame_id, node) in self.node_store.iter() {
            if !node.is_evictable {
                continue;
            }
            let infinite = node.history.len() < self.k;
            let oldest = node.history.front().copied().unwrap_or(0);
            let better = match victim {
                None => true,
                Some((_, victim_infinite, victim_oldest)) => {
                    (infinite && !victim_infinite)
                        || (infinite == victim_infinite && oldest < victim_oldest)
                }
            };
            if better {
                victim = Some((*frame_id, infinite, oldest));
            }
        }

        let (frame_id, _, _) = victim?;
        self.node_store.remove(&frame_id);
        self.evictable_size -= 1;
        Some(frame_id)
    }

    fn set_evictable(&mut self, frame_id: FrameId, set_evictable: bool) -> QuillHashResult<()> {
        self.check_frame(frame_id)?;
        let Some(node) = self.node_store.get_mut(&frame_id) else {
            return Ok(());
        };
        if node.is_evictable != set_evictable {
            node.is_evictable = set_evictable;
            if set_evictable {
                self.evictable_size += 1;
            } else {
                self.evictable_size -= 1;
            }
        }
        Ok(())
    }

    fn remove(&mut self, frame_id: FrameId) {
        if let Some(node) = self.node_store.remove(&frame_id) {
            if node.is_evictable {
                self.evictable_size -= 1;
            }
        }
    }

    fn size(&self) -> usize {
        self.evictable_size
    }
}
