use std::collections::HashMap;
use std::collections::VecDeque;

use cid::Cid;

/// In-memory copy of recently stored blocks, bounded by total size.
///
/// Oldest blocks are evicted first once `capacity` bytes are in use.
#[derive(Debug)]
pub struct BlockCache {
    capacity: usize,
    used: usize,
    order: VecDeque<Cid>,
    blocks: HashMap<Cid, Vec<u8>>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            order: VecDeque::new(),
            blocks: HashMap::new(),
        }
    }

    pub fn insert(&mut self, cid: Cid, block: Vec<u8>) {
        if let Some(previous) = self.blocks.remove(&cid) {
            self.used -= previous.len();
            self.order.retain(|cached| cached != &cid);
        }
        if block.len() > self.capacity {
            return;
        }

        while self.used + block.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.blocks.remove(&oldest) {
                self.used -= evicted.len();
            }
        }

        self.used += block.len();
        self.order.push_back(cid);
        self.blocks.insert(cid, block);
    }

    pub fn get(&self, cid: &Cid) -> Option<&[u8]> {
        self.blocks.get(cid).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn used_bytes(&self) -> usize {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::content_id;

    #[test]
    fn oldest_blocks_are_evicted_past_capacity() {
        let mut cache = BlockCache::new(10);
        let (a, b, c) = (content_id(b"a"), content_id(b"b"), content_id(b"c"));

        cache.insert(a, vec![0; 4]);
        cache.insert(b, vec![0; 4]);
        cache.insert(c, vec![0; 4]);

        assert_eq!(cache.get(&a), None);
        assert!(cache.get(&b).is_some());
        assert!(cache.get(&c).is_some());
        assert_eq!(cache.used_bytes(), 8);
    }

    #[test]
    fn oversized_block_is_not_cached() {
        let mut cache = BlockCache::new(4);
        let cid = content_id(b"big");

        cache.insert(cid, vec![0; 5]);

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn reinserting_a_block_does_not_double_count() {
        let mut cache = BlockCache::new(10);
        let cid = content_id(b"a");

        cache.insert(cid, vec![1; 6]);
        cache.insert(cid, vec![2; 6]);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), 6);
        assert_eq!(cache.get(&cid), Some(&[2u8; 6][..]));
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let mut cache = BlockCache::new(0);
        cache.insert(content_id(b"a"), vec![1]);
        assert_eq!(cache.len(), 0);
    }
}
