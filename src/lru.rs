//! Process-wide LRU chunk accountant.
//!
//! Tracks resident `(contractIndex, chunkIndex)` pairs across every engine in
//! the process against a single RAM budget, and decides what to evict when a
//! fault handler needs room for a newly loaded chunk. One `Mutex`-guarded
//! structure; per-contract sharding would reduce contention under many
//! concurrent engines but is not implemented here (see `DESIGN.md`).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::config::default_ram_budget_bytes;

/// Packs `(contract_index, chunk_index)` into a single key so the recency
/// queue doesn't need to hash a tuple on every touch.
fn pack_key(contract_index: u32, chunk_index: usize) -> u64 {
    ((contract_index as u64) << 32) | (chunk_index as u64 & 0xFFFF_FFFF)
}

/// A chunk chosen for eviction by [`LruAccountant::try_evict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub contract_index: u32,
    pub chunk_index: usize,
}

struct Inner {
    ram_budget_bytes: u64,
    resident_bytes: u64,
    /// Front = least recently used, back = most recently used.
    order: VecDeque<u64>,
    /// Byte size contributed by each resident key, needed to keep
    /// `resident_bytes` accurate when a key is evicted or re-touched.
    sizes: HashMap<u64, u64>,
}

/// The single process-wide LRU + RAM accountant. Engines register their
/// chunk touches and evictions here rather than tracking RAM usage
/// independently, so that a budget set in one place governs every region.
pub struct LruAccountant {
    inner: Mutex<Inner>,
}

impl Default for LruAccountant {
    fn default() -> Self {
        LruAccountant::new(default_ram_budget_bytes())
    }
}

impl LruAccountant {
    pub fn new(ram_budget_bytes: u64) -> Self {
        LruAccountant {
            inner: Mutex::new(Inner {
                ram_budget_bytes,
                resident_bytes: 0,
                order: VecDeque::new(),
                sizes: HashMap::new(),
            }),
        }
    }

    pub fn set_ram_budget(&self, bytes: u64) {
        self.inner.lock().unwrap().ram_budget_bytes = bytes;
    }

    pub fn ram_budget(&self) -> u64 {
        self.inner.lock().unwrap().ram_budget_bytes
    }

    pub fn resident_bytes(&self) -> u64 {
        self.inner.lock().unwrap().resident_bytes
    }

    /// `update(c, i)` — records that chunk `i` of contract `c` was just
    /// touched (loaded or written), moving it to the most-recently-used end.
    /// `chunk_bytes` is its resident size, used to keep the running total
    /// accurate the first time a key is seen.
    pub fn touch(&self, contract_index: u32, chunk_index: usize, chunk_bytes: u64) {
        let key = pack_key(contract_index, chunk_index);
        let mut inner = self.inner.lock().unwrap();
        if let Some(pos) = inner.order.iter().position(|&k| k == key) {
            inner.order.remove(pos);
        } else {
            inner.resident_bytes += chunk_bytes;
            inner.sizes.insert(key, chunk_bytes);
        }
        inner.order.push_back(key);
    }

    /// Removes a chunk from accounting without evicting anything — used when
    /// a chunk is dropped from RAM by a path other than `try_evict` (e.g. a
    /// region being destroyed).
    pub fn forget(&self, contract_index: u32, chunk_index: usize) {
        let key = pack_key(contract_index, chunk_index);
        let mut inner = self.inner.lock().unwrap();
        if let Some(pos) = inner.order.iter().position(|&k| k == key) {
            inner.order.remove(pos);
        }
        if let Some(size) = inner.sizes.remove(&key) {
            inner.resident_bytes = inner.resident_bytes.saturating_sub(size);
        }
    }

    /// Returns the most-recently-used resident key without evicting it —
    /// the read-side counterpart to `try_evict`'s eviction-driven traversal,
    /// used to confirm a recent touch actually moved its chunk to the MRU
    /// end.
    pub fn most_recently_used(&self) -> Option<EvictionCandidate> {
        let inner = self.inner.lock().unwrap();
        inner.order.back().map(|&key| EvictionCandidate {
            contract_index: (key >> 32) as u32,
            chunk_index: (key & 0xFFFF_FFFF) as usize,
        })
    }

    /// `tryEvict(needed)` — while resident bytes plus `needed` exceed the
    /// budget, pops the least-recently-used key and returns it to the
    /// caller so it can save the chunk to disk and drop its mapping. Returns
    /// every candidate chosen in one call; the caller evicts them in order.
    pub fn try_evict(&self, needed_bytes: u64) -> Vec<EvictionCandidate> {
        let mut inner = self.inner.lock().unwrap();
        let mut evicted = Vec::new();
        while inner.resident_bytes + needed_bytes > inner.ram_budget_bytes {
            let Some(key) = inner.order.pop_front() else {
                break;
            };
            let size = inner.sizes.remove(&key).unwrap_or(0);
            inner.resident_bytes = inner.resident_bytes.saturating_sub(size);
            evicted.push(EvictionCandidate {
                contract_index: (key >> 32) as u32,
                chunk_index: (key & 0xFFFF_FFFF) as usize,
            });
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_within_budget_evicts_nothing() {
        let lru = LruAccountant::new(1_000_000);
        lru.touch(0, 0, 8192);
        lru.touch(0, 1, 8192);
        assert!(lru.try_evict(0).is_empty());
        assert_eq!(lru.resident_bytes(), 16384);
    }

    #[test]
    fn eviction_picks_least_recently_used_first() {
        let lru = LruAccountant::new(16384);
        lru.touch(0, 0, 8192);
        lru.touch(0, 1, 8192);
        // touching 0 again makes chunk 1 the LRU victim when we need room.
        lru.touch(0, 0, 8192);
        let evicted = lru.try_evict(8192);
        assert_eq!(
            evicted,
            vec![EvictionCandidate {
                contract_index: 0,
                chunk_index: 1
            }]
        );
        assert_eq!(lru.resident_bytes(), 8192);
    }

    #[test]
    fn forget_removes_accounting_without_reporting_eviction() {
        let lru = LruAccountant::new(1_000_000);
        lru.touch(3, 5, 8192);
        lru.forget(3, 5);
        assert_eq!(lru.resident_bytes(), 0);
        assert!(lru.try_evict(0).is_empty());
    }

    #[test]
    fn most_recently_used_tracks_the_latest_touch() {
        let lru = LruAccountant::new(1_000_000);
        assert!(lru.most_recently_used().is_none());
        lru.touch(1, 0, 8192);
        lru.touch(1, 1, 8192);
        assert_eq!(
            lru.most_recently_used(),
            Some(EvictionCandidate { contract_index: 1, chunk_index: 1 })
        );
        lru.touch(1, 0, 8192);
        assert_eq!(
            lru.most_recently_used(),
            Some(EvictionCandidate { contract_index: 1, chunk_index: 0 })
        );
    }

    #[test]
    fn distinct_contracts_do_not_collide_in_the_packed_key() {
        let lru = LruAccountant::new(1_000_000);
        lru.touch(1, 0, 100);
        lru.touch(2, 0, 200);
        assert_eq!(lru.resident_bytes(), 300);
    }
}
