//! Black-box coverage of the process-wide LRU accountant, exercised purely
//! through its public API.

use pagehash::{EvictionCandidate, LruAccountant};

#[test]
fn eviction_candidates_are_returned_least_recently_used_first() {
    let lru = LruAccountant::new(8192 * 2);
    lru.touch(7, 0, 8192);
    lru.touch(7, 1, 8192);
    lru.touch(7, 2, 8192); // pushes resident bytes over budget

    let evicted = lru.try_evict(0);
    assert_eq!(evicted, vec![EvictionCandidate { contract_index: 7, chunk_index: 0 }]);
    assert_eq!(lru.resident_bytes(), 8192 * 2);
}

#[test]
fn most_recently_used_reflects_the_latest_touch_across_contracts() {
    let lru = LruAccountant::new(1_000_000);
    lru.touch(1, 0, 100);
    lru.touch(2, 0, 100);
    assert_eq!(
        lru.most_recently_used(),
        Some(EvictionCandidate { contract_index: 2, chunk_index: 0 })
    );
}
