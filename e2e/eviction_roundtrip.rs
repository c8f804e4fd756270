//! Exercises the LRU pager end to end: write past the RAM budget, confirm
//! chunks get evicted to disk, then read them back through a fresh fault and
//! confirm the bytes and the digest both survive the round trip.

#[path = "common/mod.rs"]
mod common;

const CHUNK_SIZE: usize = 8192;

#[test]
fn writing_past_the_ram_budget_evicts_and_reloads_correctly() {
    let dir = tempfile::tempdir().unwrap();
    // Budget room for 2 chunks; region spans 6, forcing repeated eviction.
    let registry = common::try_registry(dir.path(), CHUNK_SIZE as u64 * 2);
    let Some(engine) = common::try_create_engine(&registry, 0, CHUNK_SIZE * 6) else {
        return;
    };

    // SAFETY: writing whole chunks within the region's padded length.
    unsafe {
        let base = engine.as_mut_ptr();
        for chunk in 0..6 {
            std::ptr::write_bytes(base.add(chunk * CHUNK_SIZE), (chunk + 1) as u8, CHUNK_SIZE);
        }
    }

    let mut digest = [0u8; 32];
    engine.digest(&mut digest, true).unwrap();

    // At least one chunk must have been pushed out of RAM by now.
    assert!(engine.total_resident_bytes() < (CHUNK_SIZE * 6) as u64);

    // Reading chunk 0 again (likely evicted first) should still reproduce
    // the same digest, proving the reload path returns identical bytes.
    unsafe {
        let base = engine.as_mut_ptr();
        let byte = std::ptr::read(base);
        assert_eq!(byte, 1u8);
    }
    let mut digest2 = [0u8; 32];
    engine.digest(&mut digest2, true).unwrap();
    assert_eq!(digest, digest2);
}
