//! Exercises each of the three fault classifications the handler thread
//! dispatches on: write-protect (first write to a resident chunk), missing
//! (first touch of an evicted chunk), and the reprotect/minor cycle used to
//! re-observe reads.

#[path = "common/mod.rs"]
mod common;

const CHUNK_SIZE: usize = 8192;

#[test]
fn first_write_to_a_chunk_is_observed_via_write_protect_fault() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::try_registry(dir.path(), CHUNK_SIZE as u64 * 16);
    let Some(engine) = common::try_create_engine(&registry, 1, CHUNK_SIZE * 2) else {
        return;
    };

    let mut before = [0u8; 32];
    engine.digest(&mut before, true).unwrap();

    // SAFETY: single byte within the region.
    unsafe {
        std::ptr::write(engine.as_mut_ptr(), 0x7Au8);
    }

    let mut after = [0u8; 32];
    engine.digest(&mut after, true).unwrap();
    assert_ne!(before, after, "a write that faulted through WP must be visible to the next digest");
}

#[test]
fn digest_and_reprotect_rearms_write_protection_for_the_next_write() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::try_registry(dir.path(), CHUNK_SIZE as u64 * 16);
    let Some(engine) = common::try_create_engine(&registry, 2, CHUNK_SIZE) else {
        return;
    };

    unsafe {
        std::ptr::write(engine.as_mut_ptr(), 1u8);
    }
    let mut d1 = [0u8; 32];
    engine.digest_and_reprotect(&mut d1, true).unwrap();

    unsafe {
        std::ptr::write(engine.as_mut_ptr().add(1), 2u8);
    }
    let mut d2 = [0u8; 32];
    engine.digest(&mut d2, true).unwrap();

    assert_ne!(d1, d2, "a second write after reprotect must also be observed");
}

#[test]
fn evicted_chunk_reload_goes_through_the_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::try_registry(dir.path(), CHUNK_SIZE as u64); // room for 1 chunk
    let Some(engine) = common::try_create_engine(&registry, 3, CHUNK_SIZE * 3) else {
        return;
    };

    unsafe {
        let base = engine.as_mut_ptr();
        for chunk in 0..3 {
            std::ptr::write_bytes(base.add(chunk * CHUNK_SIZE), (10 + chunk) as u8, CHUNK_SIZE);
        }
    }
    let mut d1 = [0u8; 32];
    engine.digest(&mut d1, true).unwrap();
    assert!(engine.total_resident_bytes() <= CHUNK_SIZE as u64 * 2);

    // Touch chunk 0 again; if it was evicted this is a MISSING fault.
    unsafe {
        let v = std::ptr::read(engine.as_mut_ptr());
        assert_eq!(v, 10u8, "reloaded bytes must match what was originally written");
    }
}

#[test]
fn a_failed_write_protect_arming_marks_every_chunk_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::try_registry(dir.path(), CHUNK_SIZE as u64 * 16);
    let Some(engine) = common::try_create_engine(&registry, 4, CHUNK_SIZE * 3) else {
        return;
    };

    // A clean digest first clears every chunk's dirty bit.
    let mut out = [0u8; 32];
    engine.digest(&mut out, true).unwrap();
    for chunk in 0..3 {
        assert!(!engine.is_chunk_dirty(chunk), "chunk {chunk} should be clean after a digest");
    }

    // A range that runs off the end of the mapped region can never be armed
    // by the kernel; this is the same conservative-fallback path a real
    // UFFDIO_WRITEPROTECT failure would take.
    let out_of_bounds_len = engine.padded_len() + CHUNK_SIZE;
    let result = engine.reprotect_writes(0, out_of_bounds_len);
    assert!(result.is_err(), "an out-of-range reprotect must fail rather than silently arm a truncated range");

    for chunk in 0..3 {
        assert!(engine.is_chunk_dirty(chunk), "chunk {chunk} must be marked dirty after a failed WP arming");
    }
}

#[test]
fn a_read_after_reprotect_reads_moves_its_chunk_to_the_lru_front() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::try_registry(dir.path(), CHUNK_SIZE as u64 * 16);
    let Some(engine) = common::try_create_engine(&registry, 1, CHUNK_SIZE * 2) else {
        return;
    };

    // Touch chunk 1 last, so chunk 0 starts behind it in recency order.
    unsafe {
        let base = engine.as_mut_ptr();
        std::ptr::write(base, 0xAAu8);
        std::ptr::write(base.add(CHUNK_SIZE), 0xBBu8);
    }
    assert_eq!(
        registry.lru().most_recently_used(),
        Some(pagehash::EvictionCandidate { contract_index: 1, chunk_index: 1 })
    );

    // Drop page-table entries without touching the memfd's page cache, then
    // read chunk 0's first byte: the next access must go through a minor
    // fault and re-touch the accountant.
    engine.reprotect_reads(0, 0).unwrap();
    unsafe {
        let v = std::ptr::read(engine.as_mut_ptr());
        assert_eq!(v, 0xAAu8);
    }

    assert_eq!(
        registry.lru().most_recently_used(),
        Some(pagehash::EvictionCandidate { contract_index: 1, chunk_index: 0 })
    );
}
