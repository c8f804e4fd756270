//! End-to-end check that the chunked, cache-reusing hasher always agrees
//! with the uncached one-shot reference, across a range of input shapes.
//! Grounded in the two scenarios `test/k12_engine.cpp` walks through:
//! deterministic all-zero input, and a random fill followed by a partial
//! rewrite.

use pagehash::{k12_reference, ChunkedHasher};

const CHUNK_SIZE: usize = 8192;

fn lcg_fill(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as u8
        })
        .collect()
}

#[test]
fn deterministic_zero_buffers_of_many_sizes_match_the_reference() {
    for &len in &[0usize, 1, 8191, 8192, 8193, CHUNK_SIZE * 4, CHUNK_SIZE * 4 + 17] {
        let data = vec![0u8; len];
        let mut hasher = ChunkedHasher::new(len);
        let mut out = [0u8; 32];
        hasher.digest(&data, &mut out, true).unwrap();
        assert_eq!(out.to_vec(), k12_reference(&data, 32).unwrap(), "len={len}");
    }
}

#[test]
fn random_fill_then_partial_rewrite_matches_reference_at_each_step() {
    let len = CHUNK_SIZE * 6 + 500;
    let mut data = lcg_fill(len, 0xC0FFEE);
    let mut hasher = ChunkedHasher::new(len);

    let mut out = [0u8; 32];
    hasher.digest(&data, &mut out, true).unwrap();
    assert_eq!(out.to_vec(), k12_reference(&data, 32).unwrap());

    // Rewrite the middle of chunk 2 and the tail partial chunk, marking only
    // those chunks dirty — everything else must still reuse its cached leaf.
    for i in (CHUNK_SIZE * 2)..(CHUNK_SIZE * 2 + 50) {
        data[i] ^= 0xFF;
    }
    hasher.mark_chunk_changed(2);
    for i in (CHUNK_SIZE * 6)..len {
        data[i] = data[i].wrapping_add(1);
    }
    hasher.mark_chunk_changed(6);

    let mut out2 = [0u8; 32];
    hasher.digest(&data, &mut out2, true).unwrap();
    assert_ne!(out, out2);
    assert_eq!(out2.to_vec(), k12_reference(&data, 32).unwrap());
}

#[test]
fn digest_is_stable_across_repeated_calls_with_no_changes() {
    let data = lcg_fill(CHUNK_SIZE * 3 + 10, 42);
    let mut hasher = ChunkedHasher::new(data.len());
    let mut first = [0u8; 48];
    hasher.digest(&data, &mut first, true).unwrap();
    let mut second = [0u8; 48];
    hasher.digest(&data, &mut second, true).unwrap();
    assert_eq!(first, second);
}

#[test]
fn varying_output_length_changes_the_digest() {
    let data = lcg_fill(1000, 7);
    let short = k12_reference(&data, 16).unwrap();
    let long = k12_reference(&data, 32).unwrap();
    assert_ne!(short, &long[..16]);
}

/// A second `digest` call over unchanged, multi-megabyte data must be
/// observably faster than the first, since every chunk's leaf intermediate
/// is already cached and only the final node needs recomputing. Uses a
/// generous tolerance (not a strict ratio) since wall-clock timing on a
/// shared CI runner is noisy; the point is "much faster", not "N times
/// faster". See `benches/digest.rs` for the steady-state criterion
/// measurement this is the single-shot counterpart to.
#[test]
fn a_cached_second_digest_is_faster_than_the_first() {
    let len = CHUNK_SIZE * 256;
    let data = lcg_fill(len, 0xFACADE);
    let mut hasher = ChunkedHasher::new(len);
    let mut out = [0u8; 32];

    let first_start = std::time::Instant::now();
    hasher.digest(&data, &mut out, true).unwrap();
    let first_elapsed = first_start.elapsed();

    let second_start = std::time::Instant::now();
    hasher.digest(&data, &mut out, true).unwrap();
    let second_elapsed = second_start.elapsed();

    assert!(
        second_elapsed <= first_elapsed,
        "cached digest ({second_elapsed:?}) was not faster than the first ({first_elapsed:?})"
    );
}
