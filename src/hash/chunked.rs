//! Chunked incremental hasher.
//!
//! Splits a logical byte region into fixed-size [`crate::config::CHUNK_SIZE`]
//! leaves, caches each full leaf's intermediate TurboSHAKE128 digest, and
//! reuses it across calls to [`ChunkedHasher::digest`] for every chunk that
//! has not been marked changed since it was last hashed — a direct port of
//! `K12Engine::_KangarooTwelve_Update`'s leaf-skip optimization.

use super::turboshake::{self, Instance, Node};
use crate::config::{CAPACITY_BYTES, CHUNK_SIZE, K12_SUFFIX_LEAF, SECURITY_LEVEL_BITS};
use crate::error::EngineError;

/// Supplies cached leaf intermediates to the chunk-absorption loop.
///
/// Implemented by [`ChunkedHasher`] itself (a real, dirty-tracked, per-region
/// cache) and by [`NullCache`] (used by [`k12_reference`], the one-shot
/// cross-check that must never reuse a cached leaf).
trait LeafCache {
    fn lookup_clean(&self, chunk_index: usize) -> Option<[u8; CAPACITY_BYTES]>;
    fn store(&mut self, chunk_index: usize, intermediate: [u8; CAPACITY_BYTES]);
}

struct NullCache;

impl LeafCache for NullCache {
    fn lookup_clean(&self, _chunk_index: usize) -> Option<[u8; CAPACITY_BYTES]> {
        None
    }
    fn store(&mut self, _chunk_index: usize, _intermediate: [u8; CAPACITY_BYTES]) {}
}

/// The chunk-by-chunk absorption loop, shared by [`ChunkedHasher::digest`]
/// and [`k12_reference`]. Equivalent to `K12Engine::_KangarooTwelve_Update`.
fn update<C: LeafCache>(
    instance: &mut Instance,
    mut input: &[u8],
    cache: &mut C,
    use_cache: bool,
) {
    if instance.block_number == 0 {
        let len = (CHUNK_SIZE - instance.queue_absorbed_len).min(input.len());
        instance.final_node.absorb(&input[..len]);
        input = &input[len..];
        instance.queue_absorbed_len += len;
        if instance.queue_absorbed_len == CHUNK_SIZE && !input.is_empty() {
            instance.queue_absorbed_len = 0;
            instance.block_number = 1;
            instance.final_node.absorb(&[turboshake::MESSAGE_HOP_PADDING]);
            pad_to_8_byte_boundary(&mut instance.final_node);
        }
    } else if instance.queue_absorbed_len != 0 {
        let len = (CHUNK_SIZE - instance.queue_absorbed_len).min(input.len());
        instance.queue_node.absorb(&input[..len]);
        input = &input[len..];
        instance.queue_absorbed_len += len;
        if instance.queue_absorbed_len == CHUNK_SIZE {
            instance.queue_absorbed_len = 0;
            instance.block_number += 1;
            let mut intermediate = [0u8; CAPACITY_BYTES];
            instance.queue_node.absorb_domain_separator(K12_SUFFIX_LEAF);
            instance.queue_node.squeeze(&mut intermediate);
            instance.final_node.absorb(&intermediate);
        }
    }

    while !input.is_empty() {
        let len = CHUNK_SIZE.min(input.len());
        let chunk_index = instance.block_number as usize;

        if use_cache && len == CHUNK_SIZE {
            if let Some(intermediate) = cache.lookup_clean(chunk_index) {
                instance.final_node.absorb(&intermediate);
                input = &input[len..];
                instance.block_number += 1;
                continue;
            }
        }

        instance.queue_node = Node::init();
        instance.queue_node.absorb(&input[..len]);
        input = &input[len..];
        if len == CHUNK_SIZE {
            instance.block_number += 1;
            let mut intermediate = [0u8; CAPACITY_BYTES];
            instance.queue_node.absorb_domain_separator(K12_SUFFIX_LEAF);
            instance.queue_node.squeeze(&mut intermediate);
            instance.final_node.absorb(&intermediate);
            cache.store(chunk_index, intermediate);
        } else {
            instance.queue_absorbed_len = len;
        }
    }
}

fn pad_to_8_byte_boundary(node: &mut Node) {
    let idx = node.byte_io_index();
    let pad = (8 - (idx % 8)) % 8;
    if pad > 0 {
        node.absorb(&[0u8; 8][..pad]);
    }
}

/// One-shot reference KangarooTwelve hash, bypassing all caching. Used as the
/// cross-check in tests and available to callers who want to verify a
/// region's digest independent of any engine's cache state.
///
/// Equivalent to the adapter's `K12(bytes, n, dst, outLen)`.
pub fn k12_reference(bytes: &[u8], out_len: usize) -> Result<Vec<u8>, EngineError> {
    let mut instance = turboshake::init(SECURITY_LEVEL_BITS, out_len)?;
    let mut cache = NullCache;
    update(&mut instance, bytes, &mut cache, false);
    let mut out = vec![0u8; out_len];
    turboshake::finalize(&mut instance, &mut out, &[])?;
    Ok(out)
}

/// Per-region incremental hasher: owns the per-chunk `dirty`/cached-leaf
/// maps and the whole-output fast-path cache.
pub struct ChunkedHasher {
    max_chunks: usize,
    dirty: Vec<bool>,
    cache: Vec<Option<[u8; CAPACITY_BYTES]>>,
    last_digest: Option<(usize, Vec<u8>)>,
}

impl LeafCache for ChunkedHasher {
    fn lookup_clean(&self, chunk_index: usize) -> Option<[u8; CAPACITY_BYTES]> {
        if *self.dirty.get(chunk_index)? {
            None
        } else {
            self.cache.get(chunk_index).copied().flatten()
        }
    }

    fn store(&mut self, chunk_index: usize, intermediate: [u8; CAPACITY_BYTES]) {
        if chunk_index < self.max_chunks {
            self.cache[chunk_index] = Some(intermediate);
            self.dirty[chunk_index] = false;
        }
    }
}

impl ChunkedHasher {
    /// Constructs a hasher over a region of `region_len` logical bytes.
    /// Every chunk starts dirty — a freshly created region has nothing
    /// cached yet, so the first digest must hash everything.
    pub fn new(region_len: usize) -> Self {
        let max_chunks = region_len.div_ceil(CHUNK_SIZE);
        ChunkedHasher {
            max_chunks,
            dirty: vec![true; max_chunks],
            cache: vec![None; max_chunks],
            last_digest: None,
        }
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// `markChunkChanged(i)` — bounds-checked, silently ignores out-of-range.
    pub fn mark_chunk_changed(&mut self, chunk_index: usize) {
        if chunk_index < self.max_chunks {
            self.dirty[chunk_index] = true;
        }
    }

    pub fn is_dirty(&self, chunk_index: usize) -> bool {
        self.dirty.get(chunk_index).copied().unwrap_or(false)
    }

    fn any_dirty(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    /// `digest(out, outLen)` — recomputes only dirty chunks, reusing cached
    /// leaf intermediates for clean ones, and serves a whole-output fast
    /// path when nothing has changed since the last call.
    pub fn digest(
        &mut self,
        region_bytes: &[u8],
        out: &mut [u8],
        use_cache: bool,
    ) -> Result<(), EngineError> {
        if out.is_empty() {
            return Err(EngineError::Input("outLen == 0"));
        }
        if use_cache {
            if let Some((cached_len, cached)) = &self.last_digest {
                if *cached_len == out.len() && !self.any_dirty() {
                    out.copy_from_slice(cached);
                    return Ok(());
                }
            }
        }

        let mut instance = turboshake::init(SECURITY_LEVEL_BITS, out.len())?;
        update(&mut instance, region_bytes, self, use_cache);
        // A primitive failure mid-computation must invalidate the cache
        // rather than leave stale bytes in `out` — `finalize` returning an
        // error here means `out` holds whatever `squeeze` partially wrote,
        // so we must not treat it as valid and must not cache it.
        if let Err(e) = turboshake::finalize(&mut instance, out, &[]) {
            self.last_digest = None;
            return Err(e);
        }
        self.last_digest = Some((out.len(), out.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_region_digest_matches_reference() {
        let mut hasher = ChunkedHasher::new(0);
        let mut out = [0u8; 32];
        hasher.digest(&[], &mut out, true).unwrap();
        let reference = k12_reference(&[], 32).unwrap();
        assert_eq!(out.to_vec(), reference);
    }

    #[test]
    fn single_chunk_digest_matches_reference() {
        let data = vec![0x42u8; CHUNK_SIZE];
        let mut hasher = ChunkedHasher::new(data.len());
        let mut out = [0u8; 32];
        hasher.digest(&data, &mut out, true).unwrap();
        let reference = k12_reference(&data, 32).unwrap();
        assert_eq!(out.to_vec(), reference);
    }

    #[test]
    fn multi_chunk_digest_matches_reference_and_cache_reuse_is_correct() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 5 + 123))
            .map(|i| (i % 251) as u8)
            .collect();
        let mut hasher = ChunkedHasher::new(data.len());
        let mut out1 = [0u8; 32];
        hasher.digest(&data, &mut out1, true).unwrap();
        assert_eq!(out1.to_vec(), k12_reference(&data, 32).unwrap());

        // Second call with nothing changed must hit the whole-output cache
        // and still match the reference.
        let mut out2 = [0u8; 32];
        hasher.digest(&data, &mut out2, true).unwrap();
        assert_eq!(out1, out2);
    }

    #[test]
    fn marking_a_chunk_changed_and_mutating_it_changes_the_digest() {
        let mut data: Vec<u8> = (0..(CHUNK_SIZE * 5 + 123))
            .map(|i| (i % 251) as u8)
            .collect();
        let mut hasher = ChunkedHasher::new(data.len());
        let mut out1 = [0u8; 32];
        hasher.digest(&data, &mut out1, true).unwrap();

        data[CHUNK_SIZE * 2] ^= 0xFF;
        hasher.mark_chunk_changed(2);
        let mut out2 = [0u8; 32];
        hasher.digest(&data, &mut out2, true).unwrap();

        assert_ne!(out1, out2);
        assert_eq!(out2.to_vec(), k12_reference(&data, 32).unwrap());
    }

    #[test]
    fn reuse_optimization_is_load_bearing() {
        // With caching disabled the engine must still match the reference
        // (proving correctness does not secretly depend on the cache), and
        // with caching enabled it must also match (proving the cache path
        // is not silently skipped).
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3)).map(|i| (i % 199) as u8).collect();
        let mut hasher = ChunkedHasher::new(data.len());
        let mut cached_out = [0u8; 32];
        hasher.digest(&data, &mut cached_out, true).unwrap();

        let mut uncached_hasher = ChunkedHasher::new(data.len());
        let mut uncached_out = [0u8; 32];
        uncached_hasher.digest(&data, &mut uncached_out, false).unwrap();

        assert_eq!(cached_out, uncached_out);
    }

    #[test]
    fn mark_chunk_changed_out_of_range_is_ignored() {
        let mut hasher = ChunkedHasher::new(CHUNK_SIZE);
        hasher.mark_chunk_changed(9999);
        assert!(!hasher.is_dirty(9999.min(hasher.max_chunks().saturating_sub(1))) || hasher.max_chunks() == 0);
    }

    #[test]
    fn zero_out_len_is_rejected() {
        let mut hasher = ChunkedHasher::new(CHUNK_SIZE);
        let mut out = [0u8; 0];
        assert!(hasher.digest(&[0u8; CHUNK_SIZE], &mut out, true).is_err());
    }
}
