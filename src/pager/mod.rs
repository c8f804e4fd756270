//! Chunk pager: names, saves, and loads individual chunks on disk, through
//! pluggable [`Codec`] and [`crate::util::backend::Backend`] seams.

pub mod compress;

use crate::config::CHUNK_FILENAME_LEN;
use crate::error::EngineError;
use crate::hash::k12_reference;
use crate::util::backend::Backend;
use compress::Codec;
use std::sync::Mutex;

/// Content-addresses a chunk's on-disk name from `(contract_index,
/// chunk_index)` rather than a plain `"{chunk_index}"` — this is what lets
/// multiple contracts share one backend root without collisions, and keeps
/// filenames a fixed, filesystem-friendly length regardless of index width.
fn chunk_name(contract_index: u32, chunk_index: usize) -> Result<String, EngineError> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&contract_index.to_be_bytes());
    key.extend_from_slice(&(chunk_index as u64).to_be_bytes());
    let digest = k12_reference(&key, CHUNK_FILENAME_LEN / 2)?;
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Serializes all disk I/O for one region behind a single mutex — distinct
/// from the region's fault mutex — so concurrent evictions and loads
/// against the same backend root don't race on a half-written file.
pub struct ChunkPager {
    backend: Box<dyn Backend>,
    codec: Box<dyn Codec>,
    io_mutex: Mutex<()>,
    contract_index: u32,
}

impl ChunkPager {
    pub fn new(contract_index: u32, backend: Box<dyn Backend>, codec: Box<dyn Codec>) -> Self {
        ChunkPager {
            backend,
            codec,
            io_mutex: Mutex::new(()),
            contract_index,
        }
    }

    /// `saveChunkToDisk(i)` — encodes and persists a chunk's raw bytes.
    pub fn save_chunk(&self, chunk_index: usize, raw: &[u8]) -> Result<(), EngineError> {
        let _guard = self.io_mutex.lock().unwrap();
        let name = chunk_name(self.contract_index, chunk_index)?;
        let encoded = self.codec.encode(raw)?;
        self.backend.write(&name, &encoded)
    }

    /// `loadChunkFromDisk(i)` — loads and decodes a chunk previously saved by
    /// [`Self::save_chunk`]. `expected_len` is the chunk's exact logical
    /// length (`CHUNK_SIZE`, or shorter for a region's final partial chunk).
    pub fn load_chunk(&self, chunk_index: usize, expected_len: usize) -> Result<Vec<u8>, EngineError> {
        let _guard = self.io_mutex.lock().unwrap();
        let name = chunk_name(self.contract_index, chunk_index)?;
        if !self.backend.exists(&name) {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("chunk {chunk_index} has no on-disk copy"),
            )));
        }
        let stored = self.backend.read(&name)?;
        self.codec.decode(&stored, expected_len)
    }

    pub fn chunk_exists_on_disk(&self, chunk_index: usize) -> Result<bool, EngineError> {
        let _guard = self.io_mutex.lock().unwrap();
        let name = chunk_name(self.contract_index, chunk_index)?;
        Ok(self.backend.exists(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CHUNK_SIZE;
    use crate::pager::compress::Lz4BlockCodec;
    use crate::util::backend::FsBackend;

    fn pager(dir: &std::path::Path, contract_index: u32) -> ChunkPager {
        let backend = Box::new(FsBackend::new(dir).unwrap());
        ChunkPager::new(contract_index, backend, Box::new(Lz4BlockCodec))
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let pager = pager(dir.path(), 0);
        let data = vec![0x5Au8; CHUNK_SIZE];
        pager.save_chunk(3, &data).unwrap();
        let back = pager.load_chunk(3, CHUNK_SIZE).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn loading_an_unsaved_chunk_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pager = pager(dir.path(), 0);
        assert!(pager.load_chunk(0, CHUNK_SIZE).is_err());
    }

    #[test]
    fn distinct_contracts_do_not_collide_in_one_backend_root() {
        let dir = tempfile::tempdir().unwrap();
        let pager_a = pager(dir.path(), 1);
        let pager_b = pager(dir.path(), 2);
        pager_a.save_chunk(0, &[1u8; CHUNK_SIZE]).unwrap();
        pager_b.save_chunk(0, &[2u8; CHUNK_SIZE]).unwrap();
        assert_eq!(pager_a.load_chunk(0, CHUNK_SIZE).unwrap(), vec![1u8; CHUNK_SIZE]);
        assert_eq!(pager_b.load_chunk(0, CHUNK_SIZE).unwrap(), vec![2u8; CHUNK_SIZE]);
    }
}
