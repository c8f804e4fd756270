//! Black-box coverage of `ChunkPager` against its public `Codec`/`Backend`
//! seams, mirroring the in-crate unit tests but through the crate's
//! published API surface.

use pagehash::pager::compress::{Lz4BlockCodec, NullCodec};
use pagehash::pager::ChunkPager;
use pagehash::util::backend::FsBackend;

const CHUNK_SIZE: usize = 8192;

#[test]
fn a_chunk_saved_with_the_null_codec_round_trips_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Box::new(FsBackend::new(dir.path()).unwrap());
    let pager = ChunkPager::new(0, backend, Box::new(NullCodec));

    let data = vec![0x2Au8; CHUNK_SIZE];
    pager.save_chunk(0, &data).unwrap();
    assert_eq!(pager.load_chunk(0, CHUNK_SIZE).unwrap(), data);
}

#[test]
fn a_chunk_saved_with_the_lz4_codec_round_trips_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Box::new(FsBackend::new(dir.path()).unwrap());
    let pager = ChunkPager::new(0, backend, Box::new(Lz4BlockCodec));

    let data: Vec<u8> = (0..CHUNK_SIZE).map(|i| (i % 17) as u8).collect();
    pager.save_chunk(5, &data).unwrap();
    assert_eq!(pager.load_chunk(5, CHUNK_SIZE).unwrap(), data);
    assert!(pager.chunk_exists_on_disk(5).unwrap());
    assert!(!pager.chunk_exists_on_disk(6).unwrap());
}
