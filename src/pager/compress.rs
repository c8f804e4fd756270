//! Pluggable on-disk chunk codec.
//!
//! `Codec` is the seam between a chunk's in-memory bytes and however they
//! land on disk: compressed, encrypted, or verbatim. The default,
//! [`Lz4BlockCodec`], reuses this crate's own LZ4 block compressor rather
//! than pulling in a second compression crate.

use crate::block::compress::{compress_bound, compress_default};
use crate::block::decompress_api::decompress_safe;
use crate::config::CHUNK_SIZE;
use crate::error::EngineError;

/// Transforms a chunk's raw bytes to and from their on-disk representation.
pub trait Codec: Send + Sync {
    fn encode(&self, raw: &[u8]) -> Result<Vec<u8>, EngineError>;
    /// `original_len` is the exact decompressed length expected (a region's
    /// chunk is always `CHUNK_SIZE` bytes, except possibly a final short
    /// chunk truncated to the region's logical length).
    fn decode(&self, stored: &[u8], original_len: usize) -> Result<Vec<u8>, EngineError>;
}

/// Stores chunks uncompressed. Useful for small regions or when the data is
/// already incompressible; also the baseline the roundtrip tests compare
/// [`Lz4BlockCodec`] against.
pub struct NullCodec;

impl Codec for NullCodec {
    fn encode(&self, raw: &[u8]) -> Result<Vec<u8>, EngineError> {
        Ok(raw.to_vec())
    }

    fn decode(&self, stored: &[u8], original_len: usize) -> Result<Vec<u8>, EngineError> {
        if stored.len() != original_len {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "stored chunk length does not match expected length",
            )));
        }
        Ok(stored.to_vec())
    }
}

/// Default codec: LZ4 block format, via this crate's own [`crate::block`]
/// module (the same one-shot `compress_default`/`decompress_safe` the
/// `hash` subcommand's file path could use directly).
pub struct Lz4BlockCodec;

impl Codec for Lz4BlockCodec {
    fn encode(&self, raw: &[u8]) -> Result<Vec<u8>, EngineError> {
        let bound = compress_bound(raw.len() as i32);
        if bound <= 0 {
            return Err(EngineError::Primitive("chunk too large for LZ4 block format"));
        }
        let mut dst = vec![0u8; bound as usize];
        let written = compress_default(raw, &mut dst).map_err(|e| {
            EngineError::Primitive(match e {
                crate::block::compress::Lz4Error::OutputTooSmall => "LZ4 output buffer too small",
                crate::block::compress::Lz4Error::InputTooLarge => "LZ4 input too large",
            })
        })?;
        dst.truncate(written);
        Ok(dst)
    }

    fn decode(&self, stored: &[u8], original_len: usize) -> Result<Vec<u8>, EngineError> {
        let mut dst = vec![0u8; original_len.max(CHUNK_SIZE)];
        dst.truncate(original_len);
        let written = decompress_safe(stored, &mut dst)
            .map_err(|_| EngineError::Primitive("LZ4 decompress failed or size mismatch"))?;
        if written != original_len {
            return Err(EngineError::Primitive(
                "LZ4-decompressed chunk length does not match expected length",
            ));
        }
        Ok(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_codec_roundtrips() {
        let codec = NullCodec;
        let data = vec![7u8; CHUNK_SIZE];
        let stored = codec.encode(&data).unwrap();
        let back = codec.decode(&stored, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn lz4_codec_roundtrips_compressible_data() {
        let codec = Lz4BlockCodec;
        let data = vec![0xABu8; CHUNK_SIZE];
        let stored = codec.encode(&data).unwrap();
        assert!(stored.len() < data.len(), "highly repetitive data should shrink");
        let back = codec.decode(&stored, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn lz4_codec_roundtrips_incompressible_data() {
        let codec = Lz4BlockCodec;
        let data: Vec<u8> = (0..CHUNK_SIZE).map(|i| (i * 2654435761u32 as usize) as u8).collect();
        let stored = codec.encode(&data).unwrap();
        let back = codec.decode(&stored, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn lz4_codec_rejects_truncated_input() {
        let codec = Lz4BlockCodec;
        let data = vec![0x11u8; CHUNK_SIZE];
        let mut stored = codec.encode(&data).unwrap();
        stored.truncate(stored.len() / 2);
        assert!(codec.decode(&stored, data.len()).is_err());
    }
}
