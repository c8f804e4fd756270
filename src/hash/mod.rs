//! KangarooTwelve-family hashing: the low-level sponge primitive, the thin
//! TurboSHAKE adapter built on it, and the chunk-caching incremental hasher
//! layered on top.

mod sponge;
pub mod chunked;
pub mod turboshake;

pub use chunked::{k12_reference, ChunkedHasher};
