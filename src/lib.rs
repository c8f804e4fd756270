//! pagehash — an incremental, pageable KangarooTwelve hashing engine for
//! large mutable contract-state buffers.
//!
//! Three layers, matching the module layout:
//! - [`hash`] — the chunked, cache-reusing KangarooTwelve/TurboSHAKE128 tree
//!   hasher (components A and B).
//! - [`region`] — the userfaultfd-driven change tracker and the per-region
//!   engine shell built on top of it (components C and D).
//! - [`pager`] and [`lru`] — the on-disk chunk store and the process-wide
//!   RAM accountant that decides what the pager evicts (components E and F).
//!
//! [`registry`] ties a process's engines together under one shared RAM
//! budget; [`config`] and [`error`] are the ambient pieces everything else
//! depends on.

pub mod block;
pub mod config;
pub mod error;
pub mod hash;
pub mod lru;
pub mod pager;
pub mod region;
pub mod registry;
pub mod util;

pub use error::EngineError;
pub use hash::{k12_reference, ChunkedHasher};
pub use lru::{EvictionCandidate, LruAccountant};
pub use region::Engine;
pub use registry::EngineRegistry;
