//! config.rs — Compile-time and environment-overridable engine parameters.
//!
//! Mirrors the role of `lz4conf.h`: a single place collecting the constants
//! that tune the engine's behavior, so call sites never embed magic numbers.

use std::sync::atomic::{AtomicU32, Ordering};

/// K12 leaf/chunk size in bytes. Must be a multiple of the OS page size
/// (asserted in [`crate::region::engine::Engine::create`]).
pub const CHUNK_SIZE: usize = 8192;

/// Security level in bits used for the KangarooTwelve final digest
/// (matches the original `getHash128` naming).
pub const SECURITY_LEVEL_BITS: usize = 128;

/// Capacity of the cached per-chunk intermediate digest, in bytes.
/// `CAPACITY_BYTES = 2 * securityLevel / 8`.
pub const CAPACITY_BYTES: usize = 2 * SECURITY_LEVEL_BITS / 8;

/// TurboSHAKE128 rate (bytes absorbed/squeezed per permutation call).
pub const TURBOSHAKE128_RATE: usize = 168;

/// Domain-separation byte appended before squeezing a leaf node's
/// intermediate digest. Corresponds to `K12_suffixLeaf` in the original.
pub const K12_SUFFIX_LEAF: u8 = 0x0B;

/// Message-hop padding byte inserted into the final node once the first
/// chunk is exhausted and more input remains. Corresponds to the literal
/// `0x03` ('110^6': message hop, simple padding) in `_KangarooTwelve_Update`.
pub const K12_MESSAGE_HOP_PADDING: u8 = 0x03;

/// Default RAM ceiling across all regions, overridable via
/// [`crate::lru::LruAccountant::set_ram_budget`] or the `PAGEHASH_RAM_BUDGET`
/// environment variable (bytes). Used as the fallback by
/// [`default_ram_budget_bytes`].
pub const DEFAULT_RAM_BUDGET_BYTES: u64 = 256 * 1024 * 1024;

/// Name of the environment variable that overrides
/// [`DEFAULT_RAM_BUDGET_BYTES`] for a freshly constructed
/// [`crate::lru::LruAccountant`]/[`crate::registry::EngineRegistry`].
pub const RAM_BUDGET_ENV_VAR: &str = "PAGEHASH_RAM_BUDGET";

/// Reads [`RAM_BUDGET_ENV_VAR`] and parses it as a byte count, falling back
/// to [`DEFAULT_RAM_BUDGET_BYTES`] if the variable is unset or does not
/// parse as a `u64`.
pub fn default_ram_budget_bytes() -> u64 {
    std::env::var(RAM_BUDGET_ENV_VAR)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RAM_BUDGET_BYTES)
}

/// Upper bound on the exponential backoff used while retrying a failed
/// chunk load from disk. The mutator thread is blocked on the faulting
/// instruction until the load succeeds, so this cap keeps worst-case
/// latency bounded and observable rather than unbounded.
pub const LOAD_RETRY_BACKOFF_CAP: std::time::Duration = std::time::Duration::from_secs(1);

/// Initial backoff before the first retry of a failed chunk load.
pub const LOAD_RETRY_BACKOFF_INITIAL: std::time::Duration = std::time::Duration::from_millis(1);

/// Directory name under which per-contract on-disk chunk files live.
pub const CONTRACT_STATES_DIR: &str = "contract_states";

/// Fallback directory name for a contract with no configured asset name.
pub const DEFAULT_CONTRACT_NAME: &str = "Contract0State";

/// Printable length of a chunk's on-disk filename (truncated/padded K12 hash
/// of `(contractIndex, chunkIndex)`).
pub const CHUNK_FILENAME_LEN: usize = 32;

// ── Diagnostics verbosity ────────────────────────────────────────────────────
//
// No `log`/`tracing` dependency: `eprintln!` diagnostics are gated behind
// this crate-level atomic instead, via the `diagnostic!` macro below.
//
// 0 = silent; 1 = errors/degradation only; 2 = normal; 3 = verbose (fault-path tracing).
pub static DISPLAY_LEVEL: AtomicU32 = AtomicU32::new(1);

/// Returns the current diagnostics verbosity.
#[inline]
pub fn display_level() -> u32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

/// Sets the diagnostics verbosity level.
#[inline]
pub fn set_display_level(level: u32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Prints `msg` to stderr if the current verbosity is at least `level`.
#[macro_export]
macro_rules! diagnostic {
    ($level:expr, $($arg:tt)*) => {
        if $crate::config::display_level() >= $level {
            eprintln!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_page_multiple_of_common_page_sizes() {
        assert_eq!(CHUNK_SIZE % 4096, 0);
    }

    #[test]
    fn capacity_bytes_matches_128_bit_security_level() {
        assert_eq!(CAPACITY_BYTES, 32);
    }

    #[test]
    fn display_level_roundtrip() {
        let prev = display_level();
        set_display_level(3);
        assert_eq!(display_level(), 3);
        set_display_level(prev);
    }

    // `std::env::set_var`/`remove_var` mutate process-global state, so this
    // test takes a lock shared with every other test in this module that
    // touches `RAM_BUDGET_ENV_VAR` to avoid racing the default cargo test
    // harness's parallel execution.
    static RAM_BUDGET_ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn default_ram_budget_falls_back_when_env_var_is_absent() {
        let _guard = RAM_BUDGET_ENV_LOCK.lock().unwrap();
        std::env::remove_var(RAM_BUDGET_ENV_VAR);
        assert_eq!(default_ram_budget_bytes(), DEFAULT_RAM_BUDGET_BYTES);
    }

    #[test]
    fn default_ram_budget_honors_a_valid_env_var() {
        let _guard = RAM_BUDGET_ENV_LOCK.lock().unwrap();
        std::env::set_var(RAM_BUDGET_ENV_VAR, "1234567");
        assert_eq!(default_ram_budget_bytes(), 1_234_567);
        std::env::remove_var(RAM_BUDGET_ENV_VAR);
    }

    #[test]
    fn default_ram_budget_falls_back_on_unparseable_env_var() {
        let _guard = RAM_BUDGET_ENV_LOCK.lock().unwrap();
        std::env::set_var(RAM_BUDGET_ENV_VAR, "not-a-number");
        assert_eq!(default_ram_budget_bytes(), DEFAULT_RAM_BUDGET_BYTES);
        std::env::remove_var(RAM_BUDGET_ENV_VAR);
    }
}
