//! Small, cross-cutting helpers.
//!
//! Submodules:
//! - [`backend`]   — the pager's pluggable storage seam ([`backend::Backend`],
//!                   [`backend::FsBackend`])
//! - [`file_size`] — file size queries, used by the CLI's `stats` subcommand to
//!                   report on-disk chunk storage

pub mod backend;
pub mod file_size;

pub use file_size::{get_file_size, get_total_file_size};

// ── Sleep helpers ─────────────────────────────────────────────────────────────
// Correspond to the `UTIL_sleep` / `UTIL_sleepMilli` macros in util.h.

/// Blocks the current thread for `millis` milliseconds.
pub fn sleep_millis(millis: u64) {
    std::thread::sleep(std::time::Duration::from_millis(millis));
}

