//! Shared helpers for the engine-level end-to-end tests.
//!
//! Creating an [`pagehash::Engine`] requires the kernel's userfaultfd
//! facility, which is unavailable (or locked behind
//! `/proc/sys/vm/unprivileged_userfaultfd`) in some sandboxes and CI
//! containers. Tests that need a live engine call [`try_registry`] and skip
//! with a diagnostic rather than failing the whole suite when the kernel
//! refuses it — the same judgment call the original test harness makes for
//! environment-gated facilities.

use pagehash::EngineRegistry;
use std::sync::Arc;

pub fn try_registry(storage_root: &std::path::Path, ram_budget: u64) -> EngineRegistry {
    EngineRegistry::with_ram_budget(storage_root, ram_budget)
}

/// Returns `None` (after printing why) if this environment cannot create a
/// userfaultfd-backed engine.
pub fn try_create_engine(
    registry: &EngineRegistry,
    contract: u32,
    len: usize,
) -> Option<Arc<pagehash::Engine>> {
    match registry.create_engine(contract, len) {
        Ok(engine) => Some(engine),
        Err(e) => {
            eprintln!("skipping: cannot create a pagehash engine in this environment: {e}");
            None
        }
    }
}
