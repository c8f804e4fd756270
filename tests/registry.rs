//! Black-box coverage of `EngineRegistry`'s bookkeeping that does not need a
//! live userfaultfd (the create/remove/lookup surface, not fault handling —
//! see `e2e/` for tests that need a real engine).

use pagehash::EngineRegistry;

#[test]
fn a_fresh_registry_has_no_engines_or_resident_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(dir.path());
    assert!(registry.contract_indices().is_empty());
    assert_eq!(registry.total_resident_bytes(), 0);
    assert!(registry.get(0).is_none());
}

#[test]
fn removing_an_engine_that_was_never_created_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(dir.path());
    assert!(registry.remove(99).is_none());
}

#[test]
fn with_ram_budget_is_visible_through_the_shared_lru() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::with_ram_budget(dir.path(), 4096);
    assert_eq!(registry.lru().ram_budget(), 4096);
    registry.set_ram_budget(8192);
    assert_eq!(registry.lru().ram_budget(), 8192);
}
