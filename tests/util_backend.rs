//! Black-box coverage of `FsBackend` and `contract_state_dir`, exercised
//! through the crate's public API.

use pagehash::util::backend::{contract_state_dir, Backend, FsBackend};

#[test]
fn fs_backend_write_then_read_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsBackend::new(dir.path()).unwrap();
    backend.write("blob", b"contents").unwrap();
    assert_eq!(backend.read("blob").unwrap(), b"contents");
    assert!(backend.exists("blob"));
    assert!(!backend.exists("missing"));
}

#[test]
fn contract_state_dir_nests_named_contracts_under_the_shared_root() {
    let base = std::path::Path::new("/tmp/pagehash-example");
    let named = contract_state_dir(base, Some("42"));
    assert!(named.starts_with(base));
    assert!(named.ends_with("42"));

    let unnamed = contract_state_dir(base, None);
    assert_ne!(named, unnamed);
}
