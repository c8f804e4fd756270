//! Pluggable on-disk storage backend.
//!
//! `Backend` is the other half of the pager's storage seam, alongside
//! [`crate::pager::compress::Codec`]: where chunk bytes land. The default,
//! [`FsBackend`], is a plain directory of files — one per chunk — written
//! atomically via a temp file plus rename, the same discipline ordinary
//! file output uses elsewhere in this crate.

use crate::error::EngineError;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads and writes named byte blobs. `name` is an opaque identifier chosen
/// by the pager (the chunk's content-addressed filename); a `Backend` impl
/// must not interpret it beyond using it as a lookup key.
pub trait Backend: Send + Sync {
    fn read(&self, name: &str) -> Result<Vec<u8>, EngineError>;
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError>;
    /// `None` if no blob exists under `name` yet.
    fn size(&self, name: &str) -> Result<Option<u64>, EngineError>;
    fn exists(&self, name: &str) -> bool {
        matches!(self.size(name), Ok(Some(_)))
    }
}

/// Stores each chunk as a file under `root/`, creating `root` on first use.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FsBackend { root })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Backend for FsBackend {
    fn read(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        fs::read(self.path_for(name)).map_err(EngineError::from)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let path = self.path_for(name);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn size(&self, name: &str) -> Result<Option<u64>, EngineError> {
        match fs::metadata(self.path_for(name)) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EngineError::from(e)),
        }
    }
}

/// Joins a contract's named asset directory under the shared
/// [`crate::config::CONTRACT_STATES_DIR`] root, falling back to
/// [`crate::config::DEFAULT_CONTRACT_NAME`] when the caller has not assigned
/// the contract a name.
pub fn contract_state_dir(base: &Path, contract_name: Option<&str>) -> PathBuf {
    base.join(crate::config::CONTRACT_STATES_DIR)
        .join(contract_name.unwrap_or(crate::config::DEFAULT_CONTRACT_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();
        backend.write("chunk-0", b"hello").unwrap();
        assert_eq!(backend.read("chunk-0").unwrap(), b"hello");
        assert_eq!(backend.size("chunk-0").unwrap(), Some(5));
    }

    #[test]
    fn missing_blob_size_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();
        assert_eq!(backend.size("nope").unwrap(), None);
        assert!(!backend.exists("nope"));
    }

    #[test]
    fn contract_state_dir_falls_back_to_default_name() {
        let base = Path::new("/tmp/x");
        let dir = contract_state_dir(base, None);
        assert!(dir.ends_with("contract_states/Contract0State"));
    }
}
