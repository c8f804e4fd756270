//! Engine-wide error taxonomy.
//!
//! Mirrors the hand-rolled enum style of [`crate::block::compress::Lz4Error`]
//! and [`crate::block::decompress_api::BlockDecompressError`]: small,
//! `Copy`-where-possible enums with a manual `Display`/`Error` impl, no
//! `thiserror`. `anyhow` remains reserved for the CLI binary's top-level
//! error plumbing.

use std::fmt;

/// Errors surfaced by the chunked hasher and the state-engine shell:
/// bad input, a hash-primitive failure, disk I/O, a kernel fault-channel
/// ioctl, or an unrecognized fault classification.
#[derive(Debug)]
pub enum EngineError {
    /// A caller-supplied argument was invalid (`outLen == 0`, chunk index
    /// out of range where the API contract requires rejection rather than
    /// silent clamping).
    Input(&'static str),
    /// The underlying tree-hash primitive reported a non-zero status.
    Primitive(&'static str),
    /// A disk read/write did not match the expected size or failed outright.
    Io(std::io::Error),
    /// A fault-channel ioctl failed (register, write-protect arm, copy,
    /// continue). Carries a short description; the fault path itself never
    /// propagates these to the mutator — see [`crate::region::fault_monitor`].
    Kernel(String),
    /// A fault event did not classify as missing, minor, or write-protect.
    FaultClassification,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Input(msg) => write!(f, "invalid input: {msg}"),
            EngineError::Primitive(msg) => write!(f, "hash primitive error: {msg}"),
            EngineError::Io(e) => write!(f, "i/o error: {e}"),
            EngineError::Kernel(msg) => write!(f, "kernel fault-channel error: {msg}"),
            EngineError::FaultClassification => {
                write!(f, "fault event did not match any known classification")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_non_empty() {
        let variants: Vec<EngineError> = vec![
            EngineError::Input("outLen == 0"),
            EngineError::Primitive("non-zero status"),
            EngineError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")),
            EngineError::Kernel("UFFDIO_WRITEPROTECT failed".into()),
            EngineError::FaultClassification,
        ];
        for v in variants {
            assert!(!v.to_string().is_empty());
        }
    }
}
