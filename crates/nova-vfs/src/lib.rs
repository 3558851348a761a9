//! File system layer used by the Nova root index.
//!
//! The VFS is responsible for:
//! - Answering existence/kind/listing queries for local paths.
//! - Providing an in-memory tree that behaves like the OS file system (used by tests and
//!   by hosts that want to model a workspace without touching disk).
//! - Lexical path normalization shared by every consumer of root paths.
//! - Representing file change events.

mod change;
mod fs;
mod memory;
mod path;

pub use change::{FileChange, FileChangeKind};
pub use fs::{FileSystem, LocalFs};
pub use memory::MemoryFs;

/// Lexically normalizes a local filesystem path.
///
/// This does not hit the filesystem and does not resolve symlinks.
pub fn normalize_local_path(path: &std::path::Path) -> std::path::PathBuf {
    crate::path::normalize_local_path(path)
}
