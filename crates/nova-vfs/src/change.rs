use std::path::{Path, PathBuf};

use crate::path::normalize_local_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A change on the file system, as reported by a watcher or by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

impl FileChange {
    pub fn new(path: impl AsRef<Path>, kind: FileChangeKind) -> Self {
        Self {
            path: normalize_local_path(path.as_ref()),
            kind,
        }
    }

    pub fn created(path: impl AsRef<Path>) -> Self {
        Self::new(path, FileChangeKind::Created)
    }

    pub fn modified(path: impl AsRef<Path>) -> Self {
        Self::new(path, FileChangeKind::Modified)
    }

    pub fn deleted(path: impl AsRef<Path>) -> Self {
        Self::new(path, FileChangeKind::Deleted)
    }

    /// Whether the event can change the set of paths that exist (as opposed to contents only).
    pub fn is_structural(&self) -> bool {
        !matches!(self.kind, FileChangeKind::Modified)
    }
}
