use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File system abstraction for Nova.
///
/// The trait is intentionally small: the root index only needs to validate roots, tell
/// directories from files and walk directory children.
pub trait FileSystem: Send + Sync {
    /// Returns whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Returns whether a path exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Lists the direct children of a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Local OS file system implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = fs::read_dir(path).map_err(|err| {
            tracing::trace!(target = "nova.vfs", path = %path.display(), error = %err, "read_dir failed");
            err
        })?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            out.push(entry.path());
        }
        out.sort();
        Ok(out)
    }
}
