use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::change::FileChange;
use crate::fs::FileSystem;
use crate::path::normalize_local_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

/// In-memory file tree.
///
/// Creating an entry implicitly creates its ancestors; removing a directory removes its
/// whole subtree. Every mutation returns the [`FileChange`]s it produced so callers can feed
/// them to whoever tracks the tree.
#[derive(Debug, Default)]
pub struct MemoryFs {
    entries: RwLock<BTreeMap<PathBuf, EntryKind>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_dir_all(&self, path: impl AsRef<Path>) -> Vec<FileChange> {
        self.insert(path.as_ref(), EntryKind::Dir)
    }

    pub fn create_file(&self, path: impl AsRef<Path>) -> Vec<FileChange> {
        self.insert(path.as_ref(), EntryKind::File)
    }

    /// Removes `path` and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) -> Vec<FileChange> {
        let path = normalize_local_path(path.as_ref());
        let mut entries = self.entries.write();
        let doomed: Vec<PathBuf> = entries
            .range(path.clone()..)
            .map(|(p, _)| p)
            .take_while(|p| p.starts_with(&path))
            .cloned()
            .collect();
        for p in &doomed {
            entries.remove(p);
        }
        doomed.into_iter().map(FileChange::deleted).collect()
    }

    fn insert(&self, path: &Path, kind: EntryKind) -> Vec<FileChange> {
        let path = normalize_local_path(path);
        let mut changes = Vec::new();
        let mut entries = self.entries.write();

        let mut ancestors: Vec<&Path> = path.ancestors().skip(1).collect();
        ancestors.reverse();
        for dir in ancestors {
            if dir.as_os_str().is_empty() {
                continue;
            }
            if !entries.contains_key(dir) {
                entries.insert(dir.to_path_buf(), EntryKind::Dir);
                changes.push(FileChange::created(dir));
            }
        }

        if entries.insert(path.clone(), kind).is_none() {
            changes.push(FileChange::created(&path));
        }
        changes
    }
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        self.entries.read().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.entries.read().get(path) == Some(&EntryKind::Dir)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = self.entries.read();
        match entries.get(path) {
            Some(EntryKind::Dir) => {}
            Some(EntryKind::File) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("not a directory: {}", path.display()),
                ))
            }
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such directory: {}", path.display()),
                ))
            }
        }

        Ok(entries
            .range(path.to_path_buf()..)
            .map(|(p, _)| p)
            .skip_while(|p| p.as_path() == path)
            .take_while(|p| p.starts_with(path))
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}
