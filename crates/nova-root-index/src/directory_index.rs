use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nova_project::ProjectModel;
use nova_vfs::{FileChange, FileSystem};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::{IgnoredFiles, RootIndexConfig};
use crate::error::Result;
use crate::index::RootIndex;
use crate::policy::Extensions;

/// Holds the current [`RootIndex`] generation and rebuilds it on demand.
///
/// Rebuilds are single-flight. A generation built while [`DirectoryIndex::reset`] ran is
/// handed to the caller that built it but never published.
pub struct DirectoryIndex {
    fs: Arc<dyn FileSystem>,
    extensions: Arc<Extensions>,
    config: RootIndexConfig,
    ignored: IgnoredFiles,
    current: RwLock<Option<Arc<RootIndex>>>,
    rebuild: Mutex<()>,
    generation: AtomicU64,
}

impl DirectoryIndex {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        extensions: Extensions,
        config: RootIndexConfig,
    ) -> Result<Self> {
        let ignored = config.ignored_files()?;
        Ok(Self {
            fs,
            extensions: Arc::new(extensions),
            config,
            ignored,
            current: RwLock::new(None),
            rebuild: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn config(&self) -> &RootIndexConfig {
        &self.config
    }

    /// Bumped by every [`DirectoryIndex::reset`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The published generation, if one is built.
    pub fn current(&self) -> Option<Arc<RootIndex>> {
        self.current.read().clone()
    }

    pub fn get_or_build(
        &self,
        model: &Arc<ProjectModel>,
        cancel: &CancellationToken,
    ) -> Result<Arc<RootIndex>> {
        if let Some(index) = self.current() {
            return Ok(index);
        }

        let _rebuild = self.rebuild.lock();
        if let Some(index) = self.current() {
            return Ok(index);
        }

        let generation = self.generation();
        let index = Arc::new(RootIndex::build(
            model.clone(),
            self.fs.clone(),
            self.extensions.clone(),
            &self.config,
            self.ignored.clone(),
            cancel,
        )?);

        let mut current = self.current.write();
        if self.generation() == generation {
            *current = Some(index.clone());
        } else {
            tracing::debug!(
                target = "nova.roots",
                generation,
                "discarding root index built for a stale generation"
            );
        }
        Ok(index)
    }

    /// Drops the current generation. Its caches go with it; holders of the old
    /// [`RootIndex`] keep a consistent but stale view.
    pub fn reset(&self) {
        let mut current = self.current.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *current = None;
    }

    /// Whether `change` can alter the current generation: only creating or deleting a root,
    /// or a directory containing one, does.
    pub fn is_root_affected(&self, change: &FileChange) -> bool {
        if !change.is_structural() {
            return false;
        }
        match self.current.read().as_ref() {
            Some(index) => index.root_info().is_root_or_root_ancestor(&change.path),
            None => false,
        }
    }
}
