use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nova_project::{ModuleId, OrderEntryHandle, ProjectModel, ProjectModelError};
use nova_vfs::{FileChange, FileSystem};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tokio_util::sync::CancellationToken;

use crate::config::RootIndexConfig;
use crate::directory_index::DirectoryIndex;
use crate::enumerator::OrderEnumerator;
use crate::error::{Result, RootIndexError};
use crate::file_index::ProjectFileIndex;
use crate::index::RootIndex;
use crate::policy::Extensions;

/// Notified after every committed model change and every root-affecting file event.
///
/// Listeners may read the project but must not update it.
pub trait RootsChangeListener: Send + Sync {
    fn roots_changed(&self, project: &Project);
}

/// Host of a project model and the directory index derived from it.
pub struct Project {
    model: RwLock<Arc<ProjectModel>>,
    index: DirectoryIndex,
    listeners: Mutex<Vec<Arc<dyn RootsChangeListener>>>,
    in_roots_change: AtomicBool,
    cancel: CancellationToken,
    disposed: AtomicBool,
}

impl Project {
    pub fn new(
        model: ProjectModel,
        fs: Arc<dyn FileSystem>,
        extensions: Extensions,
        config: RootIndexConfig,
    ) -> Result<Self> {
        Ok(Self {
            model: RwLock::new(Arc::new(model)),
            index: DirectoryIndex::new(fs, extensions, config)?,
            listeners: Mutex::new(Vec::new()),
            in_roots_change: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn RootsChangeListener>) {
        self.listeners.lock().push(listener);
    }

    pub fn directory_index(&self) -> &DirectoryIndex {
        &self.index
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Read access to the committed model and the index built from it.
    pub fn read(&self) -> Result<ProjectRead<'_>> {
        self.ensure_alive()?;
        Ok(ProjectRead {
            project: self,
            model: self.model.read(),
            index: OnceCell::new(),
            cancel: self.cancel.child_token(),
        })
    }

    /// Applies `f` to a copy of the model and commits it when `f` succeeds.
    ///
    /// A successful commit drops the current index generation and then notifies listeners
    /// outside the write lock.
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut ProjectModel) -> Result<R, ProjectModelError>,
    ) -> Result<R> {
        self.ensure_alive()?;
        if self.in_roots_change.load(Ordering::Acquire) {
            return usage_violation(RootIndexError::NestedRootsChange);
        }

        let result = {
            let mut model = self.model.write();
            let mut next = ProjectModel::clone(&model);
            let result = f(&mut next)?;
            *model = Arc::new(next);
            self.index.reset();
            result
        };

        tracing::debug!(
            target = "nova.roots",
            modules = self.model.read().modules().count(),
            "project model committed"
        );
        self.notify();
        Ok(result)
    }

    /// Feeds file system changes to the index. Returns whether any of them invalidated it.
    pub fn file_events(&self, changes: &[FileChange]) -> Result<bool> {
        self.ensure_alive()?;
        let Some(change) = changes
            .iter()
            .find(|change| self.index.is_root_affected(change))
        else {
            return Ok(false);
        };

        tracing::debug!(
            target = "nova.roots",
            path = %change.path.display(),
            kind = ?change.kind,
            "root-affecting file change"
        );
        self.index.reset();
        self.notify();
        Ok(true)
    }

    /// Cancels running queries and releases the index. Every later call fails.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        self.index.reset();
        self.listeners.lock().clear();
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_disposed() {
            return usage_violation(RootIndexError::Disposed);
        }
        Ok(())
    }

    fn notify(&self) {
        struct Reset<'a>(&'a AtomicBool);

        impl Drop for Reset<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::Release);
            }
        }

        let listeners = self.listeners.lock().clone();
        if listeners.is_empty() {
            return;
        }

        self.in_roots_change.store(true, Ordering::Release);
        let _reset = Reset(&self.in_roots_change);
        for listener in listeners {
            listener.roots_changed(self);
        }
    }
}

fn usage_violation<T>(err: RootIndexError) -> Result<T> {
    tracing::error!(target = "nova.roots", error = %err, "project usage violation");
    debug_assert!(false, "{err}");
    Err(err)
}

/// A read guard over the committed model. Queries made through it observe one model
/// snapshot and one index generation, and are cancelled when the project is disposed.
pub struct ProjectRead<'p> {
    project: &'p Project,
    model: RwLockReadGuard<'p, Arc<ProjectModel>>,
    index: OnceCell<Arc<RootIndex>>,
    cancel: CancellationToken,
}

impl<'p> ProjectRead<'p> {
    /// Uses `cancel` for the queries made through this guard instead of the project's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn model(&self) -> &ProjectModel {
        &self.model
    }

    pub fn snapshot(&self) -> Arc<ProjectModel> {
        Arc::clone(&self.model)
    }

    /// The generation this guard queries, built on first use.
    pub fn root_index(&self) -> Result<Arc<RootIndex>> {
        self.pinned_index().cloned()
    }

    fn pinned_index(&self) -> Result<&Arc<RootIndex>> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let index = self.project.index.get_or_build(&self.model, &self.cancel)?;
        Ok(self.index.get_or_init(|| index))
    }

    pub fn order_entries(&self, file: &Path) -> Result<Arc<[OrderEntryHandle]>> {
        self.root_index()?.order_entries(file, &self.cancel)
    }

    pub fn package_name(&self, dir: &Path) -> Result<Option<Arc<str>>> {
        Ok(self.root_index()?.package_name(dir))
    }

    pub fn directories_by_package_name(
        &self,
        package: &str,
        include_library_sources: bool,
    ) -> Result<Vec<PathBuf>> {
        Ok(self
            .root_index()?
            .directories_by_package_name(package, include_library_sources))
    }

    pub fn dependent_unloaded_modules(&self, module: ModuleId) -> Result<Arc<BTreeSet<String>>> {
        self.root_index()?
            .dependent_unloaded_modules(module, &self.cancel)
    }

    pub fn file_index(&self) -> Result<ProjectFileIndex> {
        Ok(ProjectFileIndex::new(self.root_index()?, self.cancel.clone()))
    }

    /// An enumerator over `module` wired to the project's handlers, the generation's roots
    /// cache and cancellation.
    pub fn enumerate_module(&self, module: ModuleId) -> Result<OrderEnumerator<'_>> {
        self.wire(OrderEnumerator::module(&self.model, module))
    }

    pub fn enumerate_project(&self) -> Result<OrderEnumerator<'_>> {
        self.wire(OrderEnumerator::project(&self.model))
    }

    fn wire<'e>(&'e self, enumerator: OrderEnumerator<'e>) -> Result<OrderEnumerator<'e>> {
        let index = self.pinned_index()?;
        Ok(enumerator
            .with_handlers(&self.project.index.extensions().enumeration_handlers)
            .with_cache(index.roots_cache())
            .with_cancellation(&self.cancel))
    }
}
