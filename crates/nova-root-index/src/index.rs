use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use nova_project::{ModuleId, OrderEntryHandle, ProjectModel};
use nova_vfs::{normalize_local_path, FileSystem};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::SlruCache;
use crate::config::{IgnoredFiles, RootIndexConfig};
use crate::enumerator::OrderRootsCache;
use crate::error::Result;
use crate::graph::OrderEntryGraph;
use crate::policy::Extensions;
use crate::root_info::{subdirectory_package, DirectoryInfo, RootInfo};

/// One generation of the index: root tables for a single project model snapshot.
///
/// A `RootIndex` is never updated; structural changes produce a new generation.
pub struct RootIndex {
    model: Arc<ProjectModel>,
    fs: Arc<dyn FileSystem>,
    extensions: Arc<Extensions>,
    roots_cache: OrderRootsCache,
    info: RootInfo,
    graph: Mutex<Option<Arc<OrderEntryGraph>>>,
    capacity: NonZeroUsize,
    info_cache: SlruCache<PathBuf, Arc<DirectoryInfo>>,
    package_cache: SlruCache<PathBuf, Option<Arc<str>>>,
}

impl RootIndex {
    pub(crate) fn build(
        model: Arc<ProjectModel>,
        fs: Arc<dyn FileSystem>,
        extensions: Arc<Extensions>,
        config: &RootIndexConfig,
        ignored: IgnoredFiles,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let info = RootInfo::build(&model, fs.as_ref(), &extensions, ignored, cancel)?;
        let capacity = config.cache_capacity(info.root_count());
        Ok(Self {
            model,
            fs,
            extensions,
            roots_cache: OrderRootsCache::new(),
            info,
            graph: Mutex::new(None),
            capacity,
            info_cache: SlruCache::new(capacity),
            package_cache: SlruCache::new(capacity),
        })
    }

    /// The model snapshot this generation was built from.
    pub fn model(&self) -> &ProjectModel {
        &self.model
    }

    /// Enumerator roots memoized for this generation only.
    pub fn roots_cache(&self) -> &OrderRootsCache {
        &self.roots_cache
    }

    pub(crate) fn root_info(&self) -> &RootInfo {
        &self.info
    }

    pub fn root_count(&self) -> usize {
        self.info.root_count()
    }

    pub fn is_root(&self, path: &Path) -> bool {
        self.info.contains_root(&normalize_local_path(path))
    }

    fn graph(&self, cancel: &CancellationToken) -> Result<Arc<OrderEntryGraph>> {
        let mut slot = self.graph.lock();
        if let Some(graph) = slot.as_ref() {
            return Ok(graph.clone());
        }
        let graph = Arc::new(OrderEntryGraph::build(
            &self.model,
            &self.extensions.enumeration_handlers,
            &self.roots_cache,
            cancel,
            self.capacity,
        )?);
        *slot = Some(graph.clone());
        Ok(graph)
    }

    pub fn info_for_file(&self, file: &Path) -> Arc<DirectoryInfo> {
        let file = normalize_local_path(file);
        if let Some(info) = self.info_cache.get(&file) {
            return info;
        }
        let info = Arc::new(self.info.directory_info(&file));
        self.info_cache.put(file, info.clone());
        info
    }

    /// Order entries through which `file` is visible, sorted by owning module name.
    ///
    /// Files that are excluded, ignored or outside every root have none. For the others the
    /// answer is the one of their nearest root.
    pub fn order_entries(
        &self,
        file: &Path,
        cancel: &CancellationToken,
    ) -> Result<Arc<[OrderEntryHandle]>> {
        let file = normalize_local_path(file);
        if !self.info_for_file(&file).is_in_project() {
            return Ok(Arc::from(Vec::new()));
        }
        let graph = self.graph(cancel)?;
        graph.order_entries(&self.model, &self.info, &file, cancel)
    }

    pub fn dependent_unloaded_modules(
        &self,
        module: ModuleId,
        cancel: &CancellationToken,
    ) -> Result<Arc<BTreeSet<String>>> {
        self.graph(cancel)?.dependent_unloaded_modules(module, cancel)
    }

    /// Package of a directory, derived from the nearest root with a known package prefix.
    ///
    /// `None` for files, ignored directories and directories outside any package root.
    pub fn package_name(&self, dir: &Path) -> Option<Arc<str>> {
        let dir = normalize_local_path(dir);
        if let Some(package) = self.package_cache.get(&dir) {
            return package;
        }
        let package = self.compute_package_name(&dir).map(Arc::from);
        self.package_cache.put(dir, package.clone());
        package
    }

    fn compute_package_name(&self, dir: &Path) -> Option<String> {
        if !self.fs.is_dir(dir) {
            return None;
        }
        self.info.hierarchy(dir)?;

        let mut names: Vec<String> = Vec::new();
        let mut current = dir;
        loop {
            if let Some(prefix) = self.info.package_prefix_of_root(current) {
                let mut package = prefix.clone()?;
                for name in names.iter().rev() {
                    package = subdirectory_package(&package, name.as_str());
                }
                return Some(package);
            }
            names.push(current.file_name()?.to_string_lossy().into_owned());
            current = current.parent()?;
        }
    }

    /// Directories whose package is `package`, sorted by path.
    ///
    /// Directories that are only library sources are skipped unless `include_library_sources`.
    pub fn directories_by_package_name(
        &self,
        package: &str,
        include_library_sources: bool,
    ) -> Vec<PathBuf> {
        let mut candidates = IndexSet::new();
        for (root, prefix) in self.info.package_roots() {
            let rest = if prefix.is_empty() {
                Some(package)
            } else if package == prefix {
                Some("")
            } else {
                package
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('.'))
            };
            if let Some(rest) = rest {
                self.descend(root, rest, &mut candidates);
            }
        }

        let mut out: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|dir| {
                let info = self.info_for_file(dir);
                let library_sources_only = info.library_source_root.is_some()
                    && !info.is_in_module_source()
                    && info.library_class_root.is_none();
                info.is_in_project()
                    && (include_library_sources || !library_sources_only)
                    && self.package_name(dir).as_deref() == Some(package)
            })
            .collect();
        out.sort();
        out
    }

    fn descend(&self, dir: &Path, rest: &str, out: &mut IndexSet<PathBuf>) {
        if !self.fs.is_dir(dir) {
            return;
        }
        if rest.is_empty() {
            out.insert(dir.to_path_buf());
            return;
        }

        let children = match self.fs.read_dir(dir) {
            Ok(children) => children,
            Err(err) => {
                tracing::debug!(
                    target = "nova.roots",
                    dir = %dir.display(),
                    error = %err,
                    "failed to list directory"
                );
                return;
            }
        };
        for child in children {
            let Some(name) = child.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if rest == name {
                self.descend(&child, "", out);
            } else if let Some(remaining) = rest
                .strip_prefix(name)
                .and_then(|remaining| remaining.strip_prefix('.'))
            {
                self.descend(&child, remaining, out);
            }
        }
    }
}
