use std::collections::{BTreeSet, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use nova_project::{
    JdkDependency, ModuleId, OrderEntry, OrderEntryHandle, OrderRootType, ProjectModel,
};
use nova_vfs::normalize_local_path;
use tokio_util::sync::CancellationToken;

use crate::cache::SlruCache;
use crate::enumerator::{OrderEnumerator, OrderRootsCache};
use crate::error::{Result, RootIndexError};
use crate::policy::OrderEnumerationHandler;
use crate::root_info::{LibraryKey, LibraryRootInfo, RootInfo};

#[derive(Debug)]
struct Edge {
    /// Module declaring the entry.
    source: ModuleId,
    entry: OrderEntryHandle,
    /// Whether modules depending on `source` also see the target through this entry.
    recursive: bool,
}

#[derive(Debug, Default)]
struct Node {
    edges: Vec<Edge>,
    unloaded_dependents: BTreeSet<String>,
}

type LibraryRootEntries = HashMap<PathBuf, Vec<(LibraryKey, OrderEntryHandle)>>;

/// Reverse dependency graph: for every module that something depends on, the entries that
/// point at it, keyed by the roots the module exposes to its dependents.
#[derive(Debug)]
pub struct OrderEntryGraph {
    nodes: HashMap<ModuleId, Node>,
    roots: HashMap<PathBuf, Vec<ModuleId>>,
    lib_class_root_entries: LibraryRootEntries,
    lib_source_root_entries: LibraryRootEntries,
    entries_cache: SlruCache<PathBuf, Arc<[OrderEntryHandle]>>,
    unloaded_cache: SlruCache<ModuleId, Arc<BTreeSet<String>>>,
}

struct GraphBuilder<'a> {
    model: &'a ProjectModel,
    handlers: &'a [Arc<dyn OrderEnumerationHandler>],
    roots_cache: &'a OrderRootsCache,
    cancel: &'a CancellationToken,
    nodes: HashMap<ModuleId, Node>,
    roots: HashMap<PathBuf, Vec<ModuleId>>,
}

impl GraphBuilder<'_> {
    fn node(&mut self, target: ModuleId) -> Result<&mut Node> {
        if !self.nodes.contains_key(&target) {
            for kind in [OrderRootType::Classes, OrderRootType::Sources] {
                let exposed = OrderEnumerator::module(self.model, target)
                    .exported_only()
                    .recursively()
                    .with_handlers(self.handlers)
                    .with_cache(self.roots_cache)
                    .with_cancellation(self.cancel)
                    .roots(kind)
                    .using_cache()?
                    .roots()?;
                for root in exposed {
                    let owners = self.roots.entry(root).or_default();
                    if !owners.contains(&target) {
                        owners.push(target);
                    }
                }
            }
        }
        Ok(self.nodes.entry(target).or_default())
    }
}

impl OrderEntryGraph {
    pub(crate) fn build(
        model: &ProjectModel,
        handlers: &[Arc<dyn OrderEnumerationHandler>],
        roots_cache: &OrderRootsCache,
        cancel: &CancellationToken,
        capacity: NonZeroUsize,
    ) -> Result<Self> {
        let mut builder = GraphBuilder {
            model,
            handlers,
            roots_cache,
            cancel,
            nodes: HashMap::new(),
            roots: HashMap::new(),
        };
        let mut lib_class_root_entries = LibraryRootEntries::new();
        let mut lib_source_root_entries = LibraryRootEntries::new();

        for module in model.modules() {
            if cancel.is_cancelled() {
                return Err(RootIndexError::Cancelled);
            }
            for entry in module.order_entries() {
                let producer = match entry.entry {
                    OrderEntry::Module(dep) => {
                        let Some(target) = model.resolve_dependency(dep) else {
                            continue;
                        };
                        let recursive = OrderEnumerator::module(model, target.id)
                            .exported_only()
                            .recursively()
                            .with_handlers(handlers)
                            .should_recurse(&entry);
                        builder.node(target.id)?.edges.push(Edge {
                            source: module.id,
                            entry: entry.to_handle(),
                            recursive,
                        });
                        continue;
                    }
                    OrderEntry::Library(dep) => model
                        .library(dep.library)
                        .map(|library| {
                            (
                                LibraryKey::Library(dep.library),
                                library.class_roots.as_slice(),
                                library.source_roots.as_slice(),
                            )
                        }),
                    OrderEntry::Jdk(jdk) => {
                        let id = match jdk {
                            JdkDependency::Explicit(id) => Some(*id),
                            JdkDependency::Inherited => model.project_sdk(),
                        };
                        id.and_then(|id| {
                            model.sdk(id).map(|sdk| {
                                (
                                    LibraryKey::Sdk(id),
                                    sdk.class_roots.as_slice(),
                                    sdk.source_roots.as_slice(),
                                )
                            })
                        })
                    }
                    OrderEntry::ModuleSource => None,
                };

                if let Some((key, class_roots, source_roots)) = producer {
                    let handle = entry.to_handle();
                    for root in class_roots {
                        lib_class_root_entries
                            .entry(normalize_local_path(root))
                            .or_default()
                            .push((key, handle.clone()));
                    }
                    for root in source_roots {
                        lib_source_root_entries
                            .entry(normalize_local_path(root))
                            .or_default()
                            .push((key, handle.clone()));
                    }
                }
            }
        }

        for unloaded in model.unloaded_modules() {
            for name in &unloaded.dependency_module_names {
                if let Some(target) = model.module_by_name(name) {
                    builder
                        .node(target.id)?
                        .unloaded_dependents
                        .insert(unloaded.name.clone());
                }
            }
        }

        tracing::debug!(
            target = "nova.roots",
            nodes = builder.nodes.len(),
            roots = builder.roots.len(),
            "built order entry graph"
        );

        Ok(Self {
            nodes: builder.nodes,
            roots: builder.roots,
            lib_class_root_entries,
            lib_source_root_entries,
            entries_cache: SlruCache::new(capacity),
            unloaded_cache: SlruCache::new(capacity),
        })
    }

    /// Order entries of the nearest root above `file`, sorted by owning module.
    ///
    /// The answer depends on that root alone, so it is memoized per root. Callers filter out
    /// files excluded below the root.
    pub(crate) fn order_entries(
        &self,
        model: &ProjectModel,
        info: &RootInfo,
        file: &Path,
        cancel: &CancellationToken,
    ) -> Result<Arc<[OrderEntryHandle]>> {
        let hierarchy = match info.hierarchy(file) {
            Some(hierarchy) if !hierarchy.is_empty() => hierarchy,
            _ => return Ok(Arc::from(Vec::new())),
        };

        let key = hierarchy[0].clone();
        self.entries_cache.get_or_try_insert(&key, || {
            self.collect_order_entries(model, info, &hierarchy, cancel)
                .map(Arc::from)
        })
    }

    fn collect_order_entries(
        &self,
        model: &ProjectModel,
        info: &RootInfo,
        hierarchy: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<Vec<OrderEntryHandle>> {
        let root = hierarchy[0].as_path();
        let mut stack: Vec<ModuleId> = hierarchy
            .iter()
            .filter_map(|root| self.roots.get(root))
            .flatten()
            .copied()
            .collect();

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        while let Some(id) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(RootIndexError::Cancelled);
            }
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for edge in &node.edges {
                result.push(edge.entry.clone());
                if edge.recursive && self.nodes.contains_key(&edge.source) {
                    stack.push(edge.source);
                }
            }
        }

        let class_info = info.accepted_library_root(hierarchy, OrderRootType::Classes, root);
        let source_info = info.accepted_library_root(hierarchy, OrderRootType::Sources, root);
        result.extend(self.library_order_entries(
            info,
            hierarchy,
            class_info.as_ref(),
            source_info.as_ref(),
        ));

        if let Some((_, module)) = info.find_nearest_content_root(hierarchy, root) {
            result.extend(self.module_source_entry(model, info, hierarchy, module));
        }

        result.sort_by(|a, b| {
            a.owner_name
                .cmp(&b.owner_name)
                .then_with(|| a.index.cmp(&b.index))
        });
        Ok(result)
    }

    fn library_order_entries(
        &self,
        info: &RootInfo,
        hierarchy: &[PathBuf],
        class_info: Option<&LibraryRootInfo>,
        source_info: Option<&LibraryRootInfo>,
    ) -> IndexSet<OrderEntryHandle> {
        fn claimed<'e>(
            entries: &'e LibraryRootEntries,
            info: &'e LibraryRootInfo,
        ) -> impl Iterator<Item = OrderEntryHandle> + 'e {
            entries
                .get(&info.root)
                .into_iter()
                .flatten()
                .filter(|(key, _)| info.producers.contains(key))
                .map(|(_, handle)| handle.clone())
        }

        let mut out = IndexSet::new();
        if class_info.is_none() && source_info.is_none() {
            return out;
        }

        for root in hierarchy {
            if let Some(class_info) = class_info {
                if class_info.root == *root && !info.is_source_root(root) {
                    out.extend(claimed(&self.lib_class_root_entries, class_info));
                }
            }
            if let Some(source_info) = source_info {
                if source_info.root == *root && class_info.is_none() {
                    out.extend(claimed(&self.lib_source_root_entries, source_info));
                }
            }
            if self.lib_class_root_entries.contains_key(root)
                || (info.is_source_root(root) && source_info.is_none())
            {
                break;
            }
        }
        out
    }

    /// The content root module's own entry, if the file is inside one of its source roots.
    fn module_source_entry(
        &self,
        model: &ProjectModel,
        info: &RootInfo,
        hierarchy: &[PathBuf],
        module: ModuleId,
    ) -> Option<OrderEntryHandle> {
        for root in hierarchy {
            if info.is_source_root_of(root, module) {
                return model.module(module)?.order_entries().find_map(|entry| {
                    matches!(entry.entry, OrderEntry::ModuleSource).then(|| entry.to_handle())
                });
            }
            if self.lib_class_root_entries.contains_key(root) {
                return None;
            }
        }
        None
    }

    /// Names of unloaded modules that depend on `module`, directly or through exported entries.
    pub(crate) fn dependent_unloaded_modules(
        &self,
        module: ModuleId,
        cancel: &CancellationToken,
    ) -> Result<Arc<BTreeSet<String>>> {
        self.unloaded_cache.get_or_try_insert(&module, || {
            let mut result = BTreeSet::new();
            if !self.nodes.contains_key(&module) {
                return Ok(Arc::new(result));
            }

            let mut stack = vec![module];
            let mut seen = HashSet::new();
            while let Some(id) = stack.pop() {
                if cancel.is_cancelled() {
                    return Err(RootIndexError::Cancelled);
                }
                if !seen.insert(id) {
                    continue;
                }
                let Some(node) = self.nodes.get(&id) else {
                    continue;
                };
                result.extend(node.unloaded_dependents.iter().cloned());
                for edge in &node.edges {
                    if edge.recursive && self.nodes.contains_key(&edge.source) {
                        stack.push(edge.source);
                    }
                }
            }
            Ok(Arc::new(result))
        })
    }
}
