//! Flat lookup tables built from the project model, plus the ancestor-walk queries over them.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use nova_project::{
    JdkDependency, LibraryId, ModuleId, OrderEntry, OrderRootType, ProjectModel, SdkId,
    SourceContentKind, SourceFolder, SourceRootKind,
};
use nova_vfs::{normalize_local_path, FileSystem};
use tokio_util::sync::CancellationToken;

use crate::config::IgnoredFiles;
use crate::error::{Result, RootIndexError};
use crate::pattern::PatternTable;
use crate::policy::{ExcludeCondition, Extensions, SyntheticLibrary};

/// Identity of something that produces library roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LibraryKey {
    Library(LibraryId),
    Sdk(SdkId),
    /// Index into the synthetic libraries collected during the build.
    Synthetic(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Under a module content root or a library root.
    InProject,
    /// Under a root but hidden by an exclusion (or owned by an unloaded module).
    Excluded,
    /// A path element is an ignored file name.
    Ignored,
    NotUnderRoots,
}

/// Everything the index knows about one file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryInfo {
    pub status: FileStatus,
    pub module: Option<ModuleId>,
    pub content_root: Option<PathBuf>,
    /// Root whose package prefix applies: a module source root or a library root.
    pub source_root: Option<PathBuf>,
    pub module_source_root: Option<PathBuf>,
    pub source_root_kind: Option<SourceRootKind>,
    pub source_content: Option<SourceContentKind>,
    pub library_class_root: Option<PathBuf>,
    pub library_source_root: Option<PathBuf>,
    /// Nearest content root, disregarding every exclusion.
    pub content_root_ignoring_exclusion: Option<(PathBuf, ModuleId)>,
    pub unloaded_module: Option<String>,
}

impl DirectoryInfo {
    fn with_status(status: FileStatus) -> Self {
        Self {
            status,
            module: None,
            content_root: None,
            source_root: None,
            module_source_root: None,
            source_root_kind: None,
            source_content: None,
            library_class_root: None,
            library_source_root: None,
            content_root_ignoring_exclusion: None,
            unloaded_module: None,
        }
    }

    pub fn is_in_project(&self) -> bool {
        self.status == FileStatus::InProject
    }

    pub fn is_in_module_source(&self) -> bool {
        self.module_source_root.is_some()
    }

    pub fn is_in_library(&self) -> bool {
        self.library_class_root.is_some() || self.library_source_root.is_some()
    }
}

/// Nearest library root of one kind with the producers that still claim the file.
#[derive(Clone)]
pub(crate) struct LibraryRootInfo {
    pub(crate) root: PathBuf,
    pub(crate) producers: Vec<LibraryKey>,
    conditions: Vec<ExcludeCondition>,
}

impl fmt::Debug for LibraryRootInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryRootInfo")
            .field("root", &self.root)
            .field("producers", &self.producers)
            .field("conditions", &self.conditions.len())
            .finish()
    }
}

impl LibraryRootInfo {
    /// `false` if an exclude condition rejects the file or a directory between it and the root.
    pub(crate) fn accepts(&self, file: &Path) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        !file
            .ancestors()
            .take_while(|path| *path != self.root)
            .any(|path| self.conditions.iter().any(|condition| condition(path)))
    }
}

#[derive(Clone, Copy)]
enum RootOwner<'a> {
    Module(&'a str),
    Library(&'a str),
    Sdk(&'a str),
    Provider(&'a str),
    Unloaded(&'a str),
}

impl fmt::Display for RootOwner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootOwner::Module(name) => write!(f, "module `{name}`"),
            RootOwner::Library(name) => write!(f, "library `{name}`"),
            RootOwner::Sdk(name) => write!(f, "sdk `{name}`"),
            RootOwner::Provider(name) => write!(f, "extension `{name}`"),
            RootOwner::Unloaded(name) => write!(f, "unloaded module `{name}`"),
        }
    }
}

pub(crate) struct RootInfo {
    all_roots: HashSet<PathBuf>,
    /// Every root the model declared, valid or not.
    declared_roots: HashSet<PathBuf>,
    content_root_of: HashMap<PathBuf, ModuleId>,
    source_root_of: HashMap<PathBuf, Vec<ModuleId>>,
    source_folders: HashMap<PathBuf, Vec<(ModuleId, SourceFolder)>>,
    excluded_from_module: HashMap<PathBuf, ModuleId>,
    excluded_from_project: HashSet<PathBuf>,
    excluded_from_libraries: HashMap<PathBuf, HashSet<LibraryKey>>,
    class_of_libraries: HashMap<PathBuf, IndexSet<LibraryKey>>,
    source_of_libraries: HashMap<PathBuf, IndexSet<LibraryKey>>,
    exclude_patterns: HashMap<PathBuf, PatternTable>,
    package_prefix: HashMap<PathBuf, String>,
    content_root_of_unloaded: HashMap<PathBuf, String>,
    synthetic: Vec<SyntheticLibrary>,
    ignored: IgnoredFiles,
    /// `None` for roots that have no package root (e.g. plain content roots).
    package_prefix_by_root: HashMap<PathBuf, Option<String>>,
}

struct RootInfoBuilder<'a> {
    fs: &'a dyn FileSystem,
    info: RootInfo,
}

impl RootInfoBuilder<'_> {
    /// Normalizes and validates a declared root. Invalid roots are reported and dropped.
    fn root(&mut self, raw: &Path, owner: RootOwner<'_>) -> Option<PathBuf> {
        let path = normalize_local_path(raw);
        self.info.declared_roots.insert(path.clone());

        if !path.is_absolute() {
            tracing::warn!(
                target = "nova.roots",
                root = %raw.display(),
                owner = %owner,
                "ignoring relative root"
            );
            return None;
        }
        if !self.fs.exists(&path) {
            tracing::warn!(
                target = "nova.roots",
                root = %path.display(),
                owner = %owner,
                "ignoring root that does not exist"
            );
            return None;
        }

        self.info.all_roots.insert(path.clone());
        Some(path)
    }

    fn library_roots(
        &mut self,
        key: LibraryKey,
        owner: RootOwner<'_>,
        class_roots: &[PathBuf],
        source_roots: &[PathBuf],
        excluded_roots: &[PathBuf],
    ) {
        for raw in class_roots {
            if let Some(root) = self.root(raw, owner) {
                self.info
                    .class_of_libraries
                    .entry(root.clone())
                    .or_default()
                    .insert(key);
                self.info.package_prefix.entry(root).or_default();
            }
        }
        for raw in source_roots {
            if let Some(root) = self.root(raw, owner) {
                self.info
                    .source_of_libraries
                    .entry(root.clone())
                    .or_default()
                    .insert(key);
                self.info.package_prefix.entry(root).or_default();
            }
        }
        for raw in excluded_roots {
            if let Some(root) = self.root(raw, owner) {
                self.info
                    .excluded_from_libraries
                    .entry(root)
                    .or_default()
                    .insert(key);
            }
        }
    }
}

impl RootInfo {
    pub(crate) fn build(
        model: &ProjectModel,
        fs: &dyn FileSystem,
        extensions: &Extensions,
        ignored: IgnoredFiles,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let mut b = RootInfoBuilder {
            fs,
            info: RootInfo {
                all_roots: HashSet::new(),
                declared_roots: HashSet::new(),
                content_root_of: HashMap::new(),
                source_root_of: HashMap::new(),
                source_folders: HashMap::new(),
                excluded_from_module: HashMap::new(),
                excluded_from_project: HashSet::new(),
                excluded_from_libraries: HashMap::new(),
                class_of_libraries: HashMap::new(),
                source_of_libraries: HashMap::new(),
                exclude_patterns: HashMap::new(),
                package_prefix: HashMap::new(),
                content_root_of_unloaded: HashMap::new(),
                synthetic: Vec::new(),
                ignored,
                package_prefix_by_root: HashMap::new(),
            },
        };

        let mut libraries: IndexSet<LibraryId> = IndexSet::new();
        let mut module_sdks: IndexSet<SdkId> = IndexSet::new();

        for module in model.modules() {
            if cancel.is_cancelled() {
                return Err(RootIndexError::Cancelled);
            }
            let owner = RootOwner::Module(&module.name);

            for entry in &module.root_model.content_entries {
                for excluded in &entry.exclude_folders {
                    if let Some(root) = b.root(excluded, owner) {
                        b.info.excluded_from_module.insert(root, module.id);
                    }
                }

                let Some(content_root) = b.root(&entry.root, owner) else {
                    continue;
                };
                b.info
                    .content_root_of
                    .entry(content_root.clone())
                    .or_insert(module.id);
                if !entry.exclude_patterns.is_empty()
                    && !b.info.exclude_patterns.contains_key(&content_root)
                {
                    if let Some(table) =
                        PatternTable::new(&content_root, &module.name, &entry.exclude_patterns)
                    {
                        b.info.exclude_patterns.insert(content_root.clone(), table);
                    }
                }

                for folder in &entry.source_folders {
                    let Some(root) = b.root(&folder.path, owner) else {
                        continue;
                    };
                    b.info
                        .source_root_of
                        .entry(root.clone())
                        .or_default()
                        .push(module.id);
                    b.info
                        .source_folders
                        .entry(root.clone())
                        .or_default()
                        .push((module.id, folder.clone()));
                    b.info
                        .package_prefix
                        .entry(root)
                        .or_insert_with(|| folder.package_prefix.clone());
                }
            }

            for entry in &module.root_model.order_entries {
                match entry {
                    OrderEntry::Library(dep) if model.library(dep.library).is_some() => {
                        libraries.insert(dep.library);
                    }
                    OrderEntry::Library(dep) => {
                        tracing::debug!(
                            target = "nova.roots",
                            module = %module.name,
                            library = dep.library.index(),
                            "skipping unresolved library entry"
                        );
                    }
                    OrderEntry::Jdk(JdkDependency::Explicit(sdk)) => {
                        module_sdks.insert(*sdk);
                    }
                    OrderEntry::Jdk(JdkDependency::Inherited) => {
                        if let Some(sdk) = model.project_sdk() {
                            module_sdks.insert(sdk);
                        }
                    }
                    OrderEntry::ModuleSource | OrderEntry::Module(_) => {}
                }
            }

            for policy in &extensions.exclude_policies {
                for raw in policy.excluded_roots_for_module(model, module) {
                    if let Some(root) = b.root(&raw, RootOwner::Provider(policy.name())) {
                        b.info.excluded_from_module.insert(root, module.id);
                    }
                }
            }
        }

        for id in libraries {
            if let Some(library) = model.library(id) {
                b.library_roots(
                    LibraryKey::Library(id),
                    RootOwner::Library(&library.name),
                    &library.class_roots,
                    &library.source_roots,
                    &library.excluded_roots,
                );
            }
        }

        let mut sdks = module_sdks.clone();
        if let Some(project_sdk) = model.project_sdk() {
            sdks.insert(project_sdk);
        }
        for id in &sdks {
            match model.sdk(*id) {
                Some(sdk) => b.library_roots(
                    LibraryKey::Sdk(*id),
                    RootOwner::Sdk(&sdk.name),
                    &sdk.class_roots,
                    &sdk.source_roots,
                    &[],
                ),
                None => tracing::debug!(
                    target = "nova.roots",
                    sdk = id.index(),
                    "skipping unresolved sdk"
                ),
            }
        }

        for policy in &extensions.exclude_policies {
            let owner = RootOwner::Provider(policy.name());
            for raw in policy.excluded_roots_for_project(model) {
                if let Some(root) = b.root(&raw, owner) {
                    b.info.excluded_from_project.insert(root);
                }
            }

            for id in &module_sdks {
                let Some(sdk) = model.sdk(*id) else {
                    continue;
                };
                let class_roots: HashSet<PathBuf> = sdk
                    .class_roots
                    .iter()
                    .map(|root| normalize_local_path(root))
                    .collect();
                for raw in policy.excluded_sdk_roots(sdk) {
                    if class_roots.contains(&normalize_local_path(&raw)) {
                        continue;
                    }
                    if let Some(root) = b.root(&raw, owner) {
                        b.info
                            .excluded_from_libraries
                            .entry(root)
                            .or_default()
                            .insert(LibraryKey::Sdk(*id));
                    }
                }
            }
        }

        for provider in &extensions.library_providers {
            if cancel.is_cancelled() {
                return Err(RootIndexError::Cancelled);
            }
            for library in provider.additional_project_libraries(model) {
                let key = LibraryKey::Synthetic(b.info.synthetic.len());
                b.library_roots(
                    key,
                    RootOwner::Provider(provider.name()),
                    &library.class_roots,
                    &library.source_roots,
                    &library.excluded_roots,
                );
                b.info.synthetic.push(library);
            }
        }

        for unloaded in model.unloaded_modules() {
            for raw in &unloaded.content_roots {
                if let Some(root) = b.root(raw, RootOwner::Unloaded(&unloaded.name)) {
                    b.info
                        .content_root_of_unloaded
                        .entry(root)
                        .or_insert_with(|| unloaded.name.clone());
                }
            }
        }

        let mut info = b.info;
        info.package_prefix_by_root = info.compute_package_prefixes();
        tracing::debug!(
            target = "nova.roots",
            roots = info.all_roots.len(),
            modules = info.content_root_of.len(),
            "built root info"
        );
        Ok(info)
    }

    fn compute_package_prefixes(&self) -> HashMap<PathBuf, Option<String>> {
        self.all_roots
            .iter()
            .map(|root| {
                let prefix = self
                    .hierarchy(root)
                    .and_then(|hierarchy| self.package_prefix_for(root, &hierarchy));
                (root.clone(), prefix)
            })
            .collect()
    }

    fn package_prefix_for(&self, file: &Path, hierarchy: &[PathBuf]) -> Option<String> {
        let content = self.find_nearest_content_root(hierarchy, file);
        let class_root = self.accepted_library_root(hierarchy, OrderRootType::Classes, file);
        let source_root = self.accepted_library_root(hierarchy, OrderRootType::Sources, file);
        let package_root = self.find_package_root(
            hierarchy,
            content.as_ref().map(|(root, module)| (root.as_path(), *module)),
            class_root.as_ref().map(|info| info.root.as_path()),
            source_root.as_ref().map(|info| info.root.as_path()),
        )?;

        let base = self
            .package_prefix
            .get(package_root)
            .cloned()
            .unwrap_or_default();
        let relative = file.strip_prefix(package_root).ok()?;
        Some(extend_package(base, relative))
    }

    pub(crate) fn root_count(&self) -> usize {
        self.all_roots.len()
    }

    pub(crate) fn contains_root(&self, path: &Path) -> bool {
        self.all_roots.contains(path)
    }

    pub(crate) fn is_ignored_name(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.ignored.is_ignored(name))
    }

    /// Whether creating or deleting `path` can change which roots are valid.
    pub(crate) fn is_root_or_root_ancestor(&self, path: &Path) -> bool {
        self.declared_roots.iter().any(|root| root.starts_with(path))
    }

    pub(crate) fn content_root_owner(&self, root: &Path) -> Option<ModuleId> {
        self.content_root_of.get(root).copied()
    }

    pub(crate) fn is_source_root(&self, root: &Path) -> bool {
        self.source_root_of.contains_key(root)
    }

    pub(crate) fn is_source_root_of(&self, root: &Path, module: ModuleId) -> bool {
        self.source_root_of
            .get(root)
            .is_some_and(|owners| owners.contains(&module))
    }

    pub(crate) fn package_prefix_of_root(&self, root: &Path) -> Option<&Option<String>> {
        self.package_prefix_by_root.get(root)
    }

    /// Roots with a package prefix, in a stable order.
    pub(crate) fn package_roots(&self) -> Vec<(&Path, &str)> {
        let mut roots: Vec<(&Path, &str)> = self
            .package_prefix_by_root
            .iter()
            .filter_map(|(root, prefix)| prefix.as_deref().map(|prefix| (root.as_path(), prefix)))
            .collect();
        roots.sort();
        roots
    }

    /// Recognized roots enclosing `file` (inclusive), nearest first.
    ///
    /// `None` if the walk crosses an ignored file name before reaching a content root.
    pub(crate) fn hierarchy(&self, file: &Path) -> Option<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut seen_content_root = false;
        for dir in file.ancestors() {
            if dir.as_os_str().is_empty() {
                break;
            }
            seen_content_root |= self.content_root_of.contains_key(dir);
            if !seen_content_root && self.is_ignored_name(dir) {
                return None;
            }
            if self.all_roots.contains(dir) {
                out.push(dir.to_path_buf());
            }
        }
        Some(out)
    }

    /// Nearest content root that claims `file`, with its module.
    ///
    /// An exclusion below the content root hides the file unless a source root of the same
    /// module sits between the file and the exclusion.
    pub(crate) fn find_nearest_content_root(
        &self,
        hierarchy: &[PathBuf],
        file: &Path,
    ) -> Option<(PathBuf, ModuleId)> {
        let mut source_owners: IndexSet<ModuleId> = IndexSet::new();
        let mut under_excluded = false;

        for root in hierarchy {
            let module = self.content_root_of.get(root).copied();
            let mut excluded_from = self.excluded_from_module.get(root).copied();

            if let Some(module) = module {
                if self
                    .exclude_patterns
                    .get(root)
                    .is_some_and(|table| table.excludes(file))
                {
                    excluded_from = Some(module);
                }
                if excluded_from != Some(module)
                    || (under_excluded && source_owners.contains(&module))
                {
                    return Some((root.clone(), module));
                }
            }

            if excluded_from.is_some()
                || self.excluded_from_project.contains(root)
                || self.content_root_of_unloaded.contains_key(root)
            {
                if source_owners.is_empty() {
                    return None;
                }
                under_excluded = true;
            }

            if !under_excluded {
                if let Some(owners) = self.source_root_of.get(root) {
                    source_owners.extend(owners.iter().copied());
                }
            }
        }
        None
    }

    /// Nearest root of `kind` belonging to a library that still claims the file.
    pub(crate) fn find_library_root_info(
        &self,
        hierarchy: &[PathBuf],
        kind: OrderRootType,
    ) -> Option<LibraryRootInfo> {
        let producers_of = match kind {
            OrderRootType::Classes => &self.class_of_libraries,
            OrderRootType::Sources => &self.source_of_libraries,
        };

        let mut ignored: HashSet<LibraryKey> = HashSet::new();
        for root in hierarchy {
            if let Some(excluded) = self.excluded_from_libraries.get(root) {
                ignored.extend(excluded.iter().copied());
            }
            let Some(producers) = producers_of.get(root) else {
                continue;
            };

            let mut survivors = Vec::new();
            let mut conditions = Vec::new();
            for key in producers {
                if ignored.contains(key) {
                    continue;
                }
                if let LibraryKey::Synthetic(index) = key {
                    if let Some(condition) = self
                        .synthetic
                        .get(*index)
                        .and_then(|library| library.exclude_condition.as_ref())
                    {
                        if condition(root) {
                            continue;
                        }
                        conditions.push(condition.clone());
                    }
                }
                survivors.push(*key);
            }

            if !survivors.is_empty() {
                return Some(LibraryRootInfo {
                    root: root.clone(),
                    producers: survivors,
                    conditions,
                });
            }
        }
        None
    }

    pub(crate) fn accepted_library_root(
        &self,
        hierarchy: &[PathBuf],
        kind: OrderRootType,
        file: &Path,
    ) -> Option<LibraryRootInfo> {
        self.find_library_root_info(hierarchy, kind)
            .filter(|info| info.accepts(file))
    }

    /// Root that determines the package of a file: a source root of the content root's module,
    /// or one of the given library roots.
    pub(crate) fn find_package_root<'h>(
        &self,
        hierarchy: &'h [PathBuf],
        content: Option<(&Path, ModuleId)>,
        library_class_root: Option<&Path>,
        library_source_root: Option<&Path>,
    ) -> Option<&'h Path> {
        for root in hierarchy {
            let root = root.as_path();
            if let Some((_, module)) = content {
                if library_source_root.is_none() && self.is_source_root_of(root, module) {
                    return Some(root);
                }
            }
            if Some(root) == library_class_root || Some(root) == library_source_root {
                return Some(root);
            }
            if let Some((content_root, _)) = content {
                if root == content_root
                    && !self.is_source_root(root)
                    && library_class_root.is_none()
                    && library_source_root.is_none()
                {
                    return None;
                }
            }
        }
        None
    }

    pub(crate) fn directory_info(&self, file: &Path) -> DirectoryInfo {
        let Some(hierarchy) = self.hierarchy(file) else {
            return DirectoryInfo::with_status(FileStatus::Ignored);
        };
        if hierarchy.is_empty() {
            return DirectoryInfo::with_status(FileStatus::NotUnderRoots);
        }

        let content = self.find_nearest_content_root(&hierarchy, file);
        let class_info = self.find_library_root_info(&hierarchy, OrderRootType::Classes);
        let source_info = self.find_library_root_info(&hierarchy, OrderRootType::Sources);
        let rejected = class_info
            .iter()
            .chain(source_info.iter())
            .any(|info| !info.accepts(file));
        let class_root = class_info
            .filter(|info| info.accepts(file))
            .map(|info| info.root);
        let source_root = source_info
            .filter(|info| info.accepts(file))
            .map(|info| info.root);

        let content_ref = content
            .as_ref()
            .map(|(root, module)| (root.as_path(), *module));
        let package_root = self
            .find_package_root(
                &hierarchy,
                content_ref,
                class_root.as_deref(),
                source_root.as_deref(),
            )
            .map(Path::to_path_buf);
        let module_source_root = self
            .find_package_root(&hierarchy, content_ref, None, None)
            .map(Path::to_path_buf);

        let folder = match (&module_source_root, &content) {
            (Some(root), Some((_, module))) => self
                .source_folders
                .get(root)
                .and_then(|folders| folders.iter().find(|(owner, _)| owner == module))
                .map(|(_, folder)| folder),
            _ => None,
        };

        let mut content_root_ignoring_exclusion = None;
        let mut unloaded_module = None;
        for root in &hierarchy {
            if let Some(module) = self.content_root_of.get(root) {
                content_root_ignoring_exclusion = Some((root.clone(), *module));
                break;
            }
            if let Some(name) = self.content_root_of_unloaded.get(root) {
                unloaded_module = Some(name.clone());
                break;
            }
        }

        let in_project = content.is_some() || class_root.is_some() || source_root.is_some();
        let status = if in_project {
            FileStatus::InProject
        } else if rejected
            || content_root_ignoring_exclusion.is_some()
            || unloaded_module.is_some()
            || hierarchy.iter().any(|root| {
                self.excluded_from_project.contains(root)
                    || self.excluded_from_module.contains_key(root)
                    || self.excluded_from_libraries.contains_key(root)
            })
        {
            FileStatus::Excluded
        } else {
            FileStatus::NotUnderRoots
        };

        DirectoryInfo {
            status,
            module: content.as_ref().map(|(_, module)| *module),
            content_root: content.map(|(root, _)| root),
            source_root: package_root,
            source_root_kind: folder.map(|folder| folder.kind),
            source_content: folder.map(|folder| folder.content),
            module_source_root,
            library_class_root: class_root,
            library_source_root: source_root,
            content_root_ignoring_exclusion,
            unloaded_module,
        }
    }
}

fn extend_package(base: String, relative: &Path) -> String {
    let mut out = base;
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(&name);
    }
    out
}

/// Package name of a child directory of a directory whose package is `parent`.
pub(crate) fn subdirectory_package(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}
