use std::path::{Path, PathBuf};

use crate::order::{JdkDependency, OrderEntry};
use crate::project::SdkId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceRootKind {
    Main,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceContentKind {
    Source,
    Resource,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFolder {
    pub path: PathBuf,
    pub kind: SourceRootKind,
    pub content: SourceContentKind,
    /// Package that the folder's root directory corresponds to (`""` for the default package).
    pub package_prefix: String,
}

impl SourceFolder {
    pub fn main(path: impl Into<PathBuf>) -> Self {
        Self::new(path, SourceRootKind::Main)
    }

    pub fn test(path: impl Into<PathBuf>) -> Self {
        Self::new(path, SourceRootKind::Test)
    }

    fn new(path: impl Into<PathBuf>, kind: SourceRootKind) -> Self {
        Self {
            path: path.into(),
            kind,
            content: SourceContentKind::Source,
            package_prefix: String::new(),
        }
    }

    pub fn resource(mut self) -> Self {
        self.content = SourceContentKind::Resource;
        self
    }

    pub fn with_package_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.package_prefix = prefix.into();
        self
    }

    pub fn is_test(&self) -> bool {
        self.kind == SourceRootKind::Test
    }
}

/// A content root plus everything declared inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub root: PathBuf,
    pub source_folders: Vec<SourceFolder>,
    pub exclude_folders: Vec<PathBuf>,
    /// File-name glob patterns (e.g. `*.txt`) excluded anywhere below `root`.
    pub exclude_patterns: Vec<String>,
}

impl ContentEntry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source_folders: Vec::new(),
            exclude_folders: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    pub fn add_source_folder(&mut self, folder: SourceFolder) -> &mut Self {
        self.source_folders.push(folder);
        self
    }

    pub fn add_exclude_folder(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.exclude_folders.push(path.into());
        self
    }

    pub fn add_exclude_pattern(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.exclude_patterns.push(pattern.into());
        self
    }
}

/// Compiler output directories of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutput {
    pub path: Option<PathBuf>,
    pub test_path: Option<PathBuf>,
    /// Whether the output directories are excluded from the module's content.
    pub excluded: bool,
}

impl Default for ModuleOutput {
    fn default() -> Self {
        Self {
            path: None,
            test_path: None,
            excluded: true,
        }
    }
}

/// Roots and dependencies of a single module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootModel {
    pub content_entries: Vec<ContentEntry>,
    /// Dependency entries in resolution order. A fresh model starts with the module's own
    /// sources ([`OrderEntry::ModuleSource`]).
    pub order_entries: Vec<OrderEntry>,
    pub output: ModuleOutput,
}

impl Default for RootModel {
    fn default() -> Self {
        Self {
            content_entries: Vec::new(),
            order_entries: vec![OrderEntry::ModuleSource],
            output: ModuleOutput::default(),
        }
    }
}

impl RootModel {
    pub fn add_content_entry(&mut self, root: impl Into<PathBuf>) -> &mut ContentEntry {
        self.content_entries.push(ContentEntry::new(root));
        let last = self.content_entries.len() - 1;
        &mut self.content_entries[last]
    }

    pub fn content_entry_mut(&mut self, root: &Path) -> Option<&mut ContentEntry> {
        self.content_entries.iter_mut().find(|entry| entry.root == root)
    }

    pub fn remove_content_entry(&mut self, root: &Path) -> bool {
        let before = self.content_entries.len();
        self.content_entries.retain(|entry| entry.root != root);
        before != self.content_entries.len()
    }

    pub fn add_dependency(&mut self, entry: impl Into<OrderEntry>) -> &mut Self {
        self.order_entries.push(entry.into());
        self
    }

    /// Replaces the module's SDK entry (or appends one) with the project SDK.
    pub fn inherit_sdk(&mut self) -> &mut Self {
        self.set_jdk(JdkDependency::Inherited)
    }

    pub fn set_sdk(&mut self, sdk: SdkId) -> &mut Self {
        self.set_jdk(JdkDependency::Explicit(sdk))
    }

    fn set_jdk(&mut self, jdk: JdkDependency) -> &mut Self {
        match self
            .order_entries
            .iter_mut()
            .find(|entry| matches!(entry, OrderEntry::Jdk(_)))
        {
            Some(entry) => *entry = OrderEntry::Jdk(jdk),
            None => self.order_entries.push(OrderEntry::Jdk(jdk)),
        }
        self
    }

    pub fn content_roots(&self) -> impl Iterator<Item = &Path> {
        self.content_entries.iter().map(|entry| entry.root.as_path())
    }

    pub fn source_folders(&self) -> impl Iterator<Item = &SourceFolder> {
        self.content_entries
            .iter()
            .flat_map(|entry| entry.source_folders.iter())
    }

    /// Names of modules this model depends on, in declaration order.
    pub fn dependency_module_names(&self) -> impl Iterator<Item = &str> {
        self.order_entries.iter().filter_map(|entry| match entry {
            OrderEntry::Module(dep) => Some(dep.module_name.as_str()),
            _ => None,
        })
    }
}
