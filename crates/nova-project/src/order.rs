use std::fmt;
use std::sync::Arc;

use crate::project::{LibraryId, Module, ModuleId, SdkId};

/// Where a dependency is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DependencyScope {
    #[default]
    Compile,
    Test,
    Runtime,
    Provided,
}

impl DependencyScope {
    pub fn is_for_production_compile(self) -> bool {
        matches!(self, Self::Compile | Self::Provided)
    }

    pub fn is_for_production_runtime(self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }

    pub fn is_for_test_compile(self) -> bool {
        matches!(self, Self::Compile | Self::Test | Self::Provided)
    }

    pub fn is_for_test_runtime(self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDependency {
    /// Target module, resolved by name so a dependency may point at a module that doesn't
    /// exist (yet) or is unloaded.
    pub module_name: String,
    pub exported: bool,
    pub scope: DependencyScope,
    /// Depend on the target's test sources/output instead of its production ones.
    pub production_on_test: bool,
}

impl ModuleDependency {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            exported: false,
            scope: DependencyScope::Compile,
            production_on_test: false,
        }
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    pub fn with_scope(mut self, scope: DependencyScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn production_on_test(mut self) -> Self {
        self.production_on_test = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryDependency {
    pub library: LibraryId,
    pub exported: bool,
    pub scope: DependencyScope,
}

impl LibraryDependency {
    pub fn new(library: LibraryId) -> Self {
        Self {
            library,
            exported: false,
            scope: DependencyScope::Compile,
        }
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    pub fn with_scope(mut self, scope: DependencyScope) -> Self {
        self.scope = scope;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdkDependency {
    /// Use the project SDK.
    Inherited,
    Explicit(SdkId),
}

/// One dependency entry of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderEntry {
    /// The module's own source roots.
    ModuleSource,
    Module(ModuleDependency),
    Library(LibraryDependency),
    Jdk(JdkDependency),
}

impl OrderEntry {
    /// Entries that carry an `exported` flag and a scope.
    pub fn is_exportable(&self) -> bool {
        matches!(self, OrderEntry::Module(_) | OrderEntry::Library(_))
    }

    pub fn is_exported(&self) -> bool {
        match self {
            OrderEntry::Module(dep) => dep.exported,
            OrderEntry::Library(dep) => dep.exported,
            OrderEntry::ModuleSource | OrderEntry::Jdk(_) => false,
        }
    }

    pub fn scope(&self) -> Option<DependencyScope> {
        match self {
            OrderEntry::Module(dep) => Some(dep.scope),
            OrderEntry::Library(dep) => Some(dep.scope),
            OrderEntry::ModuleSource | OrderEntry::Jdk(_) => None,
        }
    }
}

impl From<ModuleDependency> for OrderEntry {
    fn from(dep: ModuleDependency) -> Self {
        OrderEntry::Module(dep)
    }
}

impl From<LibraryDependency> for OrderEntry {
    fn from(dep: LibraryDependency) -> Self {
        OrderEntry::Library(dep)
    }
}

impl From<JdkDependency> for OrderEntry {
    fn from(dep: JdkDependency) -> Self {
        OrderEntry::Jdk(dep)
    }
}

impl fmt::Display for OrderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderEntry::ModuleSource => f.write_str("<module source>"),
            OrderEntry::Module(dep) => write!(f, "module {}", dep.module_name),
            OrderEntry::Library(dep) => write!(f, "library #{}", dep.library.index()),
            OrderEntry::Jdk(JdkDependency::Inherited) => f.write_str("<project sdk>"),
            OrderEntry::Jdk(JdkDependency::Explicit(sdk)) => write!(f, "sdk #{}", sdk.index()),
        }
    }
}

/// Borrowed view of an order entry together with the module that declares it.
#[derive(Debug, Clone, Copy)]
pub struct OrderEntryRef<'a> {
    pub module: &'a Module,
    pub index: usize,
    pub entry: &'a OrderEntry,
}

impl OrderEntryRef<'_> {
    pub fn to_handle(&self) -> OrderEntryHandle {
        OrderEntryHandle {
            owner: self.module.id,
            owner_name: self.module.name.clone(),
            index: self.index,
            entry: self.entry.clone(),
        }
    }
}

/// Owned identity of an order entry: owning module plus position in its order list.
///
/// Handles from the same module compare by position; lists spanning several modules are
/// sorted by [`OrderEntryHandle::owner_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderEntryHandle {
    pub owner: ModuleId,
    pub owner_name: Arc<str>,
    pub index: usize,
    pub entry: OrderEntry,
}

impl fmt::Display for OrderEntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.owner_name, self.entry)
    }
}
