use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::library::{Library, Sdk};
use crate::model::RootModel;
use crate::order::{ModuleDependency, OrderEntry, OrderEntryRef};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            pub fn index(self) -> u32 {
                self.0
            }
        }
    };
}

arena_id!(
    /// Stable identity of a module inside one [`ProjectModel`]. Ids are never reused.
    ModuleId
);
arena_id!(LibraryId);
arena_id!(SdkId);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectModelError {
    #[error("module `{0}` already exists")]
    DuplicateModule(String),
    #[error("unknown module {0:?}")]
    UnknownModule(ModuleId),
    #[error("unknown module `{0}`")]
    UnknownModuleName(String),
    #[error("unknown library {0:?}")]
    UnknownLibrary(LibraryId),
    #[error("unknown sdk {0:?}")]
    UnknownSdk(SdkId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: ModuleId,
    pub name: Arc<str>,
    pub root_model: Arc<RootModel>,
}

impl Module {
    pub fn order_entries(&self) -> impl Iterator<Item = OrderEntryRef<'_>> {
        self.root_model
            .order_entries
            .iter()
            .enumerate()
            .map(move |(index, entry)| OrderEntryRef {
                module: self,
                index,
                entry,
            })
    }
}

/// A module known by name only: its roots are still claimed, but it takes no part in
/// dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnloadedModuleDescription {
    pub name: String,
    pub content_roots: Vec<PathBuf>,
    pub dependency_module_names: Vec<String>,
}

/// Snapshot of every module, library and SDK of a project.
///
/// Cloning is cheap (module and library payloads are shared); mutating a clone never affects
/// the snapshot it was cloned from.
#[derive(Debug, Clone, Default)]
pub struct ProjectModel {
    modules: BTreeMap<ModuleId, Arc<Module>>,
    libraries: BTreeMap<LibraryId, Arc<Library>>,
    sdks: BTreeMap<SdkId, Arc<Sdk>>,
    project_sdk: Option<SdkId>,
    project_output: Option<PathBuf>,
    unloaded: Vec<UnloadedModuleDescription>,
    next_id: u32,
    modification_count: u64,
}

impl ProjectModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped by every mutation.
    pub fn modification_count(&self) -> u64 {
        self.modification_count
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn touch(&mut self) {
        self.modification_count += 1;
    }

    pub fn new_module(&mut self, name: &str) -> Result<ModuleId, ProjectModelError> {
        if self.module_by_name(name).is_some() || self.unloaded_module(name).is_some() {
            return Err(ProjectModelError::DuplicateModule(name.to_string()));
        }
        let id = ModuleId(self.alloc_id());
        self.modules.insert(
            id,
            Arc::new(Module {
                id,
                name: Arc::from(name),
                root_model: Arc::new(RootModel::default()),
            }),
        );
        self.touch();
        Ok(id)
    }

    pub fn remove_module(&mut self, id: ModuleId) -> Result<(), ProjectModelError> {
        self.modules
            .remove(&id)
            .ok_or(ProjectModelError::UnknownModule(id))?;
        self.touch();
        Ok(())
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id).map(|module| module.as_ref())
    }

    pub fn module_by_name(&self, name: &str) -> Option<&Module> {
        self.modules
            .values()
            .find(|module| &*module.name == name)
            .map(|module| module.as_ref())
    }

    /// Loaded modules in creation order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values().map(|module| module.as_ref())
    }

    pub fn root_model(&self, id: ModuleId) -> Option<&RootModel> {
        self.module(id).map(|module| module.root_model.as_ref())
    }

    /// Applies `f` to a copy of the module's root model and commits the result.
    pub fn update_root_model<R>(
        &mut self,
        id: ModuleId,
        f: impl FnOnce(&mut RootModel) -> R,
    ) -> Result<R, ProjectModelError> {
        let module = self
            .modules
            .get_mut(&id)
            .ok_or(ProjectModelError::UnknownModule(id))?;
        let module = Arc::make_mut(module);
        let out = f(Arc::make_mut(&mut module.root_model));
        self.touch();
        Ok(out)
    }

    /// Resolves a module dependency against the loaded modules.
    pub fn resolve_dependency(&self, dep: &ModuleDependency) -> Option<&Module> {
        self.module_by_name(&dep.module_name)
    }

    pub fn add_library(&mut self, library: Library) -> LibraryId {
        let id = LibraryId(self.alloc_id());
        self.libraries.insert(id, Arc::new(library));
        self.touch();
        id
    }

    pub fn library(&self, id: LibraryId) -> Option<&Library> {
        self.libraries.get(&id).map(|library| library.as_ref())
    }

    pub fn libraries(&self) -> impl Iterator<Item = (LibraryId, &Library)> {
        self.libraries.iter().map(|(id, library)| (*id, library.as_ref()))
    }

    pub fn update_library<R>(
        &mut self,
        id: LibraryId,
        f: impl FnOnce(&mut Library) -> R,
    ) -> Result<R, ProjectModelError> {
        let library = self
            .libraries
            .get_mut(&id)
            .ok_or(ProjectModelError::UnknownLibrary(id))?;
        let out = f(Arc::make_mut(library));
        self.touch();
        Ok(out)
    }

    /// Removes the library. Order entries pointing at it become unresolvable and are skipped.
    pub fn remove_library(&mut self, id: LibraryId) -> Result<(), ProjectModelError> {
        self.libraries
            .remove(&id)
            .ok_or(ProjectModelError::UnknownLibrary(id))?;
        self.touch();
        Ok(())
    }

    pub fn add_sdk(&mut self, sdk: Sdk) -> SdkId {
        let id = SdkId(self.alloc_id());
        self.sdks.insert(id, Arc::new(sdk));
        self.touch();
        id
    }

    pub fn sdk(&self, id: SdkId) -> Option<&Sdk> {
        self.sdks.get(&id).map(|sdk| sdk.as_ref())
    }

    pub fn project_sdk(&self) -> Option<SdkId> {
        self.project_sdk
    }

    pub fn set_project_sdk(&mut self, sdk: Option<SdkId>) -> Result<(), ProjectModelError> {
        if let Some(id) = sdk {
            if !self.sdks.contains_key(&id) {
                return Err(ProjectModelError::UnknownSdk(id));
            }
        }
        self.project_sdk = sdk;
        self.touch();
        Ok(())
    }

    pub fn project_output(&self) -> Option<&Path> {
        self.project_output.as_deref()
    }

    pub fn set_project_output(&mut self, path: Option<PathBuf>) {
        self.project_output = path;
        self.touch();
    }

    pub fn unloaded_modules(&self) -> &[UnloadedModuleDescription] {
        &self.unloaded
    }

    pub fn unloaded_module(&self, name: &str) -> Option<&UnloadedModuleDescription> {
        self.unloaded.iter().find(|module| module.name == name)
    }

    /// Unloads a loaded module, keeping only its name, content roots and dependency names.
    pub fn unload_module(&mut self, name: &str) -> Result<(), ProjectModelError> {
        let id = self
            .module_by_name(name)
            .map(|module| module.id)
            .ok_or_else(|| ProjectModelError::UnknownModuleName(name.to_string()))?;
        let module = self
            .modules
            .remove(&id)
            .ok_or(ProjectModelError::UnknownModule(id))?;
        let model = &module.root_model;
        self.unloaded.push(UnloadedModuleDescription {
            name: name.to_string(),
            content_roots: model.content_roots().map(Path::to_path_buf).collect(),
            dependency_module_names: model
                .dependency_module_names()
                .map(str::to_string)
                .collect(),
        });
        tracing::debug!(target = "nova.project", module = name, "unloaded module");
        self.touch();
        Ok(())
    }

    /// Registers a module that was never loaded in this session.
    pub fn add_unloaded_module(
        &mut self,
        description: UnloadedModuleDescription,
    ) -> Result<(), ProjectModelError> {
        if self.module_by_name(&description.name).is_some()
            || self.unloaded_module(&description.name).is_some()
        {
            return Err(ProjectModelError::DuplicateModule(description.name));
        }
        self.unloaded.push(description);
        self.touch();
        Ok(())
    }

    /// Modules ordered so that every module comes after the modules it depends on.
    ///
    /// Cycles are broken at the first edge that closes them; otherwise creation order is kept.
    pub fn sorted_modules(&self) -> Vec<ModuleId> {
        let by_name: HashMap<&str, ModuleId> = self
            .modules
            .values()
            .map(|module| (&*module.name, module.id))
            .collect();

        let mut out = Vec::with_capacity(self.modules.len());
        let mut visited = HashSet::new();
        for id in self.modules.keys() {
            self.visit_sorted(*id, &by_name, &mut visited, &mut out);
        }
        out
    }

    fn visit_sorted(
        &self,
        id: ModuleId,
        by_name: &HashMap<&str, ModuleId>,
        visited: &mut HashSet<ModuleId>,
        out: &mut Vec<ModuleId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let Some(module) = self.modules.get(&id) else {
            return;
        };
        for entry in &module.root_model.order_entries {
            if let OrderEntry::Module(dep) = entry {
                if let Some(target) = by_name.get(dep.module_name.as_str()) {
                    self.visit_sorted(*target, by_name, visited, out);
                }
            }
        }
        out.push(id);
    }
}
