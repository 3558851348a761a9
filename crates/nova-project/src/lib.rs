//! Project root model for Nova.
//!
//! This crate holds the declarative description of a project that the root index is built
//! from:
//! - modules with their content roots, source folders and exclusions
//! - ordered dependency ("order") entries per module
//! - libraries, SDKs and unloaded module descriptions
//!
//! [`ProjectModel`] is a value: mutations produce a new snapshot that can be published
//! atomically by the host.

mod library;
mod model;
mod order;
mod project;

pub use library::{Library, OrderRootType, Sdk};
pub use model::{
    ContentEntry, ModuleOutput, RootModel, SourceContentKind, SourceFolder, SourceRootKind,
};
pub use order::{
    DependencyScope, JdkDependency, LibraryDependency, ModuleDependency, OrderEntry,
    OrderEntryHandle, OrderEntryRef,
};
pub use project::{
    LibraryId, Module, ModuleId, ProjectModel, ProjectModelError, SdkId,
    UnloadedModuleDescription,
};
