//! Directory index for Nova projects.
//!
//! Given a [`nova_project::ProjectModel`], this crate answers, for any file or directory:
//! - which module owns it, whether it is excluded, ignored, a source or a library file
//! - through which order entries it is visible to other modules
//! - which package a directory represents
//!
//! The index is computed lazily as a [`RootIndex`] generation and dropped whenever the
//! project's roots change. [`OrderEnumerator`] is the reusable dependency traversal the
//! index is built on.

mod cache;
mod config;
mod directory_index;
mod enumerator;
mod error;
mod file_index;
mod graph;
mod index;
mod pattern;
mod policy;
mod project;
mod root_info;

pub use config::{ConfigError, IgnoredFiles, RootIndexConfig, DEFAULT_IGNORED_FILES};
pub use directory_index::DirectoryIndex;
pub use enumerator::{
    EnumerationTarget, OrderEnumerator, OrderRootsCache, OrderRootsEnumerator, RootModelProvider,
};
pub use error::{Result, RootIndexError};
pub use file_index::ProjectFileIndex;
pub use index::RootIndex;
pub use policy::{
    AddDependencyType, AdditionalLibraryRootsProvider, CompilerOutputExcludePolicy,
    DirectoryIndexExcludePolicy, ExcludeCondition, Extensions, OrderEnumerationHandler,
    SyntheticLibrary,
};
pub use project::{Project, ProjectRead, RootsChangeListener};
pub use root_info::{DirectoryInfo, FileStatus, LibraryKey};
