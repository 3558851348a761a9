use std::path::PathBuf;

use nova_project::{ModuleId, ProjectModelError};
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T, E = RootIndexError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RootIndexError {
    #[error("operation was cancelled")]
    Cancelled,
    #[error("project is disposed")]
    Disposed,
    #[error("project roots were changed from inside a roots-changed notification")]
    NestedRootsChange,
    #[error("{} is not under {}", .file.display(), .root.display())]
    FileOutsideRoot { file: PathBuf, root: PathBuf },
    #[error("cannot cache roots of an enumerator that uses {0}")]
    UncacheableEnumerator(&'static str),
    #[error("unknown module {0:?}")]
    UnknownModule(ModuleId),
    #[error(transparent)]
    Model(#[from] ProjectModelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
