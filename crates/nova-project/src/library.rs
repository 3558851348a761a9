use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderRootType {
    /// Compiled classes (directories or jars).
    Classes,
    Sources,
}

/// A named set of class and source roots shared between modules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Library {
    pub name: String,
    pub class_roots: Vec<PathBuf>,
    pub source_roots: Vec<PathBuf>,
    /// Roots below the library roots that must not be considered part of the library.
    pub excluded_roots: Vec<PathBuf>,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_class_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.class_roots.push(root.into());
        self
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_roots.push(root.into());
        self
    }

    pub fn with_excluded_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.excluded_roots.push(root.into());
        self
    }

    pub fn roots(&self, kind: OrderRootType) -> &[PathBuf] {
        match kind {
            OrderRootType::Classes => &self.class_roots,
            OrderRootType::Sources => &self.source_roots,
        }
    }
}

/// A JDK (or other platform SDK).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sdk {
    pub name: String,
    pub class_roots: Vec<PathBuf>,
    pub source_roots: Vec<PathBuf>,
}

impl Sdk {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_class_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.class_roots.push(root.into());
        self
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_roots.push(root.into());
        self
    }

    pub fn roots(&self, kind: OrderRootType) -> &[PathBuf] {
        match kind {
            OrderRootType::Classes => &self.class_roots,
            OrderRootType::Sources => &self.source_roots,
        }
    }
}
