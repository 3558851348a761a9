//! Pluggable contributors to the root index.
//!
//! Hosts register implementations through [`Extensions`]; the index queries them on every
//! rebuild.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nova_project::{Module, OrderEntry, ProjectModel, Sdk};

/// Contributes excluded roots that are not declared in the root model.
pub trait DirectoryIndexExcludePolicy: Send + Sync {
    /// Used in diagnostics about invalid roots.
    fn name(&self) -> &str;

    fn excluded_roots_for_project(&self, _model: &ProjectModel) -> Vec<PathBuf> {
        Vec::new()
    }

    fn excluded_roots_for_module(&self, _model: &ProjectModel, _module: &Module) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Roots of `sdk` that should not be treated as part of it.
    fn excluded_sdk_roots(&self, _sdk: &Sdk) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Excludes compiler output directories.
///
/// The project output directory is excluded from the project when it lies outside every
/// content root, and from the innermost module owning it otherwise. Module output directories
/// are excluded from their module when [`nova_project::ModuleOutput::excluded`] is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompilerOutputExcludePolicy;

impl CompilerOutputExcludePolicy {
    fn project_output_owner<'a>(model: &'a ProjectModel, output: &Path) -> Option<&'a Module> {
        model
            .modules()
            .flat_map(|module| {
                module
                    .root_model
                    .content_roots()
                    .filter(|root| output.starts_with(root))
                    .map(move |root| (root.components().count(), module))
            })
            .max_by_key(|(depth, _)| *depth)
            .map(|(_, module)| module)
    }
}

impl DirectoryIndexExcludePolicy for CompilerOutputExcludePolicy {
    fn name(&self) -> &str {
        "compiler-output"
    }

    fn excluded_roots_for_project(&self, model: &ProjectModel) -> Vec<PathBuf> {
        match model.project_output() {
            Some(output) if Self::project_output_owner(model, output).is_none() => {
                vec![output.to_path_buf()]
            }
            _ => Vec::new(),
        }
    }

    fn excluded_roots_for_module(&self, model: &ProjectModel, module: &Module) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if let Some(output) = model.project_output() {
            if Self::project_output_owner(model, output).map(|owner| owner.id) == Some(module.id) {
                out.push(output.to_path_buf());
            }
        }

        let own = &module.root_model.output;
        if own.excluded {
            out.extend(own.path.iter().cloned());
            out.extend(own.test_path.iter().cloned());
        }
        out
    }
}

pub type ExcludeCondition = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// A library that is not declared in the root model but contributed by a provider, e.g.
/// stubs shipped by a framework integration.
#[derive(Clone, Default)]
pub struct SyntheticLibrary {
    pub name: String,
    pub source_roots: Vec<PathBuf>,
    pub class_roots: Vec<PathBuf>,
    pub excluded_roots: Vec<PathBuf>,
    /// Files (and directories) for which this returns `true` are not part of the library.
    pub exclude_condition: Option<ExcludeCondition>,
}

impl fmt::Debug for SyntheticLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticLibrary")
            .field("name", &self.name)
            .field("source_roots", &self.source_roots)
            .field("class_roots", &self.class_roots)
            .field("excluded_roots", &self.excluded_roots)
            .field("exclude_condition", &self.exclude_condition.is_some())
            .finish()
    }
}

impl SyntheticLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_roots.push(root.into());
        self
    }

    pub fn with_class_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.class_roots.push(root.into());
        self
    }

    pub fn with_excluded_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.excluded_roots.push(root.into());
        self
    }

    pub fn with_exclude_condition(
        mut self,
        condition: impl Fn(&Path) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.exclude_condition = Some(Arc::new(condition));
        self
    }
}

pub trait AdditionalLibraryRootsProvider: Send + Sync {
    fn name(&self) -> &str;

    fn additional_project_libraries(&self, model: &ProjectModel) -> Vec<SyntheticLibrary>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddDependencyType {
    /// No opinion; regular scope filtering applies.
    Default,
    /// Add the entry regardless of its scope.
    Add,
    DoNotAdd,
}

/// Customizes order enumeration for the modules it is applicable to.
pub trait OrderEnumerationHandler: Send + Sync {
    fn is_applicable(&self, _module: &Module) -> bool {
        true
    }

    fn should_add_dependency(&self, _entry: &OrderEntry) -> AddDependencyType {
        AddDependencyType::Default
    }

    fn should_process_dependencies_recursively(&self) -> bool {
        true
    }

    fn should_add_runtime_dependencies_to_test_compilation_classpath(&self) -> bool {
        false
    }

    fn should_include_tests_from_dependent_modules_to_test_classpath(&self) -> bool {
        true
    }
}

/// Every extension the root index consults.
#[derive(Clone, Default)]
pub struct Extensions {
    pub exclude_policies: Vec<Arc<dyn DirectoryIndexExcludePolicy>>,
    pub library_providers: Vec<Arc<dyn AdditionalLibraryRootsProvider>>,
    pub enumeration_handlers: Vec<Arc<dyn OrderEnumerationHandler>>,
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field(
                "exclude_policies",
                &self
                    .exclude_policies
                    .iter()
                    .map(|policy| policy.name())
                    .collect::<Vec<_>>(),
            )
            .field(
                "library_providers",
                &self
                    .library_providers
                    .iter()
                    .map(|provider| provider.name())
                    .collect::<Vec<_>>(),
            )
            .field("enumeration_handlers", &self.enumeration_handlers.len())
            .finish()
    }
}

impl Extensions {
    /// Built-in extensions only.
    pub fn with_defaults() -> Self {
        Self {
            exclude_policies: vec![Arc::new(CompilerOutputExcludePolicy)],
            ..Self::default()
        }
    }

    pub fn with_exclude_policy(mut self, policy: impl DirectoryIndexExcludePolicy + 'static) -> Self {
        self.exclude_policies.push(Arc::new(policy));
        self
    }

    pub fn with_library_provider(
        mut self,
        provider: impl AdditionalLibraryRootsProvider + 'static,
    ) -> Self {
        self.library_providers.push(Arc::new(provider));
        self
    }

    pub fn with_enumeration_handler(
        mut self,
        handler: impl OrderEnumerationHandler + 'static,
    ) -> Self {
        self.enumeration_handlers.push(Arc::new(handler));
        self
    }
}
