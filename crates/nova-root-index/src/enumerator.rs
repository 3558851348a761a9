//! Configurable traversal of a module's (or the whole project's) dependency entries.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexSet;
use nova_project::{
    JdkDependency, Library, LibraryId, Module, ModuleId, OrderEntry, OrderEntryHandle,
    OrderEntryRef, OrderRootType, ProjectModel, RootModel,
};
use nova_vfs::normalize_local_path;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Result, RootIndexError};
use crate::policy::{AddDependencyType, OrderEnumerationHandler};

/// Supplies root models that differ from the committed ones, e.g. a model being edited.
pub trait RootModelProvider: Send + Sync {
    fn root_model(&self, module: &Module) -> Arc<RootModel>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumerationTarget {
    Module(ModuleId),
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
struct EnumerationFlags {
    production_only: bool,
    compile_only: bool,
    runtime_only: bool,
    without_sdk: bool,
    without_libraries: bool,
    without_dep_modules: bool,
    without_module_source_entries: bool,
    recursively: bool,
    exported_only: bool,
    recursively_exported_only: bool,
}

enum Decision<'m> {
    Skip,
    Process,
    Recurse(&'m Module),
}

/// An entry handed to the traversal callback, with the context it was reached in.
struct Visit<'v> {
    entry: OrderEntryRef<'v>,
    root_model: &'v RootModel,
    handlers: &'v [&'v dyn OrderEnumerationHandler],
}

/// Builder-style dependency traversal.
///
/// ```text
/// OrderEnumerator::module(&model, app).recursively().exported_only().classes().roots()
/// ```
pub struct OrderEnumerator<'a> {
    model: &'a ProjectModel,
    target: EnumerationTarget,
    flags: EnumerationFlags,
    condition: Option<Box<dyn Fn(&OrderEntryRef<'_>) -> bool + 'a>>,
    provider: Option<&'a dyn RootModelProvider>,
    handlers: &'a [Arc<dyn OrderEnumerationHandler>],
    cache: Option<&'a OrderRootsCache>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> OrderEnumerator<'a> {
    pub fn module(model: &'a ProjectModel, module: ModuleId) -> Self {
        Self::new(model, EnumerationTarget::Module(module))
    }

    /// Every module's entries, dependencies first. Dependent modules are never recursed into.
    pub fn project(model: &'a ProjectModel) -> Self {
        Self::new(model, EnumerationTarget::Project)
    }

    fn new(model: &'a ProjectModel, target: EnumerationTarget) -> Self {
        Self {
            model,
            target,
            flags: EnumerationFlags::default(),
            condition: None,
            provider: None,
            handlers: &[],
            cache: None,
            cancel: None,
        }
    }

    pub fn production_only(mut self) -> Self {
        self.flags.production_only = true;
        self
    }

    pub fn compile_only(mut self) -> Self {
        self.flags.compile_only = true;
        self
    }

    pub fn runtime_only(mut self) -> Self {
        self.flags.runtime_only = true;
        self
    }

    pub fn without_sdk(mut self) -> Self {
        self.flags.without_sdk = true;
        self
    }

    pub fn without_libraries(mut self) -> Self {
        self.flags.without_libraries = true;
        self
    }

    pub fn without_dep_modules(mut self) -> Self {
        self.flags.without_dep_modules = true;
        self
    }

    pub fn without_module_source_entries(mut self) -> Self {
        self.flags.without_module_source_entries = true;
        self
    }

    pub fn recursively(mut self) -> Self {
        self.flags.recursively = true;
        self
    }

    /// Skip non-exported entries everywhere, including the target module's own.
    pub fn exported_only(mut self) -> Self {
        self.flags.exported_only = true;
        self
    }

    /// Recurse, skipping non-exported entries of the modules reached through recursion.
    pub fn recursively_exported_only(mut self) -> Self {
        self.flags.recursively = true;
        self.flags.recursively_exported_only = true;
        self
    }

    pub fn satisfying(mut self, condition: impl Fn(&OrderEntryRef<'_>) -> bool + 'a) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    pub fn using(mut self, provider: &'a dyn RootModelProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_handlers(mut self, handlers: &'a [Arc<dyn OrderEnumerationHandler>]) -> Self {
        self.handlers = handlers;
        self
    }

    pub(crate) fn with_cache(mut self, cache: &'a OrderRootsCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn effective_flags(&self) -> EnumerationFlags {
        let mut flags = self.flags;
        if self.target == EnumerationTarget::Project {
            flags.recursively = false;
            flags.without_dep_modules = true;
        }
        flags
    }

    fn is_root(&self, module: &Module) -> bool {
        match self.target {
            EnumerationTarget::Module(id) => module.id == id,
            EnumerationTarget::Project => true,
        }
    }

    fn root_model_of(&self, module: &Module) -> Arc<RootModel> {
        match self.provider {
            Some(provider) => provider.root_model(module),
            None => module.root_model.clone(),
        }
    }

    fn handlers_for(&self, module: &Module) -> Vec<&'a dyn OrderEnumerationHandler> {
        self.handlers
            .iter()
            .filter(|handler| handler.is_applicable(module))
            .map(|handler| handler.as_ref())
            .collect()
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(cancel) if cancel.is_cancelled() => Err(RootIndexError::Cancelled),
            _ => Ok(()),
        }
    }

    fn decide(
        &self,
        entry: &OrderEntryRef<'_>,
        first_level: bool,
        handlers: &[&dyn OrderEnumerationHandler],
    ) -> Decision<'a> {
        let flags = self.effective_flags();
        if let Some(condition) = &self.condition {
            if !condition(entry) {
                return Decision::Skip;
            }
        }

        match entry.entry {
            OrderEntry::Jdk(_) if flags.without_sdk || !first_level => return Decision::Skip,
            OrderEntry::Library(_) if flags.without_libraries => return Decision::Skip,
            _ => {}
        }

        if flags.without_dep_modules {
            match entry.entry {
                OrderEntry::Module(_) if !flags.recursively => return Decision::Skip,
                OrderEntry::ModuleSource if !self.is_root(entry.module) => return Decision::Skip,
                _ => {}
            }
        }
        if flags.without_module_source_entries && matches!(entry.entry, OrderEntry::ModuleSource) {
            return Decision::Skip;
        }

        let add = handlers
            .iter()
            .map(|handler| handler.should_add_dependency(entry.entry))
            .find(|add| *add != AddDependencyType::Default)
            .unwrap_or(AddDependencyType::Default);
        if add == AddDependencyType::DoNotAdd {
            return Decision::Skip;
        }

        let mut exported = !matches!(entry.entry, OrderEntry::Jdk(_));
        if let Some(scope) = entry.entry.scope() {
            if add == AddDependencyType::Default {
                let for_test_compile = scope.is_for_test_compile()
                    || (scope == nova_project::DependencyScope::Runtime
                        && handlers.iter().any(|handler| {
                            handler.should_add_runtime_dependencies_to_test_compilation_classpath()
                        }));
                if flags.compile_only && !scope.is_for_production_compile() && !for_test_compile {
                    return Decision::Skip;
                }
                if flags.runtime_only
                    && !scope.is_for_production_runtime()
                    && !scope.is_for_test_runtime()
                {
                    return Decision::Skip;
                }
                if flags.production_only
                    && ((!scope.is_for_production_compile() && !scope.is_for_production_runtime())
                        || (flags.compile_only && !scope.is_for_production_compile())
                        || (flags.runtime_only && !scope.is_for_production_runtime()))
                {
                    return Decision::Skip;
                }
            }
            exported = entry.entry.is_exported();
        }

        if !exported {
            if flags.exported_only {
                return Decision::Skip;
            }
            if flags.recursively_exported_only && !first_level {
                return Decision::Skip;
            }
        }

        if let OrderEntry::Module(dep) = entry.entry {
            if flags.recursively {
                if let Some(target) = self.model.resolve_dependency(dep) {
                    if handlers
                        .iter()
                        .all(|handler| handler.should_process_dependencies_recursively())
                    {
                        return Decision::Recurse(target);
                    }
                }
            }
            if flags.without_dep_modules {
                return Decision::Skip;
            }
        }
        Decision::Process
    }

    /// Whether a first-level entry would be traversed into rather than reported.
    pub(crate) fn should_recurse(&self, entry: &OrderEntryRef<'_>) -> bool {
        let handlers = self.handlers_for(entry.module);
        matches!(self.decide(entry, true, &handlers), Decision::Recurse(_))
    }

    fn traverse(&self, f: &mut dyn FnMut(&Visit<'_>)) -> Result<()> {
        match self.target {
            EnumerationTarget::Module(id) => {
                let module = self
                    .model
                    .module(id)
                    .ok_or(RootIndexError::UnknownModule(id))?;
                let mut processed = self.effective_flags().recursively.then(HashSet::new);
                self.process_module(module, true, &mut processed, f)
            }
            EnumerationTarget::Project => {
                let mut processed = Some(HashSet::new());
                for id in self.model.sorted_modules() {
                    if let Some(module) = self.model.module(id) {
                        self.process_module(module, true, &mut processed, f)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn process_module(
        &self,
        module: &'a Module,
        first_level: bool,
        processed: &mut Option<HashSet<ModuleId>>,
        f: &mut dyn FnMut(&Visit<'_>),
    ) -> Result<()> {
        self.check_cancelled()?;
        if let Some(processed) = processed.as_mut() {
            if !processed.insert(module.id) {
                return Ok(());
            }
        }

        let root_model = self.root_model_of(module);
        let handlers = self.handlers_for(module);
        for (index, entry) in root_model.order_entries.iter().enumerate() {
            let entry = OrderEntryRef {
                module,
                index,
                entry,
            };
            match self.decide(&entry, first_level, &handlers) {
                Decision::Skip => {}
                Decision::Recurse(dep) => self.process_module(dep, false, processed, f)?,
                Decision::Process => f(&Visit {
                    entry,
                    root_model: &root_model,
                    handlers: &handlers,
                }),
            }
        }
        Ok(())
    }

    pub fn for_each(&self, mut f: impl FnMut(OrderEntryRef<'_>)) -> Result<()> {
        self.traverse(&mut |visit| f(visit.entry))
    }

    pub fn process<R>(&self, init: R, mut fold: impl FnMut(R, OrderEntryRef<'_>) -> R) -> Result<R> {
        let mut acc = Some(init);
        self.traverse(&mut |visit| {
            if let Some(value) = acc.take() {
                acc = Some(fold(value, visit.entry));
            }
        })?;
        acc.ok_or(RootIndexError::Cancelled)
    }

    pub fn entries(&self) -> Result<Vec<OrderEntryHandle>> {
        self.process(Vec::new(), |mut out, entry| {
            out.push(entry.to_handle());
            out
        })
    }

    /// Modules contributing entries: owners of reported module sources when recursing, and
    /// targets of module entries that were not recursed into.
    pub fn for_each_module(&self, mut f: impl FnMut(&'a Module)) -> Result<()> {
        let flags = self.effective_flags();
        self.traverse(&mut |visit| match visit.entry.entry {
            OrderEntry::ModuleSource if flags.recursively => {
                if let Some(module) = self.model.module(visit.entry.module.id) {
                    f(module);
                }
            }
            OrderEntry::Module(dep)
                if !flags.recursively
                    || !visit
                        .handlers
                        .iter()
                        .all(|handler| handler.should_process_dependencies_recursively()) =>
            {
                if let Some(module) = self.model.resolve_dependency(dep) {
                    f(module);
                }
            }
            _ => {}
        })
    }

    pub fn modules(&self) -> Result<Vec<ModuleId>> {
        let mut out = IndexSet::new();
        self.for_each_module(|module| {
            out.insert(module.id);
        })?;
        Ok(out.into_iter().collect())
    }

    pub fn for_each_library(&self, mut f: impl FnMut(LibraryId, &'a Library)) -> Result<()> {
        self.traverse(&mut |visit| {
            if let OrderEntry::Library(dep) = visit.entry.entry {
                if let Some(library) = self.model.library(dep.library) {
                    f(dep.library, library);
                }
            }
        })
    }

    pub fn classes(self) -> OrderRootsEnumerator<'a> {
        self.roots(OrderRootType::Classes)
    }

    pub fn sources(self) -> OrderRootsEnumerator<'a> {
        self.roots(OrderRootType::Sources)
    }

    pub fn roots(self, kind: OrderRootType) -> OrderRootsEnumerator<'a> {
        OrderRootsEnumerator {
            enumerator: self,
            kind,
            use_cache: false,
        }
    }

    fn collect_roots(&self, visit: &Visit<'_>, kind: OrderRootType, out: &mut IndexSet<PathBuf>) {
        let flags = self.effective_flags();
        let tests_from_dependents = !flags.production_only
            && visit
                .handlers
                .iter()
                .all(|handler| handler.should_include_tests_from_dependent_modules_to_test_classpath());

        match visit.entry.entry {
            OrderEntry::ModuleSource => {
                collect_module_roots(kind, visit.root_model, true, !flags.production_only, out);
            }
            OrderEntry::Module(dep) => {
                if let Some(target) = self.model.resolve_dependency(dep) {
                    let root_model = self.root_model_of(target);
                    collect_module_roots(
                        kind,
                        &root_model,
                        !dep.production_on_test,
                        tests_from_dependents || dep.production_on_test,
                        out,
                    );
                }
            }
            OrderEntry::Library(dep) => {
                if let Some(library) = self.model.library(dep.library) {
                    out.extend(library.roots(kind).iter().map(|root| normalize_local_path(root)));
                }
            }
            OrderEntry::Jdk(jdk) => {
                let sdk = match jdk {
                    JdkDependency::Explicit(id) => Some(*id),
                    JdkDependency::Inherited => self.model.project_sdk(),
                };
                if let Some(sdk) = sdk.and_then(|id| self.model.sdk(id)) {
                    out.extend(sdk.roots(kind).iter().map(|root| normalize_local_path(root)));
                }
            }
        }
    }
}

fn collect_module_roots(
    kind: OrderRootType,
    root_model: &RootModel,
    include_production: bool,
    include_tests: bool,
    out: &mut IndexSet<PathBuf>,
) {
    match kind {
        OrderRootType::Sources => {
            for folder in root_model.source_folders() {
                let wanted = if folder.is_test() {
                    include_tests
                } else {
                    include_production
                };
                if wanted {
                    out.insert(normalize_local_path(&folder.path));
                }
            }
        }
        OrderRootType::Classes => {
            let output = &root_model.output;
            if include_production {
                out.extend(output.path.as_deref().map(normalize_local_path));
            }
            if include_tests {
                out.extend(output.test_path.as_deref().map(normalize_local_path));
            }
        }
    }
}

/// Roots of one kind contributed by the entries an [`OrderEnumerator`] visits.
pub struct OrderRootsEnumerator<'a> {
    enumerator: OrderEnumerator<'a>,
    kind: OrderRootType,
    use_cache: bool,
}

impl OrderRootsEnumerator<'_> {
    /// Memoize the result in the generation's [`OrderRootsCache`]. Enumerators built outside
    /// a [`crate::ProjectRead`] have no cache and compute every time.
    ///
    /// Enumerators with a custom condition or root model provider can't be keyed and are
    /// refused.
    pub fn using_cache(mut self) -> Result<Self> {
        if self.enumerator.condition.is_some() {
            return Err(RootIndexError::UncacheableEnumerator("a custom condition"));
        }
        if self.enumerator.provider.is_some() {
            return Err(RootIndexError::UncacheableEnumerator("a root model provider"));
        }
        self.use_cache = true;
        Ok(self)
    }

    fn compute(&self) -> Result<Vec<PathBuf>> {
        let mut out = IndexSet::new();
        self.enumerator
            .traverse(&mut |visit| self.enumerator.collect_roots(visit, self.kind, &mut out))?;
        Ok(out.into_iter().collect())
    }

    pub fn roots(&self) -> Result<Vec<PathBuf>> {
        match (self.use_cache, self.enumerator.cache) {
            (true, Some(cache)) => {
                let key = RootsCacheKey {
                    target: self.enumerator.target,
                    kind: self.kind,
                    flags: self.enumerator.effective_flags(),
                };
                Ok(cache.get_or_compute(key, || self.compute())?.to_vec())
            }
            _ => self.compute(),
        }
    }

    pub fn urls(&self) -> Result<Vec<Url>> {
        Ok(self
            .roots()?
            .into_iter()
            .filter_map(|root| match Url::from_file_path(&root) {
                Ok(url) => Some(url),
                Err(()) => {
                    tracing::warn!(
                        target = "nova.roots",
                        root = %root.display(),
                        "root cannot be expressed as a file URL"
                    );
                    None
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RootsCacheKey {
    target: EnumerationTarget,
    kind: OrderRootType,
    flags: EnumerationFlags,
}

/// Enumerator roots memoized for one [`crate::RootIndex`] generation.
///
/// Only enumerators wired by the index share it, so they all carry the project's handlers.
#[derive(Debug, Default)]
pub struct OrderRootsCache {
    roots: Mutex<HashMap<RootsCacheKey, Arc<[PathBuf]>>>,
}

impl OrderRootsCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.roots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_compute(
        &self,
        key: RootsCacheKey,
        compute: impl FnOnce() -> Result<Vec<PathBuf>>,
    ) -> Result<Arc<[PathBuf]>> {
        if let Some(roots) = self.roots.lock().get(&key) {
            return Ok(roots.clone());
        }
        let roots: Arc<[PathBuf]> = compute()?.into();
        self.roots.lock().insert(key, roots.clone());
        Ok(roots)
    }
}
