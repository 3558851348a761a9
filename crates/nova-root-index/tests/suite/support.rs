use std::path::{Path, PathBuf};
use std::sync::Arc;

use nova_project::{ModuleDependency, ModuleId, ProjectModel, SourceFolder};
use nova_root_index::{Extensions, Project, ProjectRead, RootIndexConfig};
use nova_vfs::MemoryFs;

pub(crate) fn memory_fs(dirs: &[&str]) -> Arc<MemoryFs> {
    let fs = MemoryFs::new();
    for dir in dirs {
        fs.create_dir_all(dir);
    }
    Arc::new(fs)
}

pub(crate) fn open(model: ProjectModel, fs: &Arc<MemoryFs>) -> Project {
    open_with(model, fs, Extensions::with_defaults())
}

pub(crate) fn open_with(model: ProjectModel, fs: &Arc<MemoryFs>, extensions: Extensions) -> Project {
    Project::new(model, fs.clone(), extensions, RootIndexConfig::default()).expect("open project")
}

/// Adds a module with one content root and main source folders below it.
pub(crate) fn add_module(
    model: &mut ProjectModel,
    name: &str,
    content_root: &str,
    sources: &[&str],
) -> ModuleId {
    let id = model.new_module(name).expect("new module");
    model
        .update_root_model(id, |root_model| {
            let entry = root_model.add_content_entry(content_root);
            for source in sources {
                entry.add_source_folder(SourceFolder::main(*source));
            }
        })
        .expect("update root model");
    id
}

pub(crate) fn depend(model: &mut ProjectModel, module: ModuleId, dep: ModuleDependency) {
    model
        .update_root_model(module, |root_model| {
            root_model.add_dependency(dep);
        })
        .expect("add dependency");
}

/// Order entries of `file`, rendered as `owner: entry`.
pub(crate) fn entry_names(read: &ProjectRead<'_>, file: &str) -> Vec<String> {
    read.order_entries(Path::new(file))
        .expect("order entries")
        .iter()
        .map(ToString::to_string)
        .collect()
}

pub(crate) fn module_names(model: &ProjectModel, ids: &[ModuleId]) -> Vec<String> {
    ids.iter()
        .map(|id| model.module(*id).expect("module").name.to_string())
        .collect()
}

pub(crate) fn paths(raw: &[&str]) -> Vec<PathBuf> {
    raw.iter().map(PathBuf::from).collect()
}
