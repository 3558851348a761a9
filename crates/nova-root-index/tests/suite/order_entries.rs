use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use nova_project::{
    Library, LibraryDependency, LibraryId, ModuleDependency, ProjectModel, SourceFolder,
};
use nova_root_index::{AdditionalLibraryRootsProvider, Extensions, Project, SyntheticLibrary};
use pretty_assertions::assert_eq;

use super::support::{add_module, depend, entry_names, memory_fs, open, open_with};

fn app_and_lib() -> ProjectModel {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    model
        .update_root_model(app, |root_model| {
            root_model.content_entries[0].add_exclude_folder("/p/app/build");
        })
        .expect("exclude build");
    add_module(&mut model, "lib", "/p/lib", &["/p/lib/src"]);
    depend(&mut model, app, ModuleDependency::new("lib"));
    model
}

#[test]
fn dependency_sources_are_visible_through_the_dependent_entry() {
    let fs = memory_fs(&["/p/app/src", "/p/app/build", "/p/lib/src"]);
    let project = open(app_and_lib(), &fs);
    let read = project.read().expect("read");

    assert_eq!(
        entry_names(&read, "/p/lib/src/Util.java"),
        vec!["app: module lib", "lib: <module source>"]
    );
    assert_eq!(
        entry_names(&read, "/p/app/src/Main.java"),
        vec!["app: <module source>"]
    );
    assert!(entry_names(&read, "/p/app/build/Main.class").is_empty());
    assert!(entry_names(&read, "/elsewhere/Main.java").is_empty());
}

#[test]
fn repeated_queries_return_the_cached_list() {
    let fs = memory_fs(&["/p/app/src", "/p/app/build", "/p/lib/src"]);
    let project = open(app_and_lib(), &fs);
    let read = project.read().expect("read");

    let first = read
        .order_entries(Path::new("/p/lib/src/a/A.java"))
        .expect("order entries");
    let second = read
        .order_entries(Path::new("/p/lib/src/a/A.java"))
        .expect("order entries");
    assert!(Arc::ptr_eq(&first, &second));

    // Files under the same innermost root share one list.
    let sibling = read
        .order_entries(Path::new("/p/lib/src/b/B.java"))
        .expect("order entries");
    assert!(Arc::ptr_eq(&first, &sibling));

    let index = read.root_index().expect("root index");
    assert!(Arc::ptr_eq(&index, &read.root_index().expect("root index")));
}

#[test]
fn exported_dependencies_are_visible_transitively() {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let lib = add_module(&mut model, "lib", "/p/lib", &["/p/lib/src"]);
    add_module(&mut model, "core", "/p/core", &["/p/core/src"]);
    depend(&mut model, app, ModuleDependency::new("lib"));
    depend(&mut model, lib, ModuleDependency::new("core").exported());

    let fs = memory_fs(&["/p/app/src", "/p/lib/src", "/p/core/src"]);
    let project = open(model, &fs);
    let read = project.read().expect("read");

    assert_eq!(
        entry_names(&read, "/p/core/src/Core.java"),
        vec![
            "app: module lib",
            "core: <module source>",
            "lib: module core",
        ]
    );
    assert_eq!(
        entry_names(&read, "/p/lib/src/Lib.java"),
        vec!["app: module lib", "lib: <module source>"]
    );
}

#[test]
fn non_exported_dependencies_stop_at_the_first_dependent() {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let lib = add_module(&mut model, "lib", "/p/lib", &["/p/lib/src"]);
    add_module(&mut model, "core", "/p/core", &["/p/core/src"]);
    depend(&mut model, app, ModuleDependency::new("lib"));
    depend(&mut model, lib, ModuleDependency::new("core"));

    let fs = memory_fs(&["/p/app/src", "/p/lib/src", "/p/core/src"]);
    let project = open(model, &fs);
    let read = project.read().expect("read");

    assert_eq!(
        entry_names(&read, "/p/core/src/Core.java"),
        vec!["core: <module source>", "lib: module core"]
    );
}

#[test]
fn dependency_cycles_terminate() {
    let mut model = ProjectModel::new();
    let a = add_module(&mut model, "a", "/p/a", &["/p/a/src"]);
    let b = add_module(&mut model, "b", "/p/b", &["/p/b/src"]);
    depend(&mut model, a, ModuleDependency::new("b").exported());
    depend(&mut model, b, ModuleDependency::new("a").exported());

    let fs = memory_fs(&["/p/a/src", "/p/b/src"]);
    let project = open(model, &fs);
    let read = project.read().expect("read");

    assert_eq!(
        entry_names(&read, "/p/a/src/A.java"),
        vec!["a: <module source>", "a: module b", "b: module a"]
    );
}

#[test]
fn unresolved_module_dependencies_are_skipped() {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    depend(&mut model, app, ModuleDependency::new("missing"));

    let fs = memory_fs(&["/p/app/src"]);
    let project = open(model, &fs);
    let read = project.read().expect("read");

    assert_eq!(
        entry_names(&read, "/p/app/src/Main.java"),
        vec!["app: <module source>"]
    );
}

/// Entries of each file, asked of a fresh project in the given order.
fn entries_in_order(
    open_project: &dyn Fn() -> Project,
    files: &[&str],
) -> BTreeMap<String, Vec<String>> {
    let project = open_project();
    let read = project.read().expect("read");
    files
        .iter()
        .map(|file| (file.to_string(), entry_names(&read, file)))
        .collect()
}

/// Asks about `files` forwards and backwards and checks both runs agree.
fn order_independent_entries(
    open_project: &dyn Fn() -> Project,
    files: &[&str],
) -> BTreeMap<String, Vec<String>> {
    let forwards = entries_in_order(open_project, files);
    let reversed: Vec<&str> = files.iter().rev().copied().collect();
    assert_eq!(entries_in_order(open_project, &reversed), forwards);
    forwards
}

#[test]
fn pattern_excluded_files_do_not_change_their_siblings_entries() {
    let open_project = || {
        let mut model = ProjectModel::new();
        let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
        model
            .update_root_model(app, |root_model| {
                root_model.content_entries[0].add_exclude_pattern("*.txt");
            })
            .expect("exclude pattern");
        open(model, &memory_fs(&["/p/app/src/docs.txt"]))
    };

    let entries = order_independent_entries(
        &open_project,
        &[
            "/p/app/src/notes.txt",
            "/p/app/src/Main.java",
            "/p/app/src/docs.txt/Inner.java",
        ],
    );
    assert_eq!(entries["/p/app/src/Main.java"], vec!["app: <module source>"]);
    assert!(entries["/p/app/src/notes.txt"].is_empty());
    assert!(entries["/p/app/src/docs.txt/Inner.java"].is_empty());
}

#[test]
fn source_roots_inside_excluded_folders_keep_their_entries() {
    let open_project = || {
        let mut model = ProjectModel::new();
        let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
        model
            .update_root_model(app, |root_model| {
                root_model.content_entries[0]
                    .add_exclude_folder("/p/app/out")
                    .add_source_folder(SourceFolder::main("/p/app/out/generated"));
            })
            .expect("excluded output");
        open(model, &memory_fs(&["/p/app/src", "/p/app/out/generated/sub"]))
    };

    let entries = order_independent_entries(
        &open_project,
        &[
            "/p/app/out/Other.class",
            "/p/app/out/generated/G.java",
            "/p/app/out/generated/sub/H.java",
        ],
    );
    assert!(entries["/p/app/out/Other.class"].is_empty());
    assert_eq!(
        entries["/p/app/out/generated/G.java"],
        vec!["app: <module source>"]
    );
    assert_eq!(
        entries["/p/app/out/generated/sub/H.java"],
        vec!["app: <module source>"]
    );
}

struct Stubs;

impl AdditionalLibraryRootsProvider for Stubs {
    fn name(&self) -> &str {
        "stubs"
    }

    fn additional_project_libraries(&self, _model: &ProjectModel) -> Vec<SyntheticLibrary> {
        vec![SyntheticLibrary::new("stubs")
            .with_source_root("/stubs")
            .with_exclude_condition(|path| path.ends_with("experimental"))]
    }
}

fn app_with_stub_sources() -> (ProjectModel, LibraryId) {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let stubs = model.add_library(Library::new("stub-sources").with_source_root("/stubs"));
    model
        .update_root_model(app, |root_model| {
            root_model.add_dependency(LibraryDependency::new(stubs));
        })
        .expect("library dependency");
    (model, stubs)
}

#[test]
fn synthetic_exclude_conditions_hide_only_the_rejected_files() {
    let open_project = || {
        let (model, _) = app_with_stub_sources();
        let fs = memory_fs(&["/p/app/src", "/stubs/stable", "/stubs/experimental"]);
        open_with(model, &fs, Extensions::with_defaults().with_library_provider(Stubs))
    };

    let entries = order_independent_entries(
        &open_project,
        &[
            "/stubs/experimental/Api.java",
            "/stubs/stable/Api.java",
            "/stubs/Root.java",
        ],
    );
    let (_, stubs) = app_with_stub_sources();
    let expected = vec![format!("app: library #{}", stubs.index())];
    assert!(entries["/stubs/experimental/Api.java"].is_empty());
    assert_eq!(entries["/stubs/stable/Api.java"], expected);
    assert_eq!(entries["/stubs/Root.java"], expected);
}
