use std::path::Path;

use nova_project::{Library, LibraryDependency, ProjectModel, SourceFolder};
use nova_root_index::Project;
use pretty_assertions::assert_eq;

use super::support::{memory_fs, open, paths};

fn project_with_prefixed_sources() -> Project {
    let mut model = ProjectModel::new();
    let app = model.new_module("app").expect("new module");
    let sources = model.add_library(Library::new("commons").with_source_root("/repo/commons-src"));
    model
        .update_root_model(app, |root_model| {
            root_model
                .add_content_entry("/p/app")
                .add_source_folder(SourceFolder::main("/p/app/src").with_package_prefix("com.acme"))
                .add_source_folder(SourceFolder::test("/p/app/test"));
            root_model.add_dependency(LibraryDependency::new(sources));
        })
        .expect("root model");

    let fs = memory_fs(&[
        "/p/app/src/api/v1",
        "/p/app/src/org.example",
        "/p/app/src/.git",
        "/p/app/test/com/acme/api",
        "/p/app/docs",
        "/repo/commons-src/com/acme/api",
    ]);
    fs.create_file("/p/app/src/api/Api.java");
    open(model, &fs)
}

#[test]
fn package_names_follow_source_folder_prefixes() {
    let project = project_with_prefixed_sources();
    let read = project.read().expect("read");
    let package = |dir: &str| {
        read.package_name(Path::new(dir))
            .expect("package name")
            .map(|name| name.to_string())
    };

    assert_eq!(package("/p/app/src"), Some("com.acme".to_string()));
    assert_eq!(package("/p/app/src/api/v1"), Some("com.acme.api.v1".to_string()));
    assert_eq!(package("/p/app/test"), Some(String::new()));
    assert_eq!(package("/p/app/test/com/acme"), Some("com.acme".to_string()));
    assert_eq!(package("/repo/commons-src/com/acme"), Some("com.acme".to_string()));

    // Content outside source roots, files and ignored directories have no package.
    assert_eq!(package("/p/app"), None);
    assert_eq!(package("/p/app/docs"), None);
    assert_eq!(package("/p/app/src/api/Api.java"), None);
    assert_eq!(package("/p/app/src/.git"), None);
}

#[test]
fn directories_are_found_by_package_name() {
    let project = project_with_prefixed_sources();
    let read = project.read().expect("read");

    assert_eq!(
        read.directories_by_package_name("com.acme.api", false)
            .expect("directories"),
        paths(&["/p/app/src/api", "/p/app/test/com/acme/api"])
    );
    assert_eq!(
        read.directories_by_package_name("com.acme.api", true)
            .expect("directories"),
        paths(&[
            "/p/app/src/api",
            "/p/app/test/com/acme/api",
            "/repo/commons-src/com/acme/api",
        ])
    );
    assert_eq!(
        read.directories_by_package_name("com.acme", false)
            .expect("directories"),
        paths(&["/p/app/src", "/p/app/test/com/acme"])
    );
}

#[test]
fn dotted_directory_names_span_several_package_components() {
    let project = project_with_prefixed_sources();
    let read = project.read().expect("read");

    assert_eq!(
        read.package_name(Path::new("/p/app/src/org.example"))
            .expect("package name")
            .as_deref(),
        Some("com.acme.org.example")
    );
    assert_eq!(
        read.directories_by_package_name("com.acme.org.example", false)
            .expect("directories"),
        paths(&["/p/app/src/org.example"])
    );
    assert!(read
        .directories_by_package_name("com.acme.missing", true)
        .expect("directories")
        .is_empty());
}

#[test]
fn file_index_exposes_package_names() {
    let project = project_with_prefixed_sources();
    let files = project.read().expect("read").file_index().expect("file index");

    assert_eq!(
        files
            .package_name_by_directory(Path::new("/p/app/src/api"))
            .as_deref(),
        Some("com.acme.api")
    );
}
