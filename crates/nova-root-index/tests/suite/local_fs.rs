use std::fs;
use std::sync::Arc;

use nova_project::{ModuleDependency, ProjectModel, SourceFolder};
use nova_root_index::{Extensions, Project, RootIndexConfig};
use nova_vfs::{FileChange, LocalFs};
use pretty_assertions::assert_eq;

#[test]
fn indexes_a_project_on_disk() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::create_dir_all(root.join("app/src/com/acme")).expect("app sources");
    fs::create_dir_all(root.join("lib/src")).expect("lib sources");
    fs::write(root.join("app/src/com/acme/Main.java"), "class Main {}").expect("Main.java");

    let mut model = ProjectModel::new();
    let app = model.new_module("app").expect("app");
    let lib = model.new_module("lib").expect("lib");
    model
        .update_root_model(app, |root_model| {
            root_model
                .add_content_entry(root.join("app"))
                .add_source_folder(SourceFolder::main(root.join("app/src")))
                .add_source_folder(SourceFolder::test(root.join("app/test")));
            root_model.add_dependency(ModuleDependency::new("lib"));
        })
        .expect("app root model");
    model
        .update_root_model(lib, |root_model| {
            root_model
                .add_content_entry(root.join("lib"))
                .add_source_folder(SourceFolder::main(root.join("lib/src")));
        })
        .expect("lib root model");

    let project = Project::new(
        model,
        Arc::new(LocalFs::new()),
        Extensions::with_defaults(),
        RootIndexConfig::default(),
    )
    .expect("open project");

    let main = root.join("app/src/com/acme/Main.java");
    {
        let read = project.read().expect("read");
        let files = read.file_index().expect("file index");
        assert_eq!(files.module_for_file(&main, true), Some(app));
        assert!(files.is_in_source(&main));
        assert_eq!(
            read.package_name(&root.join("app/src/com/acme"))
                .expect("package name")
                .as_deref(),
            Some("com.acme")
        );
        assert_eq!(read.order_entries(&root.join("lib/src")).expect("entries").len(), 2);
    }

    // The test folder didn't exist at build time.
    let test_dir = root.join("app/test");
    fs::create_dir_all(&test_dir).expect("test dir");
    assert!(project
        .file_events(&[FileChange::created(&test_dir)])
        .expect("file events"));

    let files = project.read().expect("read").file_index().expect("file index");
    assert!(files.is_in_test_source(&test_dir.join("MainTest.java")));
}
