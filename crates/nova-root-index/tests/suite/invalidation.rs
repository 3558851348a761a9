use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use nova_project::{ModuleDependency, ProjectModel, SourceFolder};
use nova_root_index::{Project, ProjectRead, RootIndexError, RootsChangeListener};
use nova_vfs::FileChange;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use super::support::{add_module, depend, entry_names, memory_fs, open};

#[derive(Default)]
struct CountingListener {
    calls: AtomicUsize,
}

impl RootsChangeListener for CountingListener {
    fn roots_changed(&self, project: &Project) {
        // Listeners may read the new state.
        assert!(project.read().is_ok());
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn update_publishes_a_new_generation() {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let fs = memory_fs(&["/p/app/src", "/p/app/test"]);
    let project = open(model, &fs);
    let listener = Arc::new(CountingListener::default());
    project.add_listener(listener.clone());

    let before = project.read().expect("read").root_index().expect("index");
    let generation = project.directory_index().generation();
    assert!(!project
        .read()
        .expect("read")
        .file_index()
        .expect("file index")
        .is_in_test_source(Path::new("/p/app/test/ATest.java")));

    project
        .update(|model| {
            model.update_root_model(app, |root_model| {
                root_model.content_entries[0].add_source_folder(SourceFolder::test("/p/app/test"));
            })
        })
        .expect("update");

    assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    assert!(project.directory_index().generation() > generation);
    assert!(project.directory_index().current().is_none());

    let read = project.read().expect("read");
    let after = read.root_index().expect("index");
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(read
        .file_index()
        .expect("file index")
        .is_in_test_source(Path::new("/p/app/test/ATest.java")));
}

#[test]
fn new_dependencies_show_up_after_update() {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    add_module(&mut model, "lib", "/p/lib", &["/p/lib/src"]);
    let fs = memory_fs(&["/p/app/src", "/p/lib/src"]);
    let project = open(model, &fs);

    assert_eq!(
        entry_names(&project.read().expect("read"), "/p/lib/src/Lib.java"),
        vec!["lib: <module source>"]
    );

    project
        .update(|model| {
            model.update_root_model(app, |root_model| {
                root_model.add_dependency(ModuleDependency::new("lib"));
            })
        })
        .expect("update");

    assert_eq!(
        entry_names(&project.read().expect("read"), "/p/lib/src/Lib.java"),
        vec!["app: module lib", "lib: <module source>"]
    );
}

#[test]
fn failed_update_leaves_the_model_and_index_untouched() {
    let mut model = ProjectModel::new();
    add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let fs = memory_fs(&["/p/app/src"]);
    let project = open(model, &fs);
    let index = project.read().expect("read").root_index().expect("index");
    let generation = project.directory_index().generation();

    let result = project.update(|model| {
        model.new_module("extra")?;
        model.new_module("app")?;
        Ok(())
    });

    assert!(matches!(result, Err(RootIndexError::Model(_))));
    let read = project.read().expect("read");
    assert!(read.model().module_by_name("extra").is_none());
    assert_eq!(project.directory_index().generation(), generation);
    assert!(Arc::ptr_eq(&index, &read.root_index().expect("index")));
}

#[test]
fn only_root_changes_invalidate_the_index() {
    let mut model = ProjectModel::new();
    add_module(&mut model, "app", "/p/app", &["/p/app/src", "/p/app/gen"]);
    let fs = memory_fs(&["/p/app/src"]);
    let project = open(model, &fs);
    let listener = Arc::new(CountingListener::default());
    project.add_listener(listener.clone());

    let generated = Path::new("/p/app/gen/Gen.java");
    let files = project.read().expect("read").file_index().expect("file index");
    assert!(!files.is_in_source(generated));

    let unrelated = fs.create_file("/p/app/src/Main.java");
    assert!(!project.file_events(&unrelated).expect("file events"));
    assert!(!project
        .file_events(&[FileChange::modified("/p/app/src")])
        .expect("file events"));
    assert_eq!(listener.calls.load(Ordering::SeqCst), 0);

    let created = fs.create_dir_all("/p/app/gen");
    assert!(project.file_events(&created).expect("file events"));
    assert_eq!(listener.calls.load(Ordering::SeqCst), 1);

    let files = project.read().expect("read").file_index().expect("file index");
    assert!(files.is_in_source(generated));

    // Deleting an ancestor of a root affects it too.
    let deleted = fs.remove("/p/app");
    assert!(project.file_events(&deleted).expect("file events"));
    let files = project.read().expect("read").file_index().expect("file index");
    assert!(!files.is_in_project(Path::new("/p/app/src/Main.java")));
}

#[test]
fn events_before_the_first_build_are_ignored() {
    let mut model = ProjectModel::new();
    add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let fs = memory_fs(&[]);
    let project = open(model, &fs);

    let created = fs.create_dir_all("/p/app/src");
    assert!(!project.file_events(&created).expect("file events"));

    let files = project.read().expect("read").file_index().expect("file index");
    assert!(files.is_in_source(Path::new("/p/app/src/Main.java")));
}

#[test]
fn roots_cache_belongs_to_one_generation() {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let fs = memory_fs(&["/p/app/src"]);
    let project = open(model, &fs);

    let cached_sources = |read: &ProjectRead<'_>| {
        read.enumerate_module(app)
            .expect("enumerator")
            .sources()
            .using_cache()
            .expect("cacheable")
            .roots()
            .expect("roots")
    };

    let old = {
        let read = project.read().expect("read");
        assert_eq!(cached_sources(&read), vec![PathBuf::from("/p/app/src")]);
        read.root_index().expect("index")
    };
    assert_eq!(old.roots_cache().len(), 1);

    project
        .update(|model| {
            model.update_root_model(app, |root_model| {
                root_model.content_entries[0].add_source_folder(SourceFolder::main("/p/app/gen"));
            })
        })
        .expect("update");

    let read = project.read().expect("read");
    assert!(read.root_index().expect("index").roots_cache().is_empty());
    assert_eq!(
        cached_sources(&read),
        vec![PathBuf::from("/p/app/src"), PathBuf::from("/p/app/gen")]
    );
    assert_eq!(old.roots_cache().len(), 1);
}

#[test]
fn stale_generations_do_not_leak_into_new_ones() {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let lib = add_module(&mut model, "lib", "/p/lib", &["/p/lib/src"]);
    depend(&mut model, app, ModuleDependency::new("lib"));
    let fs = memory_fs(&["/p/app/src", "/p/lib/src", "/p/lib/gen"]);
    let project = open(model, &fs);

    // The old generation's graph is only built after the update.
    let stale = project.read().expect("read").file_index().expect("file index");
    project
        .update(|model| {
            model.update_root_model(lib, |root_model| {
                root_model.content_entries[0].add_source_folder(SourceFolder::main("/p/lib/gen"));
            })
        })
        .expect("update");
    assert_eq!(
        stale
            .order_entries_for_file(Path::new("/p/lib/src/A.java"))
            .expect("entries")
            .len(),
        2
    );

    assert_eq!(
        entry_names(&project.read().expect("read"), "/p/lib/gen/G.java"),
        vec!["app: module lib", "lib: <module source>"]
    );
    assert_eq!(
        entry_names(&project.read().expect("read"), "/p/lib/src/A.java"),
        vec!["app: module lib", "lib: <module source>"]
    );
}

#[test]
fn cancelled_builds_are_not_published() {
    let mut model = ProjectModel::new();
    add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let fs = memory_fs(&["/p/app/src"]);
    let project = open(model, &fs);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let read = project.read().expect("read").with_cancellation(cancel);
    assert!(matches!(
        read.order_entries(Path::new("/p/app/src/Main.java")),
        Err(RootIndexError::Cancelled)
    ));
    assert!(project.directory_index().current().is_none());
}

#[test]
fn concurrent_readers_agree() {
    let mut model = ProjectModel::new();
    let app = add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    add_module(&mut model, "lib", "/p/lib", &["/p/lib/src"]);
    model
        .update_root_model(app, |root_model| {
            root_model.add_dependency(ModuleDependency::new("lib"));
        })
        .expect("add dependency");
    let fs = memory_fs(&["/p/app/src", "/p/lib/src"]);
    let project = open(model, &fs);

    let results: Vec<Vec<String>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| entry_names(&project.read().expect("read"), "/p/lib/src/Lib.java"))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("reader thread"))
            .collect()
    });

    for result in &results {
        assert_eq!(result, &vec!["app: module lib", "lib: <module source>"]);
    }
    let index = project.directory_index().current().expect("published index");
    assert!(Arc::ptr_eq(
        &index,
        &project.read().expect("read").root_index().expect("index")
    ));
}

struct Reentrant {
    rejected: AtomicBool,
}

impl RootsChangeListener for Reentrant {
    fn roots_changed(&self, project: &Project) {
        let nested = project.update(|_| Ok(()));
        self.rejected.store(
            matches!(nested, Err(RootIndexError::NestedRootsChange)),
            Ordering::SeqCst,
        );
    }
}

#[test]
#[cfg_attr(
    debug_assertions,
    should_panic(expected = "roots were changed from inside a roots-changed notification")
)]
fn updating_from_a_roots_changed_listener_is_rejected() {
    let project = open(ProjectModel::new(), &memory_fs(&[]));
    let listener = Arc::new(Reentrant {
        rejected: AtomicBool::new(false),
    });
    project.add_listener(listener.clone());

    project.update(|_| Ok(())).expect("update");
    assert!(listener.rejected.load(Ordering::SeqCst));

    // The guard is released once notification is over.
    project.update(|_| Ok(())).expect("second update");
}

#[test]
fn dispose_cancels_outstanding_reads() {
    let mut model = ProjectModel::new();
    add_module(&mut model, "app", "/p/app", &["/p/app/src"]);
    let fs = memory_fs(&["/p/app/src"]);
    let project = open(model, &fs);

    let read = project.read().expect("read");
    project.dispose();
    assert!(project.is_disposed());
    assert!(matches!(
        read.order_entries(Path::new("/p/app/src/Main.java")),
        Err(RootIndexError::Cancelled)
    ));
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "project is disposed"))]
fn disposed_projects_reject_reads() {
    let project = open(ProjectModel::new(), &memory_fs(&[]));
    project.dispose();
    assert!(matches!(project.read(), Err(RootIndexError::Disposed)));
}
