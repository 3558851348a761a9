use std::path::{Path, PathBuf};
use std::sync::Arc;

use nova_project::{ModuleId, OrderEntryHandle, SourceRootKind};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::index::RootIndex;
use crate::root_info::{DirectoryInfo, FileStatus};

/// File-level ownership queries over one index generation.
#[derive(Clone)]
pub struct ProjectFileIndex {
    index: Arc<RootIndex>,
    cancel: CancellationToken,
}

impl ProjectFileIndex {
    pub(crate) fn new(index: Arc<RootIndex>, cancel: CancellationToken) -> Self {
        Self { index, cancel }
    }

    pub fn info(&self, file: &Path) -> Arc<DirectoryInfo> {
        self.index.info_for_file(file)
    }

    pub fn is_in_project(&self, file: &Path) -> bool {
        self.info(file).is_in_project()
    }

    pub fn is_in_content(&self, file: &Path) -> bool {
        self.info(file).module.is_some()
    }

    /// Module sources or library sources.
    pub fn is_in_source(&self, file: &Path) -> bool {
        let info = self.info(file);
        info.is_in_module_source() || info.library_source_root.is_some()
    }

    pub fn is_in_test_source(&self, file: &Path) -> bool {
        self.info(file).source_root_kind == Some(SourceRootKind::Test)
    }

    pub fn is_in_library(&self, file: &Path) -> bool {
        self.info(file).is_in_library()
    }

    pub fn is_in_library_classes(&self, file: &Path) -> bool {
        self.info(file).library_class_root.is_some()
    }

    pub fn is_in_library_source(&self, file: &Path) -> bool {
        self.info(file).library_source_root.is_some()
    }

    /// Excluded or ignored.
    pub fn is_excluded(&self, file: &Path) -> bool {
        matches!(
            self.info(file).status,
            FileStatus::Excluded | FileStatus::Ignored
        )
    }

    pub fn is_under_ignored(&self, file: &Path) -> bool {
        self.info(file).status == FileStatus::Ignored
    }

    pub fn module_for_file(&self, file: &Path, honor_exclusion: bool) -> Option<ModuleId> {
        let info = self.info(file);
        if honor_exclusion {
            info.module
        } else {
            info.content_root_ignoring_exclusion
                .as_ref()
                .map(|(_, module)| *module)
        }
    }

    pub fn content_root_for_file(&self, file: &Path, honor_exclusion: bool) -> Option<PathBuf> {
        let info = self.info(file);
        if honor_exclusion {
            info.content_root.clone()
        } else {
            info.content_root_ignoring_exclusion
                .as_ref()
                .map(|(root, _)| root.clone())
        }
    }

    pub fn source_root_for_file(&self, file: &Path) -> Option<PathBuf> {
        self.info(file).source_root.clone()
    }

    pub fn class_root_for_file(&self, file: &Path) -> Option<PathBuf> {
        self.info(file).library_class_root.clone()
    }

    pub fn unloaded_module_for_file(&self, file: &Path) -> Option<String> {
        self.info(file).unloaded_module.clone()
    }

    pub fn package_name_by_directory(&self, dir: &Path) -> Option<Arc<str>> {
        self.index.package_name(dir)
    }

    pub fn order_entries_for_file(&self, file: &Path) -> Result<Arc<[OrderEntryHandle]>> {
        self.index.order_entries(file, &self.cancel)
    }
}
