use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{Result, RootIndexError};

/// File-name exclusion patterns declared on one content root.
#[derive(Debug, Clone)]
pub(crate) struct PatternTable {
    root: PathBuf,
    set: GlobSet,
}

impl PatternTable {
    /// Compiles `patterns`. Invalid patterns are skipped; `None` if nothing usable remains.
    pub(crate) fn new(root: &Path, module: &str, patterns: &[String]) -> Option<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut usable = 0usize;
        for pattern in patterns {
            match GlobBuilder::new(pattern).literal_separator(true).build() {
                Ok(glob) => {
                    builder.add(glob);
                    usable += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        target = "nova.roots",
                        module,
                        root = %root.display(),
                        pattern = %pattern,
                        error = %err,
                        "skipping invalid exclude pattern"
                    );
                }
            }
        }

        if usable == 0 {
            tracing::error!(
                target = "nova.roots",
                module,
                root = %root.display(),
                ?patterns,
                "content root declares exclude patterns but none of them is usable"
            );
            return None;
        }

        match builder.build() {
            Ok(set) => Some(Self {
                root: root.to_path_buf(),
                set,
            }),
            Err(err) => {
                tracing::error!(
                    target = "nova.roots",
                    module,
                    root = %root.display(),
                    error = %err,
                    "failed to build exclude pattern table"
                );
                None
            }
        }
    }

    /// Whether `file`, or any directory between it and the root, matches a pattern.
    ///
    /// The root itself is never matched against the patterns.
    pub(crate) fn is_excluded(&self, file: &Path) -> Result<bool> {
        if !file.starts_with(&self.root) {
            return Err(RootIndexError::FileOutsideRoot {
                file: file.to_path_buf(),
                root: self.root.clone(),
            });
        }

        Ok(file
            .ancestors()
            .take_while(|path| *path != self.root)
            .filter_map(|path| path.file_name())
            .any(|name| self.set.is_match(Path::new(name))))
    }

    /// [`PatternTable::is_excluded`] for callers that only ask about files below the root.
    ///
    /// A file outside the root is a caller bug: it is reported and treated as not excluded.
    pub(crate) fn excludes(&self, file: &Path) -> bool {
        match self.is_excluded(file) {
            Ok(excluded) => excluded,
            Err(err) => {
                tracing::error!(target = "nova.roots", error = %err, "exclude pattern lookup");
                debug_assert!(false, "{err}");
                false
            }
        }
    }
}
