use std::ffi::OsStr;
use std::num::NonZeroUsize;
use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File names that never belong to a project unless they sit inside a content root that
/// was declared below them.
pub const DEFAULT_IGNORED_FILES: &[&str] = &[
    "*.pyc",
    "*.pyo",
    "*.rbc",
    "*.yarb",
    "*~",
    ".DS_Store",
    ".git",
    ".hg",
    ".svn",
    "CVS",
    "__pycache__",
    "_svn",
    "vssver.scc",
    "vssver2.scc",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid ignored_files glob {pattern:?}: {message}")]
    InvalidGlob { pattern: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err.message().to_string())
    }
}

/// Tuning knobs of the root index.
///
/// ```toml
/// ignored_files = [".git", "*.pyc"]
/// min_cache_size = 100
/// cache_size_divisor = 3
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RootIndexConfig {
    /// File-name globs that are ignored outside of content roots.
    pub ignored_files: Vec<String>,
    /// Lower bound of each per-generation cache segment.
    pub min_cache_size: usize,
    /// Cache segments hold `roots / cache_size_divisor` entries when that exceeds the minimum.
    pub cache_size_divisor: usize,
}

impl Default for RootIndexConfig {
    fn default() -> Self {
        Self {
            ignored_files: DEFAULT_IGNORED_FILES
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
            min_cache_size: 100,
            cache_size_divisor: 3,
        }
    }
}

impl RootIndexConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RootIndexConfig = toml::from_str(text)?;
        // Surface bad globs at load time rather than on first index build.
        config.ignored_files()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn cache_capacity(&self, root_count: usize) -> NonZeroUsize {
        let scaled = root_count / self.cache_size_divisor.max(1);
        NonZeroUsize::new(self.min_cache_size.max(scaled)).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn ignored_files(&self) -> Result<IgnoredFiles, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignored_files {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|err| ConfigError::InvalidGlob {
                    pattern: pattern.clone(),
                    message: err.to_string(),
                })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|err| ConfigError::InvalidGlob {
            pattern: self.ignored_files.join(";"),
            message: err.to_string(),
        })?;
        Ok(IgnoredFiles { set })
    }
}

/// Compiled [`RootIndexConfig::ignored_files`].
#[derive(Clone, Debug)]
pub struct IgnoredFiles {
    set: GlobSet,
}

impl IgnoredFiles {
    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
        }
    }

    pub fn is_ignored(&self, name: &OsStr) -> bool {
        self.set.is_match(Path::new(name))
    }
}
