//! Configuration of the catalog build and usage phases.
//!
//! This crate is the entry point of the process that drives the other
//! crates; none of the library crates read configuration themselves. The
//! driver hands each section to the operation it parameterizes:
//!
//! - `index.documents` and `index.concurrency` to `apicat_build::build_directory`,
//! - `catalog.path` and `catalog.compression` to `apicat_store::save`, and
//!   `catalog.path` to `Catalog::open`,
//! - `usage.path` to `apicat_usage::UsageDatabase::open`.
//!
//! A [`Config`] is merged from three layers, later ones winning:
//!
//! 1. built-in defaults, with paths under the platform data directory,
//! 2. an optional file, `.toml`, `.yaml`/`.yml` or `.json` by extension,
//! 3. environment variables prefixed `APICAT_`, with `__` between nested
//!    keys (`APICAT_CATALOG__COMPRESSION=zstd`).
//!
//! ```toml
//! [index]
//! documents = "/srv/apicat/index"
//! concurrency = 8
//!
//! [catalog]
//! path = "/srv/apicat/apicatalog.dat"
//! compression = "deflate"
//!
//! [usage]
//! path = "/srv/apicat/usage.db"
//! ```

pub mod error;
mod load;

pub use apicat_compress::Compression;
pub use crate::load::ENV_PREFIX;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub catalog: CatalogConfig,
    pub usage: UsageConfig,
}

/// Where index documents are read from and how many are parsed at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub documents: PathBuf,
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Output of a build and input of every query.
    pub path: PathBuf,
    pub compression: Compression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    pub path: PathBuf,
}

/// Platform data directory, or the working directory when there is no home.
fn data_dir() -> PathBuf {
    ProjectDirs::from("", "", "apicat").map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf())
}

impl Default for Config {
    fn default() -> Self {
        Self::rooted_at(&data_dir())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            documents: data_dir().join("index"),
            concurrency: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { path: data_dir().join("apicatalog.dat"), compression: Compression::Deflate }
    }
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self { path: data_dir().join("usage.db") }
    }
}

impl Config {
    /// Defaults with every path placed under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            index: IndexConfig { documents: root.join("index"), ..IndexConfig::default() },
            catalog: CatalogConfig { path: root.join("apicatalog.dat"), ..CatalogConfig::default() },
            usage: UsageConfig { path: root.join("usage.db") },
        }
    }

    /// Rejects settings no phase could run with.
    pub fn validate(&self) -> Result<()> {
        if self.index.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("index.concurrency must be at least 1"));
        }
        if self.index.documents.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("index.documents must not be empty"));
        }
        if self.catalog.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("catalog.path must not be empty"));
        }
        if self.usage.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("usage.path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert!(config.index.concurrency >= 1);
        assert_eq!(config.catalog.compression, Compression::Deflate);
        assert_eq!(config.usage.path.file_name().unwrap(), "usage.db");
    }

    #[test]
    fn rooted_paths() {
        let config = Config::rooted_at(Path::new("/srv/apicat"));
        assert_eq!(config.index.documents, Path::new("/srv/apicat/index"));
        assert_eq!(config.catalog.path, Path::new("/srv/apicat/apicatalog.dat"));
        assert_eq!(config.usage.path, Path::new("/srv/apicat/usage.db"));
    }

    #[rstest]
    #[case::no_workers(|c: &mut Config| c.index.concurrency = 0, "index.concurrency must be at least 1")]
    #[case::no_documents(|c: &mut Config| c.index.documents = PathBuf::new(), "index.documents must not be empty")]
    #[case::no_catalog(|c: &mut Config| c.catalog.path = PathBuf::new(), "catalog.path must not be empty")]
    #[case::no_usage(|c: &mut Config| c.usage.path = PathBuf::new(), "usage.path must not be empty")]
    fn invalid_settings(#[case] change: fn(&mut Config), #[case] reason: &'static str) {
        let mut config = Config::rooted_at(Path::new("/tmp"));
        change(&mut config);
        assert_eq!(*config.validate().unwrap_err(), ErrorKind::Invalid(reason));
    }
}
