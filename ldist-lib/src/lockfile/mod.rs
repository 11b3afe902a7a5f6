//! `InstalledSet`: the persisted record of every installed package.
//!
//! An ordered list of packages with `files` populated, persisted as a
//! pretty-printed record. Shared-file removal is resolved here as
//! **ref-counting** (DESIGN.md): each relative file path carries a
//! reference count, decremented on remove, physically deleted only at
//! zero.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ordered_map::OrderedMap;
use crate::package::{Package, PackageName};

const LOCKFILE_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("failed to read installed-set file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse installed-set file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write installed-set file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("package '{0}' is not installed")]
    NotInstalled(PackageName),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSet {
    version: String,
    packages: Vec<Package>,
    /// Reference count per deploy-root-relative file path, shared across
    /// every package that installed it.
    file_refcounts: HashMap<PathBuf, u32>,
}

/// The installed package set plus the file reference counts needed to
/// remove packages safely when they share files.
#[derive(Debug, Clone, Default)]
pub struct InstalledSet {
    packages: OrderedMap<PackageName, Package>,
    file_refcounts: HashMap<PathBuf, u32>,
}

impl InstalledSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the installed set from `path`, or returns an empty set if the
    /// file does not exist yet (a fresh root directory).
    pub fn load(path: &Path) -> Result<Self, LockfileError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path).map_err(|source| LockfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let persisted: PersistedSet =
            serde_json::from_str(&text).map_err(|source| LockfileError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let mut packages = OrderedMap::new();
        for pkg in persisted.packages {
            packages.insert(pkg.name.clone(), pkg);
        }
        Ok(Self {
            packages,
            file_refcounts: persisted.file_refcounts,
        })
    }

    /// Persists the installed set to `path`, preserving insertion order
    /// across the load/save round trip.
    pub fn save(&self, path: &Path) -> Result<(), LockfileError> {
        let persisted = PersistedSet {
            version: LOCKFILE_VERSION.to_string(),
            packages: self.packages.values().cloned().collect(),
            file_refcounts: self.file_refcounts.clone(),
        };
        let text = serde_json::to_string_pretty(&persisted).expect("InstalledSet is always serializable");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockfileError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, text).map_err(|source| LockfileError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, name: &PackageName) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &PackageName) -> bool {
        self.packages.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn as_working_set(&self) -> OrderedMap<PackageName, Package> {
        self.packages.clone()
    }

    /// Records a newly-installed package and bumps the refcount of every
    /// file it owns (files may already be owned by another package).
    pub fn record(&mut self, package: Package) {
        for file in &package.files {
            *self.file_refcounts.entry(file.clone()).or_insert(0) += 1;
        }
        self.packages.insert(package.name.clone(), package);
    }

    /// Removes `name`, decrementing the refcount of each of its files and
    /// returning only the files that dropped to zero — i.e. the ones the
    /// caller should actually delete from the deploy root. Files still
    /// referenced by another installed package are left in place.
    pub fn remove(&mut self, name: &PackageName) -> Result<Vec<PathBuf>, LockfileError> {
        let package = self
            .packages
            .remove(name)
            .ok_or_else(|| LockfileError::NotInstalled(name.clone()))?;

        let mut to_delete = Vec::new();
        for file in &package.files {
            if let Some(count) = self.file_refcounts.get_mut(file) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.file_refcounts.remove(file);
                    to_delete.push(file.clone());
                }
            }
        }
        Ok(to_delete)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
