//! The manifest store: merges one or more upstream package indices into a
//! single in-memory [`Manifest`], earlier sources winning ties.
//!
//! Remote (`git://`, `http(s)://`, `ssh://`, or a `.git`-suffixed) URLs are
//! cloned with `git2` and their manifest file read from the checkout. Local
//! paths are scanned one level deep for `.rockspec` files via
//! `std::fs::read_dir` (no recursive walk is needed at this depth).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::lua_eval::{self, LuaEvalError, TaggedValue};
use crate::package::{PackageName, PackageNameParseError, PackageRef, PackageRefParseError};
use crate::rockspec::{Rockspec, RockspecParseError};
use crate::version::{Version, VersionParseError};

const MANIFEST_FIELDS: &[&str] = &["packages"];

#[derive(Debug, Error)]
pub enum ManifestStoreError {
    #[error("failed to clone manifest repository {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },
    #[error("local repository inclusion is disabled (url/path: {0})")]
    LocalReposDisabled(String),
    #[error("failed to load rockspec {path}: {source}")]
    RockspecLoad {
        path: PathBuf,
        #[source]
        source: RockspecParseError,
    },
    #[error("manifest file not found at {0}")]
    ManifestFileMissing(PathBuf),
    #[error(transparent)]
    ManifestEval(#[from] LuaEvalError),
    #[error("manifest entry for '{0}' has the wrong shape")]
    WrongShape(String),
    #[error(transparent)]
    PackageName(#[from] PackageNameParseError),
    #[error(transparent)]
    Version(#[from] VersionParseError),
    #[error(transparent)]
    Dependency(#[from] PackageRefParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// `PackageInfo`: one version entry inside a [`Manifest`].
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInfo {
    pub version: Version,
    pub dependencies: Vec<PackageRef>,
    pub supported_platforms: Option<Vec<String>>,
    /// Set when this entry was discovered by scanning a local repository
    /// directory directly, rather than read out of a manifest file; holds
    /// the path to the package's source directory.
    pub local_url: Option<PathBuf>,
}

/// The merged view of every package index pulled in by `download_manifest`.
/// `repo_path` accumulates one entry per contributing source, in the order
/// they were merged.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    repo_path: Vec<String>,
    packages: HashMap<PackageName, HashMap<String, PackageInfo>>,
}

impl Manifest {
    pub fn repo_path(&self) -> &[String] {
        &self.repo_path
    }

    pub fn has_package(&self, name: &PackageName) -> bool {
        self.packages.contains_key(name)
    }

    pub fn versions(&self, name: &PackageName) -> impl Iterator<Item = &PackageInfo> {
        self.packages.get(name).into_iter().flat_map(|m| m.values())
    }

    /// Greatest version for `name` satisfying `constraint` on the active
    /// platform set, ties broken by greater revision (component-wise
    /// already accounts for revision in [`Version`]'s `Ord`).
    pub fn best_match(
        &self,
        reference: &PackageRef,
        platform: &crate::platform::PlatformSet,
    ) -> Option<&PackageInfo> {
        self.versions(&reference.name)
            .filter(|info| reference.constraint.matches(&info.version))
            .filter(|info| platform.satisfies(info.supported_platforms.as_deref()))
            .max_by(|a, b| a.version.cmp(&b.version))
    }

    pub(crate) fn insert_if_absent(&mut self, name: PackageName, info: PackageInfo) {
        let versions = self.packages.entry(name).or_default();
        versions.entry(info.version.canonical_key()).or_insert(info);
    }
}

/// Downloads and merges the manifests at `urls`, in order, earlier URLs
/// taking precedence for any (name, version) collision. `temp_root` is
/// where remote repositories are cloned (`<root>/tmp/manifest_N`); any
/// single URL's failure fails the whole operation.
pub fn download_manifest(
    urls: &[String],
    manifest_filename: &str,
    include_local_repos: bool,
    temp_root: &Path,
) -> Result<Manifest, ManifestStoreError> {
    let mut manifest = Manifest::default();
    for (index, url) in urls.iter().enumerate() {
        let entries = if is_remote_url(url) {
            let clone_dir = temp_root.join(format!("manifest_{index}"));
            fetch_remote_entries(url, &clone_dir, manifest_filename)?
        } else {
            if !include_local_repos {
                return Err(ManifestStoreError::LocalReposDisabled(url.clone()));
            }
            scan_local_entries(Path::new(url))?
        };
        for (name, info) in entries {
            manifest.insert_if_absent(name, info);
        }
        manifest.repo_path.push(url.clone());
    }
    Ok(manifest)
}

fn is_remote_url(url: &str) -> bool {
    url.starts_with("git://")
        || url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("ssh://")
        || url.ends_with(".git")
}

fn fetch_remote_entries(
    url: &str,
    clone_dir: &Path,
    manifest_filename: &str,
) -> Result<Vec<(PackageName, PackageInfo)>, ManifestStoreError> {
    if clone_dir.exists() {
        std::fs::remove_dir_all(clone_dir)?;
    }
    std::fs::create_dir_all(clone_dir.parent().unwrap_or(clone_dir))?;

    // git2 has no portable equivalent of a CLI `--depth` shallow clone; we
    // fetch the default branch tip only, which is as shallow as the
    // library supports (see DESIGN.md).
    let mut fetch_options = git2::FetchOptions::new();
    fetch_options.download_tags(git2::AutotagOption::None);
    git2::build::RepoBuilder::new()
        .fetch_options(fetch_options)
        .clone(url, clone_dir)
        .map_err(|source| ManifestStoreError::Clone {
            url: url.to_string(),
            source,
        })?;

    let manifest_path = clone_dir.join(manifest_filename);
    if !manifest_path.exists() {
        return Err(ManifestStoreError::ManifestFileMissing(manifest_path));
    }
    let content = std::fs::read_to_string(&manifest_path)?;
    parse_manifest_file(&content)
}

fn scan_local_entries(root: &Path) -> Result<Vec<(PackageName, PackageInfo)>, ManifestStoreError> {
    let mut entries = Vec::new();
    let Ok(read_dir) = std::fs::read_dir(root) else {
        return Ok(entries);
    };
    for dir_entry in read_dir {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(rockspec_path) = find_rockspec(&path)? else {
            continue;
        };
        let source = std::fs::read_to_string(&rockspec_path)?;
        let spec = Rockspec::parse(&source).map_err(|source| ManifestStoreError::RockspecLoad {
            path: rockspec_path.clone(),
            source,
        })?;
        entries.push((
            spec.package.clone(),
            PackageInfo {
                version: spec.version,
                dependencies: spec.dependencies,
                supported_platforms: spec.supported_platforms,
                local_url: Some(path.clone()),
            },
        ));
    }
    Ok(entries)
}

fn find_rockspec(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "rockspec") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn parse_manifest_file(source: &str) -> Result<Vec<(PackageName, PackageInfo)>, ManifestStoreError> {
    let fields = lua_eval::eval_globals(source, MANIFEST_FIELDS)?;
    let Some(packages) = fields.get("packages") else {
        return Ok(Vec::new());
    };
    let table = packages
        .as_table()
        .ok_or_else(|| ManifestStoreError::WrongShape("packages".to_string()))?;

    let mut entries = Vec::new();
    for (name_str, versions) in table {
        let name = PackageName::new(name_str)?;
        let versions_table = versions
            .as_table()
            .ok_or_else(|| ManifestStoreError::WrongShape(name_str.clone()))?;
        for (version_str, info) in versions_table {
            let version = Version::parse(version_str)?;
            let dependencies = info
                .get("dependencies")
                .map(|v| {
                    v.string_list()
                        .into_iter()
                        .map(|s| s.parse::<PackageRef>())
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
                .unwrap_or_default();
            let supported_platforms = info.get("supported_platforms").map(TaggedValue::string_list);
            let local_url = info
                .get("local_url")
                .and_then(TaggedValue::as_str)
                .map(PathBuf::from);
            entries.push((
                name.clone(),
                PackageInfo {
                    version,
                    dependencies,
                    supported_platforms,
                    local_url,
                },
            ));
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformSet;

    const SAMPLE_MANIFEST: &str = r#"
        packages = {
            xml = {
                ["1.8.0-1"] = { dependencies = { "lua >= 5.1" } },
                ["1.7.0-1"] = { dependencies = { "lua >= 5.1" } },
            },
        }
    "#;

    #[test]
    fn parses_packages_table() {
        let entries = parse_manifest_file(SAMPLE_MANIFEST).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|(name, _)| name.as_str() == "xml"));
    }

    #[test]
    fn first_source_wins_on_collision() {
        let mut manifest = Manifest::default();
        let name = PackageName::new("xml").unwrap();
        manifest.insert_if_absent(
            name.clone(),
            PackageInfo {
                version: Version::parse("1.0").unwrap(),
                dependencies: vec![],
                supported_platforms: None,
                local_url: Some(PathBuf::from("/first")),
            },
        );
        manifest.insert_if_absent(
            name.clone(),
            PackageInfo {
                version: Version::parse("1.0").unwrap(),
                dependencies: vec![],
                supported_platforms: None,
                local_url: Some(PathBuf::from("/second")),
            },
        );
        let info = manifest.versions(&name).next().unwrap();
        assert_eq!(info.local_url, Some(PathBuf::from("/first")));
    }

    #[test]
    fn best_match_respects_constraint_and_platform() {
        let mut manifest = Manifest::default();
        let name = PackageName::new("xml").unwrap();
        manifest.insert_if_absent(
            name.clone(),
            PackageInfo {
                version: Version::parse("1.8.0-1").unwrap(),
                dependencies: vec![],
                supported_platforms: Some(vec!["!windows".to_string()]),
                local_url: None,
            },
        );
        manifest.insert_if_absent(
            name.clone(),
            PackageInfo {
                version: Version::parse("1.7.0-1").unwrap(),
                dependencies: vec![],
                supported_platforms: None,
                local_url: None,
            },
        );
        let reference: PackageRef = "xml >= 1.0".parse().unwrap();
        let platform = PlatformSet::new(vec!["linux".into()]);
        let best = manifest.best_match(&reference, &platform).unwrap();
        assert_eq!(best.version, Version::parse("1.8.0-1").unwrap());
    }
}
