//! Fetches resolved packages into per-package staging directories.
//!
//! A staging directory already holding the right package is reused rather
//! than re-downloaded. Remote sources are cloned with `git2`; local
//! `file://`/bare-path source URLs short-circuit straight to the existing
//! path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::PackageInfo;
use crate::package::Package;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to fetch '{name} {version}' from every configured repository: {attempts:?}")]
    AllReposFailed {
        name: String,
        version: String,
        attempts: Vec<(String, String)>,
    },
    #[error("'{0}' has no source URL and no local_url to fall back on")]
    NoSource(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where a fetched package landed on disk.
pub type StagingDirs = HashMap<String, PathBuf>;

fn staging_dir_name(package: &Package) -> String {
    format!("{} {}", package.name, package.version)
}

/// True when `dir` already holds a valid staged copy of `package`: it
/// exists, is non-empty, and contains the expected rockspec (or, for an
/// already-built binary package, at least one file).
fn is_valid_staging(dir: &Path, package: &Package) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let rockspec_name = format!("{}-{}.rockspec", package.name, package.version.without_hash());
    if dir.join(&rockspec_name).exists() {
        return true;
    }
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

/// Fetches every package in `packages` into `destination`, skipping any
/// whose staging directory is already valid. Packages whose manifest entry
/// has `local_url` set are used directly from that path, without copying.
pub fn fetch(
    packages: &[(Package, PackageInfo)],
    destination: &Path,
    repo_paths: &[String],
) -> Result<StagingDirs, DownloadError> {
    std::fs::create_dir_all(destination)?;
    let mut staged = StagingDirs::new();

    for (package, info) in packages {
        if let Some(local_url) = &info.local_url {
            staged.insert(package.name.to_string(), local_url.clone());
            continue;
        }

        let dir = destination.join(staging_dir_name(package));
        if is_valid_staging(&dir, package) {
            staged.insert(package.name.to_string(), dir);
            continue;
        }

        fetch_from_repos(package, &dir, repo_paths)?;
        staged.insert(package.name.to_string(), dir);
    }

    Ok(staged)
}

fn fetch_from_repos(package: &Package, dir: &Path, repo_paths: &[String]) -> Result<(), DownloadError> {
    let mut attempts = Vec::new();
    for repo in repo_paths {
        match try_clone_from(repo, package, dir) {
            Ok(()) => return Ok(()),
            Err(e) => attempts.push((repo.clone(), e.to_string())),
        }
    }
    Err(DownloadError::AllReposFailed {
        name: package.name.to_string(),
        version: package.version.to_string(),
        attempts,
    })
}

fn try_clone_from(repo: &str, package: &Package, dir: &Path) -> Result<(), git2::Error> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| git2::Error::from_str(&e.to_string()))?;
    }
    let url = format!("{}/{}", repo.trim_end_matches('/'), package.name);
    git2::build::RepoBuilder::new().clone(&url, dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageName;
    use crate::version::Version;

    fn sample_package() -> Package {
        Package::new(PackageName::new("xml").unwrap(), Version::parse("1.8.0-1").unwrap())
    }

    fn sample_info(local_url: Option<PathBuf>) -> PackageInfo {
        PackageInfo {
            version: Version::parse("1.8.0-1").unwrap(),
            dependencies: vec![],
            supported_platforms: None,
            local_url,
        }
    }

    #[test]
    fn staging_dir_name_embeds_name_and_version() {
        assert_eq!(staging_dir_name(&sample_package()), "xml 1.8.0-1");
    }

    #[test]
    fn local_source_is_used_directly_without_copying() {
        let src = tempdir::TempDir::new("ldist-download-src").unwrap();
        std::fs::write(src.path().join("xml-1.8.0-1.rockspec"), "package = \"xml\"").unwrap();
        let dest_root = tempdir::TempDir::new("ldist-download-dest").unwrap();

        let package = sample_package();
        let info = sample_info(Some(src.path().to_path_buf()));
        let staged = fetch(&[(package, info)], dest_root.path(), &[]).unwrap();

        let dir = staged.get("xml").unwrap();
        assert_eq!(dir, src.path());
        assert!(dir.join("xml-1.8.0-1.rockspec").exists());
    }

    #[test]
    fn already_valid_staging_is_not_refetched() {
        let dest_root = tempdir::TempDir::new("ldist-download-dest").unwrap();
        let package = sample_package();
        let dir = dest_root.path().join(staging_dir_name(&package));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("xml-1.8.0-1.rockspec"), "package = \"xml\"").unwrap();

        let info = sample_info(None);
        // No repo_paths and no local_url: would fail to fetch if it tried.
        let staged = fetch(&[(package, info)], dest_root.path(), &[]).unwrap();
        assert_eq!(staged.get("xml").unwrap(), &dir);
    }
}
