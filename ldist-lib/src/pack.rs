//! The packer: re-exports an installed package as a redistributable rock.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::package::{Package, PackageName};
use crate::platform::PlatformSet;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("package '{0}' is not installed")]
    UnknownPackage(PackageName),
    #[error("installed file {0} is missing from the deploy root")]
    MissingFiles(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Computes the stable dependency hash over the exact runtime-dependency
/// versions resolved on `platform`: lowercase hex SHA-256 over
/// `platform\n<dep.name> <dep.version>\n...`, dependencies sorted by name
/// so that the same dependency set always produces the same hash
/// regardless of resolution order.
pub fn dep_hash(dependencies: &[&Package], platform: &PlatformSet) -> String {
    let mut sorted: Vec<&&Package> = dependencies.iter().collect();
    sorted.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

    let mut canonical = String::new();
    let current_tag = platform.tags().first().map(|t| t.to_string()).unwrap_or_default();
    canonical.push_str(&current_tag);
    canonical.push('\n');
    for dep in sorted {
        canonical.push_str(&format!("{} {}\n", dep.name, dep.version));
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Re-exports `pkg` (with its runtime `dependencies` already resolved to
/// exact installed [`Package`]s) into `destination`, copying its files out
/// of `deploy_root` and writing a rockspec whose version carries the
/// dependency hash and whose dependency list is loosened to `~> major.minor`.
pub fn pack(
    pkg: &Package,
    dependencies: &[&Package],
    deploy_root: &Path,
    destination: &Path,
    platform: &PlatformSet,
) -> Result<PathBuf, PackError> {
    let hash = dep_hash(dependencies, platform);
    let exported_version = pkg.version.with_hash(&hash);

    let export_dir = destination.join(format!("{} {exported_version}", pkg.name));
    std::fs::create_dir_all(&export_dir)?;

    for rel in &pkg.files {
        let src = deploy_root.join(rel);
        if !src.exists() {
            return Err(PackError::MissingFiles(rel.clone()));
        }
        let dst = export_dir.join(rel);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&src, &dst)?;
    }

    let rockspec = build_exported_rockspec(pkg, dependencies, &exported_version);
    let rockspec_path = export_dir.join(format!("{}-{exported_version}.rockspec", pkg.name));
    std::fs::write(&rockspec_path, rockspec)?;

    Ok(export_dir)
}

fn build_exported_rockspec(
    pkg: &Package,
    dependencies: &[&Package],
    exported_version: &crate::version::Version,
) -> String {
    let built_on = pkg
        .built_on_platform
        .as_ref()
        .map(|p| p.0.clone())
        .unwrap_or_else(|| PlatformSet::current().tags().first().map(|t| t.to_string()).unwrap_or_default());

    let mut deps = String::new();
    for dep in dependencies {
        let components = dep.version.components();
        let major_minor = match components.as_slice() {
            [major, minor, ..] => format!("{major}.{minor}"),
            [major] => format!("{major}.0"),
            [] => "0.0".to_string(),
        };
        deps.push_str(&format!("  \"{} ~> {major_minor}\",\n", dep.name));
    }

    let files: String = pkg
        .files
        .iter()
        .map(|f| format!("  \"{}\",\n", f.display()))
        .collect();

    format!(
        "package = \"{}\"\nversion = \"{exported_version}\"\n\ndescription = {{\n  built_on = \"{built_on}\",\n}}\n\ndependencies = {{\n{deps}}}\n\nfiles = {{\n{files}}}\n",
        pkg.name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn pkg(name: &str, version: &str) -> Package {
        Package::new(PackageName::new(name).unwrap(), Version::parse(version).unwrap())
    }

    #[test]
    fn dep_hash_is_deterministic_regardless_of_input_order() {
        let a = pkg("expat", "2.1.0");
        let b = pkg("zlib", "1.2.8");
        let platform = PlatformSet::new(vec!["linux-x86_64".into()]);

        let h1 = dep_hash(&[&a, &b], &platform);
        let h2 = dep_hash(&[&b, &a], &platform);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn dep_hash_changes_with_dependency_version() {
        let a = pkg("expat", "2.1.0");
        let a_newer = pkg("expat", "2.2.0");
        let platform = PlatformSet::new(vec!["linux-x86_64".into()]);

        assert_ne!(dep_hash(&[&a], &platform), dep_hash(&[&a_newer], &platform));
    }

    #[test]
    fn pack_copies_files_and_writes_exported_rockspec() {
        let deploy = tempdir::TempDir::new("ldist-pack-deploy").unwrap();
        let dest = tempdir::TempDir::new("ldist-pack-dest").unwrap();
        std::fs::create_dir_all(deploy.path().join("lib")).unwrap();
        std::fs::write(deploy.path().join("lib/xml.so"), b"binary").unwrap();

        let mut target = pkg("xml", "1.8.0-1");
        target.files = vec![PathBuf::from("lib/xml.so")];
        let expat = pkg("expat", "2.1.0");
        let platform = PlatformSet::new(vec!["linux-x86_64".into()]);

        let export_dir = pack(&target, &[&expat], deploy.path(), dest.path(), &platform).unwrap();
        assert!(export_dir.join("lib/xml.so").exists());
        let rockspec_files: Vec<_> = std::fs::read_dir(&export_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rockspec"))
            .collect();
        assert_eq!(rockspec_files.len(), 1);
    }

    #[test]
    fn pack_fails_when_a_recorded_file_is_missing() {
        let deploy = tempdir::TempDir::new("ldist-pack-missing").unwrap();
        let dest = tempdir::TempDir::new("ldist-pack-missing-dest").unwrap();
        let mut target = pkg("xml", "1.8.0-1");
        target.files = vec![PathBuf::from("lib/xml.so")];
        let platform = PlatformSet::new(vec!["linux-x86_64".into()]);

        let err = pack(&target, &[], deploy.path(), dest.path(), &platform).unwrap_err();
        assert!(matches!(err, PackError::MissingFiles(_)));
    }
}
