//! The installer: the seven-step pipeline from a staged source directory to
//! a recorded, installed [`Package`].

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::build::{accumulate_variables, cmake, CMakeBuildSpec, CMakeError};
use crate::layout::DeployLayout;
use crate::package::{BuiltOnPlatform, Package, PackageName};
use crate::platform::PlatformSet;
use crate::rockspec::{Rockspec, RockspecParseError};

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to load rockspec for '{0}': {1}")]
    RockspecLoad(PackageName, #[source] RockspecParseError),
    #[error("failed to write generated CMakeLists.txt for '{0}': {1}")]
    CMakeGenerate(PackageName, #[source] std::io::Error),
    #[error("configure step failed:\nstdout: {stdout}\nstderr: {stderr}")]
    Configure { stdout: String, stderr: String },
    #[error("build step failed:\nstdout: {stdout}\nstderr: {stderr}")]
    Build { stdout: String, stderr: String },
    #[error("install step failed:\nstdout: {stdout}\nstderr: {stderr}")]
    Install { stdout: String, stderr: String },
    #[error("install manifest unreadable at {0}")]
    InstallManifestUnreadable(PathBuf),
    #[error("cmake binary not found: {0}")]
    CommandNotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<CMakeError> for InstallError {
    fn from(err: CMakeError) -> Self {
        match err {
            CMakeError::CommandFailure { name, stdout, stderr, .. } => match name.as_str() {
                "configure" => InstallError::Configure { stdout, stderr },
                "build" => InstallError::Build { stdout, stderr },
                _ => InstallError::Install { stdout, stderr },
            },
            CMakeError::Io(source) => InstallError::Io(source),
            CMakeError::CommandNotFound(bin) => InstallError::CommandNotFound(bin),
            CMakeError::InstallManifestUnreadable(path) => InstallError::InstallManifestUnreadable(path),
        }
    }
}

pub struct InstallOptions<'a> {
    pub staging_dir: &'a Path,
    pub build_dir: &'a Path,
    pub layout: &'a DeployLayout,
    pub cmake_binary: &'a str,
    pub cache_command: &'a str,
    pub cache_debug_options: &'a [String],
    pub build_command: &'a str,
    pub build_debug_options: &'a [String],
    pub default_variables: &'a std::collections::BTreeMap<String, String>,
    pub override_variables: &'a std::collections::BTreeMap<String, String>,
    pub platform: &'a PlatformSet,
    pub debug: bool,
}

/// Installs one package from its staged source directory, following the
/// seven-step algorithm. Returns the package with `spec`, `files`, and
/// (for binary packages) `built_on_platform` populated.
pub fn install(mut pkg: Package, opts: &InstallOptions) -> Result<Package, InstallError> {
    // Step 1: load rockspec
    let rockspec_path = find_rockspec(opts.staging_dir, &pkg.name, &pkg.version)?;
    let source = std::fs::read_to_string(&rockspec_path)?;
    let spec = Rockspec::parse(&source).map_err(|e| InstallError::RockspecLoad(pkg.name.clone(), e))?;

    // Step 2: binary short-circuit
    if spec.is_binary() {
        return install_binary(pkg, spec, opts);
    }

    pkg.spec = Some(spec.clone());

    // Step 3: accumulate CMake variables
    let rockspec_vars = spec
        .build
        .as_ref()
        .map(|b| b.variables.clone())
        .unwrap_or_default();
    let variables = accumulate_variables(
        opts.default_variables,
        opts.override_variables,
        &rockspec_vars,
        opts.layout.root(),
    );

    // Step 4: translate rockspec -> CMakeLists.txt, unless a user file exists
    let build = spec.build.clone().unwrap_or(crate::rockspec::BuildSpec {
        build_type: crate::rockspec::BuildType::Cmake,
        variables: Default::default(),
        modules: Default::default(),
        install: None,
    });
    if !(build.build_type == crate::rockspec::BuildType::Cmake
        && cmake::has_user_cmakelists(opts.staging_dir))
    {
        let generated = cmake::translate_rockspec(pkg.name.as_str(), &pkg.version.to_string(), &build);
        std::fs::write(opts.staging_dir.join("CMakeLists.txt"), generated)
            .map_err(|e| InstallError::CMakeGenerate(pkg.name.clone(), e))?;
    }

    // Step 5+6: cache script, configure, build, install, read manifest
    let build_spec = CMakeBuildSpec {
        cmake_binary: opts.cmake_binary.to_string(),
        cache_command: opts.cache_command.to_string(),
        cache_debug_options: opts.cache_debug_options.to_vec(),
        build_command: opts.build_command.to_string(),
        build_debug_options: opts.build_debug_options.to_vec(),
        source_dir: opts.staging_dir.to_path_buf(),
        build_dir: opts.build_dir.to_path_buf(),
        variables,
    };
    let absolute_files = build_spec.run()?;
    pkg.files = absolute_files
        .iter()
        .filter_map(|p| opts.layout.relativize(p))
        .collect();

    // Step 7: cleanup
    if !opts.debug {
        let _ = std::fs::remove_dir_all(opts.staging_dir);
        let _ = std::fs::remove_dir_all(opts.build_dir);
    }

    Ok(pkg)
}

fn install_binary(mut pkg: Package, spec: Rockspec, opts: &InstallOptions) -> Result<Package, InstallError> {
    let mut files = Vec::with_capacity(spec.files.len());
    for rel in &spec.files {
        let src = opts.staging_dir.join(rel);
        let dst = opts.layout.root().join(rel);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&src, &dst)?;
        files.push(PathBuf::from(rel));
    }

    if let Ok(unhashed) = pkg.version.without_hash().parse() {
        pkg.version = unhashed;
    }
    pkg.files = files;
    pkg.built_on_platform = Some(BuiltOnPlatform(
        spec.description
            .built_on
            .unwrap_or_else(|| opts.platform.tags().first().map(|t| t.to_string()).unwrap_or_default()),
    ));
    pkg.spec = Some(spec);

    if !opts.debug {
        let _ = std::fs::remove_dir_all(opts.staging_dir);
    }

    Ok(pkg)
}

fn find_rockspec(staging_dir: &Path, name: &PackageName, version: &crate::version::Version) -> std::io::Result<PathBuf> {
    let expected = staging_dir.join(format!("{name}-{}.rockspec", version.without_hash()));
    if expected.exists() {
        return Ok(expected);
    }
    for entry in std::fs::read_dir(staging_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "rockspec") {
            return Ok(path);
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    #[test]
    fn find_rockspec_prefers_exact_name_match() {
        let dir = tempdir::TempDir::new("ldist-install-test").unwrap();
        std::fs::write(dir.path().join("xml-1.8.0-1.rockspec"), "").unwrap();
        std::fs::write(dir.path().join("other.rockspec"), "").unwrap();
        let name = PackageName::new("xml").unwrap();
        let version = Version::parse("1.8.0-1").unwrap();
        let found = find_rockspec(dir.path(), &name, &version).unwrap();
        assert_eq!(found.file_name().unwrap(), "xml-1.8.0-1.rockspec");
    }

    #[test]
    fn install_binary_strips_hash_and_sets_built_on() {
        let staging = tempdir::TempDir::new("ldist-install-staging").unwrap();
        let root = tempdir::TempDir::new("ldist-install-root").unwrap();
        std::fs::write(staging.path().join("xml.so"), b"binary").unwrap();

        let layout = DeployLayout::new(root.path());
        layout.ensure().unwrap();

        let pkg = Package::new(PackageName::new("xml").unwrap(), Version::parse("1.8.0-1_deadbeef").unwrap());
        let spec = Rockspec {
            package: PackageName::new("xml").unwrap(),
            version: Version::parse("1.8.0-1_deadbeef").unwrap(),
            source: None,
            description: Default::default(),
            dependencies: vec![],
            supported_platforms: None,
            build: None,
            files: vec!["xml.so".to_string()],
        };
        let platform = PlatformSet::new(vec!["linux".into()]);
        let default_vars = Default::default();
        let override_vars = Default::default();
        let cache_debug_options = Vec::new();
        let build_debug_options = Vec::new();
        let opts = InstallOptions {
            staging_dir: staging.path(),
            build_dir: root.path(),
            layout: &layout,
            cmake_binary: "cmake",
            cache_command: "cmake",
            cache_debug_options: &cache_debug_options,
            build_command: "make",
            build_debug_options: &build_debug_options,
            default_variables: &default_vars,
            override_variables: &override_vars,
            platform: &platform,
            debug: true,
        };
        let installed = install_binary(pkg, spec, &opts).unwrap();
        assert_eq!(installed.version, Version::parse("1.8.0-1").unwrap());
        assert!(installed.built_on_platform.is_some());
        assert_eq!(installed.files, vec![PathBuf::from("xml.so")]);
        assert!(root.path().join("xml.so").exists());
    }
}
