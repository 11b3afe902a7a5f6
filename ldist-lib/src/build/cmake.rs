//! CMake rockspec translation and the configure/build/install child-process
//! pipeline.
//!
//! Each step runs via `std::process::Command`; a `CommandFailure { name,
//! status, stdout, stderr }` variant is produced on non-zero exit, and
//! `CommandNotFound` when the binary itself is missing.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;

use crate::ordered_map::OrderedMap;
use crate::rockspec::{cmake_cache_script, BuildSpec};

#[derive(Debug, Error)]
pub enum CMakeError {
    #[error("{name} step failed.\nstatus: {status}\nstdout: {stdout}\nstderr: {stderr}")]
    CommandFailure {
        name: String,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    #[error("failed to run `{0}` step")]
    Io(#[source] io::Error),
    #[error("`{0}` command not found")]
    CommandNotFound(String),
    #[error("install manifest not found or unreadable at {0}")]
    InstallManifestUnreadable(PathBuf),
}

/// Everything needed to drive one CMake configure/build/install cycle.
pub struct CMakeBuildSpec {
    /// The CMake binary itself, used for the generator-agnostic `install`
    /// step (`cmake --install .` works regardless of which build tool
    /// `build_command` names).
    pub cmake_binary: String,
    /// Command used to prime the cache and configure the build (defaults
    /// to the CMake binary too, but independently overridable).
    pub cache_command: String,
    pub cache_debug_options: Vec<String>,
    /// Command used to run the actual build, invoked directly rather than
    /// through `cmake --build` (defaults to `make`).
    pub build_command: String,
    pub build_debug_options: Vec<String>,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub variables: OrderedMap<String, String>,
}

impl CMakeBuildSpec {
    /// Writes the cache script, then runs `configure`, `build`, `install`
    /// in sequence. Returns the absolute paths read back from CMake's
    /// generated `install_manifest.txt`.
    pub fn run(&self) -> Result<Vec<PathBuf>, CMakeError> {
        std::fs::create_dir_all(&self.build_dir).map_err(CMakeError::Io)?;
        self.write_cache_script()?;
        self.configure()?;
        self.build()?;
        self.install()?;
        self.read_install_manifest()
    }

    fn write_cache_script(&self) -> Result<(), CMakeError> {
        let script = cmake_cache_script(&self.variables);
        std::fs::write(self.build_dir.join("ldist-cache.cmake"), script).map_err(CMakeError::Io)
    }

    fn configure(&self) -> Result<(), CMakeError> {
        let mut args = vec![
            self.source_dir.to_string_lossy().into_owned(),
            "-C".to_string(),
            "ldist-cache.cmake".to_string(),
        ];
        args.extend(self.cache_debug_options.iter().cloned());
        self.run_step("configure", &self.cache_command, &args)
    }

    fn build(&self) -> Result<(), CMakeError> {
        self.run_step("build", &self.build_command, &self.build_debug_options)
    }

    fn install(&self) -> Result<(), CMakeError> {
        self.run_step(
            "install",
            &self.cmake_binary,
            &["--install".to_string(), ".".to_string()],
        )
    }

    fn run_step(&self, name: &str, binary: &str, args: &[String]) -> Result<(), CMakeError> {
        let output = Command::new(binary)
            .current_dir(&self.build_dir)
            .args(args)
            .output()
            .map_err(|_| CMakeError::CommandNotFound(binary.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(CMakeError::CommandFailure {
                name: name.to_string(),
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    fn read_install_manifest(&self) -> Result<Vec<PathBuf>, CMakeError> {
        let path = self.build_dir.join("install_manifest.txt");
        let content = std::fs::read_to_string(&path)
            .map_err(|_| CMakeError::InstallManifestUnreadable(path.clone()))?;
        Ok(content.lines().filter(|l| !l.trim().is_empty()).map(PathBuf::from).collect())
    }
}

/// Generates a minimal `CMakeLists.txt` from a rockspec's `build` table,
/// used when `build.type != "cmake"` or no user-authored file exists in
/// the source directory.
pub fn translate_rockspec(package_name: &str, version: &str, build: &BuildSpec) -> String {
    let mut out = format!(
        "cmake_minimum_required(VERSION 3.10)\nproject({package_name} VERSION {})\n\n",
        sanitize_cmake_version(version)
    );

    if build.modules.is_empty() {
        out.push_str("# no modules declared; nothing to build\n");
        return out;
    }

    for (module_name, source) in &build.modules {
        let target = module_name.replace('.', "_");
        out.push_str(&format!(
            "add_library({target} MODULE {source})\nset_target_properties({target} PROPERTIES PREFIX \"\")\ninstall(TARGETS {target} DESTINATION lib)\n",
        ));
    }

    out
}

/// CMake's `project(... VERSION x)` rejects non-numeric/hash-suffixed
/// version strings, so only the leading numeric components are kept.
fn sanitize_cmake_version(version: &str) -> String {
    version
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .next()
        .unwrap_or("0.0.0")
        .trim_end_matches('.')
        .to_string()
}

/// True when `source_dir` already contains a user-authored `CMakeLists.txt`
/// that should be used as-is instead of generating one.
pub fn has_user_cmakelists(source_dir: &Path) -> bool {
    source_dir.join("CMakeLists.txt").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn translates_modules_into_library_targets() {
        let build = BuildSpec {
            build_type: crate::rockspec::BuildType::Builtin,
            variables: BTreeMap::new(),
            modules: BTreeMap::from([("foo.bar".to_string(), "src/bar.c".to_string())]),
            install: None,
        };
        let content = translate_rockspec("xml", "1.8.0-1", &build);
        assert!(content.contains("add_library(foo_bar MODULE src/bar.c)"));
        assert!(content.contains("project(xml VERSION 1.8.0)"));
    }

    #[test]
    fn sanitizes_hash_suffixed_versions() {
        assert_eq!(sanitize_cmake_version("1.8.0-1_deadbeef"), "1.8.0");
    }

    #[test]
    fn detects_user_cmakelists() {
        let dir = tempdir::TempDir::new("ldist-cmake-test").unwrap();
        assert!(!has_user_cmakelists(dir.path()));
        std::fs::write(dir.path().join("CMakeLists.txt"), "").unwrap();
        assert!(has_user_cmakelists(dir.path()));
    }
}
