//! Build-variable accumulation shared by the CMake translation/runner.

pub mod cmake;

use std::collections::BTreeMap;
use std::path::Path;

use crate::ordered_map::OrderedMap;

pub use cmake::{CMakeBuildSpec, CMakeError};

/// The three CMake search-path variables extended with the deploy root's
/// `include`/`lib`/`bin` directories so a package being built can find an
/// already-installed dependency.
const SEARCH_PATH_VARS: [&str; 3] = ["CMAKE_INCLUDE_PATH", "CMAKE_LIBRARY_PATH", "CMAKE_PROGRAM_PATH"];

/// Accumulates the final CMake cache-variable set: `defaults ← overrides ←
/// rockspec`, first source to set a key wins. Then unconditionally sets
/// `CMAKE_INSTALL_PREFIX` to `root`, and extends (not replaces) each of
/// [`SEARCH_PATH_VARS`] with `root/{include,lib,bin}`.
pub fn accumulate_variables(
    defaults: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
    rockspec_vars: &BTreeMap<String, String>,
    root: &Path,
) -> OrderedMap<String, String> {
    let mut variables = OrderedMap::new();
    for source in [defaults, overrides, rockspec_vars] {
        for (key, value) in source {
            if !variables.contains_key(key) {
                variables.insert(key.clone(), value.clone());
            }
        }
    }

    variables.insert(
        "CMAKE_INSTALL_PREFIX".to_string(),
        root.to_string_lossy().into_owned(),
    );

    let search_dirs = [
        root.join("include"),
        root.join("lib"),
        root.join("bin"),
    ];
    for (var, dir) in SEARCH_PATH_VARS.iter().zip(search_dirs.iter()) {
        let extended = match variables.get(&var.to_string()) {
            Some(existing) if !existing.is_empty() => {
                format!("{existing}{}{}", path_list_separator(), dir.to_string_lossy())
            }
            _ => dir.to_string_lossy().into_owned(),
        };
        variables.insert(var.to_string(), extended);
    }

    variables
}

fn path_list_separator() -> char {
    if cfg!(windows) {
        ';'
    } else {
        ':'
    }
}
