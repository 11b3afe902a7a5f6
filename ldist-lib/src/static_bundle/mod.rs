//! The static bundler: assembles one CMake build tree that links every
//! requested package and its dependencies into a single statically linked
//! executable.

pub mod shim;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::package::{Package, PackageName};
use shim::PreloadModule;

#[derive(Debug, Error)]
pub enum StaticBundleError {
    #[error("failed to generate CMakeLists.txt for package '{0}'")]
    CMakeListsGenerate(PackageName),
    #[error("failed to write the aggregate CMakeLists.txt: {0}")]
    MainCMakeListsWrite(#[source] io::Error),
    #[error("failed to write the generated config template: {0}")]
    ConfigTemplateWrite(#[source] io::Error),
}

/// Assembles the aggregate build tree under `destination`: one subdirectory
/// per package (each with its own `CMakeLists.txt` building a `STATIC`
/// library per declared module), a generated preload shim, and a top-level
/// `CMakeLists.txt` that links everything into one executable. `packages`
/// must already be in dependency-first order (the [`crate::resolver`]'s
/// output order). Returns the destination path on success.
pub fn generate(packages: &[Package], destination: &Path) -> Result<PathBuf, StaticBundleError> {
    std::fs::create_dir_all(destination).map_err(StaticBundleError::MainCMakeListsWrite)?;

    let mut subdirs = Vec::new();
    let mut targets = Vec::new();
    let mut preload_modules = Vec::new();

    for pkg in packages {
        let Some(build) = pkg.spec.as_ref().and_then(|s| s.build.as_ref()) else {
            continue;
        };
        if build.modules.is_empty() {
            continue;
        }

        let pkg_dir = destination.join(pkg.name.as_str());
        std::fs::create_dir_all(&pkg_dir)
            .map_err(|_| StaticBundleError::CMakeListsGenerate(pkg.name.clone()))?;

        let mut pkg_targets = Vec::new();
        for module_name in build.modules.keys() {
            pkg_targets.push(module_name.replace('.', "_"));
            preload_modules.push(PreloadModule::new(module_name.clone()));
        }

        let content = translate_static(pkg.name.as_str(), build);
        std::fs::write(pkg_dir.join("CMakeLists.txt"), content)
            .map_err(|_| StaticBundleError::CMakeListsGenerate(pkg.name.clone()))?;

        subdirs.push(pkg.name.as_str().to_string());
        targets.extend(pkg_targets);
    }

    let shim_source = shim::generate_shim(&preload_modules);
    std::fs::write(destination.join("ldist_preload.c"), shim_source)
        .map_err(StaticBundleError::ConfigTemplateWrite)?;

    std::fs::write(destination.join("main.c"), main_template())
        .map_err(StaticBundleError::ConfigTemplateWrite)?;

    let main_cmake = render_main_cmakelists(&subdirs, &targets);
    std::fs::write(destination.join("CMakeLists.txt"), main_cmake)
        .map_err(StaticBundleError::MainCMakeListsWrite)?;

    Ok(destination.to_path_buf())
}

/// Like [`crate::build::cmake::translate_rockspec`] but emits `STATIC`
/// libraries (no install rules) since the bundle has no install step —
/// only an aggregate executable link.
fn translate_static(package_name: &str, build: &crate::rockspec::BuildSpec) -> String {
    let mut out = format!("project({package_name})\n\n");
    for (module_name, source) in &build.modules {
        let target = module_name.replace('.', "_");
        out.push_str(&format!("add_library({target} STATIC {source})\n"));
    }
    out
}

fn render_main_cmakelists(subdirs: &[String], targets: &[String]) -> String {
    let mut out = String::from("cmake_minimum_required(VERSION 3.10)\nproject(ldist_static_bundle C)\n\n");
    for subdir in subdirs {
        out.push_str(&format!("add_subdirectory({subdir})\n"));
    }
    out.push('\n');
    out.push_str("add_executable(ldist_static_bundle main.c ldist_preload.c)\n");
    if !targets.is_empty() {
        out.push_str(&format!(
            "target_link_libraries(ldist_static_bundle {})\n",
            targets.join(" ")
        ));
    }
    out
}

fn main_template() -> String {
    "/* generated entry point: preloads every bundled module, then hands\n * control to the embedded Lua interpreter. */\n#include \"lua.h\"\n#include \"lauxlib.h\"\n#include \"lualib.h\"\n\nvoid ldist_preload_all(lua_State *L);\n\nint main(int argc, char **argv) {\n  lua_State *L = luaL_newstate();\n  luaL_openlibs(L);\n  ldist_preload_all(L);\n  if (argc > 1 && luaL_dofile(L, argv[1]) != LUA_OK) {\n    fprintf(stderr, \"%s\\n\", lua_tostring(L, -1));\n    lua_close(L);\n    return 1;\n  }\n  lua_close(L);\n  return 0;\n}\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageName;
    use crate::rockspec::{BuildSpec, BuildType};
    use crate::version::Version;
    use std::collections::BTreeMap;

    fn pkg_with_module(name: &str, module: &str, source: &str) -> Package {
        let mut pkg = Package::new(PackageName::new(name).unwrap(), Version::parse("1.0").unwrap());
        pkg.spec = Some(crate::rockspec::Rockspec {
            package: PackageName::new(name).unwrap(),
            version: Version::parse("1.0").unwrap(),
            source: None,
            description: Default::default(),
            dependencies: vec![],
            supported_platforms: None,
            build: Some(BuildSpec {
                build_type: BuildType::Builtin,
                variables: BTreeMap::new(),
                modules: BTreeMap::from([(module.to_string(), source.to_string())]),
                install: None,
            }),
            files: vec![],
        });
        pkg
    }

    #[test]
    fn generates_one_subdirectory_per_package_with_modules() {
        let dest = tempdir::TempDir::new("ldist-static-bundle").unwrap();
        let packages = vec![pkg_with_module("xml", "xml.core", "src/core.c")];
        let out = generate(&packages, dest.path()).unwrap();
        assert!(out.join("xml/CMakeLists.txt").exists());
        assert!(out.join("ldist_preload.c").exists());
        assert!(out.join("main.c").exists());
        let main_cmake = std::fs::read_to_string(out.join("CMakeLists.txt")).unwrap();
        assert!(main_cmake.contains("add_subdirectory(xml)"));
        assert!(main_cmake.contains("xml_core"));
    }

    #[test]
    fn packages_without_build_modules_are_skipped() {
        let dest = tempdir::TempDir::new("ldist-static-bundle-empty").unwrap();
        let packages = vec![Package::new(PackageName::new("lua").unwrap(), Version::parse("5.3.6").unwrap())];
        let out = generate(&packages, dest.path()).unwrap();
        assert!(!out.join("lua").exists());
    }
}
