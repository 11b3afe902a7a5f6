//! `make`: builds and installs the package described by the local working
//! directory's alphabetically-first rockspec, after installing any
//! dependencies it names.

use std::path::Path;

use crate::config::OperationContext;
use crate::error::LdistError;
use crate::install::{self as installer, InstallOptions};
use crate::package::Package;
use crate::resolver::resolve_all;
use crate::rockspec::Rockspec;

use super::install::{install_one, manifest_info_for};
use super::{deploy_layout, ensure_manifest, load_installed_set, save_installed_set};

/// Reads the alphabetically-first `.rockspec` in `working_dir`, installs
/// whatever dependencies it names that aren't already installed, builds
/// and installs the working directory itself, and cleans the working
/// directory afterward unless `Config::debug` is set.
pub fn make(ctx: &mut OperationContext, working_dir: &Path) -> Result<Package, LdistError> {
    let (rockspec_path, skipped) = find_first_rockspec(working_dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LdistError::NoSourceFound(format!("{}: {e}", working_dir.display()))
        } else {
            LdistError::Io(e)
        }
    })?;
    if !skipped.is_empty() {
        let names = skipped
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        ctx.report.log_ok(
            "make",
            format!("multiple rockspecs found; using {}, ignoring: {names}", rockspec_path.display()),
        );
    }
    let source = std::fs::read_to_string(&rockspec_path)?;
    let spec = Rockspec::parse(&source).map_err(|e| {
        LdistError::NoSourceFound(format!("failed to parse {}: {e}", rockspec_path.display()))
    })?;

    let layout = deploy_layout(ctx);
    layout.ensure()?;

    ensure_manifest(ctx)?;
    let manifest = ctx.manifest_cache().expect("just ensured").clone();

    let mut installed_set = load_installed_set(ctx)?;
    let working_set = installed_set.as_working_set();

    let deps_to_install =
        resolve_all(&spec.dependencies, &working_set, &manifest, &ctx.config.platform)?;
    for dep in deps_to_install {
        let info = manifest_info_for(&manifest, &dep).cloned();
        let record = install_one(ctx, &layout, dep, info, false)?;
        installed_set.record(record);
        save_installed_set(ctx, &installed_set)?;
    }

    let package = Package::new(spec.package.clone(), spec.version.clone());
    let build_dir = ctx.config.temp_dir.join(format!("{}-build", spec.package));
    let default_variables = ctx.config.variables.clone();
    let override_variables = Default::default();
    let opts = InstallOptions {
        staging_dir: working_dir,
        build_dir: &build_dir,
        layout: &layout,
        cmake_binary: &ctx.config.cmake,
        cache_command: &ctx.config.cache_command,
        cache_debug_options: &ctx.config.cache_debug_options,
        build_command: &ctx.config.build_command,
        build_debug_options: &ctx.config.build_debug_options,
        default_variables: &default_variables,
        override_variables: &override_variables,
        platform: &ctx.config.platform,
        debug: ctx.config.debug,
    };

    let installed_pkg = installer::install(package, &opts).map_err(LdistError::InstallTarget)?;
    ctx.report.log_ok("install", format!("{} {}", installed_pkg.name, installed_pkg.version));

    installed_set.record(installed_pkg.clone());
    save_installed_set(ctx, &installed_set)?;

    Ok(installed_pkg)
}

/// Returns the alphabetically-first `.rockspec` in `dir`, plus every other
/// rockspec found alongside it; the caller logs these as skipped rather
/// than silently ignoring them.
fn find_first_rockspec(dir: &Path) -> std::io::Result<(std::path::PathBuf, Vec<std::path::PathBuf>)> {
    let mut candidates: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "rockspec"))
        .collect();
    candidates.sort();
    if candidates.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no .rockspec file in working directory"));
    }
    let first = candidates.remove(0);
    Ok((first, candidates))
}
