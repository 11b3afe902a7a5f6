//! `install`: resolves targets against the installed set, then fetches,
//! builds, and installs every newly-needed package in resolver order.

use crate::config::OperationContext;
use crate::download;
use crate::error::LdistError;
use crate::install::{self as installer, InstallOptions};
use crate::manifest::{Manifest, PackageInfo};
use crate::package::{Package, PackageRef};
use crate::resolver::resolve_all;

use super::{deploy_layout, ensure_manifest, load_installed_set, save_installed_set};

/// Resolves `targets` against the current [`crate::lockfile::InstalledSet`]
/// and the manifest, then fetches/builds/installs each newly-needed
/// package in dependency-first order. The installed set is persisted after
/// every successful per-package install, so a mid-operation failure leaves
/// prior successes recorded.
pub fn install(ctx: &mut OperationContext, targets: &[PackageRef]) -> Result<Vec<Package>, LdistError> {
    std::fs::create_dir_all(&ctx.config.root_dir)?;
    let layout = deploy_layout(ctx);
    layout.ensure()?;

    ensure_manifest(ctx)?;
    let manifest = ctx.manifest_cache().expect("just ensured").clone();

    let mut installed_set = load_installed_set(ctx)?;
    let working_set = installed_set.as_working_set();

    let to_install = resolve_all(targets, &working_set, &manifest, &ctx.config.platform).map_err(|e| {
        ctx.report.log_failure("resolve", format!("{targets:?}"), &e);
        e
    })?;
    ctx.report.log_ok("resolve", format!("{} package(s)", to_install.len()));

    let target_names: std::collections::HashSet<_> = targets.iter().map(|t| t.name.clone()).collect();

    let mut installed = Vec::with_capacity(to_install.len());
    for package in to_install {
        let is_target = target_names.contains(&package.name);
        let info = manifest_info_for(&manifest, &package).cloned();
        let record = install_one(ctx, &layout, package, info, is_target)?;
        installed_set.record(record.clone());
        save_installed_set(ctx, &installed_set)?;
        installed.push(record);
    }

    Ok(installed)
}

pub(super) fn install_one(
    ctx: &mut OperationContext,
    layout: &crate::layout::DeployLayout,
    package: Package,
    info: Option<PackageInfo>,
    is_target: bool,
) -> Result<Package, LdistError> {
    let name = package.name.clone();
    let version = package.version.clone();

    let info = info.unwrap_or(PackageInfo {
        version: version.clone(),
        dependencies: vec![],
        supported_platforms: None,
        local_url: None,
    });

    let staging_root = ctx.config.temp_dir.join("staging");
    let staged = download::fetch(&[(package.clone(), info)], &staging_root, &ctx.config.manifest_repos).map_err(
        |e| {
            ctx.report.log_failure("fetch", format!("{name} {version}"), &e);
            LdistError::from(e)
        },
    )?;
    ctx.report.log_ok("fetch", format!("{name} {version}"));

    let staging_dir = staged
        .get(name.as_str())
        .cloned()
        .ok_or_else(|| LdistError::NoSourceFound(name.to_string()))?;
    let build_dir = ctx.config.temp_dir.join(format!("{name}-build"));

    let default_variables = ctx.config.variables.clone();
    let override_variables = Default::default();
    let opts = InstallOptions {
        staging_dir: &staging_dir,
        build_dir: &build_dir,
        layout,
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

    let mut installed_pkg = installer::install(package, &opts).map_err(|e| {
        ctx.report.log_failure("install", format!("{name} {version}"), &e);
        if is_target {
            LdistError::InstallTarget(e)
        } else {
            LdistError::InstallDep(e)
        }
    })?;
    installed_pkg.is_provisional = false;
    ctx.report.log_ok("install", format!("{name} {version}"));

    Ok(installed_pkg)
}

pub(super) fn manifest_info_for<'a>(manifest: &'a Manifest, package: &Package) -> Option<&'a PackageInfo> {
    manifest
        .versions(&package.name)
        .find(|info| info.version.canonical_key() == package.version.canonical_key())
}
