//! `get_rockspec`: fetches a package's rockspec without building or
//! installing it, for inspection.

use crate::config::OperationContext;
use crate::download;
use crate::error::LdistError;
use crate::package::PackageRef;
use crate::resolver::resolve_all;
use crate::rockspec::Rockspec;

use super::{ensure_manifest, load_installed_set};

pub fn get_rockspec(ctx: &mut OperationContext, target: &PackageRef) -> Result<Rockspec, LdistError> {
    ensure_manifest(ctx)?;
    let manifest = ctx.manifest_cache().expect("just ensured").clone();
    let installed_set = load_installed_set(ctx)?;
    let working_set = installed_set.as_working_set();

    let resolved = resolve_all(std::slice::from_ref(target), &working_set, &manifest, &ctx.config.platform)?;
    let package = resolved
        .into_iter()
        .find(|p| p.name == target.name)
        .ok_or_else(|| LdistError::NoSourceFound(target.name.to_string()))?;

    let info = manifest
        .versions(&package.name)
        .find(|info| info.version.canonical_key() == package.version.canonical_key())
        .cloned()
        .unwrap_or(crate::manifest::PackageInfo {
            version: package.version.clone(),
            dependencies: vec![],
            supported_platforms: None,
            local_url: None,
        });

    let staging_root = ctx.config.temp_dir.join("staging");
    let staged = download::fetch(&[(package.clone(), info)], &staging_root, &ctx.config.manifest_repos)?;
    let staging_dir = staged
        .get(package.name.as_str())
        .ok_or_else(|| LdistError::NoSourceFound(package.name.to_string()))?;

    let rockspec_path = find_rockspec(staging_dir, &package)?;
    let source = std::fs::read_to_string(&rockspec_path)?;
    Rockspec::parse(&source)
        .map_err(|e| LdistError::NoSourceFound(format!("failed to parse {}: {e}", rockspec_path.display())))
}

fn find_rockspec(staging_dir: &std::path::Path, package: &crate::package::Package) -> std::io::Result<std::path::PathBuf> {
    let expected = staging_dir.join(format!("{}-{}.rockspec", package.name, package.version.without_hash()));
    if expected.exists() {
        return Ok(expected);
    }
    for entry in std::fs::read_dir(staging_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "rockspec") {
            return Ok(path);
        }
    }
    Ok(expected)
}
