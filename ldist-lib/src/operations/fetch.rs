//! `fetch`: resolves targets and stages their sources without building or
//! installing anything.

use crate::config::OperationContext;
use crate::download::{self, StagingDirs};
use crate::error::LdistError;
use crate::package::PackageRef;
use crate::resolver::resolve_all;

use super::{ensure_manifest, load_installed_set};

pub fn fetch(ctx: &mut OperationContext, targets: &[PackageRef]) -> Result<StagingDirs, LdistError> {
    ensure_manifest(ctx)?;
    let manifest = ctx.manifest_cache().expect("just ensured").clone();
    let installed_set = load_installed_set(ctx)?;
    let working_set = installed_set.as_working_set();

    let to_fetch = resolve_all(targets, &working_set, &manifest, &ctx.config.platform)?;
    ctx.report.log_ok("resolve", format!("{} package(s)", to_fetch.len()));

    let packages_with_info: Vec<_> = to_fetch
        .into_iter()
        .map(|pkg| {
            let info = manifest
                .versions(&pkg.name)
                .find(|info| info.version.canonical_key() == pkg.version.canonical_key())
                .cloned()
                .unwrap_or(crate::manifest::PackageInfo {
                    version: pkg.version.clone(),
                    dependencies: vec![],
                    supported_platforms: None,
                    local_url: None,
                });
            (pkg, info)
        })
        .collect();

    let staging_root = ctx.config.temp_dir.join("staging");
    let staged = download::fetch(&packages_with_info, &staging_root, &ctx.config.manifest_repos)?;
    ctx.report.log_ok("fetch", format!("{} package(s) staged", staged.len()));

    Ok(staged)
}
