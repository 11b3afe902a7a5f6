//! `pack`: re-exports an installed package as a redistributable rock.

use std::path::{Path, PathBuf};

use crate::config::OperationContext;
use crate::error::LdistError;
use crate::package::PackageName;

use super::{deploy_layout, load_installed_set};

pub fn pack(ctx: &mut OperationContext, name: &PackageName, destination: &Path) -> Result<PathBuf, LdistError> {
    let installed_set = load_installed_set(ctx)?;
    let layout = deploy_layout(ctx);

    let target = installed_set
        .get(name)
        .ok_or_else(|| LdistError::NoSourceFound(name.to_string()))?
        .clone();

    let dependencies: Vec<_> = target
        .bin_dependencies
        .iter()
        .filter_map(|dep_name| installed_set.get(dep_name))
        .collect();

    let export_dir = crate::pack::pack(&target, &dependencies, layout.root(), destination, &ctx.config.platform)
        .map_err(|e| {
            ctx.report.log_failure("pack", name.to_string(), &e);
            e
        })?;
    ctx.report.log_ok("pack", format!("{} -> {}", name, export_dir.display()));

    Ok(export_dir)
}
