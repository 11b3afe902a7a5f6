//! Orchestrator entry points: one module per top-level operation
//! (`install`, `make`, `remove`, `list`, `fetch`, `pack`, `static`), plus
//! `get_rockspec`. Each brackets its work through an [`OperationContext`]
//! and the per-package state machine `RESOLVED → FETCHING → FETCHED →
//! LOADING_SPEC → (BUILDING → INSTALLING | BINARY_COPY) → RECORDED`.

mod fetch;
mod get_rockspec;
mod install;
mod list;
mod make;
mod pack;
mod remove;
mod static_bundle;

pub use fetch::fetch;
pub use get_rockspec::get_rockspec;
pub use install::install;
pub use list::list;
pub use make::make;
pub use pack::pack;
pub use remove::remove;
pub use static_bundle::static_bundle;

use std::path::PathBuf;

use crate::config::OperationContext;
use crate::error::LdistError;
use crate::layout::DeployLayout;
use crate::lockfile::InstalledSet;
use crate::manifest::{download_manifest, Manifest};

/// Loads the manifest described by `ctx.config`, using and populating the
/// context's memoized cache; the in-memory manifest is immutable for a
/// single process invocation.
fn ensure_manifest(ctx: &mut OperationContext) -> Result<&Manifest, LdistError> {
    if ctx.manifest_cache().is_none() {
        let manifest = download_manifest(
            &ctx.config.manifest_repos,
            &ctx.config.manifest_filename,
            ctx.config.include_local_repos,
            &ctx.config.temp_dir,
        )?;
        ctx.set_manifest_cache(manifest);
    }
    Ok(ctx.manifest_cache().expect("just populated"))
}

fn installed_set_path(ctx: &OperationContext) -> PathBuf {
    ctx.config.root_dir.join(&ctx.config.manifest_filename)
}

fn load_installed_set(ctx: &OperationContext) -> Result<InstalledSet, LdistError> {
    Ok(InstalledSet::load(&installed_set_path(ctx))?)
}

fn save_installed_set(ctx: &OperationContext, set: &InstalledSet) -> Result<(), LdistError> {
    Ok(set.save(&installed_set_path(ctx))?)
}

fn deploy_layout(ctx: &OperationContext) -> DeployLayout {
    DeployLayout::new(&ctx.config.root_dir)
}
