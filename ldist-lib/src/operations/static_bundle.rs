//! `static`: assembles a statically-linked build tree for a set of targets
//! and their dependencies.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::OperationContext;
use crate::error::LdistError;
use crate::ordered_map::OrderedMap;
use crate::package::{Package, PackageName, PackageRef};
use crate::resolver::resolve_all;

use super::{ensure_manifest, load_installed_set};

pub fn static_bundle(ctx: &mut OperationContext, targets: &[PackageRef], destination: &Path) -> Result<PathBuf, LdistError> {
    ensure_manifest(ctx)?;
    let manifest = ctx.manifest_cache().expect("just ensured").clone();
    let installed_set = load_installed_set(ctx)?;
    let working_set = installed_set.as_working_set();

    // Packages already installed satisfy the targets directly; anything
    // newly resolved here would still need fetching/building, which the
    // static bundle does not perform itself. `resolve_all` clones its
    // `installed` argument internally, so its return value — not the
    // untouched `working_set` — is the newly-needed part of the closure.
    let newly_resolved = resolve_all(targets, &working_set, &manifest, &ctx.config.platform)?;

    let mut combined: OrderedMap<PackageName, Package> = working_set;
    for pkg in &newly_resolved {
        combined.insert(pkg.name.clone(), pkg.clone());
    }

    // Restrict to the transitive closure actually reachable from `targets`,
    // so unrelated previously-installed packages are never bundled.
    let mut needed: HashSet<PackageName> = HashSet::new();
    let mut stack: Vec<PackageName> = targets.iter().map(|t| t.name.clone()).collect();
    while let Some(name) = stack.pop() {
        if !needed.insert(name.clone()) {
            continue;
        }
        if let Some(pkg) = combined.get(&name) {
            stack.extend(pkg.bin_dependencies.iter().cloned());
        }
    }

    let ordered: Vec<_> = combined
        .values()
        .filter(|p| needed.contains(&p.name))
        .cloned()
        .collect();
    let out = crate::static_bundle::generate(&ordered, destination).map_err(|e| {
        ctx.report.log_failure("static", format!("{targets:?}"), &e);
        e
    })?;
    ctx.report.log_ok("static", format!("bundle written to {}", out.display()));

    Ok(out)
}
