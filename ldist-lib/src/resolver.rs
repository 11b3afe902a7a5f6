//! The dependency resolver: a synchronous, greedy depth-first closure over
//! the installed set plus any requested targets.
//!
//! Resolution runs sequentially rather than concurrently; a `bon`-built
//! `Resolve` struct groups the arguments to one recursive resolve step,
//! driven by a plain recursive function.

use bon::Builder;
use thiserror::Error;

use crate::manifest::Manifest;
use crate::ordered_map::OrderedMap;
use crate::package::{Package, PackageName, PackageRef};
use crate::platform::PlatformSet;
use crate::version::{Constraint, Version};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("conflicting requirement for '{name}': wanted {wanted}, already have {existing}")]
    Conflict {
        name: PackageName,
        wanted: Constraint,
        existing: Version,
    },
    #[error("no version of '{name}' satisfies {constraint}")]
    NoVersionSatisfies { name: PackageName, constraint: Constraint },
    #[error("unknown package '{0}'")]
    UnknownPackage(PackageName),
    #[error("lua-interpreter fallback exhausted every candidate version: {0}")]
    LuaFallbackExhausted(Box<ResolveError>),
}

/// The accumulated arguments to one recursive resolve step, kept as a
/// builder purely for readability (there is no concurrency left to
/// justify it).
#[derive(Builder)]
struct ResolveStep<'a> {
    reference: &'a PackageRef,
    manifest: &'a Manifest,
    platform: &'a PlatformSet,
    working_set: &'a mut OrderedMap<PackageName, Package>,
}

/// Resolves one target against `working_set`, appending every newly-needed
/// package (dependency-first) into `working_set` and returning just the
/// ones this call added.
fn resolve_one(step: ResolveStep) -> Result<Vec<Package>, ResolveError> {
    let ResolveStep {
        reference,
        manifest,
        platform,
        working_set,
    } = step;

    if let Some(existing) = working_set.get(&reference.name) {
        return if reference.constraint.matches(&existing.version) {
            Ok(Vec::new())
        } else {
            Err(ResolveError::Conflict {
                name: reference.name.clone(),
                wanted: reference.constraint.clone(),
                existing: existing.version.clone(),
            })
        };
    }

    let info = manifest
        .best_match(reference, platform)
        .ok_or_else(|| ResolveError::NoVersionSatisfies {
            name: reference.name.clone(),
            constraint: reference.constraint.clone(),
        })?
        .clone();

    // Reserve the slot before recursing into dependencies so a dependency
    // cycle back to this package is treated as already-satisfied rather
    // than infinite recursion.
    let mut package = Package::new(reference.name.clone(), info.version.clone());
    working_set.insert(reference.name.clone(), package.clone());

    let mut newly_added = Vec::new();
    for dep in &info.dependencies {
        let added = resolve_one(
            ResolveStep::builder()
                .reference(dep)
                .manifest(manifest)
                .platform(platform)
                .working_set(working_set)
                .build(),
        )?;
        newly_added.extend(added);
    }

    package.bin_dependencies = info
        .dependencies
        .iter()
        .map(|d| d.name.clone())
        .collect();
    working_set.insert(reference.name.clone(), package.clone());
    newly_added.push(package);
    Ok(newly_added)
}

/// Resolves every target in `targets` against `installed`, returning the
/// dependency-first list of packages that must be newly fetched/installed.
/// On the first resolve failure where `lua` is requested implicitly and is
/// not already installed, retries with each known `lua` version (newest to
/// oldest) seeded as a provisional package, per the fallback strategy.
pub fn resolve_all(
    targets: &[PackageRef],
    installed: &OrderedMap<PackageName, Package>,
    manifest: &Manifest,
    platform: &PlatformSet,
) -> Result<Vec<Package>, ResolveError> {
    let mut working_set = installed.clone();
    match resolve_targets(targets, &mut working_set, manifest, platform) {
        Ok(added) => Ok(added),
        Err(first_err) => {
            let lua_name = PackageName::new("lua").expect("'lua' is a valid package name");
            if installed.contains_key(&lua_name) {
                return Err(first_err);
            }
            try_lua_fallback(targets, installed, manifest, platform)
                .map_err(|_| ResolveError::LuaFallbackExhausted(Box::new(first_err)))
        }
    }
}

fn resolve_targets(
    targets: &[PackageRef],
    working_set: &mut OrderedMap<PackageName, Package>,
    manifest: &Manifest,
    platform: &PlatformSet,
) -> Result<Vec<Package>, ResolveError> {
    let mut added = Vec::new();
    for target in targets {
        let step_added = resolve_one(
            ResolveStep::builder()
                .reference(target)
                .manifest(manifest)
                .platform(platform)
                .working_set(working_set)
                .build(),
        )?;
        added.extend(step_added);
    }
    Ok(added)
}

fn try_lua_fallback(
    targets: &[PackageRef],
    installed: &OrderedMap<PackageName, Package>,
    manifest: &Manifest,
    platform: &PlatformSet,
) -> Result<Vec<Package>, ResolveError> {
    let lua_name = PackageName::new("lua").expect("'lua' is a valid package name");
    let mut candidates: Vec<Version> = manifest
        .versions(&lua_name)
        .map(|info| info.version.clone())
        .collect();
    candidates.sort();
    candidates.reverse();

    for candidate in candidates {
        let mut working_set = installed.clone();
        working_set.insert(lua_name.clone(), Package::provisional(lua_name.clone(), candidate.clone()));
        if let Ok(mut added) = resolve_targets(targets, &mut working_set, manifest, platform) {
            let mut lua_package = Package::new(lua_name.clone(), candidate);
            lua_package.is_provisional = false;
            added.insert(0, lua_package);
            return Ok(added);
        }
    }
    Err(ResolveError::NoVersionSatisfies {
        name: lua_name,
        constraint: Constraint::any(),
    })
}
