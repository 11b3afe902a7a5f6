//! Rockspec parsing: turns a rockspec's restricted-Lua source into a
//! structured [`Rockspec`] by evaluating it and extracting a closed set of
//! known top-level fields. The evaluator itself lives in [`crate::lua_eval`]
//! and is shared with the manifest loader.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lua_eval::{self, LuaEvalError, TaggedValue};
use crate::ordered_map::OrderedMap;
use crate::package::{PackageName, PackageNameParseError, PackageRef, PackageRefParseError};
use crate::version::{Version, VersionParseError};

const ROCKSPEC_FIELDS: &[&str] = &[
    "package",
    "version",
    "source",
    "description",
    "dependencies",
    "supported_platforms",
    "build",
    "files",
];

#[derive(Debug, Error)]
pub enum RockspecParseError {
    #[error(transparent)]
    Eval(#[from] LuaEvalError),
    #[error("rockspec is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("rockspec field '{0}' has the wrong shape")]
    WrongShape(&'static str),
    #[error(transparent)]
    PackageName(#[from] PackageNameParseError),
    #[error(transparent)]
    Version(#[from] VersionParseError),
    #[error("invalid dependency entry '{0}': {1}")]
    Dependency(String, PackageRefParseError),
    #[error("unrecognized build type '{0}'")]
    UnknownBuildType(String),
}

/// `source.{url,tag,branch}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub branch: Option<String>,
}

/// `description.{summary,homepage,license,built_on}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub built_on: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Cmake,
    Builtin,
    None,
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildType::Cmake => "cmake",
            BuildType::Builtin => "builtin",
            BuildType::None => "none",
        })
    }
}

impl std::str::FromStr for BuildType {
    type Err = RockspecParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cmake" => Ok(BuildType::Cmake),
            "builtin" => Ok(BuildType::Builtin),
            "none" => Ok(BuildType::None),
            other => Err(RockspecParseError::UnknownBuildType(other.to_string())),
        }
    }
}

/// `install.{lua,bin,conf}`: destination-relative path → source-relative
/// path, used by the `builtin` build type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSpec {
    #[serde(default)]
    pub lua: BTreeMap<String, String>,
    #[serde(default)]
    pub bin: BTreeMap<String, String>,
    #[serde(default)]
    pub conf: BTreeMap<String, String>,
}

/// `build.{type,variables,modules,install}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSpec {
    #[serde(rename = "type")]
    pub build_type: BuildType,
    /// CMake cache variables, first-wins precedence is applied by the
    /// installer, not here — this is the raw rockspec-authored set.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// `builtin` module name → source file, e.g. `"foo.bar" -> "src/bar.lua"`.
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub install: Option<InstallSpec>,
}

/// A fully-parsed rockspec: the closed set of top-level fields this
/// package manager recognizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rockspec {
    pub package: PackageName,
    pub version: Version,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub description: Description,
    #[serde(default)]
    pub dependencies: Vec<PackageRef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub supported_platforms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub build: Option<BuildSpec>,
    /// Present only for an already-built binary package; its presence is
    /// the installer's binary short-circuit signal.
    #[serde(default)]
    pub files: Vec<String>,
}

impl Rockspec {
    /// Parses a rockspec's Lua source into a structured [`Rockspec`].
    pub fn parse(source: &str) -> Result<Self, RockspecParseError> {
        let fields = lua_eval::eval_globals(source, ROCKSPEC_FIELDS)?;

        let package_str = fields
            .get("package")
            .and_then(TaggedValue::as_str)
            .ok_or(RockspecParseError::MissingField("package"))?;
        let package = PackageName::new(package_str)?;

        let version_str = fields
            .get("version")
            .and_then(TaggedValue::as_str)
            .ok_or(RockspecParseError::MissingField("version"))?;
        let version = Version::parse(version_str)?;

        let source_spec = fields.get("source").map(parse_source).transpose()?;
        let description = fields
            .get("description")
            .map(parse_description)
            .transpose()?
            .unwrap_or_default();
        let dependencies = fields
            .get("dependencies")
            .map(parse_dependencies)
            .transpose()?
            .unwrap_or_default();
        let supported_platforms = fields.get("supported_platforms").map(|v| v.string_list());
        let build = fields.get("build").map(parse_build).transpose()?;
        let files = fields
            .get("files")
            .map(TaggedValue::string_list)
            .unwrap_or_default();

        Ok(Self {
            package,
            version,
            source: source_spec,
            description,
            dependencies,
            supported_platforms,
            build,
            files,
        })
    }

    /// True when this rockspec describes an already-built binary package.
    pub fn is_binary(&self) -> bool {
        !self.files.is_empty()
    }
}

fn parse_source(value: &TaggedValue) -> Result<Source, RockspecParseError> {
    let url = value
        .get("url")
        .and_then(TaggedValue::as_str)
        .ok_or(RockspecParseError::WrongShape("source.url"))?
        .to_string();
    Ok(Source {
        url,
        tag: value.get("tag").and_then(TaggedValue::as_str).map(str::to_string),
        branch: value.get("branch").and_then(TaggedValue::as_str).map(str::to_string),
    })
}

fn parse_description(value: &TaggedValue) -> Result<Description, RockspecParseError> {
    Ok(Description {
        summary: value.get("summary").and_then(TaggedValue::as_str).map(str::to_string),
        homepage: value.get("homepage").and_then(TaggedValue::as_str).map(str::to_string),
        license: value.get("license").and_then(TaggedValue::as_str).map(str::to_string),
        built_on: value.get("built_on").and_then(TaggedValue::as_str).map(str::to_string),
    })
}

fn parse_dependencies(value: &TaggedValue) -> Result<Vec<PackageRef>, RockspecParseError> {
    value
        .as_list()
        .ok_or(RockspecParseError::WrongShape("dependencies"))?
        .iter()
        .filter_map(TaggedValue::as_str)
        .map(|entry| {
            entry
                .parse::<PackageRef>()
                .map_err(|e| RockspecParseError::Dependency(entry.to_string(), e))
        })
        .collect()
}

fn string_map(value: &TaggedValue) -> BTreeMap<String, String> {
    value
        .as_table()
        .map(|t| {
            t.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_build(value: &TaggedValue) -> Result<BuildSpec, RockspecParseError> {
    let build_type = value
        .get("type")
        .and_then(TaggedValue::as_str)
        .ok_or(RockspecParseError::WrongShape("build.type"))?
        .parse()?;
    let variables = value.get("variables").map(string_map).unwrap_or_default();
    let modules = value.get("modules").map(string_map).unwrap_or_default();
    let install = value.get("install").map(|v| InstallSpec {
        lua: v.get("lua").map(string_map).unwrap_or_default(),
        bin: v.get("bin").map(string_map).unwrap_or_default(),
        conf: v.get("conf").map(string_map).unwrap_or_default(),
    });

    Ok(BuildSpec {
        build_type,
        variables,
        modules,
        install,
    })
}

/// Converts a rockspec's flat CMake variable table into the
/// `SET(K V CACHE STRING "" FORCE)` cache-script lines the installer
/// writes before configuring, preserving insertion order so later
/// overrides can shadow earlier defaults deterministically.
pub fn cmake_cache_script(variables: &OrderedMap<String, String>) -> String {
    use path_slash::PathExt as _;

    variables
        .iter()
        .map(|(k, v)| {
            let slashed = std::path::Path::new(v).to_slash_lossy();
            format!("SET({k} \"{slashed}\" CACHE STRING \"\" FORCE)")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
