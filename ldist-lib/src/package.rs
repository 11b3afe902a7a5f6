//! The `Package` value and its identity/reference types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rockspec::Rockspec;
use crate::version::{Constraint, ConstraintParseError, Version, VersionParseError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackageNameParseError {
    #[error("package name is empty")]
    Empty,
    #[error("package name '{0}' contains whitespace")]
    Whitespace(String),
}

/// A validated, non-empty, whitespace-free package name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    pub fn new(name: &str) -> Result<Self, PackageNameParseError> {
        if name.trim().is_empty() {
            return Err(PackageNameParseError::Empty);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(PackageNameParseError::Whitespace(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackageName {
    type Error = PackageNameParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PackageName> for String {
    fn from(value: PackageName) -> Self {
        value.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageName {
    type Err = PackageNameParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[derive(Debug, Error)]
pub enum PackageRefParseError {
    #[error("empty package reference")]
    Empty,
    #[error(transparent)]
    Name(#[from] PackageNameParseError),
    #[error(transparent)]
    Constraint(#[from] ConstraintParseError),
}

/// A `name` plus a [`Constraint`] on its version, as written on the CLI:
/// `"<name>"`, `"<name> <op><version>"`, or `"<name> <version>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: PackageName,
    pub constraint: Constraint,
}

impl Serialize for PackageRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PackageRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl PackageRef {
    pub fn new(name: PackageName, constraint: Constraint) -> Self {
        Self { name, constraint }
    }

    /// Combines this reference's constraint with another (used to AND
    /// repeated `-c/--constraint` CLI flags together).
    pub fn and(mut self, clause: &str) -> Result<Self, ConstraintParseError> {
        let mut clauses = self.constraint.clauses().to_vec();
        clauses.extend(clause.parse::<Constraint>()?.clauses().to_vec());
        self.constraint = Constraint::from_clauses(clauses);
        Ok(self)
    }
}

impl FromStr for PackageRef {
    type Err = PackageRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PackageRefParseError::Empty);
        }
        match s.split_once(char::is_whitespace) {
            None => Ok(Self::new(PackageName::new(s)?, Constraint::any())),
            Some((name, rest)) => {
                Ok(Self::new(PackageName::new(name)?, rest.trim().parse()?))
            }
        }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint.clauses().is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {}", self.name, self.constraint)
        }
    }
}

/// The platform this package was built on, recorded for provenance in
/// packed rockspecs (`description.built_on` / `built_on_platform`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltOnPlatform(pub String);

impl fmt::Display for BuiltOnPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved package: identity plus everything accumulated as it moves
/// through fetch → install → (pack). `is_provisional` packages are resolver
/// scaffolding only (see [`crate::resolver`]) and must never be persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: PackageName,
    pub version: Version,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spec: Option<Rockspec>,
    /// Paths relative to the deploy root; absolute paths must never appear
    /// here.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub bin_dependencies: Vec<PackageName>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub built_on_platform: Option<BuiltOnPlatform>,
    #[serde(skip, default)]
    pub is_provisional: bool,
}

impl Package {
    pub fn new(name: PackageName, version: Version) -> Self {
        Self {
            name,
            version,
            spec: None,
            files: Vec::new(),
            bin_dependencies: Vec::new(),
            built_on_platform: None,
            is_provisional: false,
        }
    }

    pub fn provisional(name: PackageName, version: Version) -> Self {
        Self {
            is_provisional: true,
            ..Self::new(name, version)
        }
    }

    /// True when `name` matches and every clause in `ref.constraint` holds
    /// against this package's version. Total: never fails.
    pub fn matches(&self, reference: &PackageRef) -> bool {
        self.name == reference.name && reference.constraint.matches(&self.version)
    }
}

impl PartialEq for Package {
    /// Two packages are equal iff name and parsed version are equal.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}
impl Eq for Package {}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        let r: PackageRef = "xml".parse().unwrap();
        assert_eq!(r.name.as_str(), "xml");
        assert!(r.constraint.clauses().is_empty());
    }

    #[test]
    fn parses_operator_constraint() {
        let r: PackageRef = "lua >= 5.1".parse().unwrap();
        assert_eq!(r.name.as_str(), "lua");
        assert!(r.constraint.matches(&Version::parse("5.3.4").unwrap()));
    }

    #[test]
    fn parses_bare_version_as_exact() {
        let r: PackageRef = "xml 1.8.0-1".parse().unwrap();
        assert!(r.constraint.matches(&Version::parse("1.8.0-1").unwrap()));
        assert!(!r.constraint.matches(&Version::parse("1.8.0-2").unwrap()));
    }

    #[test]
    fn package_equality_is_name_and_version_only() {
        let mut a = Package::new(PackageName::new("xml").unwrap(), Version::parse("1.0").unwrap());
        let b = Package::new(PackageName::new("xml").unwrap(), Version::parse("1.0").unwrap());
        a.files.push(PathBuf::from("lib/xml.so"));
        assert_eq!(a, b);
    }

    #[test]
    fn matches_is_total_and_respects_constraint() {
        let pkg = Package::new(PackageName::new("lua").unwrap(), Version::parse("5.3.4").unwrap());
        let req: PackageRef = "lua >= 5.1".parse().unwrap();
        assert!(pkg.matches(&req));

        let wildcard: PackageRef = "lua == 5.2.*".parse().unwrap();
        assert!(!wildcard.constraint.matches(&Version::parse("5.3.4").unwrap()));
        assert!(wildcard.constraint.matches(&Version::parse("5.2.4").unwrap()));
    }
}
