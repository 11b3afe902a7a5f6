//! Version and constraint algebra.
//!
//! Versions are parsed from `MAJOR[.MINOR[.PATCH[.…]]][-REV]` with an
//! optional `_HEX` hash suffix appended by the packer (see
//! [`crate::pack`]). Ordering is component-wise numeric, missing trailing
//! components treated as zero, with the revision compared last. The hash
//! suffix never participates in ordering or equality.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version string is empty")]
    Empty,
    #[error("invalid numeric component '{0}' in version '{1}'")]
    BadComponent(String, String),
    #[error("invalid revision '{0}' in version '{1}'")]
    BadRevision(String, String),
}

/// A parsed, totally-ordered version.
///
/// `Eq`/`Ord` compare only `components` and `revision`; `raw` is retained
/// purely for display and is not part of the value's identity.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    components: Vec<u64>,
    revision: u64,
    hash: Option<String>,
}

impl Version {
    /// Parses a version string, stripping and retaining a trailing `_HEX`
    /// hash tag before parsing the numeric/revision portion.
    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        if text.trim().is_empty() {
            return Err(VersionParseError::Empty);
        }

        let (body, hash) = match text.rsplit_once('_') {
            // Only treat the suffix as a hash if it looks like one (hex digits);
            // otherwise `_` is just part of an arbitrary component, e.g. dev versions.
            Some((body, tag)) if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_hexdigit()) => {
                (body, Some(tag.to_string()))
            }
            _ => (text, None),
        };

        let (version_part, revision) = match body.rsplit_once('-') {
            Some((v, rev)) => {
                let rev: u64 = rev
                    .parse()
                    .map_err(|_| VersionParseError::BadRevision(rev.to_string(), text.to_string()))?;
                (v, rev)
            }
            None => (body, 0),
        };

        let components = version_part
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| VersionParseError::BadComponent(part.to_string(), text.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if components.is_empty() {
            return Err(VersionParseError::BadComponent(
                version_part.to_string(),
                text.to_string(),
            ));
        }

        Ok(Self {
            raw: text.to_string(),
            components,
            revision,
            hash,
        })
    }

    /// The hash tag, if this version carries one (see [`crate::pack`]).
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// The version string with any `_HASH` suffix stripped.
    pub fn without_hash(&self) -> String {
        match &self.hash {
            Some(h) => self.raw.trim_end_matches(&format!("_{h}")).to_string(),
            None => self.raw.clone(),
        }
    }

    /// Returns a new version with the given hash tag appended, used by the
    /// packer to embed a dependency hash into an exported version string.
    pub fn with_hash(&self, hash: &str) -> Self {
        let mut v = self.clone();
        v.raw = format!("{}_{}", v.without_hash(), hash);
        v.hash = Some(hash.to_string());
        v
    }

    /// The canonical map key for this version: trailing zero components
    /// stripped, joined with `.`, plus the revision. This collapses `1.0`
    /// and `1.0.0` into the same manifest entry, per DESIGN.md's resolution
    /// of the version-canonicalization open question, and — since `Ord`/`Eq`
    /// already treat a missing trailing component as zero — agrees with
    /// them on every input, which `Hash` requires.
    pub fn canonical_key(&self) -> String {
        let mut components = self.components.clone();
        while components.last() == Some(&0) {
            components.pop();
        }
        format!(
            "{}-{}",
            components.iter().map(u64::to_string).collect::<Vec<_>>().join("."),
            self.revision
        )
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the same version with its last non-zero component
    /// incremented and every following component dropped — the upper bound
    /// used by the `~>` pessimistic constraint operator.
    fn bump_last_nonzero(&self) -> Self {
        let mut components = self.components.clone();
        let last_nonzero = components
            .iter()
            .rposition(|&c| c != 0)
            .unwrap_or(components.len() - 1);
        components.truncate(last_nonzero + 1);
        components[last_nonzero] += 1;
        let raw = components.iter().map(u64::to_string).collect::<Vec<_>>().join(".");
        Self {
            raw,
            components,
            revision: 0,
            hash: None,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.revision.cmp(&other.revision)
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

/// A single comparison operator in a [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Pessimistic,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Eq => "==",
            Op::Ne => "~=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Pessimistic => "~>",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstraintParseError {
    #[error("empty constraint clause")]
    Empty,
    #[error("unrecognized operator in clause '{0}'")]
    UnknownOp(String),
    #[error(transparent)]
    Version(#[from] VersionParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub op: Op,
    pub version: Version,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.version)
    }
}

impl Clause {
    fn matches(&self, v: &Version) -> bool {
        match self.op {
            Op::Eq => v == &self.version,
            Op::Ne => v != &self.version,
            Op::Lt => v < &self.version,
            Op::Le => v <= &self.version,
            Op::Gt => v > &self.version,
            Op::Ge => v >= &self.version,
            Op::Pessimistic => v >= &self.version && v < &self.version.bump_last_nonzero(),
        }
    }
}

/// A set of clauses combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint {
    clauses: Vec<Clause>,
}

impl Constraint {
    pub fn any() -> Self {
        Self { clauses: Vec::new() }
    }

    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True iff every clause holds against `version`.
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses.iter().all(|c| c.matches(version))
    }

    /// Parses one clause, possibly expanding to two (a wildcard `==` clause
    /// such as `"== 5.2.*"` expands to `>= 5.2.0, < 5.3.0`).
    fn parse_one(text: &str) -> Result<Vec<Clause>, ConstraintParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConstraintParseError::Empty);
        }
        for (prefix, op) in [
            ("~>", Op::Pessimistic),
            ("==", Op::Eq),
            ("~=", Op::Ne),
            ("<=", Op::Le),
            (">=", Op::Ge),
            ("<", Op::Lt),
            (">", Op::Gt),
        ] {
            if let Some(rest) = text.strip_prefix(prefix) {
                let rest = rest.trim();
                if op == Op::Eq {
                    if let Some(prefix_version) = rest.strip_suffix(".*") {
                        let lower = Version::parse(prefix_version)?;
                        let upper = lower.bump_last_nonzero();
                        return Ok(vec![
                            Clause { op: Op::Ge, version: lower },
                            Clause { op: Op::Lt, version: upper },
                        ]);
                    }
                }
                let version = Version::parse(rest)?;
                return Ok(vec![Clause { op, version }]);
            }
        }
        // Bare version string implies exact match, per the CLI's
        // `"<name> <version>"` reference syntax.
        let version = Version::parse(text)?;
        Ok(vec![Clause { op: Op::Eq, version }])
    }
}

impl FromStr for Constraint {
    type Err = ConstraintParseError;

    /// Parses one or more whitespace/comma-separated clauses, e.g.
    /// `">= 5.1, < 5.4"` or a single `"~> 1.2"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clauses = s
            .split(',')
            .map(Self::parse_one)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(Self { clauses })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("any");
        }
        write!(
            f,
            "{}",
            self.clauses
                .iter()
                .map(Clause::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parses_variable_depth_versions() {
        assert_eq!(v("1").components(), &[1]);
        assert_eq!(v("1.2.3.4").components(), &[1, 2, 3, 4]);
        assert_eq!(v("1.8.0-1").revision(), 1);
    }

    #[test]
    fn hash_suffix_is_stripped_and_ignored_in_ordering() {
        let plain = v("1.0.0-1");
        let hashed = v("1.0.0-1_deadbeef");
        assert_eq!(plain, hashed);
        assert_eq!(hashed.hash(), Some("deadbeef"));
        assert_eq!(hashed.without_hash(), "1.0.0-1");
    }

    #[test]
    fn missing_tail_components_compare_as_zero() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert!(v("1.1") > v("1.0.0"));
    }

    #[test]
    fn revision_compared_last() {
        assert!(v("1.0.0-2") > v("1.0.0-1"));
        assert!(v("1.0.0-1") < v("1.1.0-1"));
    }

    #[test]
    fn total_order_is_consistent() {
        let versions = ["1.0.0", "1.0.1", "1.1.0", "2.0.0", "1.0.0-1", "1.0.0-2"]
            .map(v);
        for a in &versions {
            for b in &versions {
                for c in &versions {
                    if a < b && b < c {
                        assert!(a < c, "transitivity violated: {a} < {b} < {c} but not {a} < {c}");
                    }
                }
                // exactly one of <, ==, > holds
                let lt = a < b;
                let eq = a == b;
                let gt = a > b;
                assert_eq!([lt, eq, gt].iter().filter(|x| **x).count(), 1);
            }
        }
    }

    #[test]
    fn pessimistic_constraint() {
        let c: Constraint = "~> 1.2".parse().unwrap();
        assert!(c.matches(&v("1.2.0")));
        assert!(c.matches(&v("1.2.99")));
        assert!(!c.matches(&v("1.3.0")));
        assert!(!c.matches(&v("1.1.0")));
    }

    #[test]
    fn constraint_monotonicity() {
        let c: Constraint = ">= 1.2.0".parse().unwrap();
        assert!(c.matches(&v("1.2.0")));
        assert!(c.matches(&v("1.2.1")));
        assert!(c.matches(&v("2.0.0")));
        assert!(!c.matches(&v("1.1.9")));
    }

    #[test]
    fn and_combination_of_clauses() {
        let c: Constraint = ">= 1.0.0, < 2.0.0".parse().unwrap();
        assert!(c.matches(&v("1.5.0")));
        assert!(!c.matches(&v("2.0.0")));
        assert!(!c.matches(&v("0.9.0")));
    }

    #[test]
    fn canonical_key_collapses_equivalent_versions() {
        assert_eq!(v("1.0").canonical_key(), v("1.0.0").canonical_key());
    }

    #[test]
    fn eq_versions_hash_equal_beyond_three_components() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        fn hash_of(v: &Version) -> u64 {
            let mut hasher = DefaultHasher::new();
            v.hash(&mut hasher);
            hasher.finish()
        }

        let a = v("2.0.0");
        let b = v("2.0.0.0");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
