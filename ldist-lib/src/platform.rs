//! Platform tags used to filter rockspecs via `supported_platforms`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PlatformTag(pub String);

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlatformTag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An ordered list of tags, most specific first, used to evaluate a
/// rockspec's `supported_platforms` filter.
#[derive(Debug, Clone, Default)]
pub struct PlatformSet(Vec<PlatformTag>);

impl PlatformSet {
    pub fn new(tags: Vec<PlatformTag>) -> Self {
        Self(tags)
    }

    /// The current process's platform tags, most specific first: the
    /// `(os, arch)` pair, then bare `os`, then bare `arch`.
    pub fn current() -> Self {
        let os = std::env::consts::OS;
        let arch = std::env::consts::ARCH;
        Self(vec![
            PlatformTag(format!("{os}-{arch}")),
            PlatformTag(os.to_string()),
            PlatformTag(arch.to_string()),
        ])
    }

    pub fn tags(&self) -> &[PlatformTag] {
        &self.0
    }

    /// Evaluates a rockspec's `supported_platforms` list: unconstrained
    /// (`None`) always matches; otherwise at least one listed platform must
    /// appear in this set. A leading `!` negates a single entry (excludes
    /// that platform even if otherwise unconstrained), matching the
    /// convention rockspecs use for platform exclusion lists.
    pub fn satisfies(&self, supported_platforms: Option<&[String]>) -> bool {
        let Some(list) = supported_platforms else {
            return true;
        };
        if list.is_empty() {
            return true;
        }
        let (excludes, includes): (Vec<_>, Vec<_>) =
            list.iter().partition(|p| p.starts_with('!'));
        for excl in &excludes {
            let tag = excl.trim_start_matches('!');
            if self.0.iter().any(|t| t.0 == tag) {
                return false;
            }
        }
        if includes.is_empty() {
            return true;
        }
        includes
            .iter()
            .any(|p| self.0.iter().any(|t| &t.0 == *p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_always_matches() {
        let set = PlatformSet::new(vec!["linux".into()]);
        assert!(set.satisfies(None));
        assert!(set.satisfies(Some(&[])));
    }

    #[test]
    fn include_list_requires_a_match() {
        let set = PlatformSet::new(vec!["linux".into(), "unix".into()]);
        assert!(set.satisfies(Some(&["unix".to_string()])));
        assert!(!set.satisfies(Some(&["windows".to_string()])));
    }

    #[test]
    fn exclude_entry_vetoes_even_when_unconstrained_otherwise() {
        let set = PlatformSet::new(vec!["windows".into()]);
        assert!(!set.satisfies(Some(&["!windows".to_string()])));
    }
}
