//! The deploy-root directory layout: `<root>/{lib,bin,include}`.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployLayout {
    root: PathBuf,
}

impl DeployLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lib(&self) -> PathBuf {
        self.root.join("lib")
    }

    pub fn bin(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn include(&self) -> PathBuf {
        self.root.join("include")
    }

    /// Creates `lib`, `bin`, and `include` under the root if absent.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [self.lib(), self.bin(), self.include()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Converts an absolute path produced by a native install step into a
    /// path relative to the deploy root, as required before it is recorded
    /// in a [`crate::package::Package`]'s `files` (always relative to the
    /// deploy root).
    pub fn relativize(&self, absolute: &Path) -> Option<PathBuf> {
        absolute.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdirectories_are_joined_under_root() {
        let layout = DeployLayout::new("/opt/ldist");
        assert_eq!(layout.lib(), PathBuf::from("/opt/ldist/lib"));
        assert_eq!(layout.bin(), PathBuf::from("/opt/ldist/bin"));
        assert_eq!(layout.include(), PathBuf::from("/opt/ldist/include"));
    }

    #[test]
    fn relativize_strips_the_root_prefix() {
        let layout = DeployLayout::new("/opt/ldist");
        let rel = layout.relativize(Path::new("/opt/ldist/lib/xml.so")).unwrap();
        assert_eq!(rel, PathBuf::from("lib/xml.so"));
        assert!(layout.relativize(Path::new("/elsewhere/xml.so")).is_none());
    }
}
