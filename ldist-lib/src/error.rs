//! The top-level error type returned by every [`crate::operations`]
//! function, wrapping each subsystem's error with a numeric exit code.

use thiserror::Error;

use crate::build::CMakeError;
use crate::config::ConfigError;
use crate::download::DownloadError;
use crate::install::InstallError;
use crate::lockfile::LockfileError;
use crate::manifest::ManifestStoreError;
use crate::pack::PackError;
use crate::resolver::ResolveError;
use crate::static_bundle::StaticBundleError;

#[derive(Debug, Error)]
pub enum LdistError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to retrieve the manifest: {0}")]
    ManifestRetrieval(#[from] ManifestStoreError),
    #[error("failed to resolve dependencies: {0}")]
    Resolve(#[from] ResolveError),
    #[error("failed to fetch package source: {0}")]
    Fetch(#[from] DownloadError),
    #[error("failed to build/install the requested package: {0}")]
    InstallTarget(#[source] InstallError),
    #[error("failed to build/install a dependency: {0}")]
    InstallDep(#[source] InstallError),
    #[error("no installable source was found for '{0}'")]
    NoSourceFound(String),
    #[error("failed to export package as a redistributable rock: {0}")]
    BinaryExport(#[from] PackError),
    #[error("failed to assemble the static bundle: {0}")]
    StaticBundle(#[from] StaticBundleError),
    #[error(transparent)]
    Lockfile(#[from] LockfileError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LdistError {
    /// Maps each error kind to its numbered process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            LdistError::Config(_) => 1,
            LdistError::ManifestRetrieval(_) => 1,
            LdistError::Resolve(_) => 2,
            LdistError::Fetch(_) => 3,
            LdistError::InstallTarget(_) => 4,
            LdistError::InstallDep(_) => 5,
            LdistError::NoSourceFound(_) => 6,
            LdistError::BinaryExport(_) => 7,
            LdistError::StaticBundle(_) => 8,
            LdistError::Lockfile(_) => 1,
            LdistError::Io(_) => 1,
        }
    }
}

impl From<CMakeError> for LdistError {
    fn from(err: CMakeError) -> Self {
        LdistError::InstallTarget(InstallError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_error_taxonomy() {
        let resolve_err = LdistError::Resolve(ResolveError::UnknownPackage(
            crate::package::PackageName::new("xml").unwrap(),
        ));
        assert_eq!(resolve_err.exit_code(), 2);

        let fetch_err = LdistError::Fetch(DownloadError::NoSource("xml".to_string()));
        assert_eq!(fetch_err.exit_code(), 3);
    }
}
