//! Layered configuration and the per-operation execution context.
//!
//! `Config` is assembled `built-in defaults` ← `config file` ← `environment
//! variables` ← `CLI flags`, via a [`bon`]-derived builder. Config-file
//! discovery goes through `directories::ProjectDirs`.
//!
//! [`OperationContext`] avoids any process-wide mutable root/temp-dir
//! state: it is constructed once per orchestrator call and threaded
//! through explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bon::Builder;
use serde::Deserialize;
use thiserror::Error;

use crate::manifest::Manifest;
use crate::platform::PlatformSet;
use crate::report::ActivityReport;

const DEFAULT_MANIFEST_FILENAME: &str = "manifest";
const DEFAULT_CMAKE_BINARY: &str = "cmake";
const DEFAULT_BUILD_COMMAND: &str = "make";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not determine a home/config directory for this platform")]
    NoProjectDirs,
}

/// The subset of [`Config`] fields a config file or environment may
/// override; every field is optional so a partial file/environment layer
/// only overrides what it mentions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    pub root_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub manifest_repos: Option<Vec<String>>,
    pub manifest_filename: Option<String>,
    pub cache_command: Option<String>,
    pub cache_debug_options: Option<Vec<String>>,
    pub build_command: Option<String>,
    pub build_debug_options: Option<Vec<String>>,
    pub cmake: Option<String>,
    pub include_local_repos: Option<bool>,
    pub debug: Option<bool>,
    pub report: Option<bool>,
    pub no_progress: Option<bool>,
    pub variables: Option<BTreeMap<String, String>>,
}

impl ConfigOverrides {
    fn merge(self, other: Self) -> Self {
        Self {
            root_dir: other.root_dir.or(self.root_dir),
            temp_dir: other.temp_dir.or(self.temp_dir),
            manifest_repos: other.manifest_repos.or(self.manifest_repos),
            manifest_filename: other.manifest_filename.or(self.manifest_filename),
            cache_command: other.cache_command.or(self.cache_command),
            cache_debug_options: other.cache_debug_options.or(self.cache_debug_options),
            build_command: other.build_command.or(self.build_command),
            build_debug_options: other.build_debug_options.or(self.build_debug_options),
            cmake: other.cmake.or(self.cmake),
            include_local_repos: other.include_local_repos.or(self.include_local_repos),
            debug: other.debug.or(self.debug),
            report: other.report.or(self.report),
            no_progress: other.no_progress.or(self.no_progress),
            variables: match (self.variables, other.variables) {
                (Some(mut base), Some(over)) => {
                    base.extend(over);
                    Some(base)
                }
                (base, over) => over.or(base),
            },
        }
    }

    fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|s| !s.is_empty())
        }
        fn bool_var(name: &str) -> Option<bool> {
            var(name).and_then(|v| v.parse().ok())
        }
        fn list_var(name: &str) -> Option<Vec<String>> {
            var(name).map(|v| v.split(',').map(str::trim).map(str::to_string).collect())
        }

        Self {
            root_dir: var("LDIST_ROOT_DIR").map(PathBuf::from),
            temp_dir: var("LDIST_TEMP_DIR").map(PathBuf::from),
            manifest_repos: list_var("LDIST_MANIFEST_REPOS"),
            manifest_filename: var("LDIST_MANIFEST_FILENAME"),
            cache_command: var("LDIST_CACHE_COMMAND"),
            cache_debug_options: list_var("LDIST_CACHE_DEBUG_OPTIONS"),
            build_command: var("LDIST_BUILD_COMMAND"),
            build_debug_options: list_var("LDIST_BUILD_DEBUG_OPTIONS"),
            cmake: var("LDIST_CMAKE"),
            include_local_repos: bool_var("LDIST_INCLUDE_LOCAL_REPOS"),
            debug: bool_var("LDIST_DEBUG"),
            report: bool_var("LDIST_REPORT"),
            no_progress: bool_var("LDIST_NO_PROGRESS"),
            variables: None,
        }
    }
}

/// The fully-resolved set of options: `root_dir, temp_dir,
/// manifest_repos, manifest_filename, platform, cache_command,
/// cache_debug_options, build_command, build_debug_options, cmake,
/// include_local_repos, debug, report, variables`.
#[derive(Debug, Clone, Builder)]
pub struct Config {
    pub root_dir: PathBuf,
    pub temp_dir: PathBuf,
    #[builder(default = vec!["https://luadist.org/rocks".to_string()])]
    pub manifest_repos: Vec<String>,
    #[builder(default = DEFAULT_MANIFEST_FILENAME.to_string())]
    pub manifest_filename: String,
    #[builder(default = PlatformSet::current())]
    pub platform: PlatformSet,
    #[builder(default = DEFAULT_CMAKE_BINARY.to_string())]
    pub cache_command: String,
    #[builder(default)]
    pub cache_debug_options: Vec<String>,
    #[builder(default = DEFAULT_BUILD_COMMAND.to_string())]
    pub build_command: String,
    #[builder(default)]
    pub build_debug_options: Vec<String>,
    #[builder(default = DEFAULT_CMAKE_BINARY.to_string())]
    pub cmake: String,
    #[builder(default = false)]
    pub include_local_repos: bool,
    #[builder(default = false)]
    pub debug: bool,
    #[builder(default = false)]
    pub report: bool,
    #[builder(default = false)]
    pub quiet: bool,
    #[builder(default)]
    pub variables: BTreeMap<String, String>,
}

impl Config {
    /// Assembles a `Config` from built-in defaults, an optional config file,
    /// the process environment, and finally CLI-sourced overrides, in that
    /// increasing-precedence order.
    pub fn load(config_file: Option<&Path>, cli: ConfigOverrides) -> Result<Self, ConfigError> {
        let defaults = ConfigOverrides::default();
        let file_layer = match config_file {
            Some(path) => read_config_file(path)?,
            None => match default_config_path()? {
                Some(path) if path.exists() => read_config_file(&path)?,
                _ => ConfigOverrides::default(),
            },
        };
        let env_layer = ConfigOverrides::from_env();

        let merged = defaults.merge(file_layer).merge(env_layer).merge(cli);
        Ok(Self::from_overrides(merged))
    }

    fn from_overrides(o: ConfigOverrides) -> Self {
        let mut builder = Config::builder();
        if let Some(root_dir) = o.root_dir {
            builder = builder.root_dir(root_dir);
        } else {
            builder = builder.root_dir(default_root_dir());
        }
        if let Some(temp_dir) = o.temp_dir.clone() {
            builder = builder.temp_dir(temp_dir);
        } else {
            builder = builder.temp_dir(std::env::temp_dir().join("ldist"));
        }
        if let Some(v) = o.manifest_repos {
            builder = builder.manifest_repos(v);
        }
        if let Some(v) = o.manifest_filename {
            builder = builder.manifest_filename(v);
        }
        if let Some(v) = o.cache_command {
            builder = builder.cache_command(v);
        }
        if let Some(v) = o.cache_debug_options {
            builder = builder.cache_debug_options(v);
        }
        if let Some(v) = o.build_command {
            builder = builder.build_command(v);
        }
        if let Some(v) = o.build_debug_options {
            builder = builder.build_debug_options(v);
        }
        if let Some(v) = o.cmake {
            builder = builder.cmake(v);
        }
        if let Some(v) = o.include_local_repos {
            builder = builder.include_local_repos(v);
        }
        if let Some(v) = o.debug {
            builder = builder.debug(v);
        }
        if let Some(v) = o.report {
            builder = builder.report(v);
        }
        if let Some(v) = o.no_progress {
            builder = builder.quiet(v);
        }
        if let Some(v) = o.variables {
            builder = builder.variables(v);
        }
        builder.build()
    }

    /// Whether progress bars should render, honoring both the explicit
    /// config flag and non-interactive terminals. Consumed by
    /// `Progress::new`.
    pub fn no_progress(&self) -> bool {
        self.quiet || !console_is_interactive()
    }
}

fn console_is_interactive() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

fn default_root_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "luadist2", "ldist")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".ldist"))
}

fn default_config_path() -> Result<Option<PathBuf>, ConfigError> {
    Ok(directories::ProjectDirs::from("org", "luadist2", "ldist")
        .map(|dirs| dirs.config_dir().join("config.toml")))
}

fn read_config_file(path: &Path) -> Result<ConfigOverrides, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// A value passed explicitly through every orchestrator entry point,
/// avoiding any process-wide mutable root-dir state. Holds the memoized
/// manifest cache: the in-memory manifest is immutable for a single
/// process invocation.
pub struct OperationContext {
    pub config: Config,
    pub report: ActivityReport,
    manifest: Option<Manifest>,
}

impl OperationContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            report: ActivityReport::new(),
            manifest: None,
        }
    }

    pub fn manifest_cache(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn set_manifest_cache(&mut self, manifest: Manifest) {
        self.manifest = Some(manifest);
    }
}
