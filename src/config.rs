//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. `config.toml` in the platform config directory (or `--config FILE`)
//! 3. `PHOTODUPE_*` environment variables (e.g. `PHOTODUPE_THRESHOLD=8`)
//! 4. Command-line flags, applied with [`Config::merge_scan_args`] and
//!    friends
//!
//! ```toml
//! threshold = 6
//! workers = 4
//! cache_path = "/data/photodupe/hashes.db"
//! extensions = ["jpg", "png"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::{Cli, OutputFormat, ScanArgs, SimilarArgs};
use crate::duplicates::{ClusterConfig, DEFAULT_PROGRESS_BATCH};
use crate::scanner::{WalkerConfig, DEFAULT_EXTENSIONS, DEFAULT_THRESHOLD};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PHOTODUPE_";

/// File name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// File name of the default cache database inside the cache directory.
pub const CACHE_FILE_NAME: &str = "hashes.db";

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be parsed or had the wrong type.
    #[error("Invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A value parsed but is out of range.
    #[error("Invalid configuration value for `{field}`: {reason}")]
    Invalid {
        /// The offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Serializing to TOML failed.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Reading or writing the file failed.
    #[error("Configuration I/O error for {path}: {source}")]
    Io {
        /// The file involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No home directory could be determined.
    #[error("Failed to determine project directories")]
    NoProjectDirs,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum Hamming distance for two images to match.
    pub threshold: u32,
    /// Comparison threads; `0` means one per core.
    pub workers: usize,
    /// Outer indices per clustering batch (progress granularity).
    pub progress_batch: usize,
    /// Cache database location; `None` uses the platform cache directory.
    pub cache_path: Option<PathBuf>,
    /// Descend into hidden files and directories.
    pub include_hidden: bool,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// File extensions treated as images.
    pub extensions: Vec<String>,
    /// Default output format.
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            workers: 0,
            progress_batch: DEFAULT_PROGRESS_BATCH,
            cache_path: None,
            include_hidden: false,
            follow_symlinks: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            output: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from the default platform-specific path.
    ///
    /// Problems are logged and defaults are used instead.
    #[must_use]
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_from_path(&path),
            Err(e) => {
                log::debug!("{}, using default configuration", e);
                Self::default()
            }
        }
    }

    /// Load configuration layered over the file at `path`.
    ///
    /// A missing file is not an error. Problems are logged and defaults
    /// are used instead.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        match Self::try_load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}; using default configuration", e);
                Self::default()
            }
        }
    }

    /// Load configuration layered over the file at `path`, reporting errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer is malformed or a value is out of
    /// range.
    pub fn try_load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path).extract().map_err(Box::new)?;
        config.validate()?;
        log::debug!("Loaded configuration (file: {})", path.display());
        Ok(config)
    }

    /// The figment stack used for loading, exposed for inspection.
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold > 64 {
            return Err(ConfigError::Invalid {
                field: "threshold",
                reason: format!("{} exceeds the 64 bits of a fingerprint", self.threshold),
            });
        }
        if self.progress_batch == 0 {
            return Err(ConfigError::Invalid {
                field: "progress_batch",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid {
                field: "extensions",
                reason: "at least one extension is required".to_string(),
            });
        }
        Ok(())
    }

    /// Save the configuration as TOML to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or writing fails.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply global CLI flags.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(ref cache) = cli.cache {
            self.cache_path = Some(cache.clone());
        }
    }

    /// Apply `scan` flags that were given on the command line.
    pub fn merge_scan_args(&mut self, args: &ScanArgs) {
        if let Some(threshold) = args.threshold {
            self.threshold = threshold;
        }
        if let Some(workers) = args.workers {
            self.workers = workers;
        }
        if let Some(output) = args.output {
            self.output = output;
        }
        if args.include_hidden {
            self.include_hidden = true;
        }
        if args.follow_symlinks {
            self.follow_symlinks = true;
        }
    }

    /// Apply `similar` flags that were given on the command line.
    pub fn merge_similar_args(&mut self, args: &SimilarArgs) {
        if let Some(threshold) = args.threshold {
            self.threshold = threshold;
        }
        if let Some(output) = args.output {
            self.output = output;
        }
    }

    /// Walker settings derived from this configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            include_hidden: self.include_hidden,
            extensions: self.extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Clustering settings derived from this configuration.
    #[must_use]
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig::default()
            .with_threshold(self.threshold)
            .with_workers(self.workers)
            .with_progress_batch(self.progress_batch)
    }

    /// The configured cache database, or the platform default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] if no explicit path is set and
    /// the platform cache directory cannot be determined.
    pub fn resolved_cache_path(&self) -> Result<PathBuf, ConfigError> {
        match self.cache_path {
            Some(ref path) => Ok(path.clone()),
            None => Ok(project_dirs()?.cache_dir().join(CACHE_FILE_NAME)),
        }
    }

    /// Default platform-specific configuration file path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] if it cannot be determined.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
    }
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("", "", "photodupe").ok_or(ConfigError::NoProjectDirs)
}
