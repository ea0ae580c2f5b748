//! Configuration for a dump invocation
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{DumpError, Result};

/// Name of the bucket etcd stores its versioned key space in
pub const DEFAULT_BUCKET: &str = "key";

/// Main configuration for a dump run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    // -------------------------------------------------------------------------
    // Input Configuration
    // -------------------------------------------------------------------------
    /// Path of the bbolt file (usually `member/snap/db`)
    #[serde(rename = "DBPath")]
    pub db_path: PathBuf,

    /// Key (or key prefix) to dump, e.g. `/registry/pods/default/nginx`
    pub key: String,

    /// Treat `key` as a prefix
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub prefix: bool,

    /// Dump older revisions as well as the latest one
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub history: bool,

    /// Bucket holding the versioned records
    pub bucket: String,

    /// How long to wait for the advisory file lock (milliseconds)
    pub lock_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Output Configuration
    // -------------------------------------------------------------------------
    /// Text format of the dumped objects
    pub out_format: OutputFormat,

    /// Directory the dumped files are written into
    pub output_dir: PathBuf,
}

/// Output text format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One compact JSON document per file
    Json,

    /// Block-style YAML
    #[default]
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(DumpError::Config(format!(
                "unsupported out format {:?}, expected yaml or json",
                other
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::new(),
            key: String::new(),
            prefix: false,
            history: false,
            bucket: DEFAULT_BUCKET.to_string(),
            lock_timeout_ms: 10_000,
            out_format: OutputFormat::Yaml,
            output_dir: PathBuf::from("/tmp"),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject invocations missing a required input
    pub fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(DumpError::Config("db-path must not be empty".to_string()));
        }
        if self.key.is_empty() {
            return Err(DumpError::Config("key must not be empty".to_string()));
        }
        if self.bucket.is_empty() {
            return Err(DumpError::Config("bucket must not be empty".to_string()));
        }
        if self.lock_timeout_ms == 0 {
            return Err(DumpError::Config(
                "lock timeout must be at least 1ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Lock wait as a Duration
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the path of the bbolt file
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Set the key or key prefix to dump
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.config.key = key.into();
        self
    }

    /// Match every key starting with `key`
    pub fn prefix(mut self, prefix: bool) -> Self {
        self.config.prefix = prefix;
        self
    }

    /// Also dump historical revisions
    pub fn history(mut self, history: bool) -> Self {
        self.config.history = history;
        self
    }

    /// Set the bucket name
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    /// Set the lock wait (in milliseconds)
    pub fn lock_timeout_ms(mut self, ms: u64) -> Self {
        self.config.lock_timeout_ms = ms;
        self
    }

    /// Set the output format
    pub fn out_format(mut self, format: OutputFormat) -> Self {
        self.config.out_format = format;
        self
    }

    /// Set the output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
