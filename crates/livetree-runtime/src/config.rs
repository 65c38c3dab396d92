#![forbid(unsafe_code)]

//! Session configuration.
//!
//! All fields have defaults, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! refresh_interval_ms = 1000   # client tick interval for wrapping nodes
//! client_object = "LiveTree"   # global JS object receiving client events
//! max_depth = 256              # deepest address a build may produce
//! diagnostics = false          # emit console.log lines from triggers
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors from loading or validating a [`SessionConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid TOML or has unknown fields.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field holds a value the runtime cannot use.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Runtime settings for one [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Interval, in milliseconds, for wrapping nodes that do not set their own.
    pub refresh_interval_ms: u64,
    /// Name of the client-side object that receives `valueCommit` and `click`
    /// calls. Must be a dotted JavaScript identifier path.
    pub client_object: String,
    /// Maximum address depth a single build may reach.
    pub max_depth: usize,
    /// When set, timer triggers without an explicit message log one to the
    /// browser console on every tick.
    pub diagnostics: bool,
}

impl SessionConfig {
    /// Default client tick interval.
    pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1000;
    /// Default client object name.
    pub const DEFAULT_CLIENT_OBJECT: &'static str = "LiveTree";
    /// Default depth limit.
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "loaded session config");
        Ok(config)
    }

    /// Check field values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_depth",
                reason: "must be greater than zero",
            });
        }
        if !is_js_identifier_path(&self.client_object) {
            return Err(ConfigError::Invalid {
                field: "client_object",
                reason: "must be a dotted JavaScript identifier path",
            });
        }
        Ok(())
    }

    /// Default tick interval as a [`Duration`].
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Set the default tick interval.
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the depth limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the client object name.
    #[must_use]
    pub fn with_client_object(mut self, client_object: impl Into<String>) -> Self {
        self.client_object = client_object.into();
        self
    }

    /// Toggle console diagnostics in generated triggers.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: Self::DEFAULT_REFRESH_INTERVAL_MS,
            client_object: Self::DEFAULT_CLIENT_OBJECT.to_owned(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
            diagnostics: false,
        }
    }
}

fn is_js_identifier_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}
