#![forbid(unsafe_code)]

//! Selector configuration.
//!
//! [`SelectorConfig`] gathers the knobs of a selector session. With the
//! `config-files` feature it can be loaded from TOML or JSON; every field has
//! a default, so a partial file is fine.
//!
//! ```toml
//! # jtree.toml
//! [fetch]
//! stale_policy = "apply_on_arrival"
//! timeout_ms = 5000
//!
//! [display]
//! separator = " / "
//! guides = "ascii"
//! ```
//!
//! ```rust,ignore
//! let config = SelectorConfig::from_toml_file("jtree.toml")?;
//! ```

#[cfg(feature = "config-files")]
use std::path::Path;

#[cfg(feature = "config-files")]
use serde::{Deserialize, Serialize};

use jtree_core::{DEFAULT_SEPARATOR, StaleFetchPolicy};
use web_time::Duration;

/// Text shown where a breadcrumb would be when nothing is selected.
pub const DEFAULT_NOT_FOUND: &str = "not found";

// ---------------------------------------------------------------------------
// SelectorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-files", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-files", serde(default))]
pub struct SelectorConfig {
    pub fetch: FetchConfig,
    pub display: DisplayConfig,
}

/// How child fetches are run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-files", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-files", serde(default))]
pub struct FetchConfig {
    /// What happens to a fetch whose node is collapsed before it finishes.
    pub stale_policy: StaleFetchPolicy,
    /// Per-call deadline. `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
}

impl FetchConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Tree line style for outline rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-files", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-files", serde(rename_all = "snake_case"))]
pub enum GuideStyle {
    Ascii,
    #[default]
    Unicode,
    Rounded,
}

/// How selections are presented.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-files", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-files", serde(default))]
pub struct DisplayConfig {
    /// Placed between ancestor names in a breadcrumb.
    pub separator: String,
    /// Shown instead of a breadcrumb when nothing is selected.
    pub not_found: String,
    pub guides: GuideStyle,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            not_found: DEFAULT_NOT_FOUND.to_string(),
            guides: GuideStyle::default(),
        }
    }
}

impl SelectorConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-files")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    #[cfg(feature = "config-files")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-files")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    #[cfg(feature = "config-files")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load from a file, picking the format from its extension
    /// (`.json` is JSON, anything else TOML).
    #[cfg(feature = "config-files")]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Problems with the values. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.fetch.timeout_ms == Some(0) {
            errors.push("fetch.timeout_ms must be > 0 (omit it to wait indefinitely)".into());
        }
        if self.display.separator.is_empty() {
            errors.push("display.separator must not be empty".into());
        }
        if self.display.not_found.trim().is_empty() {
            errors.push("display.not_found must not be blank".into());
        }
        errors
    }

    /// `self` if [`validate`](Self::validate) finds nothing.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from loading a [`SelectorConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "config-files")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[cfg(feature = "config-files")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
