//! Store configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it changes:
//!
//! ```
//! use sipflow_core::StoreConfig;
//!
//! let config = StoreConfig::from_json_str(r#"{"capture": {"limit": 50, "rotate": true}}"#)?;
//! assert_eq!(config.capture.limit, 50);
//! assert!(config.capture.rotate);
//! assert!(!config.match_opts.invite);
//! # Ok::<(), sipflow_core::ConfigError>(())
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attribute::Attribute;
use crate::filter::FilterKind;
use crate::matcher::CompileError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("unknown filter kind '{0}'")]
    UnknownFilterKind(String),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Which dialogs are admitted into the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Only create calls whose first message is an INVITE.
    pub invite: bool,
    /// Only create calls whose first message is an out-of-dialog request.
    pub complete: bool,
    /// Expression the first payload of a new dialog must match.
    pub expression: Option<String>,
    pub invert: bool,
    pub ignore_case: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Maximum number of stored calls, 0 for unbounded.
    pub limit: usize,
    /// Evict the oldest unlocked call instead of rejecting new ones.
    pub rotate: bool,
    /// Count RTP packets towards announced media endpoints.
    pub rtp: bool,
    /// Default report path.
    pub outfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOptions {
    pub by: Attribute,
    pub ascending: bool,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            by: Attribute::CallIndex,
            ascending: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(rename = "match")]
    pub match_opts: MatchOptions,
    pub capture: CaptureOptions,
    pub sort: SortOptions,
    /// View filters installed when the store is created.
    pub filters: BTreeMap<FilterKind, String>,
}

impl StoreConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
