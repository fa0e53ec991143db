//! Application configuration.
//!
//! Values come from built-in defaults, then an optional JSON file, then
//! per-command flags applied in [`crate::app`].

use crate::error::AppError;
use bodyscan_data::PcdEncoding;
use bodyscan_process::{MergeParams, OutlierParams, SmoothParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub filter: OutlierParams,
    pub merge: MergeParams,
    pub smooth: SmoothParams,
    pub logging: LoggingConfig,
    /// Points between progress events; 0 disables them.
    pub progress_every: usize,
    pub outlier_path: PathBuf,
    pub binary_output: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            filter: OutlierParams::default(),
            merge: MergeParams::default(),
            smooth: SmoothParams::default(),
            logging: LoggingConfig::default(),
            progress_every: 10_000,
            outlier_path: PathBuf::from(bodyscan_process::pipeline::DEFAULT_OUTLIER_PATH),
            binary_output: false,
        }
    }
}

impl AppConfig {
    /// Read a JSON configuration file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        debug!("Loading configuration from: {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encoding(&self) -> PcdEncoding {
        if self.binary_output {
            PcdEncoding::Binary
        } else {
            PcdEncoding::Ascii
        }
    }
}
