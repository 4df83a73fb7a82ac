// WildCrab - GPL-3.0-or-later
// This file is part of WildCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// WildCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// WildCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with WildCrab.  If not, see <https://www.gnu.org/licenses/>.

use crate::parser::LogDialect;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const fn default_percentile() -> f64 {
    95.0
}

const fn default_exception_limit() -> usize {
    10
}

/// User configuration stored in the config directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Percentile reported by the duration table
    #[serde(default = "default_percentile")]
    pub percentile: f64,

    /// Number of exception clusters listed
    #[serde(default = "default_exception_limit")]
    pub exception_limit: usize,

    /// Force a header dialect instead of detecting it per file
    #[serde(default)]
    pub dialect: Option<LogDialect>,

    /// Extra request path rewrites applied after the built-in de-identification
    #[serde(default)]
    pub path_rules: Vec<PathRewrite>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            percentile: default_percentile(),
            exception_limit: default_exception_limit(),
            dialect: None,
            path_rules: Vec::new(),
        }
    }
}

/// Regex rewrite of request paths, e.g. collapsing tenant-specific segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    pub pattern: String,
    pub replacement: String,
}

impl AnalysisConfig {
    /// Get the path to the config file
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config_dir| config_dir.join("wildcrab").join("config.json"))
    }

    /// Load config from disk, returning defaults if not found
    #[must_use]
    pub fn load() -> Self {
        Self::config_path().map_or_else(Self::default, |path| Self::load_from(&path))
    }

    /// Load config from an explicit path, returning defaults if it is
    /// missing or cannot be parsed
    #[must_use]
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    tracing::info!(
                        "Loaded config from {} ({} path rules)",
                        path.display(),
                        config.path_rules.len()
                    );
                    config
                }
                Err(e) => {
                    tracing::warn!("Ignoring malformed config {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Cannot read config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<PathBuf, String> {
        let path = Self::config_path().ok_or("Could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), String> {
        // Create directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {e}"))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write config file: {e}"))?;

        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"dialect":"aspen-log"}"#).expect("valid config");
        assert_eq!(config.dialect, Some(LogDialect::AspenLog));
        assert_eq!(config.percentile, 95.0);
        assert_eq!(config.exception_limit, 10);
        assert!(config.path_rules.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("config.json");
        let config = AnalysisConfig {
            percentile: 99.0,
            path_rules: vec![PathRewrite {
                pattern: "^/tenant/[^/]+".to_string(),
                replacement: "/tenant/*".to_string(),
            }],
            ..AnalysisConfig::default()
        };
        config.save_to(&path).expect("save config");
        assert_eq!(AnalysisConfig::load_from(&path), config);
    }

    #[test]
    fn test_missing_or_malformed_config_falls_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        assert_eq!(AnalysisConfig::load_from(&path), AnalysisConfig::default());
        std::fs::write(&path, "{ not json").expect("write config");
        assert_eq!(AnalysisConfig::load_from(&path), AnalysisConfig::default());
    }
}
