use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::engine::{ClusterOptions, RepresentativePolicy};
use crate::extract::Detector;
use crate::scanner::DEFAULT_EXTENSIONS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// User settings. Every field is optional so a config file and the command
/// line can each supply only what they care about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub detector: Option<Detector>,
    pub match_threshold: Option<usize>,
    pub ratio_threshold: Option<f32>,
    pub max_features: Option<usize>,
    pub recursive: Option<bool>,
    pub extensions: Option<Vec<String>>,
    pub representative: Option<RepresentativePolicy>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub detector: Detector,
    pub options: ClusterOptions,
    pub max_features: usize,
    pub recursive: bool,
    pub extensions: Vec<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<config dir>/photosort/config.json`, e.g. `~/.config/photosort/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("photosort").join("config.json"))
    }

    /// Load the config file at the default location, or empty settings if
    /// there is none.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => {
                log::info!("Loading settings from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Fields set in `overrides` win over fields set in `self`.
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            detector: overrides.detector.or(self.detector),
            match_threshold: overrides.match_threshold.or(self.match_threshold),
            ratio_threshold: overrides.ratio_threshold.or(self.ratio_threshold),
            max_features: overrides.max_features.or(self.max_features),
            recursive: overrides.recursive.or(self.recursive),
            extensions: overrides.extensions.or(self.extensions),
            representative: overrides.representative.or(self.representative),
        }
    }

    /// Fill every unset field from the detector's defaults. The detector
    /// argument is used only when the settings do not name one.
    pub fn resolve(&self, fallback: Detector) -> RunConfig {
        let detector = self.detector.unwrap_or(fallback);
        let defaults = detector.default_options();
        RunConfig {
            detector,
            options: ClusterOptions {
                match_threshold: self.match_threshold.unwrap_or(defaults.match_threshold),
                ratio_threshold: self.ratio_threshold.unwrap_or(defaults.ratio_threshold),
                representative: self.representative.unwrap_or(defaults.representative),
            },
            max_features: self
                .max_features
                .unwrap_or_else(|| detector.default_max_features()),
            recursive: self.recursive.unwrap_or(false),
            extensions: self.extensions.clone().unwrap_or_else(|| {
                DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "detector": "sift", "match_threshold": 60 }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.detector, Some(Detector::Sift));
        assert_eq!(settings.match_threshold, Some(60));
        assert_eq!(settings.ratio_threshold, None);
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(Settings::load(&missing), Err(ConfigError::Io { .. })));

        let bad = temp_dir.path().join("bad.json");
        fs::write(&bad, r#"{ "match_treshold": 3 }"#).unwrap();
        assert!(matches!(Settings::load(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides_win() {
        let file = Settings {
            detector: Some(Detector::Surf),
            ratio_threshold: Some(0.5),
            recursive: Some(true),
            ..Default::default()
        };
        let cli = Settings {
            ratio_threshold: Some(0.7),
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.detector, Some(Detector::Surf));
        assert_eq!(merged.ratio_threshold, Some(0.7));
        assert_eq!(merged.recursive, Some(true));
    }

    #[test]
    fn test_resolve_uses_detector_defaults() {
        let config = Settings::default().resolve(Detector::Orb);
        assert_eq!(config.detector, Detector::Orb);
        assert_eq!(config.options, ClusterOptions::new(20, 0.75));
        assert_eq!(config.max_features, 500);
        assert!(!config.recursive);
        assert!(config.extensions.contains(&"jpg".to_string()));

        let config = Settings {
            detector: Some(Detector::Surf),
            ratio_threshold: Some(0.65),
            ..Default::default()
        }
        .resolve(Detector::Orb);
        assert_eq!(config.detector, Detector::Surf);
        assert_eq!(config.options.match_threshold, 100);
        assert_eq!(config.options.ratio_threshold, 0.65);
    }
}
