//! Persistent scheduler configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scheduler::{RenderOptions, MAX_SEQUENCES};
use crate::util::{Error, Result};

/// Settings that persist between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    // Frame
    pub width: u32,
    pub height: u32,

    // Sampling
    pub num_sequences: u32,

    // Default request; also decides the table built on init
    pub options: RenderOptions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            num_sequences: MAX_SEQUENCES,
            options: RenderOptions::default(),
        }
    }
}

impl SchedulerConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("pathpass");
            p.push("config.json");
            p
        })
    }

    /// Load from the default location, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        Self::default_path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()
            .ok_or_else(|| Error::other("no config directory on this platform"))?;
        self.save_to(&path)
    }

    /// Read and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidSize {
                width: self.width,
                height: self.height,
            });
        }
        if self.num_sequences == 0 || self.num_sequences > MAX_SEQUENCES {
            return Err(Error::invalid_options(format!(
                "num_sequences must be in 1..={}, got {}",
                MAX_SEQUENCES, self.num_sequences
            )));
        }
        self.options.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{BokehShape, SampleMode};
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("config.json");

        let mut config = SchedulerConfig::default();
        config.width = 320;
        config.height = 200;
        config.num_sequences = 4;
        config.options.sample_mode = SampleMode::Halton;
        config.options.bokeh_shape = BokehShape::Polygon(5);
        config.save_to(&path).expect("save");

        let loaded = SchedulerConfig::load_from(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "width": 64, "options": { "sample_mode": "sobol" } }"#)
            .expect("write");

        let loaded = SchedulerConfig::load_from(&path).expect("load");
        assert_eq!(loaded.width, 64);
        assert_eq!(loaded.height, 720);
        assert_eq!(loaded.options.sample_mode, SampleMode::Sobol);
        assert_eq!(loaded.options.max_render_passes, 1024);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "num_sequences": 40 }"#).expect("write");
        assert!(matches!(
            SchedulerConfig::load_from(&path),
            Err(Error::InvalidOptions(_))
        ));

        std::fs::write(&path, "not json").expect("write");
        assert!(matches!(SchedulerConfig::load_from(&path), Err(Error::Json(_))));
    }
}
