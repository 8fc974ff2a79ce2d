use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overlay::domain::coordinate_mapper::VideoGravity;
use crate::shared::constants::{
    DEFAULT_CAPTURE_FPS, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH, DEFAULT_LINE_WIDTH,
    DEFAULT_STROKE_COLOR, DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to access settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Persisted user settings. Missing fields fall back to defaults so older
/// files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub confidence: f64,
    pub capture_width: u32,
    pub capture_height: u32,
    pub capture_fps: u32,
    pub surface_width: u32,
    pub surface_height: u32,
    pub gravity: VideoGravity,
    /// `None` mirrors front cameras only.
    pub mirror_preview: Option<bool>,
    pub always_discard_late_frames: bool,
    pub stroke_color: [u8; 4],
    pub line_width: f64,
    pub model_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            capture_width: DEFAULT_CAPTURE_WIDTH,
            capture_height: DEFAULT_CAPTURE_HEIGHT,
            capture_fps: DEFAULT_CAPTURE_FPS,
            surface_width: DEFAULT_SURFACE_WIDTH,
            surface_height: DEFAULT_SURFACE_HEIGHT,
            gravity: VideoGravity::ResizeAspectFill,
            mirror_preview: None,
            always_discard_late_frames: true,
            stroke_color: DEFAULT_STROKE_COLOR,
            line_width: DEFAULT_LINE_WIDTH,
            model_path: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCam").join("settings.json"))
    }

    /// Loads from the platform config dir, falling back to defaults when the
    /// file is absent or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io { ref source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring settings file: {e}");
                Self::default()
            }
        }
    }

    /// Rejects values no capture session or detector can run with, whether
    /// they came from flags or from a saved file.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |field, reason: String| Err(SettingsError::Invalid { field, reason });
        if !(0.0..=1.0).contains(&self.confidence) {
            return invalid(
                "confidence",
                format!("must be between 0.0 and 1.0, got {}", self.confidence),
            );
        }
        for (field, value) in [
            ("capture_width", self.capture_width),
            ("capture_height", self.capture_height),
            ("capture_fps", self.capture_fps),
            ("surface_width", self.surface_width),
            ("surface_height", self.surface_height),
        ] {
            if value == 0 {
                return invalid(field, "must be greater than 0".into());
            }
        }
        if !(self.line_width.is_finite() && self.line_width > 0.0) {
            return invalid(
                "line_width",
                format!("must be a positive number, got {}", self.line_width),
            );
        }
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)
    }
}
