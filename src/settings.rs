//! Tunable analysis settings — thresholds, frame size, window length, tick rate.
//!
//! Defaults reproduce the reference behaviour. A JSON file can override any
//! subset of fields; CLI flags override the file.

use log::info;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Frames with RMS below this are treated as silence.
    pub silence_threshold: f32,
    /// Amplitude under which a sample counts as a quiet edge when trimming.
    pub edge_threshold: f32,
    /// Samples per analysis frame.
    pub frame_size: usize,
    /// Length of the note history window.
    pub window_ms: u64,
    /// Controller ticks per second.
    pub tick_hz: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            silence_threshold: 0.01,
            edge_threshold: 0.2,
            frame_size: 2048,
            window_ms: 8000,
            tick_hz: 60,
        }
    }
}

impl Settings {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("read settings {:?}: {}", path, e))?;
        let settings: Settings = serde_json::from_str(&data)
            .map_err(|e| format!("parse settings {:?}: {}", path, e))?;
        settings.validate()?;
        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)?;
        info!("Settings saved to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.silence_threshold >= 0.0 && self.silence_threshold < 1.0) {
            return Err(format!(
                "silence_threshold must be in [0, 1), got {}",
                self.silence_threshold
            ));
        }
        if !(self.edge_threshold > 0.0 && self.edge_threshold <= 1.0) {
            return Err(format!(
                "edge_threshold must be in (0, 1], got {}",
                self.edge_threshold
            ));
        }
        if self.frame_size < 2 {
            return Err(format!("frame_size must be at least 2, got {}", self.frame_size));
        }
        if self.window_ms == 0 {
            return Err("window_ms must be positive".into());
        }
        if self.tick_hz == 0 {
            return Err("tick_hz must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.frame_size, 2048);
        assert_eq!(s.window_ms, 8000);
    }

    #[test]
    fn test_settings_roundtrip() {
        let s = Settings {
            tick_hz: 30,
            frame_size: 4096,
            ..Settings::default()
        };
        let json = serde_json::to_string_pretty(&s).unwrap();
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let loaded: Settings = serde_json::from_str(r#"{"window_ms": 4000}"#).unwrap();
        assert_eq!(loaded.window_ms, 4000);
        assert_eq!(loaded.frame_size, 2048);
        assert_eq!(loaded.silence_threshold, 0.01);
    }

    #[test]
    fn test_invalid_rejected() {
        let s = Settings {
            frame_size: 1,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
        let s = Settings {
            tick_hz: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!(
            "key_listener_settings_{}.json",
            std::process::id()
        ));
        let s = Settings {
            edge_threshold: 0.25,
            ..Settings::default()
        };
        s.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Settings::load(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(err.contains("settings.json"));
    }
}
