//! Mixer Configuration
//! Engine defaults, loaded from disk when present

use crate::audio::eq::EqSettings;
use crate::capture::RELAY_RING_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_VOLUME: f32 = 1.0;
/// Fixed pre-EQ trim on file players
const DEFAULT_SOURCE_TRIM: f32 = 0.8;
const DEFAULT_MID_BANDWIDTH: f32 = 1.0;
const DEFAULT_TAP_BLOCK_SIZE: usize = 1024;
const DEFAULT_IO_BUFFER_DURATION: f64 = 0.005;
const DEFAULT_QUEUE_DEPTH: usize = 16;

fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mixer"))
}

/// Default config file path
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|p| p.join("config.json"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Config version (for future migrations)
    pub version: u32,
    /// EQ applied when a channel is created without one
    pub default_eq: EqSettings,
    pub default_volume: f32,
    pub source_trim: f32,
    /// Mid band width in octaves
    pub mid_bandwidth: f32,
    /// Samples per metering block
    pub tap_block_size: usize,
    /// Blocks each background queue can hold
    pub queue_depth: usize,
    /// Mic relay ring capacity in frames
    pub relay_ring_frames: usize,
    /// IO buffer duration requested when the host gives none (seconds)
    pub io_buffer_duration: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            default_eq: EqSettings::default(),
            default_volume: DEFAULT_VOLUME,
            source_trim: DEFAULT_SOURCE_TRIM,
            mid_bandwidth: DEFAULT_MID_BANDWIDTH,
            tap_block_size: DEFAULT_TAP_BLOCK_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            relay_ring_frames: RELAY_RING_SIZE,
            io_buffer_duration: DEFAULT_IO_BUFFER_DURATION,
        }
    }
}

impl MixerConfig {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match get_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(_) => {
                log::debug!("[Config] No config file found, using defaults");
                Self::default()
            }
            None => {
                log::debug!("[Config] Could not determine config path, using defaults");
                Self::default()
            }
        }
    }

    /// Load from an explicit file; unreadable or malformed files yield defaults
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<MixerConfig>(&content) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("[Config] Failed to parse config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("[Config] Failed to read config: {}", e);
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), String> {
        let path = get_config_path()
            .ok_or_else(|| "Could not determine config path".to_string())?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .map_err(|e| format!("Failed to create config directory: {}", e))?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;

        log::info!("[Config] Saved configuration to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_plugin() {
        let config = MixerConfig::default();
        assert_eq!(config.default_eq.bass_frequency, 115.0);
        assert_eq!(config.default_eq.mid_frequency, 500.0);
        assert_eq!(config.default_eq.treble_frequency, 1500.0);
        assert_eq!(config.source_trim, 0.8);
        assert_eq!(config.tap_block_size, 1024);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = MixerConfig {
            default_volume: 0.5,
            queue_depth: 4,
            ..MixerConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(MixerConfig::load_from(&path), config);
    }

    #[test]
    fn test_partial_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("partial.json");
        fs::write(&partial, r#"{"tapBlockSize": 256}"#).unwrap();
        // unknown casing is ignored, everything else defaults
        assert_eq!(MixerConfig::load_from(&partial), MixerConfig::default());

        let partial = dir.path().join("partial2.json");
        fs::write(&partial, r#"{"tap_block_size": 256}"#).unwrap();
        assert_eq!(MixerConfig::load_from(&partial).tap_block_size, 256);

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert_eq!(MixerConfig::load_from(&broken), MixerConfig::default());
    }
}
