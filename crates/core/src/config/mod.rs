use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{loader::JoinPolicy, resources::AssetGroup, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Enables verbose per-frame diagnostics.
    pub debug: bool,
    /// Asset groups in load order.
    pub assets: Vec<AssetGroup>,
    pub audio: AudioConfig,
    pub time: TimeConfig,
    pub viewport: ViewportConfig,
    pub loader: LoaderConfig,
}

impl AppConfig {
    /// Defaults with a single empty `base` group so the sphere is built even
    /// when no assets are configured.
    pub fn live_defaults() -> Self {
        Self {
            assets: vec![AssetGroup::new("base", Vec::new())],
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file. A relative `loader.base_dir` is
    /// resolved against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_json_str(&std::fs::read_to_string(path)?)?;

        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        config.loader.base_dir = Some(match config.loader.base_dir.take() {
            Some(base_dir) if base_dir.is_absolute() => base_dir,
            Some(base_dir) => parent.join(base_dir),
            None => parent.to_path_buf(),
        });

        Ok(config)
    }
}

/// Configuration for the microphone analyser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Analyser window; must be a power of two.
    pub fft_size: usize,
    pub level_count: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 256,
            level_count: 8,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Frame clock settings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub max_delta_ms: u64,
    pub initial_delta_ms: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            max_delta_ms: 60,
            initial_delta_ms: 16,
        }
    }
}

/// Initial surface size and pixel ratio limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
    pub max_pixel_ratio: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_pixel_ratio: 1.0,
            max_pixel_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub join: JoinPolicy,
    /// Directory resource sources are resolved against.
    pub base_dir: Option<PathBuf>,
}
