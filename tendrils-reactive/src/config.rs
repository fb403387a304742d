//! Session configuration persistence
//!
//! Simple `key=value` text with `#` comments, stored under the user's
//! config directory.

use crate::cascade::{Policy, Thresholds};
use std::fmt::Display;
use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tendrils_analysis::{OrderLogLayout, DEFAULT_SMOOTHING};
use thiserror::Error;

/// Highest differentiation order a source may use
pub const MAX_ORDER: usize = 16;
/// Largest history any single log may keep
pub const MAX_HISTORY: usize = 4096;
/// Largest analyser FFT size
pub const MAX_FFT_SIZE: usize = 32768;

/// Config loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Everything a session needs to start
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Audio file played as the track source
    pub track_path: Option<PathBuf>,
    /// Still image standing in for the camera
    pub camera_image: Option<PathBuf>,
    pub track_fft_size: usize,
    pub track_order: usize,
    pub microphone_fft_size: usize,
    pub microphone_order: usize,
    /// Raw log capacity override, defaults to order + 1
    pub raw_capacity: Option<usize>,
    /// Rate log capacity override, defaults to max(order, 2)
    pub rate_capacity: Option<usize>,
    pub microphone_is_fallback_only: bool,
    pub flow_margin: f32,
    pub flow_decay: f32,
    /// Camera sweep interval in milliseconds, 0 disables it
    pub respawn_interval_ms: f32,
    /// Ticks per second
    pub tick_rate: u32,
    pub track_beat_threshold: f32,
    pub track_volume_threshold: f32,
    pub microphone_beat_threshold: f32,
    pub microphone_beat_window: f32,
    pub microphone_volume_threshold: f32,
    pub smoothing: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            track_path: None,
            camera_image: None,
            track_fft_size: 32,
            track_order: 3,
            microphone_fft_size: 256,
            microphone_order: 2,
            raw_capacity: None,
            rate_capacity: None,
            microphone_is_fallback_only: true,
            flow_margin: 100.0,
            flow_decay: 0.001,
            respawn_interval_ms: 0.0,
            tick_rate: 60,
            track_beat_threshold: thresholds.track_beat,
            track_volume_threshold: thresholds.track_volume,
            microphone_beat_threshold: thresholds.microphone_beat,
            microphone_beat_window: thresholds.microphone_beat_window,
            microphone_volume_threshold: thresholds.microphone_volume,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl SessionConfig {
    /// Load config from the default location
    ///
    /// A missing file gives the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tendrils")
            .join("config.txt")
    }

    pub fn track_layout(&self) -> OrderLogLayout {
        self.layout(self.track_order)
    }

    pub fn microphone_layout(&self) -> OrderLogLayout {
        self.layout(self.microphone_order)
    }

    fn layout(&self, order: usize) -> OrderLogLayout {
        let layout = OrderLogLayout::new(order);
        layout.with_capacities(
            self.raw_capacity.unwrap_or(layout.raw_capacity),
            self.rate_capacity.unwrap_or(layout.rate_capacity),
        )
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            track_beat: self.track_beat_threshold,
            track_volume: self.track_volume_threshold,
            microphone_beat: self.microphone_beat_threshold,
            microphone_beat_window: self.microphone_beat_window,
            microphone_volume: self.microphone_volume_threshold,
        }
    }

    /// Reference policy with this config's thresholds and coupling
    pub fn policy(&self) -> Policy {
        Policy::reference(self.thresholds())
            .with_microphone_fallback_only(self.microphone_is_fallback_only)
    }

    /// Parse config from simple key=value format
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse {
                    line: line_no,
                    message: format!("expected key=value, got '{line}'"),
                });
            };
            let value = value.trim();

            match key.trim() {
                "track_path" => config.track_path = path_value(value),
                "camera_image" => config.camera_image = path_value(value),
                "track_fft_size" => {
                    config.track_fft_size = bounded(value, line_no, 1..=MAX_FFT_SIZE)?
                }
                "track_order" => config.track_order = bounded(value, line_no, 1..=MAX_ORDER)?,
                "microphone_fft_size" => {
                    config.microphone_fft_size = bounded(value, line_no, 1..=MAX_FFT_SIZE)?
                }
                "microphone_order" => {
                    config.microphone_order = bounded(value, line_no, 1..=MAX_ORDER)?
                }
                "raw_capacity" => {
                    config.raw_capacity = Some(bounded(value, line_no, 0..=MAX_HISTORY)?)
                }
                "rate_capacity" => {
                    config.rate_capacity = Some(bounded(value, line_no, 0..=MAX_HISTORY)?)
                }
                "microphone_is_fallback_only" => {
                    config.microphone_is_fallback_only = number(value, line_no)?
                }
                "flow_margin" => config.flow_margin = number(value, line_no)?,
                "flow_decay" => config.flow_decay = number(value, line_no)?,
                "respawn_interval_ms" => config.respawn_interval_ms = number(value, line_no)?,
                "tick_rate" => config.tick_rate = number(value, line_no)?,
                "track_beat_threshold" => config.track_beat_threshold = number(value, line_no)?,
                "track_volume_threshold" => {
                    config.track_volume_threshold = number(value, line_no)?
                }
                "microphone_beat_threshold" => {
                    config.microphone_beat_threshold = number(value, line_no)?
                }
                "microphone_beat_window" => {
                    config.microphone_beat_window = number(value, line_no)?
                }
                "microphone_volume_threshold" => {
                    config.microphone_volume_threshold = number(value, line_no)?
                }
                "smoothing" => config.smoothing = number(value, line_no)?,
                _ => {} // Ignore unknown keys
            }
        }

        Ok(config)
    }

    /// Serialize config to simple key=value format
    pub fn serialize(&self) -> String {
        let mut lines = vec!["# Tendrils Configuration".to_string()];

        if let Some(ref path) = self.track_path {
            lines.push(format!("track_path={}", path.display()));
        }
        if let Some(ref path) = self.camera_image {
            lines.push(format!("camera_image={}", path.display()));
        }
        lines.push(format!("track_fft_size={}", self.track_fft_size));
        lines.push(format!("track_order={}", self.track_order));
        lines.push(format!("microphone_fft_size={}", self.microphone_fft_size));
        lines.push(format!("microphone_order={}", self.microphone_order));
        if let Some(raw) = self.raw_capacity {
            lines.push(format!("raw_capacity={raw}"));
        }
        if let Some(rate) = self.rate_capacity {
            lines.push(format!("rate_capacity={rate}"));
        }
        lines.push(format!(
            "microphone_is_fallback_only={}",
            self.microphone_is_fallback_only
        ));
        lines.push(format!("flow_margin={}", self.flow_margin));
        lines.push(format!("flow_decay={}", self.flow_decay));
        lines.push(format!("respawn_interval_ms={}", self.respawn_interval_ms));
        lines.push(format!("tick_rate={}", self.tick_rate));
        lines.push(format!("track_beat_threshold={}", self.track_beat_threshold));
        lines.push(format!("track_volume_threshold={}", self.track_volume_threshold));
        lines.push(format!(
            "microphone_beat_threshold={}",
            self.microphone_beat_threshold
        ));
        lines.push(format!("microphone_beat_window={}", self.microphone_beat_window));
        lines.push(format!(
            "microphone_volume_threshold={}",
            self.microphone_volume_threshold
        ));
        lines.push(format!("smoothing={}", self.smoothing));

        lines.join("\n")
    }
}

fn path_value(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn number<T>(value: &str, line: usize) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Parse {
        line,
        message: format!("invalid value '{value}': {e}"),
    })
}

fn bounded<T>(value: &str, line: usize, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let parsed: T = number(value, line)?;
    if !range.contains(&parsed) {
        return Err(ConfigError::Parse {
            line,
            message: format!(
                "value {parsed} outside {}..={}",
                range.start(),
                range.end()
            ),
        });
    }
    Ok(parsed)
}
