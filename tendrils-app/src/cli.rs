//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;
use tendrils_reactive::SessionConfig;

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "tendrils")]
#[command(about = "Audio-reactive particle respawning", long_about = None)]
pub struct Args {
    /// Audio file to play and react to
    #[arg(long, value_name = "FILE")]
    pub track: Option<PathBuf>,

    /// Still image used in place of a camera
    #[arg(long, value_name = "FILE")]
    pub camera: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub seconds: Option<f32>,

    /// Let the microphone react even while the track is unavailable
    #[arg(long)]
    pub independent_microphone: bool,

    /// Don't open the microphone
    #[arg(long)]
    pub no_microphone: bool,

    /// Write the effective config back to disk
    #[arg(long)]
    pub save_config: bool,
}

impl Args {
    /// Override config values given on the command line
    pub fn apply(&self, config: &mut SessionConfig) {
        if let Some(ref track) = self.track {
            config.track_path = Some(track.clone());
        }
        if let Some(ref camera) = self.camera {
            config.camera_image = Some(camera.clone());
        }
        if self.independent_microphone {
            config.microphone_is_fallback_only = false;
        }
    }

    /// Run length, if a usable one was given
    pub fn run_for(&self) -> Option<std::time::Duration> {
        self.seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(std::time::Duration::from_secs_f32)
    }
}
