//! Media sources for tendrils - track decoding, live capture and camera

mod camera;
mod capture;
mod loader;

pub use camera::{acquire_camera, CameraError, StillCamera};
pub use capture::{
    acquire_microphone, acquire_track, sample_ring, AnalyserSettings, Playback, Shutdown,
    StreamAnalyser,
};
pub use loader::{downmix, resample, LoadError, LoadedTrack, TrackLoader};
