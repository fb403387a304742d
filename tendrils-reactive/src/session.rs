//! Session - owns both audio bridges and the camera slot

use crate::simulation::{Simulation, VideoFrame, VideoSource};
use crate::source::{Acquired, Acquisition, SourceBridge, SourceId};
use tendrils_analysis::{Analyser, OrderLogLayout};
use tracing::{info, warn};

/// Camera handle, acquired the same way as the audio sources
#[derive(Default)]
struct CameraSlot {
    pending: Option<Acquisition<Box<dyn VideoSource>>>,
    source: Option<Box<dyn VideoSource>>,
    failed: bool,
}

impl CameraSlot {
    fn poll(&mut self) {
        let Some(outcome) = self.pending.as_ref().and_then(Acquisition::poll) else {
            return;
        };
        self.pending = None;
        match outcome {
            Acquired::Ready(source) => {
                info!("camera ready");
                self.source = Some(source);
            }
            Acquired::Failed(e) => {
                warn!(error = %e, "camera unavailable, camera respawns are skipped");
                self.failed = true;
            }
        }
    }
}

/// Everything the tick loop reads and advances between ticks
pub struct Session {
    pub track: SourceBridge,
    pub microphone: SourceBridge,
    camera: CameraSlot,
}

impl Session {
    pub fn new(track: OrderLogLayout, microphone: OrderLogLayout) -> Self {
        Self {
            track: SourceBridge::new(SourceId::Track, track),
            microphone: SourceBridge::new(SourceId::Microphone, microphone),
            camera: CameraSlot::default(),
        }
    }

    pub fn bridge(&self, id: SourceId) -> &SourceBridge {
        match id {
            SourceId::Track => &self.track,
            SourceId::Microphone => &self.microphone,
        }
    }

    pub fn bridge_mut(&mut self, id: SourceId) -> &mut SourceBridge {
        match id {
            SourceId::Track => &mut self.track,
            SourceId::Microphone => &mut self.microphone,
        }
    }

    /// Hand an in-flight audio acquisition to a bridge
    pub fn request(&mut self, id: SourceId, acquisition: Acquisition<Box<dyn Analyser>>) -> bool {
        self.bridge_mut(id).begin(acquisition)
    }

    /// Hand an in-flight camera acquisition to the session
    pub fn request_camera(&mut self, acquisition: Acquisition<Box<dyn VideoSource>>) -> bool {
        if self.camera.source.is_some() || self.camera.pending.is_some() || self.camera.failed {
            return false;
        }
        self.camera.pending = Some(acquisition);
        true
    }

    /// Apply any acquisitions that finished since the last tick
    pub fn poll(&mut self) {
        self.track.poll();
        self.microphone.poll();
        self.camera.poll();
    }

    pub fn any_ready(&self) -> bool {
        self.track.is_ready() || self.microphone.is_ready()
    }

    pub fn has_camera(&self) -> bool {
        self.camera.source.is_some()
    }

    /// Latest camera frame, if a camera is attached and has produced one
    pub fn camera_frame(&mut self) -> Option<&VideoFrame> {
        self.camera
            .source
            .as_mut()?
            .latest_frame()
            .filter(|frame| !frame.is_empty())
    }

    /// Clear the simulation and forget every source's history
    pub fn restart(&mut self, simulation: &mut dyn Simulation) {
        simulation.clear();
        self.track.clear_history();
        self.microphone.clear_history();
    }
}
