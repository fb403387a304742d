//! Interfaces to the external particle simulation and camera

/// One captured video frame, RGBA8, row-major
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A live camera (or anything standing in for one)
pub trait VideoSource: Send {
    /// Newest frame, if the source has produced one yet
    fn latest_frame(&mut self) -> Option<&VideoFrame>;
}

/// The simulation the reactive core drives
///
/// Commands are fire-and-forget. Time values are in the simulation's
/// own units (milliseconds for tendrils).
pub trait Simulation {
    /// Current simulation time
    fn time(&self) -> f32;

    /// Elapsed time of the current tick
    fn dt(&self) -> f32;

    /// Live flow decay setting, read every tick
    fn flow_decay(&self) -> f32;

    /// Advance and draw one frame
    fn draw(&mut self);

    /// Respawn particles from the pixels of a camera frame
    fn respawn_from_camera(&mut self, frame: &VideoFrame);

    /// Respawn particles from the flow feedback buffer
    fn respawn_from_flow(&mut self);

    /// Clear all particles and flow
    fn clear(&mut self);
}
