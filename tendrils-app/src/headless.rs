//! Headless stand-in for the particle simulation
//!
//! Keeps wall-clock time in milliseconds and reports every command it
//! receives through tracing instead of drawing.

use std::f32::consts::TAU;
use std::time::Instant;
use tendrils_reactive::{Simulation, VideoFrame};
use tracing::{info, trace};

/// Respawn counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RespawnStats {
    pub frames: u64,
    pub camera: u64,
    pub flow: u64,
}

pub struct HeadlessSimulation {
    started: Instant,
    last_draw: Instant,
    time: f32,
    dt: f32,
    flow_decay: f32,
    stats: RespawnStats,
}

impl HeadlessSimulation {
    pub fn new(flow_decay: f32) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_draw: now,
            time: 0.0,
            dt: 0.0,
            flow_decay,
            stats: RespawnStats::default(),
        }
    }

    pub fn stats(&self) -> RespawnStats {
        self.stats
    }

    /// Where a slowly orbiting pointer would be at the current time
    pub fn pointer(&self) -> [f32; 2] {
        let phase = self.time / 4000.0 * TAU;
        [0.5 * phase.cos(), 0.5 * phase.sin()]
    }
}

impl Simulation for HeadlessSimulation {
    fn time(&self) -> f32 {
        self.time
    }

    fn dt(&self) -> f32 {
        self.dt
    }

    fn flow_decay(&self) -> f32 {
        self.flow_decay
    }

    fn draw(&mut self) {
        let now = Instant::now();
        self.dt = now.duration_since(self.last_draw).as_secs_f32() * 1000.0;
        self.time = now.duration_since(self.started).as_secs_f32() * 1000.0;
        self.last_draw = now;
        self.stats.frames += 1;
        trace!(time = self.time, dt = self.dt, "draw");
    }

    fn respawn_from_camera(&mut self, frame: &VideoFrame) {
        self.stats.camera += 1;
        info!(
            width = frame.width,
            height = frame.height,
            time = self.time,
            "respawn from camera"
        );
    }

    fn respawn_from_flow(&mut self) {
        self.stats.flow += 1;
        info!(time = self.time, "respawn from flow");
    }

    fn clear(&mut self) {
        info!("simulation cleared");
        self.stats = RespawnStats::default();
    }
}
