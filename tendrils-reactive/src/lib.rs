//! Reactive core for tendrils
//!
//! Audio sources are acquired off the tick loop and, once ready, captured
//! every tick into order logs. A decision cascade reduces those logs and
//! picks at most one respawn action per tick for the particle simulation.

mod cascade;
mod config;
mod flow;
mod orchestrator;
mod session;
mod simulation;
mod source;

pub use cascade::{
    Action, Comparison, Decision, DecisionCascade, Metric, OrderSelector, Policy, PolicyError,
    ThresholdRule, Thresholds,
};
pub use config::{ConfigError, SessionConfig, MAX_FFT_SIZE, MAX_HISTORY, MAX_ORDER};
pub use flow::{flow_window, FlowFeedback, FlowLine, FlowPoint};
pub use orchestrator::{TickOrchestrator, TickReport, DEFAULT_FLOW_MARGIN};
pub use session::Session;
pub use simulation::{Simulation, VideoFrame, VideoSource};
pub use source::{
    spawn_acquisition, Acquired, Acquisition, AcquisitionError, SourceBridge, SourceId,
    SourcePhase,
};
