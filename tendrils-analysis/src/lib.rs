//! Audio analysis for tendrils
//!
//! Provides frame logs, multi-order rate logs, statistical reducers
//! and the FFT analyser that produces raw frames.

mod frame;
mod log;
mod order_log;
pub mod reduce;
mod spectrum;

pub use frame::{Frame, Iter, SampleKind};
pub use log::{Log, LogError};
pub use order_log::{OrderLog, OrderLogLayout, StepError};
pub use reduce::{mean, peak, sum, weighted_mean, ReduceError};
pub use spectrum::{
    Analyser, FrequencyAnalyser, DEFAULT_MAX_DB, DEFAULT_MIN_DB, DEFAULT_SMOOTHING,
};
