//! Audio source bridges and asynchronous acquisition
//!
//! A bridge starts `Unready`, becomes `Acquiring` once a request is made and
//! `Ready` when the acquisition reports an analyser. Acquisitions run off
//! the tick loop and report exactly once over a channel; the tick loop only
//! ever polls. A failed acquisition leaves the bridge `Unready` for good.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::fmt;
use std::thread;
use tendrils_analysis::{Analyser, OrderLog, OrderLogLayout};
use thiserror::Error;
use tracing::{debug, info, warn};

/// The two audio sources the cascade listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Track,
    Microphone,
}

impl SourceId {
    pub fn name(self) -> &'static str {
        match self {
            SourceId::Track => "track",
            SourceId::Microphone => "microphone",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors reported by device or stream acquisition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    #[error("Permission denied: {0}")]
    Denied(String),
    #[error("No device available: {0}")]
    NoDevice(String),
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("Load error: {0}")]
    Load(String),
    #[error("Acquisition ended without a result")]
    Abandoned,
}

/// Outcome of one acquisition
#[derive(Debug)]
pub enum Acquired<T> {
    Ready(T),
    Failed(AcquisitionError),
}

impl<T> From<Result<T, AcquisitionError>> for Acquired<T> {
    fn from(result: Result<T, AcquisitionError>) -> Self {
        match result {
            Ok(handle) => Acquired::Ready(handle),
            Err(e) => Acquired::Failed(e),
        }
    }
}

/// Receiving end of an in-flight acquisition
pub struct Acquisition<T> {
    rx: Receiver<Acquired<T>>,
}

impl<T> Acquisition<T> {
    /// Create a sender/acquisition pair for callback-driven completion
    pub fn channel() -> (Sender<Acquired<T>>, Self) {
        let (tx, rx) = bounded(1);
        (tx, Self { rx })
    }

    /// An acquisition that has already finished
    pub fn resolved(outcome: Acquired<T>) -> Self {
        let (tx, acquisition) = Self::channel();
        let _ = tx.send(outcome);
        acquisition
    }

    /// Check for completion without blocking
    ///
    /// `None` while still in flight. A sender dropped without reporting
    /// counts as a failure.
    pub fn poll(&self) -> Option<Acquired<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Acquired::Failed(AcquisitionError::Abandoned)),
        }
    }
}

/// Run `acquire` on its own thread and report through an `Acquisition`
pub fn spawn_acquisition<T, F>(acquire: F) -> Acquisition<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AcquisitionError> + Send + 'static,
{
    let (tx, acquisition) = Acquisition::channel();
    thread::spawn(move || {
        let _ = tx.send(Acquired::from(acquire()));
    });
    acquisition
}

/// Lifecycle phase of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    Unready,
    Acquiring,
    Ready,
}

/// Analyser handle together with the order log it feeds
///
/// Kept as one record so the pair appears atomically.
struct ReadySource {
    analyser: Box<dyn Analyser>,
    order_log: OrderLog,
}

/// Lifecycle adapter turning an audio acquisition into per-tick frames
pub struct SourceBridge {
    id: SourceId,
    layout: OrderLogLayout,
    pending: Option<Acquisition<Box<dyn Analyser>>>,
    ready: Option<ReadySource>,
    failure: Option<AcquisitionError>,
}

impl SourceBridge {
    pub fn new(id: SourceId, layout: OrderLogLayout) -> Self {
        Self {
            id,
            layout,
            pending: None,
            ready: None,
            failure: None,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn layout(&self) -> OrderLogLayout {
        self.layout
    }

    pub fn phase(&self) -> SourcePhase {
        if self.ready.is_some() {
            SourcePhase::Ready
        } else if self.pending.is_some() {
            SourcePhase::Acquiring
        } else {
            SourcePhase::Unready
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    /// Why acquisition failed, if it did
    pub fn failure(&self) -> Option<&AcquisitionError> {
        self.failure.as_ref()
    }

    /// Start acquiring; ignored unless the bridge is unready and never failed
    pub fn begin(&mut self, acquisition: Acquisition<Box<dyn Analyser>>) -> bool {
        if self.phase() != SourcePhase::Unready || self.failure.is_some() {
            debug!(source = %self.id, phase = ?self.phase(), "ignoring acquisition request");
            return false;
        }
        info!(source = %self.id, "acquiring");
        self.pending = Some(acquisition);
        true
    }

    /// Apply a finished acquisition, returning the phase it moved to
    pub fn poll(&mut self) -> Option<SourcePhase> {
        let outcome = self.pending.as_ref()?.poll()?;
        self.pending = None;

        match outcome {
            Acquired::Ready(analyser) => {
                let bins = analyser.frequency_bin_count();
                let order_log = OrderLog::new(self.layout, bins);
                info!(source = %self.id, bins, order = self.layout.order, "source ready");
                self.ready = Some(ReadySource {
                    analyser,
                    order_log,
                });
                Some(SourcePhase::Ready)
            }
            Acquired::Failed(e) => {
                warn!(source = %self.id, error = %e, "acquisition failed, source stays unready");
                self.failure = Some(e);
                Some(SourcePhase::Unready)
            }
        }
    }

    /// Order log of a ready source
    pub fn order_log(&self) -> Option<&OrderLog> {
        self.ready.as_ref().map(|r| &r.order_log)
    }

    /// Capture this tick's raw frame and derive its rates
    ///
    /// Does nothing and returns `None` unless the source is ready.
    pub fn capture_tick(&mut self, dt: f32) -> Option<&OrderLog> {
        let ReadySource {
            analyser,
            order_log,
        } = self.ready.as_mut()?;
        analyser.capture_frequencies(order_log.raw_mut().step());
        order_log.advance_rates(dt);
        Some(&*order_log)
    }

    /// Drop all captured history, keeping the analyser
    pub fn clear_history(&mut self) {
        if let Some(ready) = self.ready.as_mut() {
            ready.order_log.clear();
        }
    }
}

impl fmt::Debug for SourceBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBridge")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("failure", &self.failure)
            .finish()
    }
}
