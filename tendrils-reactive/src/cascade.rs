//! Decision cascade - turns analysed rates into at most one action per tick
//!
//! Rules are evaluated in listed order and the first match wins. With the
//! microphone as fallback only, the track's rules are tried before any
//! microphone rule regardless of where they are listed.

use crate::session::Session;
use crate::source::SourceId;
use tendrils_analysis::{mean, peak, sum, weighted_mean, Frame, OrderLog, OrderLogLayout};
use thiserror::Error;
use tracing::{debug, trace};

/// Reactive actions the simulation can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RespawnFromCamera,
    RespawnFromFlow,
}

/// Reducer applied to the selected frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Sum,
    Mean,
    Peak,
    /// Recency-weighted mean over the first `len * window_fraction` samples
    WeightedMean { window_fraction: f32 },
}

impl Metric {
    pub fn measure(&self, frame: &Frame) -> f32 {
        match *self {
            Metric::Sum => sum(frame),
            Metric::Mean => mean(frame),
            Metric::Peak => peak(frame),
            Metric::WeightedMean { window_fraction } => {
                weighted_mean(frame.iter(), frame.len() as f32 * window_fraction)
            }
        }
    }
}

/// Which differentiation order a rule reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSelector {
    /// The source's highest order, whatever it is configured to
    Highest,
    Order(usize),
}

impl OrderSelector {
    pub fn resolve(self, highest: usize) -> usize {
        match self {
            OrderSelector::Highest => highest,
            OrderSelector::Order(k) => k,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Above,
    Below,
}

impl Comparison {
    #[inline]
    pub fn holds(self, value: f32, threshold: f32) -> bool {
        match self {
            Comparison::Above => value > threshold,
            Comparison::Below => value < threshold,
        }
    }
}

/// One entry of the cascade policy
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    /// Name used in logs ("track beat", "mic volume", ...)
    pub label: String,
    pub source: SourceId,
    pub metric: Metric,
    pub order: OrderSelector,
    /// Reverse-chronological frame offset within the selected log
    pub frame: usize,
    pub comparison: Comparison,
    pub threshold: f32,
    pub action: Action,
}

impl ThresholdRule {
    /// Rule reading the newest frame and firing above `threshold`
    pub fn above(
        label: impl Into<String>,
        source: SourceId,
        metric: Metric,
        order: OrderSelector,
        threshold: f32,
        action: Action,
    ) -> Self {
        Self {
            label: label.into(),
            source,
            metric,
            order,
            frame: 0,
            comparison: Comparison::Above,
            threshold,
            action,
        }
    }

    /// Reduce the selected frame, `None` while it has not been captured yet
    pub fn measure(&self, order_log: &OrderLog) -> Option<f32> {
        let k = self.order.resolve(order_log.order());
        let frame = order_log.log(k)?.get(self.frame)?;
        Some(self.metric.measure(frame))
    }

    fn validate(&self, layout: &OrderLogLayout) -> Result<(), PolicyError> {
        let order = self.order.resolve(layout.order);
        if order > layout.order {
            return Err(PolicyError::OrderOutOfRange {
                label: self.label.clone(),
                order,
                highest: layout.order,
            });
        }
        let capacity = layout.capacity_of(order);
        if self.frame >= capacity {
            return Err(PolicyError::FrameOutOfRange {
                label: self.label.clone(),
                frame: self.frame,
                capacity,
            });
        }
        if !self.threshold.is_finite() {
            return Err(PolicyError::InvalidThreshold {
                label: self.label.clone(),
            });
        }
        Ok(())
    }
}

/// Policy errors, caught when the cascade is built
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Rule '{label}' reads order {order} but the source only has {highest}")]
    OrderOutOfRange {
        label: String,
        order: usize,
        highest: usize,
    },
    #[error("Rule '{label}' reads frame {frame} but the log keeps only {capacity}")]
    FrameOutOfRange {
        label: String,
        frame: usize,
        capacity: usize,
    },
    #[error("Rule '{label}' has a non-finite threshold")]
    InvalidThreshold { label: String },
}

/// Thresholds of the reference policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub track_beat: f32,
    pub track_volume: f32,
    pub microphone_beat: f32,
    pub microphone_beat_window: f32,
    pub microphone_volume: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            track_beat: 0.1,
            track_volume: 10.0,
            microphone_beat: 2.0,
            microphone_beat_window: 0.2,
            microphone_volume: 5.0,
        }
    }
}

/// Ordered rule list plus the source coupling flag
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub rules: Vec<ThresholdRule>,
    /// Only consult the microphone when the track is ready and none of its
    /// rules fired this tick. When false every ready source is captured
    /// each tick and all rules compete in priority order.
    pub microphone_is_fallback_only: bool,
}

impl Policy {
    /// Track beat, track volume, mic beat, mic volume
    pub fn reference(thresholds: Thresholds) -> Self {
        let rules = vec![
            ThresholdRule::above(
                "track beat",
                SourceId::Track,
                Metric::Mean,
                OrderSelector::Highest,
                thresholds.track_beat,
                Action::RespawnFromCamera,
            ),
            ThresholdRule::above(
                "track volume",
                SourceId::Track,
                Metric::Sum,
                OrderSelector::Order(1),
                thresholds.track_volume,
                Action::RespawnFromFlow,
            ),
            ThresholdRule::above(
                "mic beat",
                SourceId::Microphone,
                Metric::WeightedMean {
                    window_fraction: thresholds.microphone_beat_window,
                },
                OrderSelector::Highest,
                thresholds.microphone_beat,
                Action::RespawnFromCamera,
            ),
            ThresholdRule::above(
                "mic volume",
                SourceId::Microphone,
                Metric::Peak,
                OrderSelector::Order(1),
                thresholds.microphone_volume,
                Action::RespawnFromFlow,
            ),
        ];
        Self {
            rules,
            microphone_is_fallback_only: true,
        }
    }

    pub fn with_microphone_fallback_only(mut self, fallback_only: bool) -> Self {
        self.microphone_is_fallback_only = fallback_only;
        self
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::reference(Thresholds::default())
    }
}

/// The rule that fired on a tick
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Index into the policy's rules
    pub rule: usize,
    pub source: SourceId,
    pub action: Action,
    /// Reduced value that crossed the threshold
    pub value: f32,
}

/// Per-tick evaluator of a validated policy
#[derive(Debug, Clone)]
pub struct DecisionCascade {
    policy: Policy,
}

impl DecisionCascade {
    /// Validate `policy` against the sources' layouts
    pub fn new(
        policy: Policy,
        track: OrderLogLayout,
        microphone: OrderLogLayout,
    ) -> Result<Self, PolicyError> {
        for rule in &policy.rules {
            let layout = match rule.source {
                SourceId::Track => &track,
                SourceId::Microphone => &microphone,
            };
            rule.validate(layout)?;
        }
        Ok(Self { policy })
    }

    /// Validate `policy` against the layouts `session` actually captures with
    pub fn for_session(policy: Policy, session: &Session) -> Result<Self, PolicyError> {
        Self::new(policy, session.track.layout(), session.microphone.layout())
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Label of the rule behind a decision
    pub fn label(&self, decision: &Decision) -> &str {
        self.policy
            .rules
            .get(decision.rule)
            .map_or("", |r| r.label.as_str())
    }

    /// Capture ready sources and fire at most one rule
    pub fn run(&self, session: &mut Session, dt: f32) -> Option<Decision> {
        if !session.any_ready() {
            return None;
        }

        let decision = if self.policy.microphone_is_fallback_only {
            self.run_fallback(session, dt)
        } else {
            self.run_independent(session, dt)
        };

        if let Some(d) = &decision {
            debug!(rule = self.label(d), value = d.value, "rule fired");
        }
        decision
    }

    /// Track first; the microphone only when the track is ready and quiet
    fn run_fallback(&self, session: &mut Session, dt: f32) -> Option<Decision> {
        if !session.track.is_ready() {
            trace!("microphone is fallback only and the track is not ready");
            return None;
        }
        for source in [SourceId::Track, SourceId::Microphone] {
            session.bridge_mut(source).capture_tick(dt)?;
            if let Some(decision) = self.first_match(session, |s| s == source) {
                return Some(decision);
            }
        }
        None
    }

    /// Every ready source is captured, then all rules compete in listed order
    fn run_independent(&self, session: &mut Session, dt: f32) -> Option<Decision> {
        for source in [SourceId::Track, SourceId::Microphone] {
            session.bridge_mut(source).capture_tick(dt);
        }
        self.first_match(session, |_| true)
    }

    fn first_match(
        &self,
        session: &Session,
        include: impl Fn(SourceId) -> bool,
    ) -> Option<Decision> {
        self.policy
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| include(rule.source))
            .find_map(|(index, rule)| {
                let value = rule.measure(session.bridge(rule.source).order_log()?)?;
                rule.comparison
                    .holds(value, rule.threshold)
                    .then_some(Decision {
                        rule: index,
                        source: rule.source,
                        action: rule.action,
                        value,
                    })
            })
    }
}
