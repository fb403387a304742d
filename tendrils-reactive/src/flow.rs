//! Flow feedback buffer: timestamped flow-line points aged out each tick

use std::collections::VecDeque;

/// Flow input the orchestrator ages out and advances every tick
pub trait FlowFeedback {
    /// Drop entries older than `max_age` relative to `now`, returning how many
    fn trim_old(&mut self, max_age: f32, now: f32) -> usize;

    /// Advance after trimming (upload, redraw)
    fn update(&mut self);
}

/// Trim window for a flow decay rate: `1 / decay + margin`
///
/// A non-positive decay never fades, so nothing is trimmed.
pub fn flow_window(flow_decay: f32, margin: f32) -> f32 {
    if flow_decay > 0.0 && flow_decay.is_finite() {
        1.0 / flow_decay + margin
    } else {
        f32::INFINITY
    }
}

/// A single flow point in view space (-1 to 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowPoint {
    pub time: f32,
    pub position: [f32; 2],
}

/// Flow line kept in time order, oldest first
#[derive(Debug, Clone, Default)]
pub struct FlowLine {
    points: VecDeque<FlowPoint>,
    updates: u64,
}

impl FlowLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a point at `time`
    pub fn push(&mut self, time: f32, position: [f32; 2]) {
        self.points.push_back(FlowPoint { time, position });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &FlowPoint> {
        self.points.iter()
    }

    /// Number of updates since creation
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl FlowFeedback for FlowLine {
    fn trim_old(&mut self, max_age: f32, now: f32) -> usize {
        let cutoff = now - max_age;
        let mut trimmed = 0;
        while let Some(point) = self.points.front() {
            if point.time < cutoff {
                self.points.pop_front();
                trimmed += 1;
            } else {
                break;
            }
        }
        trimmed
    }

    fn update(&mut self) {
        self.updates += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_window() {
        assert!((flow_window(0.001, 100.0) - 1100.0).abs() < 0.01);
        assert_eq!(flow_window(0.5, 100.0), 102.0);
        assert_eq!(flow_window(0.0, 100.0), f32::INFINITY);
        assert_eq!(flow_window(-1.0, 100.0), f32::INFINITY);
    }

    #[test]
    fn test_trim_old() {
        let mut line = FlowLine::new();
        for t in [0.0, 500.0, 1000.0, 1500.0] {
            line.push(t, [0.0, 0.0]);
        }

        let trimmed = line.trim_old(1100.0, 1600.0);
        assert_eq!(trimmed, 1);
        assert_eq!(line.points().next().map(|p| p.time), Some(500.0));
    }

    #[test]
    fn test_infinite_window_keeps_everything() {
        let mut line = FlowLine::new();
        line.push(0.0, [0.5, -0.5]);
        assert_eq!(line.trim_old(f32::INFINITY, 1.0e9), 0);
        assert_eq!(line.len(), 1);
    }
}
