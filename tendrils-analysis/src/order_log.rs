//! Multi-order frame history
//!
//! Order 0 holds raw captured frames. Order k holds the per-sample finite
//! difference of order k-1's two newest frames, divided by the tick's
//! elapsed time: order 1 is the velocity of spectral energy, order 2 its
//! acceleration, and so on.

use crate::frame::SampleKind;
use crate::log::Log;
use thiserror::Error;

/// Rate step errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum StepError {
    #[error("Invalid rate step: dt = {0}")]
    InvalidStep(f32),
}

/// Shape of an order log: how many orders and how much history each keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLogLayout {
    /// Highest differentiation order (>= 1)
    pub order: usize,
    /// Frames kept for raw captures (order 0)
    pub raw_capacity: usize,
    /// Frames kept for each derived order
    pub rate_capacity: usize,
}

impl OrderLogLayout {
    /// Default history sizes for `order`
    pub fn new(order: usize) -> Self {
        let order = order.max(1);
        Self {
            order,
            raw_capacity: order + 1,
            rate_capacity: order.max(2),
        }
    }

    /// Default layout with overridden history sizes
    pub fn with_capacities(mut self, raw: usize, rate: usize) -> Self {
        self.raw_capacity = raw;
        self.rate_capacity = rate;
        self
    }

    /// Capacity of the log at order `k`
    ///
    /// Every log feeding a higher order keeps at least two frames, since the
    /// order above differences its two newest.
    pub fn capacity_of(&self, k: usize) -> usize {
        let capacity = if k == 0 {
            self.raw_capacity
        } else {
            self.rate_capacity
        };
        if k < self.order {
            capacity.max(2)
        } else {
            capacity.max(1)
        }
    }
}

/// One log per differentiation order for a single audio source
#[derive(Debug, Clone)]
pub struct OrderLog {
    logs: Vec<Log>,
}

impl OrderLog {
    /// Build `order + 1` logs from a per-order factory
    pub fn with_logs(order: usize, mut make_log: impl FnMut(usize) -> Log) -> Self {
        assert!(order >= 1, "order log needs at least one derived order");
        Self {
            logs: (0..=order).map(&mut make_log).collect(),
        }
    }

    /// Build from a layout: byte frames at order 0, float frames above
    pub fn new(layout: OrderLogLayout, frame_len: usize) -> Self {
        Self::with_logs(layout.order, |k| {
            let kind = if k == 0 {
                SampleKind::Byte
            } else {
                SampleKind::Float
            };
            Log::new(layout.capacity_of(k), kind, frame_len)
        })
    }

    /// Highest differentiation order
    pub fn order(&self) -> usize {
        self.logs.len() - 1
    }

    /// Log at order `k`
    pub fn log(&self, k: usize) -> Option<&Log> {
        self.logs.get(k)
    }

    /// Raw capture log (order 0)
    pub fn raw(&self) -> &Log {
        &self.logs[0]
    }

    /// Mutable raw capture log, for filling the next frame in place
    pub fn raw_mut(&mut self) -> &mut Log {
        &mut self.logs[0]
    }

    /// Log of the highest order
    pub fn highest(&self) -> &Log {
        &self.logs[self.logs.len() - 1]
    }

    /// Derive one new frame per order from the orders below it
    ///
    /// Must run after this tick's raw frame was captured. Orders advance in
    /// increasing order so each sees the frame its lower order pushed this
    /// same tick. An order whose lower order has fewer than two frames is
    /// left untouched. An unusable `dt` records a zero rate.
    pub fn advance_rates(&mut self, dt: f32) {
        let step = match check_step(dt) {
            Ok(dt) => Some(dt),
            Err(e) => {
                tracing::trace!("{e}, recording zero rate");
                None
            }
        };

        for k in 1..self.logs.len() {
            let (lower, upper) = self.logs.split_at_mut(k);
            let source = &lower[k - 1];
            let (Some(newest), Some(previous)) = (source.get(0), source.get(1)) else {
                continue;
            };

            let target = upper[0].step();
            match step {
                Some(dt) => {
                    target.fill_with(|i| {
                        newest.get(i).unwrap_or(0.0) - previous.get(i).unwrap_or(0.0)
                    });
                    target.map_in_place(|d| d / dt);
                }
                None => target.fill_with(|_| 0.0),
            }
        }
    }

    /// Forget all history at every order
    pub fn clear(&mut self) {
        for log in &mut self.logs {
            log.clear();
        }
    }
}

impl std::ops::Index<usize> for OrderLog {
    type Output = Log;

    fn index(&self, k: usize) -> &Log {
        &self.logs[k]
    }
}

fn check_step(dt: f32) -> Result<f32, StepError> {
    if dt.is_finite() && dt > 0.0 {
        Ok(dt)
    } else {
        Err(StepError::InvalidStep(dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn order_log(order: usize, frame_len: usize) -> OrderLog {
        OrderLog::new(OrderLogLayout::new(order), frame_len)
    }

    fn capture(log: &mut OrderLog, samples: &[f32]) {
        log.raw_mut().step().fill_with(|i| samples[i]);
    }

    #[test]
    fn test_layout_defaults() {
        let layout = OrderLogLayout::new(3);
        assert_eq!(layout.raw_capacity, 4);
        assert_eq!(layout.rate_capacity, 3);
        assert_eq!(OrderLogLayout::new(1).rate_capacity, 2);
        // Order is never below 1
        assert_eq!(OrderLogLayout::new(0).order, 1);
    }

    #[test]
    fn test_feeding_logs_keep_two_frames() {
        let layout = OrderLogLayout::new(3).with_capacities(1, 0);
        assert_eq!(layout.capacity_of(0), 2);
        assert_eq!(layout.capacity_of(1), 2);
        assert_eq!(layout.capacity_of(2), 2);
        assert_eq!(layout.capacity_of(3), 1);

        // The highest order still fills from undersized overrides
        let mut log = OrderLog::new(layout, 1);
        for raw in [0.0, 250.0, 0.0, 250.0, 0.0] {
            capture(&mut log, &[raw]);
            log.advance_rates(1.0);
        }
        assert_eq!(log.raw().capacity(), 2);
        assert_eq!(log.highest().len(), 1);
    }

    #[test]
    fn test_sample_kinds_per_order() {
        let log = order_log(2, 4);
        assert_eq!(log.order(), 2);
        assert_eq!(log.raw().kind(), SampleKind::Byte);
        assert_eq!(log[1].kind(), SampleKind::Float);
        assert_eq!(log.highest().kind(), SampleKind::Float);
    }

    #[test]
    fn test_order_dependency() {
        let mut log = order_log(3, 2);

        // First tick: order 0 has a single frame, nothing derives
        capture(&mut log, &[10.0, 20.0]);
        log.advance_rates(1.0);
        for k in 1..=3 {
            assert!(log[k].is_empty(), "order {k} advanced too early");
        }

        // Second tick: order 1 gets its first frame, order 2 still waits
        capture(&mut log, &[12.0, 20.0]);
        log.advance_rates(1.0);
        assert_eq!(log[1].len(), 1);
        assert!(log[2].is_empty());
        assert!(log[3].is_empty());

        // Third tick reaches order 2, fourth reaches order 3
        capture(&mut log, &[15.0, 20.0]);
        log.advance_rates(1.0);
        assert_eq!(log[2].len(), 1);
        assert!(log[3].is_empty());

        capture(&mut log, &[15.0, 20.0]);
        log.advance_rates(1.0);
        assert_eq!(log[3].len(), 1);
    }

    #[test]
    fn test_constant_signal_has_zero_rate() {
        let mut log = order_log(1, 3);
        capture(&mut log, &[7.0, 7.0, 7.0]);
        capture(&mut log, &[7.0, 7.0, 7.0]);
        log.advance_rates(1.0);

        assert_eq!(log[1][0], Frame::from_floats(vec![0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_rate_scaling() {
        let mut log = order_log(1, 3);
        let k = 6.0;
        let d = 4.0;
        capture(&mut log, &[10.0, 20.0, 30.0]);
        capture(&mut log, &[10.0 + k, 20.0 + k, 30.0 + k]);
        log.advance_rates(d);

        for rate in log[1][0].iter() {
            assert!((rate - k / d).abs() < 1e-6);
        }
    }

    #[test]
    fn test_second_order_uses_same_tick_velocity() {
        let mut log = order_log(2, 1);
        // Raw: 0, 1, 4 -> velocity: 1, 3 -> acceleration: 2
        for raw in [0.0, 1.0, 4.0] {
            capture(&mut log, &[raw]);
            log.advance_rates(1.0);
        }

        assert_eq!(log[1][0].get(0), Some(3.0));
        assert_eq!(log[1][1].get(0), Some(1.0));
        assert_eq!(log[2][0].get(0), Some(2.0));
    }

    #[test]
    fn test_negative_rates_are_kept() {
        let mut log = order_log(1, 1);
        capture(&mut log, &[200.0]);
        capture(&mut log, &[50.0]);
        log.advance_rates(10.0);

        assert_eq!(log[1][0].get(0), Some(-15.0));
    }

    #[test]
    fn test_zero_dt_records_zero_rate() {
        let mut log = order_log(1, 2);
        capture(&mut log, &[0.0, 0.0]);
        capture(&mut log, &[100.0, 50.0]);
        log.advance_rates(0.0);

        assert_eq!(log[1].len(), 1);
        assert!(log[1][0].iter().all(|r| r == 0.0));
        assert!(log[1][0].iter().all(f32::is_finite));
    }

    #[test]
    fn test_with_logs_factory() {
        let log = OrderLog::with_logs(2, |k| Log::new(k + 2, SampleKind::Float, 8));
        assert_eq!(log[0].capacity(), 2);
        assert_eq!(log[2].capacity(), 4);
        assert_eq!(log.raw().frame_len(), 8);
    }

    #[test]
    fn test_clear_resets_every_order() {
        let mut log = order_log(1, 1);
        capture(&mut log, &[1.0]);
        capture(&mut log, &[2.0]);
        log.advance_rates(1.0);
        log.clear();

        assert!(log.raw().is_empty());
        assert!(log[1].is_empty());
    }

    #[test]
    fn test_check_step() {
        assert_eq!(check_step(16.0), Ok(16.0));
        assert_eq!(check_step(0.0), Err(StepError::InvalidStep(0.0)));
        assert!(check_step(f32::INFINITY).is_err());
        assert!(check_step(-1.0).is_err());
    }
}
