//! Statistical reducers over frames and recency-ordered values
//!
//! Reducers compose: pre-reduce each frame of a log to its mean
//! (`Log::means`) and feed the result to `weighted_mean`.

use crate::frame::Frame;
use thiserror::Error;

/// Reducer window errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ReduceError {
    #[error("Invalid reducer window: {0}")]
    InvalidWindow(f32),
}

/// Arithmetic sum of samples
pub fn sum(frame: &Frame) -> f32 {
    frame.iter().sum()
}

/// Mean sample value, 0 for an empty frame
pub fn mean(frame: &Frame) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    sum(frame) / frame.len() as f32
}

/// Maximum sample value, 0 for an empty frame
pub fn peak(frame: &Frame) -> f32 {
    frame.iter().reduce(f32::max).unwrap_or(0.0)
}

/// Resolve a requested window against the number of available values
///
/// Fractional windows round up. Windows beyond `available` clamp to it.
pub fn resolve_window(requested: f32, available: usize) -> Result<usize, ReduceError> {
    if !requested.is_finite() || requested <= 0.0 {
        return Err(ReduceError::InvalidWindow(requested));
    }
    Ok((requested.ceil() as usize).min(available))
}

/// Linearly recency-weighted mean of the first `window` values
///
/// `values` must be ordered newest first; the i-th newest value carries
/// weight `window - i`. An invalid window is clamped to 1. No values
/// reduce to 0.
pub fn weighted_mean<I>(values: I, window: f32) -> f32
where
    I: IntoIterator<Item = f32>,
    I::IntoIter: ExactSizeIterator,
{
    let values = values.into_iter();
    let available = values.len();
    let window = match resolve_window(window, available) {
        Ok(w) => w,
        Err(e) => {
            tracing::trace!("{e}, clamping to 1");
            available.min(1)
        }
    };
    if window == 0 {
        return 0.0;
    }

    let (total, weights) = values
        .take(window)
        .enumerate()
        .fold((0.0f32, 0.0f32), |(total, weights), (i, v)| {
            let w = (window - i) as f32;
            (total + v * w, weights + w)
        });
    total / weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SampleKind;
    use crate::log::Log;

    #[test]
    fn test_sum_mean_peak() {
        let frame = Frame::from_floats(vec![1.0, 2.0, 3.0]);
        assert_eq!(sum(&frame), 6.0);
        assert_eq!(mean(&frame), 2.0);
        assert_eq!(peak(&Frame::from_floats(vec![1.0, 5.0, 3.0])), 5.0);
    }

    #[test]
    fn test_byte_frames_reduce_as_floats() {
        let frame = Frame::from_bytes(vec![10, 20, 255]);
        assert_eq!(sum(&frame), 285.0);
        assert_eq!(peak(&frame), 255.0);
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::from_floats(Vec::new());
        assert_eq!(sum(&frame), 0.0);
        assert_eq!(mean(&frame), 0.0);
        assert_eq!(peak(&frame), 0.0);
    }

    #[test]
    fn test_peak_of_negative_rates() {
        let frame = Frame::from_floats(vec![-4.0, -1.0, -2.0]);
        assert_eq!(peak(&frame), -1.0);
    }

    #[test]
    fn test_weighted_mean_favours_recent() {
        let mut log = Log::new(5, SampleKind::Float, 1);
        for v in 1..=5 {
            log.push(Frame::from_floats(vec![v as f32]));
        }

        let means: Vec<f32> = log.means().collect();
        let weighted = weighted_mean(means.iter().copied(), 5.0);
        let plain = means.iter().sum::<f32>() / means.len() as f32;

        assert!(weighted > 3.0);
        assert!(weighted > plain);
        // (5*5 + 4*4 + 3*3 + 2*2 + 1*1) / 15
        assert!((weighted - 55.0 / 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_weighted_mean_clamps_window() {
        let values = [2.0f32, 4.0];

        // Window larger than the data uses everything
        let wide = weighted_mean(values.iter().copied(), 10.0);
        assert!((wide - (2.0 * 2.0 + 4.0) / 3.0).abs() < 1e-5);

        // Non-positive window falls back to the newest value
        assert_eq!(weighted_mean(values.iter().copied(), 0.0), 2.0);
        assert_eq!(weighted_mean(values.iter().copied(), -3.0), 2.0);
        assert_eq!(weighted_mean(values.iter().copied(), f32::NAN), 2.0);
    }

    #[test]
    fn test_weighted_mean_fractional_window_rounds_up() {
        let values = [1.0f32, 1.0, 100.0];
        // 1.2 -> 2 values
        assert_eq!(weighted_mean(values.iter().copied(), 1.2), 1.0);
    }

    #[test]
    fn test_weighted_mean_empty() {
        assert_eq!(weighted_mean(std::iter::empty::<f32>(), 4.0), 0.0);
        assert_eq!(weighted_mean(Vec::<f32>::new(), 0.0), 0.0);
    }

    #[test]
    fn test_resolve_window() {
        assert_eq!(resolve_window(2.5, 10), Ok(3));
        assert_eq!(resolve_window(20.0, 4), Ok(4));
        assert_eq!(resolve_window(0.0, 4), Err(ReduceError::InvalidWindow(0.0)));
    }
}
