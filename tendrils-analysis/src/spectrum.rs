//! FFT frequency analyser feeding raw capture frames

use crate::frame::{Frame, SampleKind};
use rustfft::{num_complex::Complex, FftPlanner};
use std::collections::VecDeque;
use std::f32::consts::PI;

/// Default temporal smoothing between successive captures
pub const DEFAULT_SMOOTHING: f32 = 0.8;
/// Level mapped to byte 0
pub const DEFAULT_MIN_DB: f32 = -100.0;
/// Level mapped to byte 255
pub const DEFAULT_MAX_DB: f32 = -30.0;

/// Anything that can fill a frame with its current frequency content
pub trait Analyser: Send {
    /// Number of bins written per capture
    fn frequency_bin_count(&self) -> usize;

    /// Fill `target` in place from the current analyser state
    fn capture_frequencies(&mut self, target: &mut Frame);
}

/// Real-time FFT analyser over a sliding window of the latest samples
///
/// Byte frames receive decibels mapped linearly from `[min_db, max_db]`
/// onto 0-255. Float frames receive decibels, floored at `min_db`.
pub struct FrequencyAnalyser {
    fft_size: usize,
    fft: std::sync::Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    /// Latest `fft_size` time-domain samples
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
    /// Pre-allocated FFT buffer to avoid allocation per capture
    fft_buffer: Vec<Complex<f32>>,
}

impl FrequencyAnalyser {
    /// Create an analyser; `fft_size` is rounded up to a power of two (min 32)
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(32).next_power_of_two();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Blackman window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let x = i as f32 / fft_size as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft_size,
            fft,
            window,
            smoothing: DEFAULT_SMOOTHING,
            min_db: DEFAULT_MIN_DB,
            max_db: DEFAULT_MAX_DB,
            samples: VecDeque::with_capacity(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Set temporal smoothing (0.0 - 1.0)
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    /// Set the decibel range mapped onto byte samples
    pub fn with_decibel_range(mut self, min_db: f32, max_db: f32) -> Self {
        if max_db > min_db {
            self.min_db = min_db;
            self.max_db = max_db;
        }
        self
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Append mono time-domain samples, keeping only the latest `fft_size`
    pub fn push_samples(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.fft_size);
        for &s in &samples[skip..] {
            if self.samples.len() == self.fft_size {
                self.samples.pop_front();
            }
            self.samples.push_back(if s.is_finite() { s } else { 0.0 });
        }
    }

    /// Run one FFT over the window and update smoothed magnitudes
    fn analyze(&mut self) {
        // Zero pad at the front until the window has filled
        let pad = self.fft_size - self.samples.len();
        for (i, buf) in self.fft_buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { self.samples[i - pad] };
            *buf = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let scale = 1.0 / self.fft_size as f32;
        for (prev, bin) in self.smoothed.iter_mut().zip(self.fft_buffer.iter()) {
            let magnitude = bin.norm() * scale;
            let next = self.smoothing * *prev + (1.0 - self.smoothing) * magnitude;
            *prev = if next.is_finite() { next } else { 0.0 };
        }
    }

    /// Smoothed level of each bin in decibels, floored at `min_db`
    fn decibels(&self, bin: usize) -> f32 {
        let magnitude = self.smoothed.get(bin).copied().unwrap_or(0.0);
        if magnitude <= 0.0 {
            return self.min_db;
        }
        (20.0 * magnitude.log10()).max(self.min_db)
    }

    fn byte_level(&self, db: f32) -> f32 {
        255.0 * (db - self.min_db) / (self.max_db - self.min_db)
    }
}

impl Analyser for FrequencyAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn capture_frequencies(&mut self, target: &mut Frame) {
        self.analyze();
        match target.kind() {
            SampleKind::Byte => target.fill_with(|i| self.byte_level(self.decibels(i))),
            SampleKind::Float => target.fill_with(|i| self.decibels(i)),
        }
    }
}
