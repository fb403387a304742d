//! Live audio capture feeding stream analysers
//!
//! Each source runs on its own thread, which builds and owns the cpal
//! stream (streams cannot move between threads) and reports the analyser
//! through an `Acquisition`. The stream callback downmixes to mono and
//! pushes into a ring; the analyser drains the ring on every capture.

use crate::loader::TrackLoader;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tendrils_analysis::{Analyser, Frame, FrequencyAnalyser, DEFAULT_SMOOTHING};
use tendrils_reactive::{Acquired, Acquisition, AcquisitionError};
use tracing::{debug, info, warn};

/// How often capture threads check for shutdown
const KEEP_ALIVE_POLL: Duration = Duration::from_millis(20);

/// Shared stop flag for every capture thread
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// FFT parameters of one source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserSettings {
    pub fft_size: usize,
    pub smoothing: f32,
}

impl AnalyserSettings {
    pub fn new(fft_size: usize) -> Self {
        Self {
            fft_size,
            smoothing: DEFAULT_SMOOTHING,
        }
    }

    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing;
        self
    }

    fn build(&self) -> FrequencyAnalyser {
        FrequencyAnalyser::new(self.fft_size).with_smoothing(self.smoothing)
    }
}

/// Mono sample ring between a stream callback and its analyser
pub fn sample_ring(capacity: usize) -> (HeapProd<f32>, HeapCons<f32>) {
    HeapRb::<f32>::new(capacity.max(1)).split()
}

/// Frequency analyser fed from a sample ring
pub struct StreamAnalyser {
    consumer: HeapCons<f32>,
    analyser: FrequencyAnalyser,
    scratch: Vec<f32>,
}

impl StreamAnalyser {
    pub fn new(consumer: HeapCons<f32>, analyser: FrequencyAnalyser) -> Self {
        let scratch = vec![0.0; analyser.fft_size()];
        Self {
            consumer,
            analyser,
            scratch,
        }
    }

    /// Move everything queued in the ring into the analysis window
    fn drain(&mut self) {
        loop {
            let n = self.consumer.pop_slice(&mut self.scratch);
            if n == 0 {
                break;
            }
            self.analyser.push_samples(&self.scratch[..n]);
        }
    }
}

impl Analyser for StreamAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    fn capture_frequencies(&mut self, target: &mut Frame) {
        self.drain();
        self.analyser.capture_frequencies(target);
    }
}

/// Decoded track and its play position
#[derive(Debug)]
pub struct Playback {
    samples: Vec<f32>,
    position: usize,
}

impl Playback {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }

    /// Copy the next samples into `out`, padding with silence past the end
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let remaining = &self.samples[self.position..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        out[n..].fill(0.0);
        self.position += n;
        n
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.samples.len()
    }
}

/// Start capturing the default input device
pub fn acquire_microphone(
    settings: AnalyserSettings,
    shutdown: Shutdown,
) -> Acquisition<Box<dyn Analyser>> {
    let (tx, acquisition) = Acquisition::channel();
    let spawned = thread::Builder::new()
        .name("tendrils-microphone".into())
        .spawn(move || {
            let stream = match open_microphone(settings) {
                Ok((stream, analyser)) => {
                    let _ = tx.send(Acquired::Ready(analyser));
                    stream
                }
                Err(e) => {
                    let _ = tx.send(Acquired::Failed(e));
                    return;
                }
            };
            keep_alive(&shutdown, || {});
            drop(stream);
            debug!("microphone stream closed");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn microphone thread");
    }
    acquisition
}

/// Decode `path` and play it through the default output device
pub fn acquire_track(
    path: PathBuf,
    settings: AnalyserSettings,
    shutdown: Shutdown,
) -> Acquisition<Box<dyn Analyser>> {
    let (tx, acquisition) = Acquisition::channel();
    let spawned = thread::Builder::new()
        .name("tendrils-track".into())
        .spawn(move || {
            let (stream, playback) = match open_track(&path, settings) {
                Ok((stream, playback, analyser)) => {
                    let _ = tx.send(Acquired::Ready(analyser));
                    (stream, playback)
                }
                Err(e) => {
                    let _ = tx.send(Acquired::Failed(e));
                    return;
                }
            };

            let mut finished = false;
            keep_alive(&shutdown, || {
                if !finished && playback.lock().is_finished() {
                    finished = true;
                    info!(path = %path.display(), "track finished");
                }
            });
            drop(stream);
            debug!("track stream closed");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn track thread");
    }
    acquisition
}

/// Hold the calling thread (and its stream) until shutdown
fn keep_alive(shutdown: &Shutdown, mut idle: impl FnMut()) {
    while !shutdown.is_triggered() {
        idle();
        thread::sleep(KEEP_ALIVE_POLL);
    }
}

fn open_microphone(
    settings: AnalyserSettings,
) -> Result<(Stream, Box<dyn Analyser>), AcquisitionError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AcquisitionError::NoDevice("no audio input device found".into()))?;
    let supported = device.default_input_config().map_err(config_error)?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    if channels == 0 {
        return Err(AcquisitionError::Stream("input device reported 0 channels".into()));
    }
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let (producer, consumer) = sample_ring((sample_rate as usize).max(settings.fft_size * 2));
    let stream = match sample_format {
        SampleFormat::F32 => build_input::<f32>(&device, &config, channels, producer),
        SampleFormat::I16 => build_input::<i16>(&device, &config, channels, producer),
        SampleFormat::U16 => build_input::<u16>(&device, &config, channels, producer),
        other => Err(AcquisitionError::Stream(format!(
            "unsupported input sample format {other:?}"
        ))),
    }?;
    stream
        .play()
        .map_err(|e| AcquisitionError::Stream(e.to_string()))?;

    let name = device.name().unwrap_or_else(|_| "unknown".into());
    info!(
        device = %name,
        sample_rate,
        channels,
        "microphone capturing"
    );
    let analyser = StreamAnalyser::new(consumer, settings.build());
    Ok((stream, Box::new(analyser)))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    mut producer: HeapProd<f32>,
) -> Result<Stream, AcquisitionError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut mono = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                mono.extend(data.chunks_exact(channels).map(|frame| {
                    frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32
                }));
                // Samples that don't fit are dropped until the analyser drains
                producer.push_slice(&mono);
            },
            |err| warn!(error = %err, "input stream error"),
            None,
        )
        .map_err(build_error)
}

type OpenedTrack = (Stream, Arc<Mutex<Playback>>, Box<dyn Analyser>);

fn open_track(path: &Path, settings: AnalyserSettings) -> Result<OpenedTrack, AcquisitionError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AcquisitionError::NoDevice("no audio output device found".into()))?;
    let supported = device.default_output_config().map_err(config_error)?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    if channels == 0 {
        return Err(AcquisitionError::Stream("output device reported 0 channels".into()));
    }
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let track = TrackLoader::with_sample_rate(sample_rate)
        .load(path)
        .map_err(|e| AcquisitionError::Load(e.to_string()))?;
    let playback = Arc::new(Mutex::new(Playback::new(track.samples)));

    let (producer, consumer) = sample_ring((sample_rate as usize).max(settings.fft_size * 2));
    let for_callback = playback.clone();
    let stream = match sample_format {
        SampleFormat::F32 => {
            build_output::<f32>(&device, &config, channels, for_callback, producer)
        }
        SampleFormat::I16 => {
            build_output::<i16>(&device, &config, channels, for_callback, producer)
        }
        SampleFormat::U16 => {
            build_output::<u16>(&device, &config, channels, for_callback, producer)
        }
        other => Err(AcquisitionError::Stream(format!(
            "unsupported output sample format {other:?}"
        ))),
    }?;
    stream
        .play()
        .map_err(|e| AcquisitionError::Stream(e.to_string()))?;

    info!(path = %path.display(), sample_rate, channels, "track playing");
    let analyser = StreamAnalyser::new(consumer, settings.build());
    Ok((stream, playback, Box::new(analyser)))
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    playback: Arc<Mutex<Playback>>,
    mut producer: HeapProd<f32>,
) -> Result<Stream, AcquisitionError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut mono = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Never block the audio thread; output silence on contention
                let Some(mut playback) = playback.try_lock() else {
                    data.fill(T::EQUILIBRIUM);
                    return;
                };
                mono.resize(data.len() / channels, 0.0);
                playback.read(&mut mono);
                for (frame, &sample) in data.chunks_exact_mut(channels).zip(mono.iter()) {
                    frame.fill(T::from_sample(sample));
                }
                producer.push_slice(&mono);
            },
            |err| warn!(error = %err, "output stream error"),
            None,
        )
        .map_err(build_error)
}

fn config_error(e: cpal::DefaultStreamConfigError) -> AcquisitionError {
    match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => {
            AcquisitionError::NoDevice(e.to_string())
        }
        other => AcquisitionError::Stream(other.to_string()),
    }
}

fn build_error(e: cpal::BuildStreamError) -> AcquisitionError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => AcquisitionError::NoDevice(e.to_string()),
        other => AcquisitionError::Stream(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Observer;
    use std::f32::consts::PI;
    use tendrils_analysis::SampleKind;

    #[test]
    fn test_stream_analyser_drains_ring() {
        let (mut producer, consumer) = sample_ring(1024);
        let mut analyser =
            StreamAnalyser::new(consumer, FrequencyAnalyser::new(64).with_smoothing(0.0));
        assert_eq!(analyser.frequency_bin_count(), 32);

        let tone: Vec<f32> = (0..512)
            .map(|i| (2.0 * PI * 8.0 * i as f32 / 64.0).sin())
            .collect();
        assert_eq!(producer.push_slice(&tone), 512);

        let mut frame = Frame::zeroed(SampleKind::Float, 32);
        analyser.capture_frequencies(&mut frame);

        assert_eq!(analyser.consumer.occupied_len(), 0);
        let loudest = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(8));
    }

    #[test]
    fn test_empty_ring_reads_silence() {
        let (_producer, consumer) = sample_ring(16);
        let mut analyser = StreamAnalyser::new(consumer, FrequencyAnalyser::new(32));
        let mut frame = Frame::zeroed(SampleKind::Byte, 16);
        analyser.capture_frequencies(&mut frame);
        assert!(frame.iter().all(|b| b == 0.0));
    }

    #[test]
    fn test_playback_reads_then_pads() {
        let mut playback = Playback::new(vec![0.1, 0.2, 0.3]);
        let mut out = [1.0; 2];
        assert_eq!(playback.read(&mut out), 2);
        assert_eq!(out, [0.1, 0.2]);
        assert!(!playback.is_finished());

        assert_eq!(playback.read(&mut out), 1);
        assert_eq!(out, [0.3, 0.0]);
        assert!(playback.is_finished());

        assert_eq!(playback.read(&mut out), 0);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn test_shutdown_flag() {
        let shutdown = Shutdown::new();
        let seen_by_thread = shutdown.clone();
        assert!(!seen_by_thread.is_triggered());
        shutdown.trigger();
        assert!(seen_by_thread.is_triggered());

        // Returns immediately once triggered
        let mut polls = 0;
        keep_alive(&seen_by_thread, || polls += 1);
        assert_eq!(polls, 0);
    }

    #[test]
    fn test_settings_build_analyser() {
        let settings = AnalyserSettings::new(256).with_smoothing(0.5);
        assert_eq!(settings.build().fft_size(), 256);
        assert_eq!(AnalyserSettings::new(32).smoothing, DEFAULT_SMOOTHING);
    }
}
