//! Track file loading and decoding

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during track loading
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// A decoded track, downmixed to mono
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    /// Mono samples, normalized to -1.0 to 1.0
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl LoadedTrack {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Audio file loader using Symphonia
pub struct TrackLoader {
    target_sample_rate: u32,
}

impl Default for TrackLoader {
    fn default() -> Self {
        Self::with_sample_rate(48000)
    }
}

impl TrackLoader {
    /// Create a loader resampling to `target_sample_rate`
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Load, decode and downmix an audio file
    pub fn load(&self, path: &Path) -> Result<LoadedTrack, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut interleaved: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "stopping decode");
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(error = e, "skipping corrupt packet");
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(sample_buf.samples());
        }

        let mono = downmix(&interleaved, channels);
        let samples = if source_sample_rate != self.target_sample_rate {
            resample(&mono, source_sample_rate, self.target_sample_rate)?
        } else {
            mono
        };

        let track = LoadedTrack {
            samples,
            sample_rate: self.target_sample_rate,
        };
        info!(
            path = %path.display(),
            source_rate = source_sample_rate,
            channels,
            secs = track.duration_secs(),
            "track decoded"
        );
        Ok(track)
    }
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Resample mono audio between rates
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(source_rate as usize, target_rate as usize, 1024, 1)
            .map_err(|e| LoadError::Resample(e.to_string()))?;

    let chunk_size = resampler.input_frames_next();
    let mut output = Vec::with_capacity(
        (samples.len() as u64 * target_rate as u64 / source_rate as u64) as usize + chunk_size,
    );

    let mut chunks = samples.chunks_exact(chunk_size);
    for chunk in chunks.by_ref() {
        let resampled = resampler
            .process(&[chunk], None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        output.extend_from_slice(&resampled[0]);
    }

    // Pad the tail with zeros, keeping only its proportional share
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut padded = tail.to_vec();
        padded.resize(chunk_size, 0.0);
        let resampled = resampler
            .process(&[padded.as_slice()], None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        let keep = tail.len() * target_rate as usize / source_rate as usize;
        output.extend_from_slice(&resampled[0][..keep.min(resampled[0].len())]);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_downmix_drops_partial_frame() {
        assert_eq!(downmix(&[1.0, 1.0, 1.0], 2), vec![1.0]);
    }

    #[test]
    fn test_resample_length() {
        let input: Vec<f32> = (0..44100).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resample(&input, 44100, 48000).unwrap();

        let expected = 48000.0;
        assert!((output.len() as f32 - expected).abs() / expected < 0.05);
    }

    #[test]
    fn test_resample_same_rate() {
        let input = vec![0.25; 10];
        assert_eq!(resample(&input, 48000, 48000).unwrap(), input);
    }

    #[test]
    fn test_missing_file() {
        let loader = TrackLoader::default();
        let result = loader.load(Path::new("/nonexistent/track.mp3"));
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn test_duration() {
        let track = LoadedTrack {
            samples: vec![0.0; 24000],
            sample_rate: 48000,
        };
        assert_eq!(track.duration_secs(), 0.5);
    }
}
