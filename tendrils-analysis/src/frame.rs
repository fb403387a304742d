//! Audio frames - one analysis snapshot of frequency bins or amplitudes

/// Numeric kind of the samples held by a frame
///
/// Raw spectral magnitude is integer-quantised; every derived rate is real valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleKind {
    /// 8-bit unsigned samples (0 - 255)
    Byte,
    /// 32-bit float samples
    #[default]
    Float,
}

impl SampleKind {
    /// Convert a real value into this kind's representable range
    #[inline]
    pub fn quantize(self, value: f32) -> f32 {
        match self {
            SampleKind::Byte => byte_of(value) as f32,
            SampleKind::Float => value,
        }
    }
}

#[inline]
fn byte_of(value: f32) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 255.0) as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Samples {
    Byte(Vec<u8>),
    Float(Vec<f32>),
}

/// Fixed-length snapshot of samples produced by one analysis step
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Samples,
}

impl Frame {
    /// Create a frame of `len` zero samples
    pub fn zeroed(kind: SampleKind, len: usize) -> Self {
        let samples = match kind {
            SampleKind::Byte => Samples::Byte(vec![0; len]),
            SampleKind::Float => Samples::Float(vec![0.0; len]),
        };
        Self { samples }
    }

    pub fn from_bytes(samples: Vec<u8>) -> Self {
        Self {
            samples: Samples::Byte(samples),
        }
    }

    pub fn from_floats(samples: Vec<f32>) -> Self {
        Self {
            samples: Samples::Float(samples),
        }
    }

    pub fn kind(&self) -> SampleKind {
        match self.samples {
            Samples::Byte(_) => SampleKind::Byte,
            Samples::Float(_) => SampleKind::Float,
        }
    }

    pub fn len(&self) -> usize {
        match &self.samples {
            Samples::Byte(s) => s.len(),
            Samples::Float(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index` as a float, if present
    pub fn get(&self, index: usize) -> Option<f32> {
        match &self.samples {
            Samples::Byte(s) => s.get(index).map(|&b| b as f32),
            Samples::Float(s) => s.get(index).copied(),
        }
    }

    /// Iterate samples in bin order, widened to `f32`
    pub fn iter(&self) -> Iter<'_> {
        match &self.samples {
            Samples::Byte(s) => Iter::Byte(s.iter()),
            Samples::Float(s) => Iter::Float(s.iter()),
        }
    }

    /// Overwrite every sample with `f(index)`, quantising for byte frames
    pub fn fill_with(&mut self, mut f: impl FnMut(usize) -> f32) {
        match &mut self.samples {
            Samples::Byte(s) => {
                for (i, sample) in s.iter_mut().enumerate() {
                    *sample = byte_of(f(i));
                }
            }
            Samples::Float(s) => {
                for (i, sample) in s.iter_mut().enumerate() {
                    *sample = f(i);
                }
            }
        }
    }

    /// Apply `f` to every sample in place
    pub fn map_in_place(&mut self, mut f: impl FnMut(f32) -> f32) {
        match &mut self.samples {
            Samples::Byte(s) => {
                for sample in s.iter_mut() {
                    *sample = byte_of(f(*sample as f32));
                }
            }
            Samples::Float(s) => {
                for sample in s.iter_mut() {
                    *sample = f(*sample);
                }
            }
        }
    }

    /// Resize to `len` samples, zero-filling new ones
    pub fn resize(&mut self, len: usize) {
        match &mut self.samples {
            Samples::Byte(s) => s.resize(len, 0),
            Samples::Float(s) => s.resize(len, 0.0),
        }
    }

    /// Convert into a frame of `kind`, quantising when narrowing to bytes
    pub fn into_kind(self, kind: SampleKind) -> Frame {
        if self.kind() == kind {
            return self;
        }
        match self.samples {
            Samples::Byte(s) => Frame::from_floats(s.into_iter().map(|b| b as f32).collect()),
            Samples::Float(s) => Frame::from_bytes(s.into_iter().map(byte_of).collect()),
        }
    }

    /// Float samples, when this is a float frame
    pub fn as_floats(&self) -> Option<&[f32]> {
        match &self.samples {
            Samples::Float(s) => Some(s),
            Samples::Byte(_) => None,
        }
    }

    /// Byte samples, when this is a byte frame
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.samples {
            Samples::Byte(s) => Some(s),
            Samples::Float(_) => None,
        }
    }
}

/// Sample iterator yielding `f32` for either sample kind
#[derive(Debug, Clone)]
pub enum Iter<'a> {
    Byte(std::slice::Iter<'a, u8>),
    Float(std::slice::Iter<'a, f32>),
}

impl Iterator for Iter<'_> {
    type Item = f32;

    #[inline]
    fn next(&mut self) -> Option<f32> {
        match self {
            Iter::Byte(it) => it.next().map(|&b| b as f32),
            Iter::Float(it) => it.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Iter::Byte(it) => it.size_hint(),
            Iter::Float(it) => it.size_hint(),
        }
    }
}

impl ExactSizeIterator for Iter<'_> {}
