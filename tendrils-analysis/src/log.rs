//! Fixed-capacity circular history of frames
//!
//! Addressing is reverse-chronological: `log[0]` is the newest frame,
//! `log[1]` the one before it, and so on.

use crate::frame::{Frame, SampleKind};
use thiserror::Error;

/// Errors raised when reading a log
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("Log index {index} out of range (length {len})")]
    OutOfRange { index: usize, len: usize },
}

/// Circular buffer of frames, all of the same sample kind and length
#[derive(Debug, Clone)]
pub struct Log {
    frames: Vec<Frame>,
    capacity: usize,
    write_pos: usize,
    len: usize,
    kind: SampleKind,
    frame_len: usize,
}

impl Log {
    /// Create an empty log holding up to `capacity` frames of `frame_len` samples
    ///
    /// Frames are allocated lazily and recycled once the log is full.
    pub fn new(capacity: usize, kind: SampleKind, frame_len: usize) -> Self {
        assert!(capacity >= 1, "log capacity must be at least 1");
        Self {
            frames: Vec::with_capacity(capacity),
            capacity,
            write_pos: 0,
            len: 0,
            kind,
            frame_len,
        }
    }

    /// Advance the write head and return the slot now holding the newest frame
    ///
    /// Once the log is full the returned slot is the evicted oldest frame,
    /// still carrying its stale samples; callers overwrite it in place.
    pub fn step(&mut self) -> &mut Frame {
        if self.frames.len() < self.capacity {
            self.frames.push(Frame::zeroed(self.kind, self.frame_len));
        }
        let slot = self.write_pos;
        self.write_pos = (self.write_pos + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
        &mut self.frames[slot]
    }

    /// Append a frame, evicting the oldest one when at capacity
    pub fn push(&mut self, frame: Frame) {
        let mut frame = frame.into_kind(self.kind);
        frame.resize(self.frame_len);
        *self.step() = frame;
    }

    /// Frame at reverse-chronological offset `index`
    pub fn at(&self, index: usize) -> Result<&Frame, LogError> {
        self.get(index).ok_or(LogError::OutOfRange {
            index,
            len: self.len,
        })
    }

    /// Frame at reverse-chronological offset `index`, if present
    pub fn get(&self, index: usize) -> Option<&Frame> {
        if index >= self.len {
            return None;
        }
        self.frames.get(self.slot(index))
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.write_pos + self.capacity - 1 - index) % self.capacity
    }

    /// Most recently inserted frame
    pub fn newest(&self) -> Option<&Frame> {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    /// Number of samples per frame
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Frames from newest to oldest
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Frame> + '_ {
        (0..self.len).map(move |i| &self.frames[self.slot(i)])
    }

    /// Per-frame means from newest to oldest, ready for `weighted_mean`
    pub fn means(&self) -> impl ExactSizeIterator<Item = f32> + '_ {
        self.iter().map(crate::reduce::mean)
    }

    /// Forget every frame, keeping allocated slots for reuse
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }
}

impl std::ops::Index<usize> for Log {
    type Output = Frame;

    fn index(&self, index: usize) -> &Frame {
        match self.at(index) {
            Ok(frame) => frame,
            Err(e) => panic!("{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(v: f32) -> Frame {
        Frame::from_floats(vec![v])
    }

    #[test]
    fn test_circular_eviction() {
        let capacity = 4;
        let mut log = Log::new(capacity, SampleKind::Float, 1);

        for i in 0..10 {
            log.push(scalar(i as f32));
        }

        assert_eq!(log.len(), capacity);
        assert!(log.is_full());
        // Newest is the last pushed, oldest is push index N - C
        assert_eq!(log.at(0).unwrap().get(0), Some(9.0));
        assert_eq!(log.at(capacity - 1).unwrap().get(0), Some(6.0));
    }

    #[test]
    fn test_reverse_chronological_before_full() {
        let mut log = Log::new(8, SampleKind::Float, 1);
        log.push(scalar(1.0));
        log.push(scalar(2.0));
        log.push(scalar(3.0));

        let order: Vec<f32> = log.iter().filter_map(|f| f.get(0)).collect();
        assert_eq!(order, vec![3.0, 2.0, 1.0]);
        assert_eq!(log[2].get(0), Some(1.0));
    }

    #[test]
    fn test_at_out_of_range() {
        let mut log = Log::new(3, SampleKind::Float, 1);
        assert_eq!(log.at(0), Err(LogError::OutOfRange { index: 0, len: 0 }));

        log.push(scalar(1.0));
        assert!(log.at(0).is_ok());
        assert_eq!(log.at(1), Err(LogError::OutOfRange { index: 1, len: 1 }));
    }

    #[test]
    fn test_push_converts_to_log_kind() {
        let mut log = Log::new(2, SampleKind::Byte, 3);
        log.push(Frame::from_floats(vec![1.2, 300.0]));

        let newest = log.newest().unwrap();
        assert_eq!(newest.kind(), SampleKind::Byte);
        assert_eq!(newest.as_bytes(), Some(&[1u8, 255, 0][..]));
    }

    #[test]
    fn test_step_recycles_oldest_slot() {
        let mut log = Log::new(2, SampleKind::Float, 1);
        log.step().fill_with(|_| 1.0);
        log.step().fill_with(|_| 2.0);

        // Third step hands back the slot that held 1.0
        let recycled = log.step();
        assert_eq!(recycled.get(0), Some(1.0));
        recycled.fill_with(|_| 3.0);

        assert_eq!(log[0].get(0), Some(3.0));
        assert_eq!(log[1].get(0), Some(2.0));
    }

    #[test]
    fn test_means_newest_first() {
        let mut log = Log::new(3, SampleKind::Float, 2);
        log.push(Frame::from_floats(vec![1.0, 3.0]));
        log.push(Frame::from_floats(vec![4.0, 6.0]));

        assert_eq!(log.means().collect::<Vec<_>>(), vec![5.0, 2.0]);
    }

    #[test]
    fn test_clear() {
        let mut log = Log::new(2, SampleKind::Float, 1);
        log.push(scalar(1.0));
        log.clear();

        assert!(log.is_empty());
        assert!(log.newest().is_none());
    }
}
