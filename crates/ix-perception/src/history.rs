//! Rolling window of lidar frames.

use std::collections::VecDeque;

/// The last `capacity` frames of one agent, oldest first.
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    frames:    VecDeque<Vec<f32>>,
    capacity:  usize,
    frame_len: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize, frame_len: usize) -> Self {
        Self { frames: VecDeque::with_capacity(capacity), capacity, frame_len }
    }

    /// Append `frame`, evicting the oldest once full.
    pub fn push(&mut self, frame: Vec<f32>) {
        debug_assert_eq!(frame.len(), self.frame_len);
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Append `capacity × frame_len` values to `out`: zeros for missing
    /// leading frames, then the stored frames oldest first.
    pub fn write_stacked(&self, out: &mut Vec<f32>) {
        let missing = self.capacity - self.frames.len();
        out.extend(std::iter::repeat_n(0.0, missing * self.frame_len));
        for frame in &self.frames {
            out.extend_from_slice(frame);
        }
    }
}
