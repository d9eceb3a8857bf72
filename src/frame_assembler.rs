use crate::types::{AudioChunk, AudioFrame};
use std::collections::VecDeque;

/// Rolling sample buffer that always exposes the newest `frame_size`
/// samples, like an analyser node's time-domain snapshot.
///
/// Sources push chunks of any size; the controller takes one snapshot per
/// tick. Samples that scroll out between ticks are never analysed.
pub struct FrameAssembler {
    buf: VecDeque<f32>,
    frame_size: usize,
    sample_rate: Option<u32>,
    /// Samples pushed since the last snapshot
    fresh_samples: usize,
}

impl FrameAssembler {
    pub fn new(frame_size: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(frame_size),
            frame_size,
            sample_rate: None,
            fresh_samples: 0,
        }
    }

    pub fn push_audio(&mut self, chunk: &AudioChunk) {
        if self.sample_rate.is_some_and(|sr| sr != chunk.sample_rate) {
            // Rate change: old samples belong to a different timebase
            self.buf.clear();
        }
        self.sample_rate = Some(chunk.sample_rate);
        self.buf.extend(chunk.samples.iter().copied());
        self.fresh_samples += chunk.samples.len();

        let excess = self.buf.len().saturating_sub(self.frame_size);
        self.buf.drain(..excess);
    }

    /// True when samples arrived since the last snapshot.
    pub fn has_fresh_audio(&self) -> bool {
        self.fresh_samples > 0
    }

    /// Copy of the newest full frame, or None while still filling.
    pub fn snapshot(&mut self) -> Option<AudioFrame> {
        let sample_rate = self.sample_rate?;
        if self.buf.len() < self.frame_size {
            return None;
        }
        self.fresh_samples = 0;
        Some(AudioFrame::new(self.buf.iter().copied().collect(), sample_rate))
    }
}
