use crate::types::{NoteEvent, PitchClass};
use std::collections::VecDeque;

pub const DEFAULT_WINDOW_MS: u64 = 8000;

/// Trailing time window of detected pitch classes.
///
/// Pruning happens inside `insert` and nowhere else: after every insert,
/// no retained event is older than `window_ms` relative to the inserted
/// timestamp. Events are kept individually, so repeated detections of the
/// same note weight the histogram.
#[derive(Debug, Clone)]
pub struct NoteHistory {
    events: VecDeque<NoteEvent>,
    window_ms: u64,
}

impl NoteHistory {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW_MS)
    }

    pub fn with_window(window_ms: u64) -> Self {
        Self {
            events: VecDeque::with_capacity(512),
            window_ms,
        }
    }

    /// Append a detection and drop everything older than the window.
    /// `now_ms` is both the event timestamp and the pruning reference.
    pub fn insert(&mut self, pitch_class: PitchClass, now_ms: u64) {
        self.events.push_back(NoteEvent {
            pitch_class,
            timestamp_ms: now_ms,
        });
        let cutoff = now_ms.saturating_sub(self.window_ms);
        self.events.retain(|e| e.timestamp_ms >= cutoff);
    }

    /// Per-pitch-class counts over the live events, recomputed on each call.
    pub fn histogram(&self) -> [u32; 12] {
        let mut counts = [0u32; 12];
        for e in &self.events {
            counts[e.pitch_class.index()] += 1;
        }
        counts
    }

    pub fn reset(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter()
    }

    /// Pitch classes in insertion order, oldest first.
    pub fn pitch_classes(&self) -> Vec<PitchClass> {
        self.events.iter().map(|e| e.pitch_class).collect()
    }
}

impl Default for NoteHistory {
    fn default() -> Self {
        Self::new()
    }
}
