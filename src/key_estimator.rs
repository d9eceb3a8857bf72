//! Key estimation by diatonic scale membership.
//!
//! Each of the 24 candidate keys is scored by summing the pitch-class
//! histogram over the seven degrees of its scale. The first candidate to
//! reach the highest score wins, scanning roots C..B with major before
//! minor. An empty histogram therefore reports C major; gate on the history
//! size upstream if that matters.

use crate::types::{KeyCandidate, Mode, KEY_COUNT};

pub const MAJOR_OFFSETS: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];
pub const MINOR_OFFSETS: [usize; 7] = [0, 2, 3, 5, 7, 8, 10];

pub fn scale_offsets(mode: Mode) -> &'static [usize; 7] {
    match mode {
        Mode::Major => &MAJOR_OFFSETS,
        Mode::Minor => &MINOR_OFFSETS,
    }
}

/// Sum of histogram counts at the candidate's seven scale degrees.
pub fn score(histogram: &[u32; 12], key: KeyCandidate) -> u32 {
    let root = key.root.index();
    scale_offsets(key.mode)
        .iter()
        .map(|&i| histogram[(root + i) % 12])
        .sum()
}

/// Scores for all 24 candidates, in canonical order.
pub fn score_all(histogram: &[u32; 12]) -> [u32; KEY_COUNT] {
    let mut scores = [0u32; KEY_COUNT];
    for key in KeyCandidate::all() {
        scores[key.index()] = score(histogram, key);
    }
    scores
}

/// Best-matching key. Only a strictly greater score replaces the running
/// best, which starts below any real score, so ties go to the earliest
/// candidate in canonical order.
pub fn best_key(histogram: &[u32; 12]) -> Option<KeyCandidate> {
    let mut best_score: i64 = -1;
    let mut best = None;
    for key in KeyCandidate::all() {
        let s = score(histogram, key) as i64;
        if s > best_score {
            best_score = s;
            best = Some(key);
        }
    }
    best
}

/// Cumulative per-key counts across the whole session.
///
/// Unlike the note history this never ages out; it only grows (one count per
/// tick that produced a key guess) until `reset`.
#[derive(Debug, Clone)]
pub struct KeyTally {
    counts: [u64; KEY_COUNT],
}

impl KeyTally {
    pub fn new() -> Self {
        Self {
            counts: [0; KEY_COUNT],
        }
    }

    pub fn record(&mut self, key: KeyCandidate) {
        self.counts[key.index()] += 1;
    }

    pub fn counts(&self) -> &[u64; KEY_COUNT] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Share of each key in percent. An empty tally is all zeros.
    pub fn percentages(&self) -> [f64; KEY_COUNT] {
        let total = self.total().max(1) as f64;
        let mut pct = [0.0; KEY_COUNT];
        for (p, &c) in pct.iter_mut().zip(&self.counts) {
            *p = c as f64 / total * 100.0;
        }
        pct
    }

    /// Key with the largest share; earliest in canonical order on ties.
    pub fn dominant(&self) -> KeyCandidate {
        let mut max = -1.0;
        let mut dominant = KeyCandidate::C_MAJOR;
        for (i, &p) in self.percentages().iter().enumerate() {
            if p > max {
                max = p;
                dominant = KeyCandidate::from_index(i);
            }
        }
        dominant
    }

    pub fn reset(&mut self) {
        self.counts = [0; KEY_COUNT];
    }
}

impl Default for KeyTally {
    fn default() -> Self {
        Self::new()
    }
}
