use crate::dsp::{autocorrelate, compute_rms, parabolic_offset};
use crate::settings::Settings;
use crate::types::AudioFrame;
use log::trace;

/// Monophonic pitch estimator: time-domain autocorrelation with parabolic
/// peak refinement.
///
/// # How it works
///
/// 1. **Silence gate** — frames whose RMS is below `silence_threshold` are
///    rejected outright.
/// 2. **Edge trim** — the frame is cut down to the span between the first
///    quiet sample near the start and the first quiet sample near the end
///    (|x| < `edge_threshold`), so the correlation sum starts and ends near
///    a zero crossing.
/// 3. **Autocorrelation** over the trimmed span.
/// 4. **Period pick** — skip the lag-0 lobe by walking down to the first
///    dip, then take the highest correlation after it.
/// 5. **Parabolic refinement** of the peak lag to sub-sample precision.
///
/// Any degenerate case (silence, a trimmed span under 2 samples, a period
/// that cannot be turned into a finite positive frequency) yields `None`.
pub struct PitchEstimator {
    pub silence_threshold: f32,
    pub edge_threshold: f32,
}

impl PitchEstimator {
    pub fn new() -> Self {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            silence_threshold: settings.silence_threshold,
            edge_threshold: settings.edge_threshold,
        }
    }

    /// Estimate the fundamental frequency of `frame` in Hz.
    pub fn estimate(&self, frame: &AudioFrame) -> Option<f64> {
        self.estimate_samples(&frame.samples, frame.sample_rate)
    }

    pub fn estimate_samples(&self, samples: &[f32], sample_rate: u32) -> Option<f64> {
        let rms = compute_rms(samples);
        if rms < self.silence_threshold {
            return None;
        }

        let (start, end) = trim_bounds(samples, self.edge_threshold);
        if end <= start || end - start < 2 {
            return None;
        }
        let buf = &samples[start..end];
        let n = buf.len();

        let c = autocorrelate(buf);

        // First dip: walk past the lag-0 lobe
        let mut d = 0;
        while d + 1 < n && c[d] > c[d + 1] {
            d += 1;
        }

        // Highest correlation from the dip onwards (earliest wins on ties)
        let mut peak = d;
        for lag in d + 1..n {
            if c[lag] > c[peak] {
                peak = lag;
            }
        }

        // Refinement needs both neighbours; at either end keep the integer lag.
        let mut period = peak as f64;
        if peak > 0 && peak + 1 < n {
            period += parabolic_offset(c[peak - 1], c[peak], c[peak + 1]);
        }

        let freq = sample_rate as f64 / period;
        trace!(
            "pitch: rms={:.4} trim={}..{} dip={} peak={} period={:.3} → {:.2}Hz",
            rms, start, end, d, peak, period, freq
        );

        if freq.is_finite() && freq > 0.0 {
            Some(freq)
        } else {
            None
        }
    }
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Half-open sample range `[start, end)` between the first quiet sample in
/// the first half of the buffer and the first quiet sample (scanning
/// backwards) in the second half. Edges with no quiet sample stay at
/// 0 / `len`.
fn trim_bounds(samples: &[f32], threshold: f32) -> (usize, usize) {
    let size = samples.len();
    // Odd lengths scan the middle sample from both sides
    let half = size.div_ceil(2);

    let start = samples[..half]
        .iter()
        .position(|s| s.abs() < threshold)
        .unwrap_or(0);

    let end = (1..half)
        .map(|i| size - i)
        .find(|&i| samples[i].abs() < threshold)
        .unwrap_or(size);

    (start, end)
}
