//! Shared DSP primitives: RMS, unnormalized autocorrelation, parabolic peak
//! interpolation, and test signal generators.

/// Root mean square of an audio buffer.
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Unnormalized autocorrelation: `c[lag] = Σ buf[j] * buf[j + lag]` for
/// every lag in `0..buf.len()`. O(n²); fine for analyser-sized frames.
pub fn autocorrelate(buf: &[f32]) -> Vec<f64> {
    let n = buf.len();
    (0..n)
        .map(|lag| {
            buf[..n - lag]
                .iter()
                .zip(&buf[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum()
        })
        .collect()
}

/// Sub-sample offset of a peak from three neighbouring values
/// (left, centre, right). Returns 0.0 when the points are collinear.
pub fn parabolic_offset(x1: f64, x2: f64, x3: f64) -> f64 {
    let a = (x1 + x3 - 2.0 * x2) / 2.0;
    let b = (x3 - x1) / 2.0;
    if a != 0.0 {
        -b / (2.0 * a)
    } else {
        0.0
    }
}

/// Test signal generators for unit tests.
#[cfg(test)]
pub mod test_helpers {
    use std::f64::consts::PI;

    /// Generate `n` samples of a mono sine wave.
    pub fn sine_wave(freq_hz: f64, amp: f64, sr: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (amp * (2.0 * PI * freq_hz * i as f64 / sr as f64).sin()) as f32)
            .collect()
    }
}
