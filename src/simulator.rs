use crate::key_estimator::scale_offsets;
use crate::note_mapper::midi_to_hz;
use crate::types::*;
use crossbeam_channel::Sender;
use log::info;
use std::f64::consts::PI;
use std::thread;
use std::time::{Duration, Instant};

/// Samples per AudioChunk. ~11ms at 44.1kHz.
const CHUNK_SIZE: usize = 512;

/// Plays a synthetic melody in a chosen key as audio chunks, paced in real
/// time, so the whole pipeline can run without a microphone.
pub struct Simulator {
    clock: SessionClock,
    tx: Sender<InputEvent>,
    key: KeyCandidate,
    sample_rate: u32,
    /// Monotonic sample counter for phase-continuous synthesis.
    sample_counter: u64,
}

/// One step of the demo melody.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Sustained tone at a MIDI note number
    Note { midi: f64, ms: u32 },
    Rest { ms: u32 },
}

impl Simulator {
    pub fn new(clock: SessionClock, tx: Sender<InputEvent>, key: KeyCandidate) -> Self {
        Self {
            clock,
            tx,
            key,
            sample_rate: 44100,
            sample_counter: 0,
        }
    }

    /// Play the melody `repeats` times, then send `Shutdown`.
    /// Blocks the calling thread.
    pub fn run(&mut self, repeats: usize) {
        let steps = melody(self.key);
        info!(
            "Simulator: {} melody, {} steps × {} at {} Hz",
            self.key,
            steps.len(),
            repeats,
            self.sample_rate
        );

        let chunk_dur = Duration::from_secs_f64(CHUNK_SIZE as f64 / self.sample_rate as f64);
        let start = Instant::now();
        let mut chunk_index: u32 = 0;

        for _ in 0..repeats {
            for step in &steps {
                let samples = self.render(step);
                for chunk in samples.chunks(CHUNK_SIZE) {
                    // Pace to real time
                    let target = chunk_dur * chunk_index;
                    let elapsed = start.elapsed();
                    if elapsed < target {
                        thread::sleep(target - elapsed);
                    }
                    chunk_index += 1;

                    let event = InputEvent::Audio(AudioChunk {
                        timestamp_ms: self.clock.now_ms(),
                        samples: chunk.to_vec(),
                        sample_rate: self.sample_rate,
                    });
                    if self.tx.send(event).is_err() {
                        // Controller shut down
                        return;
                    }
                }
            }
        }

        info!("Simulator: melody complete");
        let _ = self.tx.send(InputEvent::Shutdown);
    }

    /// Synthesize one step. Notes get a fundamental plus a quieter octave
    /// partial and a short fade at both ends to avoid clicks.
    pub fn render(&mut self, step: &Step) -> Vec<f32> {
        let sr = self.sample_rate as f64;
        match *step {
            Step::Rest { ms } => {
                let n = (sr * ms as f64 / 1000.0) as usize;
                self.sample_counter += n as u64;
                vec![0.0; n]
            }
            Step::Note { midi, ms } => {
                let n = (sr * ms as f64 / 1000.0) as usize;
                let freq = midi_to_hz(midi);
                let fade = ((sr * 0.005) as usize).min(n / 2).max(1);
                let out = (0..n)
                    .map(|j| {
                        let t = (self.sample_counter + j as u64) as f64 / sr;
                        let env = (j.min(n - 1 - j) as f64 / fade as f64).min(1.0);
                        let v = 0.5 * (2.0 * PI * freq * t).sin()
                            + 0.15 * (2.0 * PI * 2.0 * freq * t).sin();
                        (env * v) as f32
                    })
                    .collect();
                self.sample_counter += n as u64;
                out
            }
        }
    }
}

/// Ascending then descending scale from the root (octave 4), followed by a
/// tonic arpeggio. Minor keys use the natural minor scale.
pub fn melody(key: KeyCandidate) -> Vec<Step> {
    let root_midi = 60.0 + key.root.index() as f64;
    let degrees: Vec<f64> = scale_offsets(key.mode)
        .iter()
        .map(|&o| root_midi + o as f64)
        .chain(std::iter::once(root_midi + 12.0))
        .collect();

    let mut steps = Vec::new();
    for &m in degrees.iter().chain(degrees.iter().rev().skip(1)) {
        steps.push(Step::Note { midi: m, ms: 350 });
        steps.push(Step::Rest { ms: 50 });
    }
    // Tonic triad: degrees 1, 3, 5, 8
    for &i in &[0usize, 2, 4, 7] {
        steps.push(Step::Note {
            midi: degrees[i],
            ms: 500,
        });
    }
    steps.push(Step::Rest { ms: 400 });
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note_mapper::pitch_class_of;

    fn sim() -> Simulator {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        Simulator::new(SessionClock::new(), tx, KeyCandidate::C_MAJOR)
    }

    #[test]
    fn test_melody_stays_in_key() {
        let key: KeyCandidate = "A minor".parse().unwrap();
        let allowed: Vec<usize> = scale_offsets(key.mode)
            .iter()
            .map(|&o| (key.root.index() + o) % 12)
            .collect();
        for step in melody(key) {
            if let Step::Note { midi, .. } = step {
                let pc = pitch_class_of(midi_to_hz(midi)).unwrap();
                assert!(allowed.contains(&pc.index()), "{} not in {}", pc, key);
            }
        }
    }

    #[test]
    fn test_melody_starts_on_root() {
        let key: KeyCandidate = "E major".parse().unwrap();
        match &melody(key)[0] {
            Step::Note { midi, .. } => assert_eq!(*midi, 64.0),
            other => panic!("expected a note, got {:?}", other),
        }
    }

    #[test]
    fn test_render_lengths_and_phase_counter() {
        let mut s = sim();
        let a = s.render(&Step::Note { midi: 69.0, ms: 100 });
        assert_eq!(a.len(), 4410);
        let r = s.render(&Step::Rest { ms: 10 });
        assert_eq!(r.len(), 441);
        assert!(r.iter().all(|&x| x == 0.0));
        assert_eq!(s.sample_counter, 4851);
        assert!(a.iter().all(|x| x.abs() <= 0.66));
    }

    #[test]
    fn test_rendered_note_is_detectable() {
        let mut s = sim();
        let samples = s.render(&Step::Note { midi: 67.0, ms: 100 });
        let est = crate::pitch_estimator::PitchEstimator::new();
        let hz = est.estimate_samples(&samples[1000..3048], 44100).unwrap();
        assert_eq!(pitch_class_of(hz).unwrap().name(), "G");
    }
}
