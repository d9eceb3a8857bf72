use crate::types::*;
use crossbeam_channel::Sender;
use hound::{SampleFormat, WavReader};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Reads a WAV file and streams it as AudioChunk events at real-time pace,
/// so a recording goes through the controller exactly like live input.
pub struct WavPlayer {
    path: PathBuf,
    tx: Sender<InputEvent>,
    clock: SessionClock,
}

/// Samples sent per AudioChunk. ~11ms at 44.1kHz.
const CHUNK_SIZE: usize = 512;

impl WavPlayer {
    pub fn new(path: PathBuf, tx: Sender<InputEvent>, clock: SessionClock) -> Self {
        Self { path, tx, clock }
    }

    /// Stream the file, then send `Shutdown`. Blocks the calling thread.
    pub fn run(&self) {
        let (mono, sample_rate) = match load_mono(&self.path) {
            Ok(v) => v,
            Err(e) => {
                error!("{}", e);
                let _ = self.tx.send(InputEvent::Shutdown);
                return;
            }
        };

        let duration_secs = mono.len() as f64 / sample_rate as f64;
        info!(
            "WAV: {:.2}s, {} samples → streaming at real-time pace",
            duration_secs,
            mono.len()
        );

        let chunk_dur = Duration::from_secs_f64(CHUNK_SIZE as f64 / sample_rate as f64);
        let start = Instant::now();

        for (i, chunk) in mono.chunks(CHUNK_SIZE).enumerate() {
            // Pace to real time: wait until this chunk's expected send time
            let target = chunk_dur * i as u32;
            let elapsed = start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }

            let event = InputEvent::Audio(AudioChunk {
                timestamp_ms: self.clock.now_ms(),
                samples: chunk.to_vec(),
                sample_rate,
            });

            if self.tx.send(event).is_err() {
                // Controller shut down
                return;
            }
        }

        info!("WAV playback complete.");
        let _ = self.tx.send(InputEvent::Shutdown);
    }
}

/// Decode a WAV file to mono f32 in [-1, 1]. Returns samples and rate.
pub fn load_mono(path: &Path) -> Result<(Vec<f32>, u32), String> {
    let reader =
        WavReader::open(path).map_err(|e| format!("Failed to open WAV file {:?}: {}", path, e))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    info!(
        "WAV: {:?}  {} Hz  {} ch  {:?}  {} bit",
        path.file_name().unwrap_or_default(),
        spec.sample_rate,
        channels,
        spec.sample_format,
        spec.bits_per_sample,
    );

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Failed to decode {:?}: {}", path, e))?,
        SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()
                .map_err(|e| format!("Failed to decode {:?}: {}", path, e))?
        }
    };

    let mono: Vec<f32> = if channels == 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    if mono.is_empty() {
        warn!("WAV {:?} contains no samples", path);
    }

    Ok((mono, spec.sample_rate))
}
