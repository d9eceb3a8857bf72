use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::Sender;
use log::{error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{AudioChunk, InputEvent, SessionClock};

/// Live microphone capture via cpal.
///
/// Holds the cpal `Stream` alive. Drop this to stop capture.
/// Each device callback is mixed to mono f32 and forwarded as one
/// `InputEvent::Audio` chunk. The callback never blocks: if the controller
/// falls behind, chunks are dropped and counted.
pub struct AudioCapture {
    _stream: Stream,
    dropped: Arc<AtomicU64>,
}

impl AudioCapture {
    /// Open the default input device and start streaming.
    /// Returns immediately; audio arrives on the cpal callback thread.
    pub fn start(tx: Sender<InputEvent>, clock: SessionClock) -> Result<Self, String> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| "No default audio input device found".to_string())?;

        info!(
            "Audio input: {}",
            device.name().unwrap_or_else(|_| "unknown".into())
        );

        let supported = device
            .default_input_config()
            .map_err(|e| format!("No supported input config: {e}"))?;
        let sample_rate = supported.sample_rate().0;
        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels as usize;

        info!(
            "Capture config: {}Hz  {} ch  {:?}",
            sample_rate, channels, format
        );

        let dropped = Arc::new(AtomicU64::new(0));
        let err_fn = |e: cpal::StreamError| error!("Audio stream error: {e}");

        let stream = match format {
            SampleFormat::F32 => {
                let forward = forwarder(tx, clock, sample_rate, dropped.clone());
                device
                    .build_input_stream(
                        &config,
                        move |data: &[f32], _| forward(mix_mono_f32(data, channels)),
                        err_fn,
                        None,
                    )
                    .map_err(|e| e.to_string())?
            }
            SampleFormat::I16 => {
                let forward = forwarder(tx, clock, sample_rate, dropped.clone());
                device
                    .build_input_stream(
                        &config,
                        move |data: &[i16], _| forward(mix_mono_i16(data, channels)),
                        err_fn,
                        None,
                    )
                    .map_err(|e| e.to_string())?
            }
            SampleFormat::U16 => {
                let forward = forwarder(tx, clock, sample_rate, dropped.clone());
                device
                    .build_input_stream(
                        &config,
                        move |data: &[u16], _| forward(mix_mono_u16(data, channels)),
                        err_fn,
                        None,
                    )
                    .map_err(|e| e.to_string())?
            }
            fmt => {
                return Err(format!(
                    "Unsupported sample format {fmt:?}. Use an F32, I16 or U16 device."
                ))
            }
        };

        stream.play().map_err(|e| e.to_string())?;

        Ok(Self {
            _stream: stream,
            dropped,
        })
    }

    /// Chunks discarded because the controller's channel was full.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        let dropped = self.dropped_chunks();
        if dropped > 0 {
            warn!("Audio capture dropped {} chunks", dropped);
        }
    }
}

fn forwarder(
    tx: Sender<InputEvent>,
    clock: SessionClock,
    sample_rate: u32,
    dropped: Arc<AtomicU64>,
) -> impl Fn(Vec<f32>) + Send + 'static {
    move |samples| {
        let event = InputEvent::Audio(AudioChunk {
            timestamp_ms: clock.now_ms(),
            samples,
            sample_rate,
        });
        if tx.try_send(event).is_err() {
            dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ─── Per-format mono mixdown helpers ─────────────────────────────────────────

fn mix_mono_f32(data: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn mix_mono_i16(data: &[i16], channels: usize) -> Vec<f32> {
    const SCALE: f32 = i16::MAX as f32;
    data.chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            sum as f32 / (channels as f32 * SCALE)
        })
        .collect()
}

fn mix_mono_u16(data: &[u16], channels: usize) -> Vec<f32> {
    // U16: 0 = -1.0, 32768 = 0.0, 65535 = +1.0
    const MID: f32 = 32768.0;
    data.chunks(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| (s as f32 - MID) / MID).sum();
            sum / channels as f32
        })
        .collect()
}
