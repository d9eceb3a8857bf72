use crate::frame_assembler::FrameAssembler;
use crate::key_estimator::{best_key, KeyTally};
use crate::note_history::NoteHistory;
use crate::note_mapper::pitch_class_of;
use crate::pitch_estimator::PitchEstimator;
use crate::presenter::Presenter;
use crate::settings::Settings;
use crate::types::*;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info, trace, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Owns all session state (note history, key tally, frame buffer) and runs
/// one pipeline pass per tick:
///
///   frame → PitchEstimator → pitch class → NoteHistory → best key → presenters
///
/// Everything happens on the thread that owns the controller. Sources feed
/// it through an `InputEvent` channel; `run` drains that channel between
/// ticks, so a `Reset` can never land in the middle of a pass.
///
/// Only the newest frame is analysed at each tick. Audio that scrolled out
/// of the frame buffer between ticks is skipped, not queued.
pub struct Controller {
    settings: Settings,
    estimator: PitchEstimator,
    history: NoteHistory,
    tally: KeyTally,
    assembler: FrameAssembler,
    presenters: Vec<Box<dyn Presenter>>,
    report_txs: Vec<Sender<TickReport>>,
    clock: SessionClock,
    running: bool,
    tick_count: u64,
}

impl Controller {
    pub fn new(settings: Settings) -> Self {
        Self {
            estimator: PitchEstimator::from_settings(&settings),
            history: NoteHistory::with_window(settings.window_ms),
            tally: KeyTally::new(),
            assembler: FrameAssembler::new(settings.frame_size),
            presenters: Vec::new(),
            report_txs: Vec::new(),
            clock: SessionClock::new(),
            running: false,
            tick_count: 0,
            settings,
        }
    }

    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenters.push(presenter);
        self
    }

    /// Every tick's `TickReport` is offered to this channel. A full channel
    /// drops the report rather than stalling the tick.
    pub fn with_report_sender(mut self, tx: Sender<TickReport>) -> Self {
        self.report_txs.push(tx);
        self
    }

    /// Share a clock with the sources so chunk and note timestamps agree.
    pub fn with_clock(mut self, clock: SessionClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn history(&self) -> &NoteHistory {
        &self.history
    }

    pub fn tally(&self) -> &KeyTally {
        &self.tally
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Begin accepting ticks. Ticks before `start` are ignored.
    pub fn start(&mut self) {
        if !self.running {
            info!(
                "Controller started (frame {} samples, window {}ms, {} Hz ticks)",
                self.settings.frame_size, self.settings.window_ms, self.settings.tick_hz
            );
        }
        self.running = true;
    }

    /// Stop accepting ticks. State is kept; `start` resumes.
    pub fn stop(&mut self) {
        if self.running {
            info!("Controller stopped after {} ticks", self.tick_count);
        }
        self.running = false;
    }

    /// Clear the note history and the cumulative key tally.
    pub fn reset(&mut self) {
        info!(
            "Reset: dropping {} notes and {} key guesses",
            self.history.len(),
            self.tally.total()
        );
        self.history.reset();
        self.tally.reset();
        for p in self.presenters.iter_mut() {
            p.on_reset();
        }
    }

    pub fn push_audio(&mut self, chunk: &AudioChunk) {
        self.assembler.push_audio(chunk);
    }

    /// Analyse the newest buffered frame at the current clock time.
    /// Returns None when stopped or when no full frame is buffered yet.
    pub fn tick(&mut self) -> Option<TickReport> {
        if !self.running {
            return None;
        }
        let frame = self.assembler.snapshot()?;
        let now_ms = self.clock.now_ms();
        self.process_frame(&frame, now_ms)
    }

    /// One pipeline pass over `frame`, timestamped `now_ms`.
    pub fn process_frame(&mut self, frame: &AudioFrame, now_ms: u64) -> Option<TickReport> {
        if !self.running {
            trace!("tick ignored: controller not started");
            return None;
        }

        for p in self.presenters.iter_mut() {
            p.on_frame(frame);
        }

        let frequency_hz = self.estimator.estimate(frame);
        let note = frequency_hz.and_then(pitch_class_of);
        for p in self.presenters.iter_mut() {
            p.on_note_detected(note, frequency_hz);
        }

        let mut key = None;
        if let Some(pc) = note {
            self.history.insert(pc, now_ms);
            for p in self.presenters.iter_mut() {
                p.on_history_changed(&self.history);
            }
            key = best_key(&self.history.histogram());
            if let Some(k) = key {
                self.tally.record(k);
            }
        }

        for p in self.presenters.iter_mut() {
            p.on_key_estimated(key, &self.tally);
            p.on_tick_end();
        }

        let report = TickReport {
            timestamp_ms: now_ms,
            frequency_hz,
            note,
            history: self.history.pitch_classes(),
            key,
            key_percentages: self.tally.percentages().to_vec(),
            dominant_key: self.tally.dominant(),
        };

        for tx in &self.report_txs {
            if let Err(TrySendError::Full(_)) = tx.try_send(report.clone()) {
                debug!("Report channel full, dropping tick at {}ms", now_ms);
            }
        }

        self.tick_count += 1;
        if self.tick_count % 600 == 0 {
            debug!("Controller: {} ticks processed", self.tick_count);
            trace!("Latest: {}", report);
        }

        Some(report)
    }

    /// Tick loop. Blocks the calling thread until the input channel closes
    /// or a `Shutdown` event arrives.
    ///
    /// Each iteration drains every pending event without blocking, then
    /// ticks once if new audio arrived since the last tick, then sleeps to
    /// the next tick deadline.
    pub fn run(&mut self, input_rx: Receiver<InputEvent>) {
        self.start();
        // Unvalidated settings may carry 0 Hz; tick at least once a second
        let tick_hz = self.settings.tick_hz.max(1);
        let period = Duration::from_secs_f64(1.0 / tick_hz as f64);
        let mut deadline = Instant::now();

        loop {
            let mut finished = false;
            loop {
                match input_rx.try_recv() {
                    Ok(InputEvent::Audio(chunk)) => self.push_audio(&chunk),
                    Ok(InputEvent::Reset) => self.reset(),
                    Ok(InputEvent::Shutdown) => {
                        finished = true;
                        break;
                    }
                    Err(crossbeam_channel::TryRecvError::Empty) => break,
                    Err(crossbeam_channel::TryRecvError::Disconnected) => {
                        finished = true;
                        break;
                    }
                }
            }

            // A stalled source would otherwise re-detect the same frame forever
            if self.assembler.has_fresh_audio() {
                self.tick();
            }

            if finished {
                break;
            }

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                if now - deadline > period * 10 {
                    warn!("Controller fell {:?} behind; skipping ahead", now - deadline);
                }
                deadline = now;
            }
        }

        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::test_helpers::sine_wave;
    use crate::note_mapper::midi_to_hz;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
    }

    struct Recorder(Arc<Mutex<Log>>);

    impl Presenter for Recorder {
        fn on_frame(&mut self, _frame: &AudioFrame) {
            self.0.lock().unwrap().calls.push("frame".into());
        }
        fn on_note_detected(&mut self, note: Option<PitchClass>, _hz: Option<f64>) {
            let s = format!("note:{}", note.map(|n| n.name()).unwrap_or("-"));
            self.0.lock().unwrap().calls.push(s);
        }
        fn on_history_changed(&mut self, history: &NoteHistory) {
            let s = format!("history:{}", history.len());
            self.0.lock().unwrap().calls.push(s);
        }
        fn on_key_estimated(&mut self, key: Option<KeyCandidate>, _tally: &KeyTally) {
            let s = format!("key:{}", key.map(|k| k.to_string()).unwrap_or("-".into()));
            self.0.lock().unwrap().calls.push(s);
        }
        fn on_reset(&mut self) {
            self.0.lock().unwrap().calls.push("reset".into());
        }
    }

    fn tone(midi: f64) -> AudioFrame {
        AudioFrame::new(sine_wave(midi_to_hz(midi), 0.5, 44100, 2048), 44100)
    }

    fn started() -> Controller {
        let mut c = Controller::new(Settings::default());
        c.start();
        c
    }

    #[test]
    fn test_ignores_ticks_before_start() {
        let mut c = Controller::new(Settings::default());
        assert!(c.process_frame(&tone(69.0), 0).is_none());
        assert!(c.history().is_empty());
        c.start();
        assert!(c.process_frame(&tone(69.0), 0).is_some());
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn test_detected_note_updates_history_and_tally() {
        let mut c = started();
        let r = c.process_frame(&tone(69.0), 100).unwrap();
        assert_eq!(r.note.map(|n| n.name()), Some("A"));
        assert_eq!(r.history, vec![PitchClass::A]);
        assert!(r.key.is_some());
        assert_eq!(c.tally().total(), 1);
    }

    #[test]
    fn test_silence_leaves_state_untouched() {
        let mut c = started();
        c.process_frame(&tone(60.0), 0);
        let r = c
            .process_frame(&AudioFrame::new(vec![0.0; 2048], 44100), 10)
            .unwrap();
        assert!(r.frequency_hz.is_none());
        assert!(r.note.is_none());
        assert!(r.key.is_none());
        assert_eq!(r.history.len(), 1);
        assert_eq!(c.tally().total(), 1);
    }

    #[test]
    fn test_reset_clears_history_and_tally() {
        let mut c = started();
        c.process_frame(&tone(60.0), 0);
        c.process_frame(&tone(64.0), 10);
        c.reset();
        assert!(c.history().is_empty());
        assert_eq!(c.history().histogram(), [0; 12]);
        assert_eq!(c.tally().total(), 0);
    }

    #[test]
    fn test_presenter_callback_order() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut c = Controller::new(Settings::default())
            .with_presenter(Box::new(Recorder(log.clone())));
        c.start();
        c.process_frame(&tone(69.0), 0);
        c.process_frame(&AudioFrame::new(vec![0.0; 2048], 44100), 5);
        c.reset();
        let calls = log.lock().unwrap().calls.clone();
        assert_eq!(
            calls,
            vec![
                "frame", "note:A", "history:1", "key:C major",
                "frame", "note:-", "key:-",
                "reset",
            ]
        );
    }

    #[test]
    fn test_tick_uses_buffered_audio() {
        let mut c = started();
        assert!(c.tick().is_none());
        c.push_audio(&AudioChunk {
            timestamp_ms: 0,
            samples: sine_wave(440.0, 0.5, 44100, 4096),
            sample_rate: 44100,
        });
        let r = c.tick().unwrap();
        assert_eq!(r.note, Some(PitchClass::A));
    }

    #[test]
    fn test_report_sent_to_channel() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let mut c = Controller::new(Settings::default()).with_report_sender(tx);
        c.start();
        c.process_frame(&tone(62.0), 7);
        let r = rx.try_recv().unwrap();
        assert_eq!(r.timestamp_ms, 7);
        assert_eq!(r.note.map(|n| n.name()), Some("D"));
    }

    #[test]
    fn test_run_with_zero_tick_rate() {
        let settings = Settings {
            tick_hz: 0,
            ..Settings::default()
        };
        let (tx, rx) = crossbeam_channel::bounded(4);
        tx.send(InputEvent::Audio(AudioChunk {
            timestamp_ms: 0,
            samples: sine_wave(440.0, 0.5, 44100, 2048),
            sample_rate: 44100,
        }))
        .unwrap();
        tx.send(InputEvent::Shutdown).unwrap();

        let mut c = Controller::new(settings);
        c.run(rx);
        assert_eq!(c.tick_count(), 1);
        assert!(!c.is_running());
    }
}
