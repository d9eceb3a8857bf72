use crate::key_estimator::KeyTally;
use crate::note_history::NoteHistory;
use crate::types::{AudioFrame, KeyCandidate, PitchClass};

/// Display side of the pipeline. The controller calls these in order on
/// every tick that had audio: `on_frame`, `on_note_detected`, then (only
/// when a note was detected) `on_history_changed`, then `on_key_estimated`,
/// and finally `on_tick_end`.
///
/// Implementations must not block; they run on the controller's thread.
pub trait Presenter: Send {
    /// Raw frame for waveform views. Most presenters ignore it.
    fn on_frame(&mut self, _frame: &AudioFrame) {}

    /// Pitch class and frequency for this tick, or None for silence.
    fn on_note_detected(&mut self, note: Option<PitchClass>, frequency_hz: Option<f64>);

    fn on_history_changed(&mut self, history: &NoteHistory);

    /// Key guess for this tick (None when no note was detected) and the
    /// cumulative tally it was recorded into.
    fn on_key_estimated(&mut self, key: Option<KeyCandidate>, tally: &KeyTally);

    /// History and tally were cleared.
    fn on_reset(&mut self) {}

    /// All callbacks for this tick have been delivered.
    fn on_tick_end(&mut self) {}
}
