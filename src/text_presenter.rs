use crate::key_estimator::KeyTally;
use crate::note_history::NoteHistory;
use crate::presenter::Presenter;
use crate::types::*;
use std::io::{self, Write};

/// Notes that must be in the window before a key is printed. An empty or
/// near-empty window always scores C major, which is not a real guess.
pub const DEFAULT_MIN_NOTES: usize = 5;

/// Plain line-oriented output: one line per detected note with the current
/// window and key. Silent ticks print nothing.
pub struct TextPresenter<W: Write + Send> {
    out: W,
    min_notes: usize,
    window_len: usize,
    window: Vec<PitchClass>,
    line: Option<String>,
}

impl TextPresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            min_notes: DEFAULT_MIN_NOTES,
            window_len: 0,
            window: Vec::new(),
            line: None,
        }
    }

    pub fn with_min_notes(mut self, min_notes: usize) -> Self {
        self.min_notes = min_notes;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Presenter for TextPresenter<W> {
    fn on_note_detected(&mut self, note: Option<PitchClass>, frequency_hz: Option<f64>) {
        self.line = match (note, frequency_hz) {
            (Some(n), Some(hz)) => Some(format!("Note: {:<2} ({:.1} Hz)", n, hz)),
            _ => None,
        };
    }

    fn on_history_changed(&mut self, history: &NoteHistory) {
        self.window_len = history.len();
        self.window = history.pitch_classes();
    }

    fn on_key_estimated(&mut self, key: Option<KeyCandidate>, _tally: &KeyTally) {
        let Some(line) = self.line.as_mut() else {
            return;
        };
        let notes: Vec<&str> = self.window.iter().map(|n| n.name()).collect();
        line.push_str(&format!(" | Notes: {}", notes.join(" ")));
        match key {
            Some(k) if self.window_len > self.min_notes => {
                line.push_str(&format!(" | Key: {}", k));
            }
            _ => line.push_str(" | Key: listening..."),
        }
    }

    fn on_reset(&mut self) {
        self.window.clear();
        self.window_len = 0;
        let _ = writeln!(self.out, "-- reset --");
    }

    fn on_tick_end(&mut self) {
        if let Some(line) = self.line.take() {
            let _ = writeln!(self.out, "{}", line);
            let _ = self.out.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(p: &mut TextPresenter<Vec<u8>>, history: &mut NoteHistory, note: &str, t: u64) {
        let pc: PitchClass = note.parse().unwrap();
        history.insert(pc, t);
        p.on_note_detected(Some(pc), Some(440.0));
        p.on_history_changed(history);
        let key = crate::key_estimator::best_key(&history.histogram());
        p.on_key_estimated(key, &KeyTally::new());
        p.on_tick_end();
    }

    #[test]
    fn test_key_gated_until_enough_notes() {
        let mut p = TextPresenter::new(Vec::new());
        let mut h = NoteHistory::new();
        for (i, n) in ["G", "A", "B", "C", "D", "E"].iter().enumerate() {
            feed(&mut p, &mut h, n, i as u64 * 100);
        }
        let out = String::from_utf8(p.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[4].ends_with("Key: listening..."));
        assert!(lines[5].contains("Notes: G A B C D E"));
        assert!(lines[5].ends_with("Key: C major"));
    }

    #[test]
    fn test_silent_tick_prints_nothing() {
        let mut p = TextPresenter::new(Vec::new());
        p.on_note_detected(None, None);
        p.on_key_estimated(None, &KeyTally::new());
        p.on_tick_end();
        assert!(p.into_inner().is_empty());
    }

    #[test]
    fn test_min_notes_zero_shows_key_immediately() {
        let mut p = TextPresenter::new(Vec::new()).with_min_notes(0);
        let mut h = NoteHistory::new();
        feed(&mut p, &mut h, "A", 0);
        let out = String::from_utf8(p.into_inner()).unwrap();
        assert!(out.starts_with("Note: A  (440.0 Hz)"));
        assert!(out.trim_end().ends_with("Key: C major"));
    }
}
