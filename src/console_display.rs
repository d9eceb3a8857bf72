use crate::key_estimator::KeyTally;
use crate::note_history::NoteHistory;
use crate::note_mapper::note_label;
use crate::presenter::Presenter;
use crate::types::*;
use std::io::{self, Write};

const SCOPE_COLS: usize = 56;
const SCOPE_ROWS: usize = 7;

/// Renders a live ASCII dashboard: oscilloscope trace of the current frame,
/// detected note, the note window, and a bar per candidate key showing its
/// share of the cumulative tally.
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
    /// Redraw every Nth tick
    every: u64,
    ticks: u64,
    waveform: Vec<f32>,
    note: Option<PitchClass>,
    frequency_hz: Option<f64>,
    history: Vec<PitchClass>,
    key: Option<KeyCandidate>,
    percentages: [f64; KEY_COUNT],
    counts: [u64; KEY_COUNT],
    dominant: KeyCandidate,
    clear_screen: bool,
}

impl ConsoleDisplay<io::Stdout> {
    /// Dashboard on stdout, redrawn at roughly `update_hz` given the
    /// controller's `tick_hz`.
    pub fn stdout(tick_hz: u32, update_hz: u32) -> Self {
        let every = if update_hz == 0 {
            1
        } else {
            (tick_hz / update_hz).max(1) as u64
        };
        Self::new(io::stdout(), every)
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W, every: u64) -> Self {
        Self {
            out,
            every: every.max(1),
            ticks: 0,
            waveform: Vec::new(),
            note: None,
            frequency_hz: None,
            history: Vec::new(),
            key: None,
            percentages: [0.0; KEY_COUNT],
            counts: [0; KEY_COUNT],
            dominant: KeyCandidate::C_MAJOR,
            clear_screen: true,
        }
    }

    /// Skip the ANSI clear-screen prefix (for logs and tests).
    pub fn without_clear(mut self) -> Self {
        self.clear_screen = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self) -> io::Result<()> {
        let mut s = String::with_capacity(4096);
        if self.clear_screen {
            s.push_str("\x1b[2J\x1b[H");
        }

        s.push_str("╔══════════════════════════════════════════════════════════╗\n");
        s.push_str("║  KEY LISTENER — Live Monitor                              ║\n");
        s.push_str("╠══════════════════════════════════════════════════════════╣\n");

        for row in make_scope(&self.waveform, SCOPE_COLS, SCOPE_ROWS) {
            s.push_str(&format!("║ {} ║\n", row));
        }
        s.push_str("╠══════════════════════════════════════════════════════════╣\n");

        let note = match (self.note, self.frequency_hz) {
            (Some(n), Some(hz)) => format!("{:<2}  {:>7.1} Hz  ({})", n, hz, note_label(hz)),
            _ => "---".to_string(),
        };
        s.push_str(&format!("║  Note:    {:<47}║\n", note));

        let window: Vec<&str> = self.history.iter().rev().take(16).map(|n| n.name()).collect();
        s.push_str(&format!(
            "║  Window:  {:<3} {:<43}║\n",
            self.history.len(),
            window.join(" ")
        ));

        let key = match self.key {
            Some(k) => k.to_string(),
            None => "---".to_string(),
        };
        s.push_str(&format!("║  Key:     {:<47}║\n", key));
        s.push_str("║                                                          ║\n");

        for (i, &pct) in self.percentages.iter().enumerate() {
            let k = KeyCandidate::from_index(i);
            let mark = if k == self.dominant { "◀" } else { " " };
            s.push_str(&format!(
                "║  {:<9} {} {:>5.1}% {} {:>6}         ║\n",
                k,
                make_bar(pct / 100.0, 20),
                pct,
                mark,
                self.counts[i]
            ));
        }
        s.push_str("╚══════════════════════════════════════════════════════════╝\n");

        self.out.write_all(s.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write + Send> Presenter for ConsoleDisplay<W> {
    fn on_frame(&mut self, frame: &AudioFrame) {
        self.waveform.clear();
        self.waveform.extend_from_slice(&frame.samples);
    }

    fn on_note_detected(&mut self, note: Option<PitchClass>, frequency_hz: Option<f64>) {
        self.note = note;
        self.frequency_hz = frequency_hz;
    }

    fn on_history_changed(&mut self, history: &NoteHistory) {
        self.history = history.pitch_classes();
    }

    fn on_key_estimated(&mut self, key: Option<KeyCandidate>, tally: &KeyTally) {
        // Keep the last guess on screen through silent ticks
        if key.is_some() {
            self.key = key;
        }
        self.percentages = tally.percentages();
        self.counts = *tally.counts();
        self.dominant = tally.dominant();
    }

    fn on_reset(&mut self) {
        self.history.clear();
        self.key = None;
        self.percentages = [0.0; KEY_COUNT];
        self.counts = [0; KEY_COUNT];
        self.dominant = KeyCandidate::C_MAJOR;
    }

    fn on_tick_end(&mut self) {
        self.ticks += 1;
        if self.ticks % self.every == 0 {
            let _ = self.render();
        }
    }
}

fn make_bar(val: f64, width: usize) -> String {
    let filled = ((val.clamp(0.0, 1.0)) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Min/max-decimated oscilloscope trace, top row = +1.0.
fn make_scope(samples: &[f32], cols: usize, rows: usize) -> Vec<String> {
    let mut grid = vec![vec![' '; cols]; rows];
    let mid = rows / 2;
    for row in grid.iter_mut() {
        row[0] = '│';
    }
    for cell in grid[mid].iter_mut().skip(1) {
        *cell = '·';
    }

    if !samples.is_empty() {
        let per_col = samples.len().div_ceil(cols).max(1);
        for (col, chunk) in samples.chunks(per_col).enumerate().take(cols) {
            let lo = chunk.iter().cloned().fold(f32::INFINITY, f32::min);
            let hi = chunk.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let r_hi = to_row(hi, rows);
            let r_lo = to_row(lo, rows);
            for row in grid.iter_mut().take(r_lo + 1).skip(r_hi) {
                row[col] = '█';
            }
        }
    }

    grid.into_iter().map(|r| r.into_iter().collect()).collect()
}

fn to_row(v: f32, rows: usize) -> usize {
    let v = v.clamp(-1.0, 1.0);
    (((1.0 - v) / 2.0) * (rows - 1) as f32).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::test_helpers::sine_wave;

    #[test]
    fn test_scope_dimensions() {
        let rows = make_scope(&sine_wave(440.0, 1.0, 44100, 2048), SCOPE_COLS, SCOPE_ROWS);
        assert_eq!(rows.len(), SCOPE_ROWS);
        assert!(rows.iter().all(|r| r.chars().count() == SCOPE_COLS));
        // A loud sine reaches both the top and bottom rows
        assert!(rows[0].contains('█'));
        assert!(rows[SCOPE_ROWS - 1].contains('█'));
    }

    #[test]
    fn test_scope_empty_frame() {
        let rows = make_scope(&[], 10, 5);
        assert_eq!(rows[2], "│·········");
    }

    #[test]
    fn test_bar() {
        assert_eq!(make_bar(0.5, 4), "[██░░]");
        assert_eq!(make_bar(2.0, 2), "[██]");
    }

    #[test]
    fn test_render_shows_note_and_key() {
        let mut tally = KeyTally::new();
        let g = "G major".parse().unwrap();
        tally.record(g);
        let mut d = ConsoleDisplay::new(Vec::new(), 1).without_clear();
        d.on_frame(&AudioFrame::new(sine_wave(392.0, 0.5, 44100, 512), 44100));
        d.on_note_detected(Some("G".parse().unwrap()), Some(392.0));
        d.on_key_estimated(Some(g), &tally);
        d.on_tick_end();
        let out = String::from_utf8(d.into_inner()).unwrap();
        assert!(out.contains("G4"));
        assert!(out.contains("Key:     G major"));
        assert!(out.contains("║  G major   ["));
        assert!(out.contains("100.0% ◀      1"));
        assert!(!out.contains("\x1b[2J"));
    }

    #[test]
    fn test_redraw_rate() {
        let mut d = ConsoleDisplay::new(Vec::new(), 3).without_clear();
        for _ in 0..7 {
            d.on_tick_end();
        }
        let out = String::from_utf8(d.into_inner()).unwrap();
        assert_eq!(out.matches("KEY LISTENER").count(), 2);
    }
}
