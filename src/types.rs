use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

// ─── Audio data ─────────────────────────────────────────────────────────────

/// A chunk of audio samples from a source (microphone, WAV file, simulator).
/// Chunks arrive at whatever size the source produces; the controller's
/// `FrameAssembler` turns them into fixed-size frames.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Milliseconds since session start (timestamp of first sample)
    pub timestamp_ms: u64,
    /// Mono f32 samples, normalized -1.0 to 1.0
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// One fixed-length analysis frame: the newest `frame_size` samples at tick
/// time. Owned by the tick that processes it and dropped afterwards.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono f32 samples, normalized -1.0 to 1.0
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ─── Pitch classes ──────────────────────────────────────────────────────────

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the 12 equal-tempered semitones, 0 = C … 11 = B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);
    pub const A: PitchClass = PitchClass(9);

    /// Wraps any integer into [0, 11], negative values included.
    pub fn new(index: i64) -> Self {
        Self(index.rem_euclid(12) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.index()]
    }

    /// All 12 pitch classes, ascending from C.
    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0..12u8).map(PitchClass)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NOTE_NAMES
            .iter()
            .position(|&n| n == s.trim())
            .map(|i| PitchClass(i as u8))
            .ok_or_else(|| format!("unknown pitch class {:?}", s))
    }
}

impl Serialize for PitchClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for PitchClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─── Keys ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

/// A candidate key: root + mode. There are exactly 24, ordered by root
/// ascending with major before minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCandidate {
    pub root: PitchClass,
    pub mode: Mode,
}

impl KeyCandidate {
    pub const C_MAJOR: KeyCandidate = KeyCandidate {
        root: PitchClass::C,
        mode: Mode::Major,
    };

    pub fn new(root: PitchClass, mode: Mode) -> Self {
        Self { root, mode }
    }

    /// Position in the canonical 24-key order.
    pub fn index(self) -> usize {
        self.root.index() * 2
            + match self.mode {
                Mode::Major => 0,
                Mode::Minor => 1,
            }
    }

    pub fn from_index(index: usize) -> Self {
        let mode = if index % 2 == 0 { Mode::Major } else { Mode::Minor };
        Self::new(PitchClass::new((index / 2) as i64), mode)
    }

    /// All 24 candidates in canonical order: C major, C minor, C# major, …
    pub fn all() -> impl Iterator<Item = KeyCandidate> {
        (0..KEY_COUNT).map(KeyCandidate::from_index)
    }
}

impl fmt::Display for KeyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{} {}", self.root, self.mode.name()))
    }
}

impl FromStr for KeyCandidate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (root, mode) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| format!("expected \"<root> <major|minor>\", got {:?}", s))?;
        let mode = match mode.trim().to_ascii_lowercase().as_str() {
            "major" => Mode::Major,
            "minor" => Mode::Minor,
            other => return Err(format!("unknown mode {:?}", other)),
        };
        Ok(Self::new(root.parse()?, mode))
    }
}

impl Serialize for KeyCandidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyCandidate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub const KEY_COUNT: usize = 24;

// ─── Note events ────────────────────────────────────────────────────────────

/// A detected pitch class and when it was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch_class: PitchClass,
    /// Milliseconds on the session clock
    pub timestamp_ms: u64,
}

// ─── Per-tick output ────────────────────────────────────────────────────────

/// Everything one tick produced. Sent to the data logger and handy in tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub timestamp_ms: u64,
    /// Detected fundamental, None when the frame was silent or unpitched
    pub frequency_hz: Option<f64>,
    pub note: Option<PitchClass>,
    /// Pitch classes currently inside the history window, oldest first
    pub history: Vec<PitchClass>,
    /// Best-guess key this tick; None on ticks without a detected note
    pub key: Option<KeyCandidate>,
    /// Cumulative key distribution in canonical order, percent
    pub key_percentages: Vec<f64>,
    pub dominant_key: KeyCandidate,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = match self.frequency_hz {
            Some(hz) => format!("{:.1}Hz", hz),
            None => "---".to_string(),
        };
        let note = self.note.map(|n| n.name()).unwrap_or("-");
        let key = match self.key {
            Some(k) => k.to_string(),
            None => "-".to_string(),
        };
        write!(
            f,
            "t={:>8}ms  pitch={:<9} note={:<2} window={:<3} key={:<8} dominant={}",
            self.timestamp_ms,
            hz,
            note,
            self.history.len(),
            key,
            self.dominant_key,
        )
    }
}

// ─── Inter-thread messages ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum InputEvent {
    Audio(AudioChunk),
    /// Clear the note history and the cumulative key tally.
    Reset,
    /// The source is finished (end of file, user quit); stop ticking.
    Shutdown,
}

// ─── Session clock ──────────────────────────────────────────────────────────

/// Monotonic clock for the listening session.
#[derive(Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_wraps_negative() {
        assert_eq!(PitchClass::new(-1).name(), "B");
        assert_eq!(PitchClass::new(12), PitchClass::C);
        assert_eq!(PitchClass::new(69).name(), "A");
    }

    #[test]
    fn test_pitch_class_parse() {
        assert_eq!("F#".parse::<PitchClass>().unwrap().index(), 6);
        assert!("H".parse::<PitchClass>().is_err());
    }

    #[test]
    fn test_key_order_and_names() {
        let keys: Vec<String> = KeyCandidate::all().map(|k| k.to_string()).collect();
        assert_eq!(keys.len(), KEY_COUNT);
        assert_eq!(keys[0], "C major");
        assert_eq!(keys[1], "C minor");
        assert_eq!(keys[2], "C# major");
        assert_eq!(keys[23], "B minor");
        for (i, k) in KeyCandidate::all().enumerate() {
            assert_eq!(k.index(), i);
        }
    }

    #[test]
    fn test_display_honours_width() {
        assert_eq!(format!("[{:<2}]", PitchClass::A), "[A ]");
        assert_eq!(format!("[{:<2}]", PitchClass::new(1)), "[C#]");
        assert_eq!(format!("[{:<9}]", KeyCandidate::C_MAJOR), "[C major  ]");
        assert_eq!(format!("[{:>9}]", KeyCandidate::C_MAJOR), "[  C major]");
    }

    #[test]
    fn test_key_parse() {
        let k: KeyCandidate = "A minor".parse().unwrap();
        assert_eq!(k.root, PitchClass::A);
        assert_eq!(k.mode, Mode::Minor);
        assert!("A dorian".parse::<KeyCandidate>().is_err());
        assert!("Aminor".parse::<KeyCandidate>().is_err());
    }

    #[test]
    fn test_report_serializes_names() {
        let report = TickReport {
            timestamp_ms: 42,
            frequency_hz: Some(440.0),
            note: Some(PitchClass::A),
            history: vec![PitchClass::A, PitchClass::C],
            key: Some(KeyCandidate::C_MAJOR),
            key_percentages: vec![0.0; KEY_COUNT],
            dominant_key: KeyCandidate::C_MAJOR,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"note\":\"A\""));
        assert!(json.contains("\"key\":\"C major\""));
        let back: TickReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.history, report.history);
    }
}
