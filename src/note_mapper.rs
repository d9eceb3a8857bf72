//! Frequency ↔ note conversions, referenced to A4 = MIDI 69 = 440 Hz.

use crate::types::{PitchClass, NOTE_NAMES};

/// Convert MIDI note number (fractional) to Hz.
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// Convert Hz to MIDI note number (fractional).
pub fn hz_to_midi(hz: f64) -> f64 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

/// Nearest whole note number. Exact halves round up, so -2.5 maps to -2.
fn nearest_note(midi: f64) -> i64 {
    (midi + 0.5).floor() as i64
}

/// Pitch class of the nearest equal-tempered note.
/// Returns None for non-positive or non-finite frequencies.
pub fn pitch_class_of(hz: f64) -> Option<PitchClass> {
    if !(hz.is_finite() && hz > 0.0) {
        return None;
    }
    Some(PitchClass::new(nearest_note(hz_to_midi(hz))))
}

/// Note name with octave and cents deviation, e.g. "A4", "C#3+12", "E2-7".
pub fn note_label(hz: f64) -> String {
    if !(hz.is_finite() && hz > 0.0) {
        return "---".to_string();
    }
    let midi = hz_to_midi(hz);
    let note_num = nearest_note(midi);
    let cents = ((midi - note_num as f64) * 100.0).round() as i64;
    let name = NOTE_NAMES[note_num.rem_euclid(12) as usize];
    let octave = note_num.div_euclid(12) - 1;

    if cents == 0 {
        format!("{}{}", name, octave)
    } else {
        format!("{}{}{:+}", name, octave, cents)
    }
}
