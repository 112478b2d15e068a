//! # Pitch Unit Module
//!
//! Pure numeric primitives shared by every stage of the comparison engine.
//! Nothing in here holds state; all functions are total and never return
//! NaN or infinity for the inputs the engine feeds them.
//!
//! ## Features
//! - Hz ↔ MIDI note number conversion (A4 = 69 = 440 Hz)
//! - Cents distance and octave-band wrapping
//! - Octave-shift search for octave-invariant comparison
//! - The score curve mapping mean absolute cents to 0..=100
//! - Note naming for the 128 MIDI notes

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Cents in one octave.
pub const CENTS_PER_OCTAVE: f64 = 1200.0;

/// Two candidates whose absolute cents differ by less than this are a tie.
const OCTAVE_TIE_EPSILON: f64 = 1e-9;

/// A single note of the equal-tempered MIDI range.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// MIDI note number (0-127)
    pub midi: u8,
    /// Frequency in Hz
    pub frequency: f64,
}

/// Statically computed notes for the full MIDI range (C-1 to G9).
///
/// Frequencies use equal temperament with A4 = 440 Hz. The table is built
/// once on first use.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    (0..=127u8)
        .map(|midi| {
            // MIDI 0 is C-1, so the octave number lags the index by one.
            let octave = i32::from(midi / 12) - 1;
            Note {
                name: format!("{}{}", NOTE_NAMES[usize::from(midi % 12)], octave),
                midi,
                frequency: midi_to_hz(f64::from(midi)),
            }
        })
        .collect()
});

/// Converts a frequency to a (fractional) MIDI note number.
///
/// Returns the sentinel `0.0` for non-positive or non-finite input; callers
/// must filter unvoiced samples before converting.
pub fn hz_to_midi(hz: f64) -> f64 {
    if !(hz.is_finite() && hz > 0.0) {
        return 0.0;
    }
    69.0 + 12.0 * (hz / 440.0).log2()
}

/// Converts a (fractional) MIDI note number to Hz.
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// Calculates the distance from `ref_hz` to `usr_hz` in cents.
///
/// # Arguments
/// * `ref_hz` - Reference frequency in Hz
/// * `usr_hz` - User frequency in Hz
///
/// # Returns
/// * `1200 * log2(usr_hz / ref_hz)` (positive = user sharp)
/// * `0.0` if either frequency is non-positive or non-finite
pub fn cents_diff(ref_hz: f64, usr_hz: f64) -> f64 {
    if !(is_voiced(ref_hz) && is_voiced(usr_hz)) {
        return 0.0;
    }
    CENTS_PER_OCTAVE * (usr_hz / ref_hz).log2()
}

/// Shifts `cents` by whole octaves into the half-open band `(-600, 600]`.
pub fn wrap_to_octave_band(cents: f64) -> f64 {
    if !cents.is_finite() {
        return 0.0;
    }
    let half = CENTS_PER_OCTAVE / 2.0;
    cents - CENTS_PER_OCTAVE * ((cents - half) / CENTS_PER_OCTAVE).ceil()
}

/// Moves `usr_hz` by whole octaves to sit as close as possible to `ref_hz`.
///
/// Tries `usr_hz * 2^k` for every `k` in `-bound..=bound` and keeps the
/// candidate with the smallest absolute cents distance. An exact half-octave
/// tie resolves to the candidate lying *above* the reference, which keeps the
/// result consistent with [`wrap_to_octave_band`].
///
/// Invalid input is returned unchanged.
pub fn closest_octave_shift(ref_hz: f64, usr_hz: f64, bound: u8) -> f64 {
    if !(is_voiced(ref_hz) && is_voiced(usr_hz)) {
        return usr_hz;
    }
    let bound = i32::from(bound);
    let mut best: Option<(f64, f64)> = None;
    for k in -bound..=bound {
        let candidate = usr_hz * 2.0_f64.powi(k);
        let cents = cents_diff(ref_hz, candidate);
        let replace = match best {
            None => true,
            Some((_, best_cents)) => {
                let gap = cents.abs() - best_cents.abs();
                gap < -OCTAVE_TIE_EPSILON || (gap.abs() <= OCTAVE_TIE_EPSILON && cents > best_cents)
            }
        };
        if replace {
            best = Some((candidate, cents));
        }
    }
    best.map_or(usr_hz, |(candidate, _)| candidate)
}

/// The function turning a mean absolute cents error into a 0..=100 score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreCurve {
    /// `exp(-k·x²)` renormalized so that `x = 0` scores 100 and
    /// `x = zero_at_cents` scores 0.
    Exponential { k: f64, zero_at_cents: f64 },
    /// `100·(1 - x / zero_at_cents)`, clamped.
    Linear { zero_at_cents: f64 },
}

impl Default for ScoreCurve {
    fn default() -> Self {
        ScoreCurve::Exponential {
            k: 2e-5,
            zero_at_cents: 600.0,
        }
    }
}

impl ScoreCurve {
    /// Scores a mean absolute cents error. Always within `[0, 100]`.
    pub fn score(&self, mean_absolute_cents: f64) -> f64 {
        if !mean_absolute_cents.is_finite() {
            return 0.0;
        }
        let x = mean_absolute_cents.max(0.0);
        let score = match *self {
            ScoreCurve::Exponential { k, zero_at_cents } => {
                let raw = |c: f64| (-k * c * c).exp();
                let floor = raw(zero_at_cents);
                let span = raw(0.0) - floor;
                if !(span.is_finite() && span > 0.0) {
                    return if x == 0.0 { 100.0 } else { 0.0 };
                }
                100.0 * (raw(x) - floor) / span
            }
            ScoreCurve::Linear { zero_at_cents } => {
                if !(zero_at_cents.is_finite() && zero_at_cents > 0.0) {
                    return if x == 0.0 { 100.0 } else { 0.0 };
                }
                100.0 * (1.0 - x / zero_at_cents)
            }
        };
        score.clamp(0.0, 100.0)
    }
}

/// Returns the name of the MIDI note nearest to `midi` (e.g. `"A4"`).
///
/// `None` outside the MIDI range or for non-finite input.
pub fn note_name(midi: f64) -> Option<&'static str> {
    if !midi.is_finite() {
        return None;
    }
    let rounded = midi.round();
    if !(0.0..=127.0).contains(&rounded) {
        return None;
    }
    NOTES.get(rounded as usize).map(|note| note.name.as_str())
}

/// Finds the MIDI note closest to a frequency.
///
/// Used by the report front-end to label a take's register.
pub fn nearest_note(hz: f64) -> Option<&'static Note> {
    if !is_voiced(hz) {
        return None;
    }
    let midi = hz_to_midi(hz).round();
    if !(0.0..=127.0).contains(&midi) {
        return None;
    }
    NOTES.get(midi as usize)
}

/// `true` if `hz` is a usable frequency.
pub(crate) fn is_voiced(hz: f64) -> bool {
    hz.is_finite() && hz > 0.0
}
