//! # Key Offset Module
//!
//! Tells a transposed take apart from an out-of-tune one. A singer who
//! performs the whole song an octave down, or two semitones up, has a large
//! but *constant* offset; this module estimates that offset from the median
//! raw error and measures how well the take fits once it is removed.

use serde::{Deserialize, Serialize};

use crate::align::AlignedSample;
use crate::score::{percentile, std_dev};
use crate::units::{CENTS_PER_OCTAVE, cents_diff, hz_to_midi, note_name};

/// Residual window, around a whole number of octaves, that still reads as an octave shift.
const OCTAVE_MATCH_CENTS: f64 = 200.0;

/// Best explanation of a take's constant offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum KeyVerdict {
    /// Sung whole octaves away from the reference.
    OctaveShift { octaves: i32 },
    /// Sung in a transposed key; zero semitones means the original key.
    KeyShift { semitones: i32 },
}

/// Diagnosis of the take's overall transposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyOffset {
    pub frames: usize,
    pub median_cents: f64,
    pub semitone_offset: i32,
    pub octave_offset: i32,
    /// Median after removing `octave_offset` octaves.
    pub wrapped_median_cents: f64,
    pub wrapped_std_cents: f64,
    /// Fraction of octave-removed errors within tolerance.
    pub wrapped_within_tolerance: f64,
    pub verdict: KeyVerdict,
    /// Name of the reference's median note, e.g. `"A3"`.
    pub reference_center_note: Option<String>,
}

/// Diagnoses the transposition between the two tracks.
///
/// Uses uncorrected cents over both-voiced samples. Returns `None` when no
/// sample is voiced in both tracks.
pub fn diagnose(samples: &[AlignedSample], tolerance_cents: f64) -> Option<KeyOffset> {
    let pairs: Vec<(f64, f64)> = samples.iter().filter_map(AlignedSample::voiced_pair).collect();
    if pairs.is_empty() {
        return None;
    }

    let mut cents: Vec<f64> = pairs.iter().map(|&(r, u)| cents_diff(r, u)).collect();
    cents.sort_by(f64::total_cmp);
    let median_cents = percentile(&cents, 50.0);

    let semitone_offset = (median_cents / 100.0).round() as i32;
    let octave_offset = (median_cents / CENTS_PER_OCTAVE).round() as i32;
    let shift = f64::from(octave_offset) * CENTS_PER_OCTAVE;

    // Subtracting a constant keeps the slice sorted.
    let wrapped: Vec<f64> = cents.iter().map(|c| c - shift).collect();
    let within = wrapped.iter().filter(|c| c.abs() <= tolerance_cents).count();

    let verdict = if octave_offset != 0 && (median_cents - shift).abs() < OCTAVE_MATCH_CENTS {
        KeyVerdict::OctaveShift { octaves: octave_offset }
    } else {
        KeyVerdict::KeyShift { semitones: semitone_offset }
    };

    let mut ref_midi: Vec<f64> = pairs.iter().map(|&(r, _)| hz_to_midi(r)).collect();
    ref_midi.sort_by(f64::total_cmp);

    Some(KeyOffset {
        frames: cents.len(),
        median_cents,
        semitone_offset,
        octave_offset,
        wrapped_median_cents: percentile(&wrapped, 50.0),
        wrapped_std_cents: std_dev(&wrapped),
        wrapped_within_tolerance: within as f64 / wrapped.len() as f64,
        verdict,
        reference_center_note: note_name(percentile(&ref_midi, 50.0)).map(str::to_owned),
    })
}
