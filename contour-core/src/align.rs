//! # Alignment Module
//!
//! Puts two independently sampled tracks on one shared time grid.
//!
//! The grid starts at the later of the two first samples and ends at the
//! earlier of the two last samples. Each grid instant queries both
//! interpolators, so neither track's irregular timing leaks into scoring.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EngineSettings;
use crate::track::{PitchTrack, TrackInterpolator};

/// Both tracks' pitch at one grid instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedSample {
    pub t: f64,
    pub ref_f0: Option<f64>,
    pub usr_f0: Option<f64>,
    pub ref_voiced: bool,
    pub usr_voiced: bool,
}

impl AlignedSample {
    fn new(t: f64, ref_f0: Option<f64>, usr_f0: Option<f64>) -> Self {
        Self {
            t,
            ref_f0,
            usr_f0,
            ref_voiced: ref_f0.is_some_and(|hz| hz > 0.0),
            usr_voiced: usr_f0.is_some_and(|hz| hz > 0.0),
        }
    }

    /// Both frequencies, when both tracks are voiced here.
    pub fn voiced_pair(&self) -> Option<(f64, f64)> {
        if self.ref_voiced && self.usr_voiced {
            Some((self.ref_f0?, self.usr_f0?))
        } else {
            None
        }
    }
}

/// Returns the time span covered by both tracks.
///
/// `None` if either track is empty or the spans do not overlap by a
/// positive amount.
pub fn overlap_window(reference: &PitchTrack, user: &PitchTrack) -> Option<(f64, f64)> {
    let (ref_first, ref_last) = reference.time_span()?;
    let (usr_first, usr_last) = user.time_span()?;
    let t0 = ref_first.max(usr_first);
    let t1 = ref_last.min(usr_last);
    (t1 > t0).then_some((t0, t1))
}

/// Picks the base grid step from the two tracks' sampling metadata.
///
/// Takes the finer of the two nominal intervals. Missing metadata yields NaN
/// for that track, which `f64::min` skips. When the result is not a finite
/// value strictly inside `(0, max_step_seconds)` the configured default is
/// used instead.
pub fn base_step(reference: &PitchTrack, user: &PitchTrack, settings: &EngineSettings) -> f64 {
    let dt = reference.nominal_step().min(user.nominal_step());
    if dt.is_finite() && dt > 0.0 && dt < settings.max_step_seconds {
        dt
    } else {
        warn!(
            target: "contour::align",
            step = dt,
            fallback = settings.default_step_seconds,
            "unusable sampling metadata, falling back to default step"
        );
        settings.default_step_seconds
    }
}

/// Number of instants `sample_at` visits for this window and step.
///
/// `None` for a non-finite or non-positive step, a reversed window, or a
/// count too large to represent.
pub fn grid_len(t0: f64, t1: f64, step: f64) -> Option<usize> {
    if !(step.is_finite() && step > 0.0 && t0.is_finite() && t1.is_finite()) || t1 < t0 {
        return None;
    }
    // Absorb rounding so an exact multiple of `step` still reaches t1.
    let last_index = ((t1 - t0) / step + 1e-9).floor();
    if !(last_index.is_finite() && last_index < (usize::MAX / 2) as f64) {
        return None;
    }
    Some(last_index as usize + 1)
}

/// Samples both interpolators from `t0` to `t1` inclusive every `step` seconds.
///
/// Grid instants are computed as `t0 + i·step` so long takes do not
/// accumulate rounding drift, and the last one is clamped to `t1`. Callers
/// bound the size with [`grid_len`] first; the grid is allocated whole.
pub fn sample_at(
    reference: &TrackInterpolator,
    user: &TrackInterpolator,
    t0: f64,
    t1: f64,
    step: f64,
) -> Vec<AlignedSample> {
    let Some(len) = grid_len(t0, t1, step) else {
        return Vec::new();
    };
    (0..len)
        .map(|i| (t0 + i as f64 * step).min(t1))
        .map(|t| AlignedSample::new(t, reference.value_at(t), user.value_at(t)))
        .collect()
}

/// Counts the instants where both tracks are voiced.
pub fn reliable_sample_count(samples: &[AlignedSample]) -> usize {
    samples.iter().filter(|s| s.ref_voiced && s.usr_voiced).count()
}
