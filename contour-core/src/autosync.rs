//! # Autosync Module
//!
//! Estimates a constant time offset between a take and its reference from
//! *when* each one is voiced, ignoring pitch entirely. Useful when the user
//! started recording late or the reference carries an intro the take lacks.
//!
//! Both voicing masks are sampled on one shared grid and cross-correlated in
//! the frequency domain with RustFFT.

use rustfft::{FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::align::grid_len;
use crate::track::{PitchTrack, TrackInterpolator};

/// Lags that leave fewer overlapping frames than this are not considered.
const MIN_OVERLAP_FRAMES: usize = 10;

/// Result of an offset search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncEstimate {
    /// Seconds to add to every user timestamp (see [`PitchTrack::shifted`]).
    pub shift_seconds: f64,
    /// The same shift in grid frames.
    pub lag_frames: i64,
    /// Grid frames voiced in both tracks at the chosen lag.
    pub matched_frames: usize,
}

/// Finds the shift of `user` that best lines its voicing up with `reference`.
///
/// # Arguments
/// * `reference` / `user` - The two tracks
/// * `step` - Grid spacing in seconds (normally the aligner's base step)
/// * `max_shift_seconds` - Largest shift tried in either direction
/// * `max_frames` - Largest grid built over the union of both tracks
///
/// # Returns
/// * `Some(estimate)` - Best shift; ties go to the smaller shift
/// * `None` - Either track is empty or never voiced, no lag overlaps, or
///   the grid would exceed `max_frames`
pub fn estimate_offset(
    reference: &PitchTrack,
    user: &PitchTrack,
    step: f64,
    max_shift_seconds: f64,
    max_frames: usize,
) -> Option<SyncEstimate> {
    if !(step.is_finite() && step > 0.0 && max_shift_seconds.is_finite() && max_shift_seconds >= 0.0) {
        return None;
    }
    let (ref_first, ref_last) = reference.time_span()?;
    let (usr_first, usr_last) = user.time_span()?;
    let start = ref_first.min(usr_first);
    let end = ref_last.max(usr_last);
    let frames = grid_len(start, end, step).filter(|&n| n <= max_frames);
    let Some(frames) = frames else {
        warn!(
            target: "contour::autosync",
            start,
            end,
            step,
            max_frames,
            "voicing grid too large, skipping offset search"
        );
        return None;
    };
    if frames < MIN_OVERLAP_FRAMES {
        return None;
    }

    let ref_mask = voicing_mask(reference, start, step, frames);
    let usr_mask = voicing_mask(user, start, step, frames);
    if !ref_mask.iter().any(|&v| v > 0.0) || !usr_mask.iter().any(|&v| v > 0.0) {
        return None;
    }

    let counts = cross_correlate(&ref_mask, &usr_mask);
    let max_lag = ((max_shift_seconds / step).round() as usize).min(frames - MIN_OVERLAP_FRAMES);

    let mut best: Option<(i64, usize)> = None;
    // Visit lags by increasing magnitude so ties keep the smallest shift.
    let lags = std::iter::once(0).chain((1..=max_lag as i64).flat_map(|m| [m, -m]));
    for lag in lags {
        let count = count_at(&counts, lag);
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((lag, count));
        }
    }

    let (lag, matched) = best.filter(|&(_, matched)| matched > 0)?;
    debug!(
        target: "contour::autosync",
        lag,
        matched,
        shift = lag as f64 * step,
        "voicing cross-correlation peak"
    );
    Some(SyncEstimate {
        shift_seconds: lag as f64 * step,
        lag_frames: lag,
        matched_frames: matched,
    })
}

fn voicing_mask(track: &PitchTrack, start: f64, step: f64, frames: usize) -> Vec<f64> {
    let interp = TrackInterpolator::new(track);
    (0..frames)
        .map(|i| {
            if interp.value_at(start + i as f64 * step).is_some() {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Cross-correlation of two 0/1 masks, zero-padded so no lag wraps around.
///
/// Entry `k` (negative lags wrap to the end) holds `Σ_n a[n]·b[n-k]`, the
/// overlap count after delaying `b` by `k` frames. Read it with [`count_at`].
fn cross_correlate(a: &[f64], b: &[f64]) -> Vec<usize> {
    let len = (a.len() + b.len()).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(len);
    let inverse = planner.plan_fft_inverse(len);

    let spectrum = |values: &[f64]| {
        let mut buffer: Vec<Complex<f64>> = values
            .iter()
            .map(|&re| Complex { re, im: 0.0 })
            .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
            .take(len)
            .collect();
        forward.process(&mut buffer);
        buffer
    };
    let fa = spectrum(a);
    let fb = spectrum(b);

    let mut product: Vec<Complex<f64>> = fa.iter().zip(&fb).map(|(x, y)| x * y.conj()).collect();
    inverse.process(&mut product);

    // Masks are 0/1, so every correlation value is an integer count.
    let scale = len as f64;
    product
        .iter()
        .map(|c| (c.re / scale).round().max(0.0) as usize)
        .collect()
}

fn count_at(counts: &[usize], lag: i64) -> usize {
    let index = lag.rem_euclid(counts.len() as i64) as usize;
    counts[index]
}
