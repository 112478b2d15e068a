//! # Deviation Events Module
//!
//! Finds the stretches of a take a singer should look at: sustained flat or
//! sharp singing and places where the reference sings but the user does not.
//!
//! Events are detected on the base-resolution grid so they do not move when
//! the display density changes.

use serde::{Deserialize, Serialize};

use crate::align::AlignedSample;
use crate::score::sample_cents;

/// What went wrong during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    /// Sustained below `-tolerance`.
    PitchLow,
    /// Sustained above `+tolerance`.
    PitchHigh,
    /// Reference voiced, user silent.
    UnvoicedMiss,
}

/// One contiguous run of deviating samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationEvent {
    /// Time of the run's first sample.
    pub start: f64,
    /// Time of the run's last sample.
    pub end: f64,
    pub kind: DeviationKind,
    pub mean_cents: Option<f64>,
    /// The largest-magnitude error of the run, with its sign.
    pub peak_cents: Option<f64>,
}

impl DeviationEvent {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Detects deviation events on a uniform grid.
///
/// # Arguments
/// * `samples` - Aligned samples on a grid with spacing `step`
/// * `step` - Grid spacing in seconds
/// * `octave_invariant` / `octave_bound` - Octave policy for the cents values
/// * `tolerance_cents` - Errors strictly beyond this are deviations
/// * `min_event_seconds` - Shorter runs are dropped
///
/// # Returns
/// * Events of all kinds, sorted by start time
pub fn detect_events(
    samples: &[AlignedSample],
    step: f64,
    octave_invariant: bool,
    octave_bound: u8,
    tolerance_cents: f64,
    min_event_seconds: f64,
) -> Vec<DeviationEvent> {
    if samples.is_empty() || !(step.is_finite() && step > 0.0) {
        return Vec::new();
    }
    // Shave rounding noise so 0.2 s at 50 ms is four samples, not five.
    let min_len = ((min_event_seconds / step - 1e-9).ceil().max(1.0)) as usize;

    let cents: Vec<Option<f64>> = samples
        .iter()
        .map(|s| sample_cents(s, octave_invariant, octave_bound))
        .collect();
    let kinds: Vec<Option<DeviationKind>> = samples
        .iter()
        .zip(&cents)
        .map(|(s, c)| classify(s, *c, tolerance_cents))
        .collect();

    let mut events: Vec<DeviationEvent> = runs(&kinds, min_len)
        .into_iter()
        .map(|(kind, start, end)| {
            let (mean_cents, peak_cents) = match kind {
                DeviationKind::UnvoicedMiss => (None, None),
                _ => {
                    let run: Vec<f64> = cents[start..end].iter().flatten().copied().collect();
                    summarize(&run)
                }
            };
            DeviationEvent {
                start: samples[start].t,
                end: samples[end - 1].t,
                kind,
                mean_cents,
                peak_cents,
            }
        })
        .collect();
    events.sort_by(|a, b| a.start.total_cmp(&b.start));
    events
}

fn classify(sample: &AlignedSample, cents: Option<f64>, tolerance_cents: f64) -> Option<DeviationKind> {
    match cents {
        Some(c) if c < -tolerance_cents => Some(DeviationKind::PitchLow),
        Some(c) if c > tolerance_cents => Some(DeviationKind::PitchHigh),
        Some(_) => None,
        None if sample.ref_voiced && !sample.usr_voiced => Some(DeviationKind::UnvoicedMiss),
        None => None,
    }
}

/// Maximal runs of one kind, as `(kind, start, end)` with `end` exclusive,
/// keeping those at least `min_len` long.
fn runs(kinds: &[Option<DeviationKind>], min_len: usize) -> Vec<(DeviationKind, usize, usize)> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < kinds.len() {
        let mut end = start + 1;
        while end < kinds.len() && kinds[end] == kinds[start] {
            end += 1;
        }
        if let Some(kind) = kinds[start] {
            if end - start >= min_len {
                out.push((kind, start, end));
            }
        }
        start = end;
    }
    out
}

fn summarize(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let peak = values.iter().copied().fold(0.0_f64, |peak, v| if v.abs() > peak.abs() { v } else { peak });
    (Some(mean), Some(peak))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const STEP: f64 = 0.05;

    fn grid(usr: impl Fn(usize) -> Option<f64>, n: usize) -> Vec<AlignedSample> {
        (0..n)
            .map(|i| {
                let usr_f0 = usr(i);
                AlignedSample {
                    t: i as f64 * STEP,
                    ref_f0: Some(220.0),
                    usr_f0,
                    ref_voiced: true,
                    usr_voiced: usr_f0.is_some(),
                }
            })
            .collect()
    }

    fn flat_by(cents: f64) -> Option<f64> {
        Some(220.0 * 2.0_f64.powf(cents / 1200.0))
    }

    #[test]
    fn finds_each_kind() {
        // 0..10 low, 10..20 in tune, 20..30 high, 30..40 silent.
        let samples = grid(
            |i| match i {
                0..10 => flat_by(-80.0),
                10..20 => flat_by(0.0),
                20..30 => flat_by(60.0 + i as f64),
                _ => None,
            },
            40,
        );
        let events = detect_events(&samples, STEP, false, 3, 40.0, 0.2);
        let kinds: Vec<DeviationKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![DeviationKind::PitchLow, DeviationKind::PitchHigh, DeviationKind::UnvoicedMiss]
        );

        let low = events[0];
        assert_abs_diff_eq!(low.start, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(low.end, 9.0 * STEP, epsilon = 1e-12);
        assert_abs_diff_eq!(low.mean_cents.unwrap_or_default(), -80.0, epsilon = 1e-9);

        let high = events[1];
        assert_abs_diff_eq!(high.peak_cents.unwrap_or_default(), 89.0, epsilon = 1e-9);

        let miss = events[2];
        assert!(miss.mean_cents.is_none());
        assert_abs_diff_eq!(miss.duration(), 9.0 * STEP, epsilon = 1e-12);
    }

    #[test]
    fn short_runs_are_dropped() {
        // 3 samples at 50 ms is under the 4-sample minimum for 0.2 s.
        let samples = grid(|i| if (5..8).contains(&i) { flat_by(-100.0) } else { flat_by(0.0) }, 20);
        assert!(detect_events(&samples, STEP, false, 3, 40.0, 0.2).is_empty());
        assert_eq!(detect_events(&samples, STEP, false, 3, 40.0, 0.1).len(), 1);
    }

    #[test]
    fn octave_policy_applies() {
        let samples = grid(|_| Some(440.0), 10);
        assert_eq!(detect_events(&samples, STEP, false, 3, 40.0, 0.2).len(), 1);
        assert!(detect_events(&samples, STEP, true, 3, 40.0, 0.2).is_empty());
    }

    #[test]
    fn nothing_to_do() {
        assert!(detect_events(&[], STEP, false, 3, 40.0, 0.2).is_empty());
        let samples = grid(|_| flat_by(-100.0), 10);
        assert!(detect_events(&samples, 0.0, false, 3, 40.0, 0.2).is_empty());
    }
}
