//! # Scoring Module
//!
//! Turns aligned samples into cents errors and aggregates them.
//!
//! ## Features
//! - Optional octave correction per sample
//! - Mean absolute error and inclusive tolerance hit rate
//! - Distribution summary (median, spread, percentiles, drift)
//! - The counterfactual report for the opposite octave setting
//!
//! Only instants where both tracks are voiced are scored. With nothing to
//! score every statistic is zero, never NaN.

use linreg::linear_regression;
use serde::{Deserialize, Serialize};

use crate::align::AlignedSample;
use crate::config::{ComparisonConfig, EngineSettings};
use crate::units::{cents_diff, closest_octave_shift};

/// The pitch error at one grid instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredSample {
    pub t: f64,
    pub cents: f64,
}

/// Headline statistics of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub tolerance_cents: f64,
    /// Fraction (0..=1) of scored samples with `|cents| <= tolerance_cents`.
    pub percent_within_tolerance: f64,
    pub mean_absolute_cents: f64,
    /// Both-voiced instants at base resolution. Independent of display density.
    pub reliable_sample_count: usize,
}

impl Stats {
    pub fn empty(tolerance_cents: f64) -> Self {
        Self {
            tolerance_cents,
            ..Self::default()
        }
    }
}

/// Shape of the signed cents error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Distribution {
    pub mean_cents: f64,
    pub median_cents: f64,
    pub std_cents: f64,
    pub p10_cents: f64,
    pub p90_cents: f64,
    /// Fraction below `-tolerance`.
    pub percent_low: f64,
    /// Fraction above `+tolerance`.
    pub percent_high: f64,
    /// Least-squares slope of cents over time.
    pub drift_cents_per_second: f64,
}

/// Everything derived from one scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub octave_invariant: bool,
    pub scored_sample_count: usize,
    pub stats: Stats,
    pub score: f64,
    pub distribution: Distribution,
}

impl ScoreReport {
    pub fn empty(octave_invariant: bool, tolerance_cents: f64) -> Self {
        Self {
            octave_invariant,
            scored_sample_count: 0,
            stats: Stats::empty(tolerance_cents),
            score: 0.0,
            distribution: Distribution::default(),
        }
    }
}

/// Cents error of one sample, `None` unless both tracks are voiced.
pub fn sample_cents(sample: &AlignedSample, octave_invariant: bool, octave_bound: u8) -> Option<f64> {
    let (ref_hz, usr_hz) = sample.voiced_pair()?;
    let usr_hz = if octave_invariant {
        closest_octave_shift(ref_hz, usr_hz, octave_bound)
    } else {
        usr_hz
    };
    let cents = cents_diff(ref_hz, usr_hz);
    cents.is_finite().then_some(cents)
}

/// Scores every both-voiced sample.
pub fn scored_samples(
    samples: &[AlignedSample],
    octave_invariant: bool,
    octave_bound: u8,
) -> Vec<ScoredSample> {
    samples
        .iter()
        .filter_map(|s| {
            sample_cents(s, octave_invariant, octave_bound).map(|cents| ScoredSample { t: s.t, cents })
        })
        .collect()
}

/// Aggregates one scoring pass.
///
/// `reliable_sample_count` is passed through untouched; it comes from the
/// base-resolution grid, not from `samples`.
pub fn score_samples(
    samples: &[AlignedSample],
    octave_invariant: bool,
    tolerance_cents: f64,
    reliable_sample_count: usize,
    settings: &EngineSettings,
) -> ScoreReport {
    let scored = scored_samples(samples, octave_invariant, settings.octave_search_bound);
    let mut report = aggregate(&scored, tolerance_cents, settings);
    report.octave_invariant = octave_invariant;
    report.stats.reliable_sample_count = reliable_sample_count;
    report
}

/// Scores with the configured octave setting and with its opposite.
///
/// Returns `(primary, counterfactual)`.
pub fn score_both(
    samples: &[AlignedSample],
    config: &ComparisonConfig,
    reliable_sample_count: usize,
    settings: &EngineSettings,
) -> (ScoreReport, ScoreReport) {
    let primary = score_samples(
        samples,
        config.octave_invariant,
        config.tolerance_cents,
        reliable_sample_count,
        settings,
    );
    let counterfactual = score_samples(
        samples,
        !config.octave_invariant,
        config.tolerance_cents,
        reliable_sample_count,
        settings,
    );
    (primary, counterfactual)
}

fn aggregate(scored: &[ScoredSample], tolerance_cents: f64, settings: &EngineSettings) -> ScoreReport {
    if scored.is_empty() {
        return ScoreReport::empty(false, tolerance_cents);
    }
    let n = scored.len() as f64;

    let mut sum_abs = 0.0;
    let mut sum = 0.0;
    let (mut within, mut low, mut high) = (0usize, 0usize, 0usize);
    for s in scored {
        sum_abs += s.cents.abs();
        sum += s.cents;
        if s.cents.abs() <= tolerance_cents {
            within += 1;
        } else if s.cents < 0.0 {
            low += 1;
        } else {
            high += 1;
        }
    }
    let mean_absolute_cents = sum_abs / n;
    let mean_cents = sum / n;

    let variance = scored.iter().map(|s| (s.cents - mean_cents).powi(2)).sum::<f64>() / n;
    let mut sorted: Vec<f64> = scored.iter().map(|s| s.cents).collect();
    sorted.sort_by(f64::total_cmp);

    ScoreReport {
        octave_invariant: false,
        scored_sample_count: scored.len(),
        stats: Stats {
            tolerance_cents,
            percent_within_tolerance: within as f64 / n,
            mean_absolute_cents,
            reliable_sample_count: 0,
        },
        score: settings.score_curve.score(mean_absolute_cents),
        distribution: Distribution {
            mean_cents,
            median_cents: percentile(&sorted, 50.0),
            std_cents: variance.sqrt(),
            p10_cents: percentile(&sorted, 10.0),
            p90_cents: percentile(&sorted, 90.0),
            percent_low: low as f64 / n,
            percent_high: high as f64 / n,
            drift_cents_per_second: drift(scored),
        },
    }
}

/// Linear-interpolated percentile of an ascending slice; 0 when empty.
pub(crate) fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let pos = (q / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Population standard deviation; 0 when empty.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn drift(scored: &[ScoredSample]) -> f64 {
    if scored.len() < 2 {
        return 0.0;
    }
    let (ts, cents): (Vec<f64>, Vec<f64>) = scored.iter().map(|s| (s.t, s.cents)).unzip();
    match linear_regression::<_, _, f64>(&ts, &cents) {
        Ok((slope, _intercept)) if slope.is_finite() => slope,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pair(t: f64, ref_hz: f64, usr_hz: f64) -> AlignedSample {
        AlignedSample {
            t,
            ref_f0: Some(ref_hz),
            usr_f0: Some(usr_hz),
            ref_voiced: true,
            usr_voiced: true,
        }
    }

    fn cents_above(hz: f64, cents: f64) -> f64 {
        hz * 2.0_f64.powf(cents / 1200.0)
    }

    #[test]
    fn nothing_voiced_is_all_zero() {
        let samples = [AlignedSample {
            t: 0.0,
            ref_f0: Some(220.0),
            usr_f0: None,
            ref_voiced: true,
            usr_voiced: false,
        }];
        let report = score_samples(&samples, false, 40.0, 0, &EngineSettings::default());
        assert_eq!(report.scored_sample_count, 0);
        assert_eq!(report.stats, Stats::empty(40.0));
        assert_eq!(report.score, 0.0);
        assert_eq!(report.distribution, Distribution::default());
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        // Exactly 40 cents apart in log space, checked against the computed value.
        let usr = cents_above(220.0, 40.0);
        let exact = cents_diff(220.0, usr);
        let settings = EngineSettings::default();

        let on_edge = score_samples(&[pair(0.0, 220.0, usr)], false, exact, 1, &settings);
        assert_eq!(on_edge.stats.percent_within_tolerance, 1.0);

        let just_over = score_samples(&[pair(0.0, 220.0, cents_above(220.0, 40.001))], false, exact, 1, &settings);
        assert_eq!(just_over.stats.percent_within_tolerance, 0.0);
        assert_eq!(just_over.distribution.percent_high, 1.0);
    }

    #[test]
    fn aggregates_mean_and_hit_rate() {
        let samples = [
            pair(0.0, 220.0, cents_above(220.0, 10.0)),
            pair(0.1, 220.0, cents_above(220.0, -30.0)),
            pair(0.2, 220.0, cents_above(220.0, 100.0)),
            pair(0.3, 220.0, cents_above(220.0, -60.0)),
        ];
        let report = score_samples(&samples, false, 40.0, 7, &EngineSettings::default());
        assert_eq!(report.scored_sample_count, 4);
        assert_eq!(report.stats.reliable_sample_count, 7);
        assert_abs_diff_eq!(report.stats.mean_absolute_cents, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(report.stats.percent_within_tolerance, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(report.distribution.mean_cents, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(report.distribution.median_cents, -10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(report.distribution.percent_low, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(report.distribution.percent_high, 0.25, epsilon = 1e-12);
        assert!(report.score > 0.0 && report.score < 100.0);
    }

    #[test]
    fn counterfactual_flips_octave_setting() {
        let samples = [pair(0.0, 220.0, 440.0), pair(0.1, 220.0, 220.0)];
        let config = ComparisonConfig::default();
        let (primary, counterfactual) = score_both(&samples, &config, 2, &EngineSettings::default());
        assert!(!primary.octave_invariant);
        assert!(counterfactual.octave_invariant);
        assert_abs_diff_eq!(primary.stats.mean_absolute_cents, 600.0, epsilon = 1e-9);
        assert_abs_diff_eq!(counterfactual.stats.mean_absolute_cents, 0.0, epsilon = 1e-9);
        assert_eq!(counterfactual.score, 100.0);
    }

    #[test]
    fn drift_tracks_a_sagging_singer() {
        let samples: Vec<AlignedSample> = (0..20)
            .map(|i| {
                let t = i as f64 * 0.5;
                pair(t, 220.0, cents_above(220.0, -5.0 * t))
            })
            .collect();
        let report = score_samples(&samples, false, 40.0, 20, &EngineSettings::default());
        assert_abs_diff_eq!(report.distribution.drift_cents_per_second, -5.0, epsilon = 1e-6);
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 50.0), 20.0);
        assert_abs_diff_eq!(percentile(&sorted, 10.0), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile(&sorted, 90.0), 36.0, epsilon = 1e-12);
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.0], 90.0), 7.0);
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        assert_eq!(std_dev(&[3.0, 3.0, 3.0]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_abs_diff_eq!(std_dev(&[1.0, 3.0]), 1.0, epsilon = 1e-12);
    }
}
