//! # Display Reduction Module
//!
//! Downsamples density-scaled aligned samples into fixed-width time bins for
//! charting. Each non-empty bin yields one reference/user overlay pair and,
//! when both tracks were voiced somewhere in the bin, one error point. Every
//! output value is the arithmetic mean of the bin's contributing samples.
//!
//! The number of bins is bounded by the window length divided by the bin
//! width, so the chart's point count does not grow with input density.

use serde::{Deserialize, Serialize};

use crate::align::AlignedSample;
use crate::config::{DensityMultiplier, EngineSettings};
use crate::score::sample_cents;
use crate::units::{closest_octave_shift, hz_to_midi};

/// Which curve an overlay point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Series {
    Reference,
    User,
}

/// One averaged pitch point of an overlay curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub t: f64,
    /// `None` when this series was unvoiced for the whole bin.
    pub midi: Option<f64>,
    pub series: Series,
}

/// One averaged point of the error curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorPoint {
    pub t: f64,
    pub cents: f64,
}

/// Chart-ready output of one reduction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplaySeries {
    pub bin_seconds: f64,
    pub reference: Vec<OverlayPoint>,
    pub user: Vec<OverlayPoint>,
    pub error: Vec<ErrorPoint>,
}

impl DisplaySeries {
    pub fn empty(bin_seconds: f64) -> Self {
        Self {
            bin_seconds,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty() && self.user.is_empty() && self.error.is_empty()
    }
}

/// Bin width for a display density: `max(min_bin, per_density × density)`.
pub fn bin_seconds(density: DensityMultiplier, settings: &EngineSettings) -> f64 {
    settings
        .min_bin_seconds
        .max(settings.bin_seconds_per_density * f64::from(density.factor()))
}

#[derive(Debug, Default)]
struct BinAccumulator {
    t_sum: f64,
    t_count: usize,
    ref_sum: f64,
    ref_count: usize,
    usr_sum: f64,
    usr_count: usize,
    cents_sum: f64,
    cents_count: usize,
}

impl BinAccumulator {
    fn flush_into(&mut self, out: &mut DisplaySeries) {
        if self.t_count == 0 {
            return;
        }
        let t = self.t_sum / self.t_count as f64;
        let mean = |sum: f64, count: usize| (count > 0).then(|| sum / count as f64);
        out.reference.push(OverlayPoint {
            t,
            midi: mean(self.ref_sum, self.ref_count),
            series: Series::Reference,
        });
        out.user.push(OverlayPoint {
            t,
            midi: mean(self.usr_sum, self.usr_count),
            series: Series::User,
        });
        if let Some(cents) = mean(self.cents_sum, self.cents_count) {
            out.error.push(ErrorPoint { t, cents });
        }
        *self = Self::default();
    }
}

/// Reduces time-sorted aligned samples to one averaged point per bin.
///
/// With `octave_invariant` set the user curve is octave-corrected wherever
/// the reference is voiced, so it overlays the reference curve.
pub fn reduce(
    samples: &[AlignedSample],
    octave_invariant: bool,
    octave_bound: u8,
    bin_seconds: f64,
) -> DisplaySeries {
    let mut out = DisplaySeries::empty(bin_seconds);
    if !(bin_seconds.is_finite() && bin_seconds > 0.0) {
        return out;
    }

    let mut acc = BinAccumulator::default();
    let mut current_bin: Option<i64> = None;

    for sample in samples.iter().filter(|s| s.ref_voiced || s.usr_voiced) {
        let bin = (sample.t / bin_seconds).floor() as i64;
        if current_bin != Some(bin) {
            acc.flush_into(&mut out);
            current_bin = Some(bin);
        }

        acc.t_sum += sample.t;
        acc.t_count += 1;
        let ref_hz = sample.ref_f0.filter(|_| sample.ref_voiced);
        if let Some(ref_hz) = ref_hz {
            acc.ref_sum += hz_to_midi(ref_hz);
            acc.ref_count += 1;
        }
        if let Some(usr_hz) = sample.usr_f0.filter(|_| sample.usr_voiced) {
            let shown = match ref_hz {
                Some(ref_hz) if octave_invariant => closest_octave_shift(ref_hz, usr_hz, octave_bound),
                _ => usr_hz,
            };
            acc.usr_sum += hz_to_midi(shown);
            acc.usr_count += 1;
        }
        if let Some(cents) = sample_cents(sample, octave_invariant, octave_bound) {
            acc.cents_sum += cents;
            acc.cents_count += 1;
        }
    }
    acc.flush_into(&mut out);
    out
}
