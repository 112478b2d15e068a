//! # Pitch Track Module
//!
//! Strictly typed f0 tracks and the interpolator that answers "what was the
//! pitch at time x?" for an arbitrary instant.
//!
//! Tracks are normalized once on construction: samples are sorted by time,
//! samples with a non-finite time are dropped, and any f0 that is missing,
//! non-positive, or non-finite is stored as unvoiced. Everything downstream
//! can therefore rely on finite, positive frequencies.

use serde::{Deserialize, Serialize};

use crate::units::is_voiced;

/// One f0 estimate at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchSample {
    /// Time in seconds
    pub t: f64,
    /// Fundamental frequency in Hz, `None` when unvoiced
    pub f0: Option<f64>,
}

impl PitchSample {
    pub fn new(t: f64, f0: Option<f64>) -> Self {
        Self {
            t,
            f0: f0.filter(|&hz| is_voiced(hz)),
        }
    }

    pub fn voiced(t: f64, hz: f64) -> Self {
        Self::new(t, Some(hz))
    }

    pub fn unvoiced(t: f64) -> Self {
        Self { t, f0: None }
    }

    pub fn is_voiced(&self) -> bool {
        self.f0.is_some()
    }
}

/// A time-sorted f0 track plus the extraction metadata it came with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchTrack {
    samples: Vec<PitchSample>,
    sample_rate_hz: Option<f64>,
    hop_size: Option<f64>,
}

impl PitchTrack {
    /// Builds a track from samples in any order.
    pub fn new(samples: impl IntoIterator<Item = PitchSample>) -> Self {
        let mut samples: Vec<PitchSample> = samples
            .into_iter()
            .filter(|s| s.t.is_finite())
            .map(|s| PitchSample::new(s.t, s.f0))
            .collect();
        // Stable, so duplicate instants keep their input order.
        samples.sort_by(|a, b| a.t.total_cmp(&b.t));
        Self {
            samples,
            sample_rate_hz: None,
            hop_size: None,
        }
    }

    /// Convenience constructor from `(t, f0)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, Option<f64>)>) -> Self {
        Self::new(pairs.into_iter().map(|(t, f0)| PitchSample::new(t, f0)))
    }

    /// Attaches the extractor's sample rate and hop size.
    pub fn with_metadata(mut self, sample_rate_hz: Option<f64>, hop_size: Option<f64>) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self.hop_size = hop_size;
        self
    }

    pub fn samples(&self) -> &[PitchSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate_hz(&self) -> Option<f64> {
        self.sample_rate_hz
    }

    pub fn hop_size(&self) -> Option<f64> {
        self.hop_size
    }

    /// First and last sample times, if any.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.t, last.t)),
            _ => None,
        }
    }

    /// Nominal sampling interval `hop_size / sample_rate_hz`.
    ///
    /// NaN when either value is missing; garbage values pass through
    /// unchecked and are rejected by the aligner's step validation.
    pub fn nominal_step(&self) -> f64 {
        match (self.hop_size, self.sample_rate_hz) {
            (Some(hop), Some(sr)) => hop / sr,
            _ => f64::NAN,
        }
    }

    /// Number of voiced samples.
    pub fn voiced_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_voiced()).count()
    }

    /// Returns a copy with every timestamp moved by `seconds`.
    pub fn shifted(&self, seconds: f64) -> Self {
        if !seconds.is_finite() {
            return self.clone();
        }
        Self {
            samples: self
                .samples
                .iter()
                .map(|s| PitchSample { t: s.t + seconds, f0: s.f0 })
                .collect(),
            sample_rate_hz: self.sample_rate_hz,
            hop_size: self.hop_size,
        }
    }
}

impl FromIterator<PitchSample> for PitchTrack {
    fn from_iter<I: IntoIterator<Item = PitchSample>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Answers f0 queries at arbitrary times by linear interpolation.
///
/// Built in O(n) from a track; each query is a binary search, O(log n).
/// Never extrapolates and never bridges an unvoiced gap.
#[derive(Debug, Clone)]
pub struct TrackInterpolator {
    times: Vec<f64>,
    values: Vec<Option<f64>>,
}

impl TrackInterpolator {
    pub fn new(track: &PitchTrack) -> Self {
        let (times, values) = track.samples().iter().map(|s| (s.t, s.f0)).unzip();
        Self { times, values }
    }

    /// Returns the interpolated f0 at `x`, or `None` when `x` lies outside
    /// the track or inside an unvoiced gap.
    pub fn value_at(&self, x: f64) -> Option<f64> {
        let (&first, &last) = (self.times.first()?, self.times.last()?);
        if !(x >= first && x <= last) {
            return None;
        }

        // Index of the last sample at or before x. Duplicate instants resolve
        // to the later sample, and times[i + 1] > x, so the span below is never zero.
        let i = self.times.partition_point(|&t| t <= x).checked_sub(1)?;
        if self.times[i] == x || i + 1 == self.times.len() {
            return self.values[i];
        }

        let (t0, t1) = (self.times[i], self.times[i + 1]);
        let (f0, f1) = (self.values[i]?, self.values[i + 1]?);
        let alpha = (x - t0) / (t1 - t0);
        Some(f0 + alpha * (f1 - f0))
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
