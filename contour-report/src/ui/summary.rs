//! # Summary View
//!
//! Plain-text rendering of a [`ComparisonResult`]: headline score, the
//! octave-corrected/uncorrected pair, distribution, key diagnosis, deviation
//! events and (optionally) the binned error chart.

use std::fmt;

use contour_core::ComparisonResult;
use contour_core::autosync::SyncEstimate;
use contour_core::display::ErrorPoint;
use contour_core::events::DeviationKind;
use contour_core::key_offset::KeyVerdict;
use contour_core::units::{Note, note_name};

use super::cent_meter::CentMeter;

/// One line of the track header.
pub struct TrackLine {
    pub label: &'static str,
    pub samples: usize,
    pub voiced: usize,
    /// Note nearest the track's median voiced pitch.
    pub center: Option<&'static Note>,
}

/// Everything printed for one comparison.
pub struct Summary<'a> {
    pub result: &'a ComparisonResult,
    pub tracks: &'a [TrackLine],
    pub sync: Option<&'a SyncEstimate>,
    pub chart: bool,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;
        let config = &result.config;

        writeln!(
            f,
            "Comparison (density x{}, octave-invariant {}, tolerance {:.0} c)",
            config.density.factor(),
            if config.octave_invariant { "on" } else { "off" },
            config.tolerance_cents
        )?;
        for track in self.tracks {
            let center = track.center.map_or("-", |note| note.name.as_str());
            writeln!(
                f,
                "  {:<10} {} samples, {} voiced, centre {}",
                track.label, track.samples, track.voiced, center
            )?;
        }
        if let Some(sync) = self.sync {
            writeln!(
                f,
                "  autosync   user shifted {:+.3} s ({} matched frames)",
                sync.shift_seconds, sync.matched_frames
            )?;
        }

        let Some((t0, t1)) = result.window else {
            writeln!(f, "\n  The tracks do not overlap; nothing to score.")?;
            return Ok(());
        };
        writeln!(
            f,
            "  window     {:.2} s - {:.2} s (base step {:.1} ms, display step {:.1} ms)",
            t0,
            t1,
            result.base_step * 1000.0,
            result.display_step * 1000.0
        )?;

        let stats = &result.primary.stats;
        writeln!(f)?;
        writeln!(f, "  score          {:.1} / 100", result.primary.score)?;
        writeln!(f, "  within tol.    {:.1} %", stats.percent_within_tolerance * 100.0)?;
        writeln!(f, "  mean |error|   {:.1} c", stats.mean_absolute_cents)?;
        writeln!(
            f,
            "  reliable       {} samples{}",
            stats.reliable_sample_count,
            if result.low_confidence { " (low confidence)" } else { "" }
        )?;
        let (with, without) = if result.primary.octave_invariant {
            (&result.primary, &result.counterfactual)
        } else {
            (&result.counterfactual, &result.primary)
        };
        writeln!(
            f,
            "  octave         with correction {:.1} / without {:.1}",
            with.score, without.score
        )?;

        let d = &result.primary.distribution;
        writeln!(
            f,
            "  distribution   median {:+.1} c, p10 {:+.1} c, p90 {:+.1} c, std {:.1} c",
            d.median_cents, d.p10_cents, d.p90_cents, d.std_cents
        )?;
        writeln!(
            f,
            "                 {:.1} % flat, {:.1} % sharp, drift {:+.2} c/s",
            d.percent_low * 100.0,
            d.percent_high * 100.0,
            d.drift_cents_per_second
        )?;

        if let Some(key) = &result.key_offset {
            let verdict = match key.verdict {
                KeyVerdict::OctaveShift { octaves } => format!("sung {octaves:+} octave(s) away"),
                KeyVerdict::KeyShift { semitones: 0 } => "original key".to_owned(),
                KeyVerdict::KeyShift { semitones } => format!("transposed {semitones:+} semitone(s)"),
            };
            writeln!(
                f,
                "  key            {} (median {:+.0} c, {:.1} % in tune after octave removal)",
                verdict,
                key.median_cents,
                key.wrapped_within_tolerance * 100.0
            )?;
        }

        writeln!(f)?;
        if result.events.is_empty() {
            writeln!(f, "  No sustained deviations.")?;
        } else {
            writeln!(f, "  Deviations:")?;
            for event in &result.events {
                let kind = match event.kind {
                    DeviationKind::PitchLow => "flat",
                    DeviationKind::PitchHigh => "sharp",
                    DeviationKind::UnvoicedMiss => "missed",
                };
                write!(f, "    {:>7.2} s - {:>7.2} s  {:<6}", event.start, event.end, kind)?;
                match (event.mean_cents, event.peak_cents) {
                    (Some(mean), Some(peak)) => writeln!(f, "  mean {mean:+.0} c, peak {peak:+.0} c")?,
                    _ => writeln!(f)?,
                }
            }
        }

        if self.chart {
            writeln!(f)?;
            writeln!(f, "  Error chart ({:.2} s bins):", result.display.bin_seconds)?;
            for point in &result.display.error {
                writeln!(f, "    {}", ChartRow::new(result, point, config.tolerance_cents))?;
            }
        }
        Ok(())
    }
}

/// One bin of the error chart with the reference note sung there.
struct ChartRow<'a> {
    point: &'a ErrorPoint,
    note: Option<&'static str>,
    tolerance_cents: f64,
}

impl<'a> ChartRow<'a> {
    fn new(result: &'a ComparisonResult, point: &'a ErrorPoint, tolerance_cents: f64) -> Self {
        // Overlay and error points of one bin share the same mean time.
        let note = result
            .display
            .reference
            .iter()
            .find(|p| p.t == point.t)
            .and_then(|p| p.midi)
            .and_then(note_name);
        Self { point, note, tolerance_cents }
    }
}

impl fmt::Display for ChartRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>7.2} s  {:<4} {:>+6.0} c  {}",
            self.point.t,
            self.note.unwrap_or("-"),
            self.point.cents,
            CentMeter::new(Some(self.point.cents), self.tolerance_cents).render()
        )
    }
}
