//! # Comparison Pipeline
//!
//! One full, synchronous recompute: align → score → reduce for display, plus
//! deviation events and the key diagnosis. The session runs this on its
//! worker thread; it is also usable directly for one-shot comparisons.
//!
//! The pipeline is a pure function of its inputs, so identical tracks and
//! configuration always produce bit-identical results.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::align::{base_step, grid_len, overlap_window, reliable_sample_count, sample_at};
use crate::config::{ComparisonConfig, EngineSettings};
use crate::display::{DisplaySeries, bin_seconds, reduce};
use crate::events::{DeviationEvent, detect_events};
use crate::key_offset::{KeyOffset, diagnose};
use crate::score::{ScoreReport, score_both};
use crate::track::{PitchTrack, TrackInterpolator};

/// Everything a comparison screen renders, replaced as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Request number this result answers; 0 for one-shot comparisons.
    pub generation: u64,
    pub config: ComparisonConfig,
    /// Shared time span of the two tracks, `None` if they do not overlap.
    pub window: Option<(f64, f64)>,
    pub base_step: f64,
    pub display_step: f64,
    /// Scored with the configured octave setting.
    pub primary: ScoreReport,
    /// Scored with the opposite octave setting.
    pub counterfactual: ScoreReport,
    pub display: DisplaySeries,
    pub events: Vec<DeviationEvent>,
    pub key_offset: Option<KeyOffset>,
    /// Fewer reliable samples than `EngineSettings::min_reliable_samples`.
    pub low_confidence: bool,
}

impl ComparisonResult {
    /// The well-defined "insufficient data" result.
    pub fn empty(config: &ComparisonConfig, base_step: f64, settings: &EngineSettings) -> Self {
        Self {
            generation: 0,
            config: *config,
            window: None,
            base_step,
            display_step: base_step * f64::from(config.density.factor()),
            primary: ScoreReport::empty(config.octave_invariant, config.tolerance_cents),
            counterfactual: ScoreReport::empty(!config.octave_invariant, config.tolerance_cents),
            display: DisplaySeries::empty(bin_seconds(config.density, settings)),
            events: Vec::new(),
            key_offset: None,
            low_confidence: true,
        }
    }

    pub fn score(&self) -> f64 {
        self.primary.score
    }

    pub fn reliable_sample_count(&self) -> usize {
        self.primary.stats.reliable_sample_count
    }
}

/// Runs the full comparison pipeline.
pub fn compare(
    reference: &PitchTrack,
    user: &PitchTrack,
    config: &ComparisonConfig,
    settings: &EngineSettings,
) -> ComparisonResult {
    let step = base_step(reference, user, settings);
    let Some((t0, t1)) = overlap_window(reference, user) else {
        debug!(
            target: "contour::pipeline",
            ref_len = reference.len(),
            usr_len = user.len(),
            "no usable overlap"
        );
        return ComparisonResult::empty(config, step, settings);
    };

    // The base grid is the finest one built; bounding it bounds them all.
    let base_len = grid_len(t0, t1, step);
    if base_len.is_none_or(|len| len > settings.max_grid_samples) {
        warn!(
            target: "contour::pipeline",
            t0,
            t1,
            step,
            max = settings.max_grid_samples,
            "time grid too large, treating as insufficient data"
        );
        return ComparisonResult::empty(config, step, settings);
    }

    let ref_interp = TrackInterpolator::new(reference);
    let usr_interp = TrackInterpolator::new(user);

    // Base resolution: confidence signal, events, key diagnosis.
    let base = sample_at(&ref_interp, &usr_interp, t0, t1, step);
    let reliable = reliable_sample_count(&base);

    // Display resolution: scores and chart.
    let display_step = step * f64::from(config.density.factor());
    let scaled = sample_at(&ref_interp, &usr_interp, t0, t1, display_step);
    debug!(
        target: "contour::pipeline",
        t0,
        t1,
        step,
        display_step,
        base_samples = base.len(),
        display_samples = scaled.len(),
        reliable,
        "aligned"
    );

    let (primary, counterfactual) = score_both(&scaled, config, reliable, settings);
    let display = reduce(
        &scaled,
        config.octave_invariant,
        settings.octave_search_bound,
        bin_seconds(config.density, settings),
    );
    let events = detect_events(
        &base,
        step,
        config.octave_invariant,
        settings.octave_search_bound,
        config.tolerance_cents,
        settings.min_event_seconds,
    );
    let key_offset = diagnose(&base, config.tolerance_cents);

    ComparisonResult {
        generation: 0,
        config: *config,
        window: Some((t0, t1)),
        base_step: step,
        display_step,
        primary,
        counterfactual,
        display,
        events,
        key_offset,
        low_confidence: reliable < settings.min_reliable_samples,
    }
}
