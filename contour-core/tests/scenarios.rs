use approx::assert_abs_diff_eq;
use contour_core::align::{overlap_window, sample_at};
use contour_core::autosync::estimate_offset;
use contour_core::events::DeviationKind;
use contour_core::key_offset::KeyVerdict;
use contour_core::score::scored_samples;
use contour_core::source::decode_track;
use contour_core::{ComparisonConfig, EngineSettings, PitchTrack, TrackInterpolator, compare};

fn voiced(pairs: &[(f64, f64)]) -> PitchTrack {
    PitchTrack::from_pairs(pairs.iter().map(|&(t, hz)| (t, Some(hz))))
}

/// A 10 ms track of `seconds` length where `f0(t)` gives the pitch.
fn sung(seconds: f64, f0: impl Fn(f64) -> Option<f64>) -> PitchTrack {
    let frames = (seconds / 0.01).round() as usize;
    PitchTrack::from_pairs((0..=frames).map(|i| {
        let t = i as f64 * 0.01;
        (t, f0(t))
    }))
    .with_metadata(Some(16_000.0), Some(160.0))
}

#[test]
fn empty_overlap_yields_zeroed_result() {
    let reference = voiced(&[(0.0, 220.0), (0.5, 220.0), (1.0, 220.0)]);
    let user = voiced(&[(2.0, 220.0), (2.5, 220.0), (3.0, 220.0)]);
    let result = compare(&reference, &user, &ComparisonConfig::default(), &EngineSettings::default());

    let stats = &result.primary.stats;
    assert_eq!(stats.percent_within_tolerance, 0.0);
    assert_eq!(stats.mean_absolute_cents, 0.0);
    assert_eq!(stats.reliable_sample_count, 0);
    assert!(result.display.reference.is_empty());
    assert!(result.display.user.is_empty());
    assert!(result.display.error.is_empty());
    assert!(result.key_offset.is_none());
}

#[test]
fn octave_invariance_scenario() {
    let reference = voiced(&[(0.0, 220.0), (0.5, 220.0), (1.0, 220.0)]);
    let user = voiced(&[(0.0, 220.0), (0.5, 220.0), (1.0, 440.0)]);
    let (t0, t1) = overlap_window(&reference, &user).expect("tracks overlap");
    let samples = sample_at(
        &TrackInterpolator::new(&reference),
        &TrackInterpolator::new(&user),
        t0,
        t1,
        0.02,
    );

    let strict = scored_samples(&samples, false, 3);
    let last = strict.last().expect("scored samples");
    assert_abs_diff_eq!(last.t, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(last.cents, 1200.0, epsilon = 1e-6);

    let invariant = scored_samples(&samples, true, 3);
    let last = invariant.last().expect("scored samples");
    assert_abs_diff_eq!(last.cents, 0.0, epsilon = 1e-6);
}

#[test]
fn counterfactual_reports_the_other_octave_setting() {
    let reference = sung(5.0, |_| Some(440.0));
    let user = sung(5.0, |_| Some(220.0));
    let config = ComparisonConfig {
        octave_invariant: true,
        ..ComparisonConfig::default()
    };
    let result = compare(&reference, &user, &config, &EngineSettings::default());

    assert!(result.primary.octave_invariant);
    assert_eq!(result.primary.score, 100.0);
    assert!(!result.counterfactual.octave_invariant);
    assert_eq!(result.counterfactual.score, 0.0);
    assert_abs_diff_eq!(result.counterfactual.stats.mean_absolute_cents, 1200.0, epsilon = 1e-6);
    assert_eq!(
        result.key_offset.map(|k| k.verdict),
        Some(KeyVerdict::OctaveShift { octaves: -1 })
    );
}

#[test]
fn short_take_is_low_confidence() {
    let reference = sung(1.0, |_| Some(330.0));
    let result = compare(&reference, &reference, &ComparisonConfig::default(), &EngineSettings::default());
    assert_eq!(result.reliable_sample_count(), 101);
    assert!(result.low_confidence);
}

#[test]
fn flat_passage_becomes_an_event() {
    let reference = sung(4.0, |_| Some(440.0));
    // 100 cents flat between 1 s and 2 s.
    let flat = 440.0 * 2f64.powf(-100.0 / 1200.0);
    let user = sung(4.0, |t| Some(if (1.0..2.0).contains(&t) { flat } else { 440.0 }));
    let result = compare(&reference, &user, &ComparisonConfig::default(), &EngineSettings::default());

    assert_eq!(result.events.len(), 1);
    let event = &result.events[0];
    assert_eq!(event.kind, DeviationKind::PitchLow);
    assert_abs_diff_eq!(event.start, 1.0, epsilon = 0.02);
    assert_abs_diff_eq!(event.end, 2.0, epsilon = 0.02);
    assert!(event.mean_cents.is_some_and(|c| c < -40.0));
}

#[test]
fn autosync_then_compare_recovers_a_late_take() {
    let phrase = |t: f64| ((1.0..2.0).contains(&t) || (2.5..3.5).contains(&t)).then_some(262.0);
    let reference = sung(6.0, phrase);
    let late = sung(6.0, |t| phrase(t - 0.4));
    let settings = EngineSettings::default();

    let before = compare(&reference, &late, &ComparisonConfig::default(), &settings);
    let estimate = estimate_offset(
        &reference,
        &late,
        0.01,
        settings.autosync_max_shift_seconds,
        settings.max_grid_samples,
    )
    .expect("voiced tracks");
    assert_abs_diff_eq!(estimate.shift_seconds, -0.4, epsilon = 0.015);

    let after = compare(&reference, &late.shifted(estimate.shift_seconds), &ComparisonConfig::default(), &settings);
    assert!(after.reliable_sample_count() > before.reliable_sample_count());
}

#[test]
fn decoded_tracks_feed_the_pipeline() {
    let reference = decode_track(
        r#"{ "sr": 16000, "hop": 160, "algo": "yin",
             "track": [{ "t": 0.0, "f0_hz": 220.0 }, { "t": 0.01, "f0_hz": 220.0 },
                       { "t": 0.02, "f0_hz": null }, { "t": 0.03, "f0_hz": 220.0 }] }"#,
    )
    .expect("valid document");
    let result = compare(&reference, &reference, &ComparisonConfig::default(), &EngineSettings::default());
    assert_abs_diff_eq!(result.base_step, 0.01, epsilon = 1e-15);
    assert_eq!(result.reliable_sample_count(), 3);
}
