use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use contour_core::config::DEFAULT_TOLERANCE_CENTS;
use contour_core::display::bin_seconds;
use contour_core::{
    ComparisonResult, ComparisonSession, DensityMultiplier, EngineSettings, PitchTrack, SessionState,
};
use crossbeam_channel::Receiver;

const TIMEOUT: Duration = Duration::from_secs(10);

/// A few minutes of vibrato around A3, long enough that recomputes overlap with edits.
fn take(seconds: f64, detune_cents: f64) -> PitchTrack {
    let frames = (seconds / 0.01) as usize;
    PitchTrack::from_pairs((0..frames).map(|i| {
        let t = i as f64 * 0.01;
        let cents = detune_cents + 30.0 * (t * 5.0 * std::f64::consts::TAU).sin();
        let voiced = (t % 4.0) < 3.5;
        (t, voiced.then_some(220.0 * 2f64.powf(cents / 1200.0)))
    }))
    .with_metadata(Some(44_100.0), Some(441.0))
}

fn wait_for_generation(rx: &Receiver<Arc<ComparisonResult>>, generation: u64) -> Vec<u64> {
    let mut seen = Vec::new();
    loop {
        let result = rx.recv_timeout(TIMEOUT).expect("result published in time");
        seen.push(result.generation);
        if result.generation >= generation {
            return seen;
        }
    }
}

#[test]
fn last_write_wins() {
    let session = ComparisonSession::new(EngineSettings::default()).expect("valid settings");
    let rx = session.subscribe();

    session.set_tracks(take(180.0, 0.0), take(180.0, 15.0));
    for density in [
        DensityMultiplier::X2,
        DensityMultiplier::X5,
        DensityMultiplier::X10,
        DensityMultiplier::X20,
        DensityMultiplier::X50,
    ] {
        session.set_density(density);
    }
    session.set_octave_invariant(true);
    session.set_tolerance(25.0).expect("valid tolerance");

    let seen = wait_for_generation(&rx, 8);
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "out of order: {seen:?}");
    assert_eq!(seen.last(), Some(&8));

    let latest = session.latest().expect("published result");
    assert_eq!(latest.generation, 8);
    assert_eq!(latest.config, session.config());
    assert_eq!(latest.config.density, DensityMultiplier::X50);
    assert!(latest.primary.octave_invariant);
    assert_eq!(latest.primary.stats.tolerance_cents, 25.0);
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn state_machine_follows_requests() {
    let session = ComparisonSession::new(EngineSettings::default()).expect("valid settings");
    let rx = session.subscribe();
    assert_eq!(session.state(), SessionState::Empty);

    // Stored while empty, applied once tracks arrive.
    session.set_tolerance(10.0).expect("valid tolerance");
    assert_eq!(session.state(), SessionState::Empty);
    assert!(rx.try_recv().is_err());

    session.set_tracks(take(5.0, 0.0), take(5.0, 0.0));
    let first = rx.recv_timeout(TIMEOUT).expect("first result");
    assert_eq!(first.generation, 1);
    assert_eq!(first.primary.stats.tolerance_cents, 10.0);
    assert_eq!(session.state(), SessionState::Ready);

    // Setting the same value again does not recompute.
    session.set_tolerance(10.0).expect("valid tolerance");
    assert_eq!(session.state(), SessionState::Ready);

    session.set_tolerance(DEFAULT_TOLERANCE_CENTS).expect("valid tolerance");
    let second = rx.recv_timeout(TIMEOUT).expect("second result");
    assert_eq!(second.generation, 2);
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn confidence_is_stable_across_density_changes() {
    let session = ComparisonSession::new(EngineSettings::default()).expect("valid settings");
    let rx = session.subscribe();
    session.set_tracks(take(20.0, 0.0), take(20.0, 50.0));
    let baseline = rx.recv_timeout(TIMEOUT).expect("first result").reliable_sample_count();

    for (i, density) in DensityMultiplier::ALL.into_iter().rev().enumerate() {
        session.set_density(density);
        let seen = wait_for_generation(&rx, i as u64 + 2);
        assert!(!seen.is_empty());
        let latest = session.latest().expect("published result");
        assert_eq!(latest.reliable_sample_count(), baseline);
    }
}

#[test]
fn readers_never_see_mixed_results() {
    let settings = EngineSettings::default();
    let session = Arc::new(ComparisonSession::new(settings.clone()).expect("valid settings"));
    let rx = session.subscribe();
    session.set_tracks(take(60.0, 0.0), take(60.0, -20.0));
    rx.recv_timeout(TIMEOUT).expect("first result");

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let session = Arc::clone(&session);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut checked = 0usize;
            while !stop.load(Ordering::Relaxed) {
                if let Some(result) = session.latest() {
                    assert_eq!(result.primary.octave_invariant, result.config.octave_invariant);
                    assert_eq!(result.display.bin_seconds, bin_seconds(result.config.density, &settings));
                    assert_eq!(result.primary.stats.tolerance_cents, result.config.tolerance_cents);
                    checked += 1;
                }
            }
            checked
        })
    };

    let mut expected = 1;
    for round in 0..10 {
        session.set_octave_invariant(round % 2 == 0);
        session.set_density(DensityMultiplier::ALL[round % DensityMultiplier::ALL.len()]);
        session.set_tolerance(20.0 + round as f64).expect("valid tolerance");
        expected += 3;
    }
    // Density for round 0 equals the default, so it does not recompute.
    expected -= 1;
    wait_for_generation(&rx, expected);

    stop.store(true, Ordering::Relaxed);
    let checked = reader.join().expect("reader thread");
    assert!(checked > 0);
    assert_eq!(session.latest().map(|r| r.generation), Some(expected));
}

#[test]
fn recovers_after_oversized_tracks() {
    let session = ComparisonSession::new(EngineSettings::default()).expect("valid settings");
    let rx = session.subscribe();

    let huge = || PitchTrack::from_pairs([(0.0, Some(220.0)), (1e300, Some(220.0))]);
    session.set_tracks(huge(), huge());
    let first = rx.recv_timeout(TIMEOUT).expect("oversized tracks still publish");
    assert_eq!(first.generation, 1);
    assert!(first.window.is_none());
    assert!(first.low_confidence);
    assert_eq!(session.state(), SessionState::Ready);

    session.set_tracks(take(1.0, 0.0), take(1.0, 0.0));
    let second = rx.recv_timeout(TIMEOUT).expect("worker still serving");
    assert_eq!(second.generation, 2);
    assert_eq!(second.score(), 100.0);
    assert_eq!(session.state(), SessionState::Ready);
}
