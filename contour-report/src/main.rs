//! # Contour Report - Sung Take Comparison
//!
//! Command-line front-end for the contour comparison engine. Loads a
//! reference pitch track and a user's take, optionally lines them up in
//! time, runs one comparison session and prints the published result.
//!
//! ## Architecture
//! - **Main Thread**: argument parsing, loading, and rendering
//! - **Recompute Thread**: owned by [`ComparisonSession`], runs the pipeline
//! - **Communication**: the session's crossbeam subscription channel

mod ui;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use contour_core::align::base_step;
use contour_core::autosync::{SyncEstimate, estimate_offset};
use contour_core::config::DEFAULT_TOLERANCE_CENTS;
use contour_core::units::nearest_note;
use contour_core::{
    AnalysisDataSource, ComparisonConfig, ComparisonResult, ComparisonSession, DensityMultiplier,
    EngineSettings, JsonFileSource, PitchTrack,
};
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use ui::summary::{Summary, TrackLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "contour-report")]
#[command(about = "Score a sung take against a reference pitch track")]
struct Args {
    /// Reference pitch-track JSON document.
    reference: PathBuf,
    /// User take pitch-track JSON document.
    user: PathBuf,
    /// Display density multiplier (1, 2, 5, 10, 20 or 50).
    #[arg(long, default_value = "1", value_parser = parse_density)]
    density: DensityMultiplier,
    /// Ignore which octave the take was sung in.
    #[arg(long)]
    octave_invariant: bool,
    /// Errors up to this many cents count as in tune.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_CENTS)]
    tolerance: f64,
    /// Engine settings JSON; missing fields keep their defaults.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Estimate and remove a constant time offset of the take first.
    #[arg(long)]
    autosync: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Append the binned error chart to the text output.
    #[arg(long)]
    chart: bool,
    /// Seconds to wait for the comparison to finish.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

/// JSON output: the published result plus the offset that was applied.
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    result: &'a ComparisonResult,
    autosync: Option<&'a SyncEstimate>,
}

fn parse_density(value: &str) -> std::result::Result<DensityMultiplier, String> {
    let factor: u32 = value.parse().map_err(|e| format!("{e}"))?;
    DensityMultiplier::try_from(factor).map_err(|e| e.to_string())
}

fn init_tracing() {
    // RUST_LOG wins; otherwise only warnings reach stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
    let Some(path) = path else {
        return Ok(EngineSettings::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let settings = EngineSettings::from_json(&json)
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    debug!(?settings, "settings loaded");
    Ok(settings)
}

fn track_line(label: &'static str, track: &PitchTrack) -> TrackLine {
    let mut voiced: Vec<f64> = track.samples().iter().filter_map(|s| s.f0).collect();
    voiced.sort_by(f64::total_cmp);
    TrackLine {
        label,
        samples: track.len(),
        voiced: voiced.len(),
        center: voiced.get(voiced.len() / 2).copied().and_then(nearest_note),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let settings = load_settings(args.settings.as_deref())?;
    let config = ComparisonConfig {
        density: args.density,
        octave_invariant: args.octave_invariant,
        tolerance_cents: args.tolerance,
    };
    config.validate().context("invalid comparison options")?;

    let source = JsonFileSource::new(&args.reference, &args.user);
    let mut tracks = source.load_tracks().context("loading pitch tracks")?;
    info!(
        reference = tracks.reference.len(),
        user = tracks.user.len(),
        "tracks loaded"
    );

    let sync = if args.autosync {
        let step = base_step(&tracks.reference, &tracks.user, &settings);
        let estimate = estimate_offset(
            &tracks.reference,
            &tracks.user,
            step,
            settings.autosync_max_shift_seconds,
            settings.max_grid_samples,
        );
        match estimate {
            Some(estimate) => {
                info!(shift = estimate.shift_seconds, "applying autosync offset");
                tracks.user = tracks.user.shifted(estimate.shift_seconds);
            }
            None => warn!("autosync found no usable offset, comparing unshifted"),
        }
        estimate
    } else {
        None
    };

    let lines = [
        track_line("reference", &tracks.reference),
        track_line("user", &tracks.user),
    ];

    let session = ComparisonSession::with_config(settings, config)?;
    let results = session.subscribe();
    session.set_track_pair(tracks);
    let result = match results.recv_timeout(Duration::from_secs(args.timeout_secs)) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            bail!("comparison did not finish within {} s", args.timeout_secs)
        }
        Err(RecvTimeoutError::Disconnected) => bail!("comparison session stopped before publishing"),
    };

    match args.format {
        OutputFormat::Text => print!(
            "{}",
            Summary {
                result: &result,
                tracks: &lines,
                sync: sync.as_ref(),
                chart: args.chart,
            }
        ),
        OutputFormat::Json => {
            let report = JsonReport {
                result: &result,
                autosync: sync.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
