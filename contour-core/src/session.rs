//! # Comparison Session Module
//!
//! Owns the two tracks and the user-facing [`ComparisonConfig`] for one
//! comparison screen, and keeps a published [`ComparisonResult`] in step with
//! them.
//!
//! ## Features
//! - Recomputes on a dedicated worker thread so setters never block on the pipeline
//! - Coalesces bursts of changes: the worker only ever runs the newest request
//! - Latest-generation-wins publish: a recompute that was superseded while it
//!   ran is discarded instead of overwriting a newer result
//! - Results are replaced as one `Arc`, so readers never see a half-updated set
//!
//! ```text
//!  Empty ──set_tracks──▶ Computing ──publish──▶ Ready
//!                            ▲                    │
//!                            └── any change ──────┘
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::config::{ComparisonConfig, DensityMultiplier, EngineSettings};
use crate::align::base_step;
use crate::error::{ContourError, Result};
use crate::pipeline::{ComparisonResult, compare};
use crate::source::TrackPair;
use crate::track::PitchTrack;

/// Where the session is in its recompute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No tracks loaded yet.
    Empty,
    /// A recompute for the newest request is pending or running.
    Computing,
    /// The published result matches the current tracks and configuration.
    Ready,
}

/// One recompute job, a snapshot of the inputs at request time.
struct Request {
    generation: u64,
    config: ComparisonConfig,
    tracks: Arc<TrackPair>,
}

/// Mutable session inputs, guarded together so a request snapshot is consistent.
struct Control {
    state: SessionState,
    requested_generation: u64,
    config: ComparisonConfig,
    tracks: Option<Arc<TrackPair>>,
}

/// State shared between the session handle and its worker.
struct Shared {
    settings: EngineSettings,
    control: Mutex<Control>,
    published: RwLock<Option<Arc<ComparisonResult>>>,
    subscribers: Mutex<Vec<Sender<Arc<ComparisonResult>>>>,
}

/// Worker thread management.
struct RecomputeWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

/// Orchestrates recomputes for one reference/take pair.
///
/// All methods take `&self`; wrap the session in an `Arc` to drive it from
/// several threads.
pub struct ComparisonSession {
    shared: Arc<Shared>,
    request_tx: Sender<Request>,
    worker: RecomputeWorker,
}

impl ComparisonSession {
    /// Starts a session with the default configuration.
    pub fn new(settings: EngineSettings) -> Result<Self> {
        Self::with_config(settings, ComparisonConfig::default())
    }

    /// Starts a session with an initial configuration.
    ///
    /// # Returns
    /// * `Ok(session)` - Session in the `Empty` state with its worker running
    /// * `Err(InvalidConfig)` - If the settings or configuration are out of range
    pub fn with_config(settings: EngineSettings, config: ComparisonConfig) -> Result<Self> {
        settings.validate()?;
        config.validate()?;

        let shared = Arc::new(Shared::new(settings, config));

        let (request_tx, request_rx) = crossbeam_channel::unbounded::<Request>();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let worker_shared = Arc::clone(&shared);
        let thread_handle = thread::Builder::new()
            .name("contour-recompute".into())
            .spawn(move || worker_shared.run(request_rx, shutdown_rx))
            .map_err(|e| ContourError::io("spawning recompute worker", e))?;

        info!(target: "contour::session", ?config, "session started");
        Ok(Self {
            shared,
            request_tx,
            worker: RecomputeWorker {
                shutdown_tx,
                thread_handle: Some(thread_handle),
            },
        })
    }

    /// Loads a new pair of tracks and schedules a recompute.
    pub fn set_tracks(&self, reference: PitchTrack, user: PitchTrack) {
        self.set_track_pair(TrackPair { reference, user });
    }

    pub fn set_track_pair(&self, tracks: TrackPair) {
        let mut control = self.shared.control.lock();
        info!(
            target: "contour::session",
            ref_len = tracks.reference.len(),
            usr_len = tracks.user.len(),
            "tracks loaded"
        );
        control.tracks = Some(Arc::new(tracks));
        self.schedule(&mut control);
    }

    pub fn set_density(&self, density: DensityMultiplier) {
        self.update_config(|config| config.density = density);
    }

    pub fn set_octave_invariant(&self, octave_invariant: bool) {
        self.update_config(|config| config.octave_invariant = octave_invariant);
    }

    /// Changes the tolerance; rejects non-finite or negative values.
    pub fn set_tolerance(&self, tolerance_cents: f64) -> Result<()> {
        let tolerance_cents = ComparisonConfig::validate_tolerance(tolerance_cents)?;
        self.update_config(|config| config.tolerance_cents = tolerance_cents);
        Ok(())
    }

    /// Replaces the whole configuration at once.
    pub fn set_config(&self, config: ComparisonConfig) -> Result<()> {
        config.validate()?;
        self.update_config(|current| *current = config);
        Ok(())
    }

    pub fn config(&self) -> ComparisonConfig {
        self.shared.control.lock().config
    }

    pub fn state(&self) -> SessionState {
        self.shared.control.lock().state
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    /// The most recently published result, if any.
    ///
    /// While `Computing` this is still the previous result.
    pub fn latest(&self) -> Option<Arc<ComparisonResult>> {
        self.shared.published.read().clone()
    }

    /// Returns a channel that receives every result published from now on.
    pub fn subscribe(&self) -> Receiver<Arc<ComparisonResult>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    fn update_config(&self, change: impl FnOnce(&mut ComparisonConfig)) {
        let mut control = self.shared.control.lock();
        let before = control.config;
        change(&mut control.config);
        if control.config == before {
            trace!(target: "contour::session", "configuration unchanged");
            return;
        }
        debug!(target: "contour::session", config = ?control.config, "configuration changed");
        self.schedule(&mut control);
    }

    /// Bumps the generation and queues a recompute, if there is anything to compute.
    fn schedule(&self, control: &mut Control) {
        let Some(tracks) = control.tracks.clone() else {
            // Stored until tracks arrive.
            return;
        };
        control.requested_generation += 1;
        control.state = SessionState::Computing;
        let request = Request {
            generation: control.requested_generation,
            config: control.config,
            tracks,
        };
        debug!(target: "contour::session", generation = request.generation, "recompute requested");
        if self.request_tx.send(request).is_err() {
            warn!(target: "contour::session", "recompute worker is gone, request dropped");
        }
    }
}

impl Shared {
    fn new(settings: EngineSettings, config: ComparisonConfig) -> Self {
        Self {
            settings,
            control: Mutex::new(Control {
                state: SessionState::Empty,
                requested_generation: 0,
                config,
                tracks: None,
            }),
            published: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn run(&self, request_rx: Receiver<Request>, shutdown_rx: Receiver<()>) {
        debug!(target: "contour::session", "recompute worker started");
        loop {
            crossbeam_channel::select! {
                recv(request_rx) -> msg => match msg {
                    Ok(request) => {
                        // Only the newest queued request matters.
                        let request = request_rx.try_iter().last().unwrap_or(request);
                        self.recompute(request);
                    }
                    Err(_) => break,
                },
                recv(shutdown_rx) -> _ => break,
            }
        }
        debug!(target: "contour::session", "recompute worker finished");
    }

    fn recompute(&self, request: Request) {
        let started = Instant::now();
        let generation = request.generation;
        let mut result = self.compute(&request);
        result.generation = generation;
        if self.publish(Arc::new(result)) {
            debug!(
                target: "contour::session",
                generation,
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "result published"
            );
        }
    }

    /// Runs the pipeline for one request. A panic is contained to this job
    /// and yields the empty result, so the worker keeps serving requests.
    fn compute(&self, request: &Request) -> ComparisonResult {
        let tracks = &request.tracks;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            compare(&tracks.reference, &tracks.user, &request.config, &self.settings)
        }));
        outcome.unwrap_or_else(|_| {
            error!(
                target: "contour::session",
                generation = request.generation,
                "comparison panicked, publishing an empty result"
            );
            let step = base_step(&tracks.reference, &tracks.user, &self.settings);
            ComparisonResult::empty(&request.config, step, &self.settings)
        })
    }

    /// Publishes `result` if it answers the newest request.
    ///
    /// Returns `false` when a newer request arrived while it was computed.
    fn publish(&self, result: Arc<ComparisonResult>) -> bool {
        let mut control = self.control.lock();
        if control.requested_generation != result.generation {
            trace!(
                target: "contour::session",
                generation = result.generation,
                newest = control.requested_generation,
                "discarding superseded result"
            );
            return false;
        }
        *self.published.write() = Some(Arc::clone(&result));
        control.state = SessionState::Ready;
        self.subscribers
            .lock()
            .retain(|tx| tx.send(Arc::clone(&result)).is_ok());
        true
    }
}

impl Drop for ComparisonSession {
    fn drop(&mut self) {
        let _ = self.worker.shutdown_tx.send(());
        if let Some(handle) = self.worker.thread_handle.take() {
            if handle.join().is_err() {
                warn!(target: "contour::session", "recompute worker panicked");
            }
        }
    }
}
