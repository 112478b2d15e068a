// contour-core/src/lib.rs

//! The core logic for comparing a sung take against a reference melody.
//! This crate aligns two pitch tracks on a shared time grid, scores the
//! take in cents, and reduces both tracks to chart-sized series. It is
//! completely headless and knows nothing about audio capture, transport
//! or rendering.
//!
//! ## Pipeline
//! ```text
//! PitchTrack ×2 ─▶ align ─▶ score ──────┐
//!                        ├─▶ display ───┼─▶ ComparisonResult
//!                        ├─▶ events ────┤
//!                        └─▶ key_offset ┘
//! ```
//!
//! [`session::ComparisonSession`] runs that pipeline off the caller's thread
//! and publishes each result atomically.

pub mod align;
pub mod autosync;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod key_offset;
pub mod pipeline;
pub mod score;
pub mod session;
pub mod source;
pub mod track;
pub mod units;

pub use config::{ComparisonConfig, DensityMultiplier, EngineSettings};
pub use error::{ContourError, Result};
pub use pipeline::{ComparisonResult, compare};
pub use session::{ComparisonSession, SessionState};
pub use source::{AnalysisDataSource, JsonFileSource, TrackPair};
pub use track::{PitchSample, PitchTrack, TrackInterpolator};
