//! # Track Source Module
//!
//! The boundary between the engine and whatever delivers pitch tracks.
//!
//! The engine only ever sees strict [`PitchTrack`] values. Wire documents
//! are decoded here by a versioned adapter; a transport (files, HTTP, a
//! cache) plugs in by implementing [`AnalysisDataSource`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ContourError, Result};
use crate::track::{PitchSample, PitchTrack};

/// The only document version this adapter understands.
pub const PITCH_TRACK_DOCUMENT_VERSION: u32 = 1;

/// A reference track and the user's take of the same song.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackPair {
    pub reference: PitchTrack,
    pub user: PitchTrack,
}

/// Anything that can produce the two tracks of a comparison.
pub trait AnalysisDataSource {
    fn load_tracks(&self) -> Result<TrackPair>;
}

/// One frame of the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFrame {
    pub t: f64,
    #[serde(default)]
    pub f0_hz: Option<f64>,
}

/// Version 1 pitch-track document as produced by the extraction service.
///
/// ```json
/// { "sr": 44100, "hop": 256, "algo": "yin", "track": [{ "t": 0.0, "f0_hz": 220.0 }] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitchTrackDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub sr: Option<f64>,
    #[serde(default)]
    pub hop: Option<f64>,
    #[serde(default)]
    pub algo: Option<String>,
    pub track: Vec<WireFrame>,
}

fn default_version() -> u32 {
    PITCH_TRACK_DOCUMENT_VERSION
}

impl PitchTrackDocument {
    /// Converts the document into an engine track.
    pub fn into_track(self) -> Result<PitchTrack> {
        if self.version != PITCH_TRACK_DOCUMENT_VERSION {
            return Err(ContourError::UnsupportedVersion(self.version));
        }
        let track = self
            .track
            .into_iter()
            .map(|frame| PitchSample::new(frame.t, frame.f0_hz))
            .collect::<PitchTrack>()
            .with_metadata(self.sr, self.hop);
        Ok(track)
    }
}

impl From<&PitchTrack> for PitchTrackDocument {
    fn from(track: &PitchTrack) -> Self {
        Self {
            version: PITCH_TRACK_DOCUMENT_VERSION,
            sr: track.sample_rate_hz(),
            hop: track.hop_size(),
            algo: None,
            track: track
                .samples()
                .iter()
                .map(|s| WireFrame { t: s.t, f0_hz: s.f0 })
                .collect(),
        }
    }
}

/// Decodes a JSON pitch-track document.
pub fn decode_track(json: &str) -> Result<PitchTrack> {
    let document: PitchTrackDocument =
        serde_json::from_str(json).map_err(|e| ContourError::json("decoding pitch track", e))?;
    document.into_track()
}

/// Reads both tracks from JSON files on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    pub reference: PathBuf,
    pub user: PathBuf,
}

impl JsonFileSource {
    pub fn new(reference: impl Into<PathBuf>, user: impl Into<PathBuf>) -> Self {
        Self {
            reference: reference.into(),
            user: user.into(),
        }
    }
}

impl AnalysisDataSource for JsonFileSource {
    fn load_tracks(&self) -> Result<TrackPair> {
        Ok(TrackPair {
            reference: read_track(&self.reference)?,
            user: read_track(&self.user)?,
        })
    }
}

fn read_track(path: &Path) -> Result<PitchTrack> {
    let json = fs::read_to_string(path)
        .map_err(|e| ContourError::io(format!("reading {}", path.display()), e))?;
    let document: PitchTrackDocument = serde_json::from_str(&json)
        .map_err(|e| ContourError::json(format!("decoding {}", path.display()), e))?;
    let track = document.into_track()?;
    debug!(
        target: "contour::source",
        path = %path.display(),
        samples = track.len(),
        voiced = track.voiced_count(),
        "loaded pitch track"
    );
    Ok(track)
}
