//! # Configuration Module
//!
//! Two layers of configuration:
//! - [`ComparisonConfig`] holds the user-facing knobs that a comparison
//!   screen mutates (display density, octave invariance, tolerance).
//! - [`EngineSettings`] holds the engine's tunable constants. It is fixed for
//!   the lifetime of a session and can be loaded from JSON; every field has
//!   a default, so a partial document is valid.

use serde::{Deserialize, Serialize};

use crate::error::{ContourError, Result};
use crate::units::ScoreCurve;

/// Default tolerance band, in cents.
pub const DEFAULT_TOLERANCE_CENTS: f64 = 40.0;

/// Display downsampling factor applied to the base step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DensityMultiplier {
    #[default]
    X1,
    X2,
    X5,
    X10,
    X20,
    X50,
}

impl DensityMultiplier {
    /// Every accepted multiplier, ascending.
    pub const ALL: [DensityMultiplier; 6] = [
        DensityMultiplier::X1,
        DensityMultiplier::X2,
        DensityMultiplier::X5,
        DensityMultiplier::X10,
        DensityMultiplier::X20,
        DensityMultiplier::X50,
    ];

    pub fn factor(self) -> u32 {
        match self {
            DensityMultiplier::X1 => 1,
            DensityMultiplier::X2 => 2,
            DensityMultiplier::X5 => 5,
            DensityMultiplier::X10 => 10,
            DensityMultiplier::X20 => 20,
            DensityMultiplier::X50 => 50,
        }
    }
}

impl TryFrom<u32> for DensityMultiplier {
    type Error = ContourError;

    fn try_from(value: u32) -> Result<Self> {
        DensityMultiplier::ALL
            .into_iter()
            .find(|d| d.factor() == value)
            .ok_or_else(|| {
                ContourError::invalid_config("density", value, "expected one of 1, 2, 5, 10, 20, 50")
            })
    }
}

impl From<DensityMultiplier> for u32 {
    fn from(value: DensityMultiplier) -> Self {
        value.factor()
    }
}

/// User-facing comparison settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    pub density: DensityMultiplier,
    pub octave_invariant: bool,
    pub tolerance_cents: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            density: DensityMultiplier::X1,
            octave_invariant: false,
            tolerance_cents: DEFAULT_TOLERANCE_CENTS,
        }
    }
}

impl ComparisonConfig {
    /// Rejects a tolerance that is negative or non-finite.
    pub fn validate_tolerance(tolerance_cents: f64) -> Result<f64> {
        if tolerance_cents.is_finite() && tolerance_cents >= 0.0 {
            Ok(tolerance_cents)
        } else {
            Err(ContourError::invalid_config(
                "tolerance_cents",
                tolerance_cents,
                "must be finite and non-negative",
            ))
        }
    }

    pub fn validate(&self) -> Result<()> {
        Self::validate_tolerance(self.tolerance_cents).map(|_| ())
    }
}

/// Tunable engine constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Octaves searched in each direction by octave correction.
    pub octave_search_bound: u8,
    /// Curve mapping mean absolute cents to a score.
    pub score_curve: ScoreCurve,
    /// Below this many reliable samples a result is flagged low-confidence.
    pub min_reliable_samples: usize,
    /// Step used when track metadata yields no usable interval.
    pub default_step_seconds: f64,
    /// Exclusive upper bound on a metadata-derived step.
    pub max_step_seconds: f64,
    /// Lower bound on the display bin width.
    pub min_bin_seconds: f64,
    /// Display bin width per unit of density.
    pub bin_seconds_per_density: f64,
    /// Deviation runs shorter than this are not reported.
    pub min_event_seconds: f64,
    /// Search range, in each direction, of autosync offset estimation.
    pub autosync_max_shift_seconds: f64,
    /// Largest time grid a comparison or autosync search may build.
    pub max_grid_samples: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            octave_search_bound: 3,
            score_curve: ScoreCurve::default(),
            min_reliable_samples: 200,
            default_step_seconds: 0.02,
            max_step_seconds: 0.2,
            min_bin_seconds: 0.10,
            bin_seconds_per_density: 0.02,
            min_event_seconds: 0.20,
            autosync_max_shift_seconds: 3.0,
            // Five hours at 10 ms.
            max_grid_samples: 2_000_000,
        }
    }
}

impl EngineSettings {
    /// Parses settings from a JSON document, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: EngineSettings =
            serde_json::from_str(json).map_err(|e| ContourError::json("parsing engine settings", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("default_step_seconds", self.default_step_seconds),
            ("max_step_seconds", self.max_step_seconds),
            ("min_bin_seconds", self.min_bin_seconds),
            ("bin_seconds_per_density", self.bin_seconds_per_density),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ContourError::invalid_config(name, value, "must be finite and positive"));
            }
        }
        let non_negative = [
            ("min_event_seconds", self.min_event_seconds),
            ("autosync_max_shift_seconds", self.autosync_max_shift_seconds),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ContourError::invalid_config(name, value, "must be finite and non-negative"));
            }
        }
        if self.max_grid_samples == 0 {
            return Err(ContourError::invalid_config(
                "max_grid_samples",
                self.max_grid_samples,
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_round_trips_through_factor() {
        for density in DensityMultiplier::ALL {
            assert_eq!(DensityMultiplier::try_from(density.factor()).ok(), Some(density));
        }
        assert!(DensityMultiplier::try_from(3).is_err());
    }

    #[test]
    fn tolerance_validation() {
        assert!(ComparisonConfig::validate_tolerance(0.0).is_ok());
        assert!(ComparisonConfig::validate_tolerance(-1.0).is_err());
        assert!(ComparisonConfig::validate_tolerance(f64::NAN).is_err());
        assert!(ComparisonConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_settings_document_uses_defaults() {
        let settings = EngineSettings::from_json(r#"{ "octave_search_bound": 2,
            "score_curve": { "kind": "linear", "zero_at_cents": 200.0 } }"#)
        .expect("valid settings");
        assert_eq!(settings.octave_search_bound, 2);
        assert_eq!(settings.score_curve, ScoreCurve::Linear { zero_at_cents: 200.0 });
        assert_eq!(settings.min_reliable_samples, 200);
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(EngineSettings::from_json(r#"{ "default_step_seconds": 0.0 }"#).is_err());
        assert!(EngineSettings::from_json("not json").is_err());
        assert!(EngineSettings::from_json(r#"{ "max_grid_samples": 0 }"#).is_err());
    }

    #[test]
    fn config_density_serializes_as_number() {
        let config = ComparisonConfig {
            density: DensityMultiplier::X20,
            ..ComparisonConfig::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(json.contains("\"density\":20"));
        let back: ComparisonConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
