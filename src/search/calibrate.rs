//! Confidence calibration: raw fused scores to discrete labels plus a
//! bounded display score.
//!
//! Raw RRF scores live in an awkward range (roughly 0.05–1.3 after
//! boosting); calibration maps them through ordered threshold bands, each
//! band applying its own affine rescale into a 0–1 display range. Profiles
//! are pluggable configuration, not inlined arithmetic.

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Discrete confidence label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Strong match; safe to act on the top hit.
    High,
    /// Plausible match; present alternatives.
    Medium,
    /// Weak match; treat as a suggestion only.
    Low,
}

/// One calibration band: raw scores at or above `threshold` (and below the
/// next band's threshold) rescale affinely into
/// `[display_floor, display_ceil]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationBand {
    /// Label reported for scores in this band.
    pub label: Confidence,
    /// Inclusive lower bound on the raw score.
    pub threshold: f32,
    /// Display score at the band's lower edge.
    pub display_floor: f32,
    /// Display score at the band's upper edge.
    pub display_ceil: f32,
}

/// Ordered calibration bands (highest threshold first) plus the raw score
/// at which the top band saturates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationProfile {
    bands: Vec<CalibrationBand>,
    raw_ceiling: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            bands: vec![
                CalibrationBand {
                    label: Confidence::High,
                    threshold: 0.8,
                    display_floor: 0.8,
                    display_ceil: 1.0,
                },
                CalibrationBand {
                    label: Confidence::Medium,
                    threshold: 0.4,
                    display_floor: 0.4,
                    display_ceil: 0.8,
                },
                CalibrationBand {
                    label: Confidence::Low,
                    threshold: 0.0,
                    display_floor: 0.0,
                    display_ceil: 0.4,
                },
            ],
            raw_ceiling: 1.5,
        }
    }
}

impl CalibrationProfile {
    /// Build a profile from explicit bands. Bands must be ordered by strictly
    /// descending threshold, each with `display_floor <= display_ceil`, and
    /// display ranges must not invert across bands (the whole mapping stays
    /// monotonic in the raw score).
    pub fn new(bands: Vec<CalibrationBand>, raw_ceiling: f32) -> Result<Self, RetrievalError> {
        if bands.is_empty() {
            return Err(RetrievalError::InvalidConfig(
                "calibration profile needs at least one band".to_string(),
            ));
        }
        if raw_ceiling <= bands[0].threshold {
            return Err(RetrievalError::InvalidConfig(format!(
                "raw_ceiling {raw_ceiling} must exceed the top band threshold {}",
                bands[0].threshold
            )));
        }
        for pair in bands.windows(2) {
            if pair[1].threshold >= pair[0].threshold {
                return Err(RetrievalError::InvalidConfig(
                    "calibration bands must have strictly descending thresholds".to_string(),
                ));
            }
            if pair[1].display_ceil > pair[0].display_floor {
                return Err(RetrievalError::InvalidConfig(
                    "calibration display ranges must not invert across bands".to_string(),
                ));
            }
        }
        for band in &bands {
            if band.display_floor > band.display_ceil {
                return Err(RetrievalError::InvalidConfig(format!(
                    "band {:?} has display_floor above display_ceil",
                    band.label
                )));
            }
        }
        Ok(Self { bands, raw_ceiling })
    }

    /// Map a raw score to its confidence label and display score.
    #[must_use]
    pub fn calibrate(&self, raw: f32) -> (Confidence, f32) {
        let mut upper = self.raw_ceiling;
        for band in &self.bands {
            if raw >= band.threshold {
                let span = (upper - band.threshold).max(f32::EPSILON);
                let t = ((raw - band.threshold) / span).clamp(0.0, 1.0);
                let display = band.display_floor + t * (band.display_ceil - band.display_floor);
                return (band.label, display);
            }
            upper = band.threshold;
        }
        // Raw score below every threshold (negative); pin to the bottom band.
        let bottom = &self.bands[self.bands.len() - 1];
        (bottom.label, bottom.display_floor)
    }
}
