//! Sensitivity profiles and the thresholds they map to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed custom gravity threshold (g)
pub const GRAVITY_RANGE: (f32, f32) = (1.0, 20.0);

/// Allowed custom flip window (ms)
pub const DURATION_RANGE_MS: (u64, u64) = (50, 5000);

/// Minimum gap between two triggers, independent of sensitivity
pub const DEBOUNCE_MS: u64 = 500;

/// Errors raised when validating a profile
#[derive(Debug, Error, PartialEq)]
pub enum SensitivityError {
    #[error("Sensitivity level must be within 0..=100, got {0}")]
    LevelOutOfRange(u8),

    #[error("Gravity threshold must be within {min}..={max} g, got {value}")]
    GravityOutOfRange { value: f32, min: f32, max: f32 },

    #[error("Max duration must be within {min}..={max} ms, got {value}")]
    DurationOutOfRange { value: u64, min: u64, max: u64 },
}

/// The active sensitivity setting (exactly one is active)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SensitivityProfile {
    /// Single 0..=100 slider; higher means a harder, faster flip
    Standard { level: u8 },

    /// Explicit thresholds
    Custom {
        gravity_threshold: f32,
        max_duration_ms: u64,
    },
}

impl Default for SensitivityProfile {
    fn default() -> Self {
        Self::Standard { level: 50 }
    }
}

/// Concrete detector thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub gravity: f32,
    pub max_duration_ms: u64,
}

impl SensitivityProfile {
    /// Build a standard profile, rejecting out-of-range levels
    pub fn standard(level: u8) -> Result<Self, SensitivityError> {
        let profile = Self::Standard { level };
        profile.validate()?;
        Ok(profile)
    }

    /// Build a custom profile, rejecting out-of-range values (never clamps)
    pub fn custom(gravity_threshold: f32, max_duration_ms: u64) -> Result<Self, SensitivityError> {
        let profile = Self::Custom {
            gravity_threshold,
            max_duration_ms,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), SensitivityError> {
        match *self {
            Self::Standard { level } if level > 100 => Err(SensitivityError::LevelOutOfRange(level)),
            Self::Standard { .. } => Ok(()),
            Self::Custom {
                gravity_threshold,
                max_duration_ms,
            } => {
                let (gmin, gmax) = GRAVITY_RANGE;
                if !(gmin..=gmax).contains(&gravity_threshold) {
                    return Err(SensitivityError::GravityOutOfRange {
                        value: gravity_threshold,
                        min: gmin,
                        max: gmax,
                    });
                }
                let (dmin, dmax) = DURATION_RANGE_MS;
                if !(dmin..=dmax).contains(&max_duration_ms) {
                    return Err(SensitivityError::DurationOutOfRange {
                        value: max_duration_ms,
                        min: dmin,
                        max: dmax,
                    });
                }
                Ok(())
            }
        }
    }

    /// Map to detector thresholds.
    ///
    /// Standard: `g = 5.5 + p/100 * 3.5`, `window = 800 - 5p` ms.
    pub fn thresholds(&self) -> Thresholds {
        match *self {
            Self::Standard { level } => {
                let p = level.min(100);
                Thresholds {
                    gravity: 5.5 + (p as f32 / 100.0) * 3.5,
                    max_duration_ms: 800 - 5 * p as u64,
                }
            }
            Self::Custom {
                gravity_threshold,
                max_duration_ms,
            } => Thresholds {
                gravity: gravity_threshold,
                max_duration_ms,
            },
        }
    }
}

impl std::fmt::Display for SensitivityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.thresholds();
        match self {
            Self::Standard { level } => write!(
                f,
                "standard (level {}): {:.2} g within {} ms",
                level, t.gravity, t.max_duration_ms
            ),
            Self::Custom { .. } => write!(
                f,
                "custom: {:.2} g within {} ms",
                t.gravity, t.max_duration_ms
            ),
        }
    }
}

/// Snapshot read of the active profile, consulted on every sample
pub trait ProfileSource: Send + Sync {
    fn active_profile(&self) -> SensitivityProfile;
}

/// Fixed profile, for hosts without a settings store
impl ProfileSource for SensitivityProfile {
    fn active_profile(&self) -> SensitivityProfile {
        *self
    }
}
