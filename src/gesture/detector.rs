//! Flip detector: down-then-up within a window, debounced.

use super::sensitivity::{SensitivityProfile, DEBOUNCE_MS};
use super::{OrientationSample, TriggerEvent};

/// Coarse orientation of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Up,
    Down,
    Unknown,
}

impl Orientation {
    /// Classify by the z axis against threshold `g`
    pub fn classify(z: f32, g: f32) -> Self {
        if z > g {
            Self::Up
        } else if z < -g {
            Self::Down
        } else {
            Self::Unknown
        }
    }
}

/// Detector state. Only `Up` / `Down` are ever recorded.
#[derive(Debug, Default)]
pub struct FlipDetector {
    last_state: Option<Orientation>,
    down_at: u64,
    last_fire: Option<u64>,
}

impl FlipDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample; returns a trigger when a flip completes
    pub fn on_sample(
        &mut self,
        sample: &OrientationSample,
        profile: &SensitivityProfile,
    ) -> Option<TriggerEvent> {
        let thresholds = profile.thresholds();
        let state = Orientation::classify(sample.z, thresholds.gravity);

        if state == Orientation::Unknown || Some(state) == self.last_state {
            return None;
        }

        let now = sample.timestamp_ms;
        let prior = self.last_state.replace(state);

        match state {
            Orientation::Down => {
                self.down_at = now;
                None
            }
            Orientation::Up if prior == Some(Orientation::Down) => {
                let elapsed = now.saturating_sub(self.down_at);
                let debounced = match self.last_fire {
                    None => true,
                    Some(last) => now.saturating_sub(last) > DEBOUNCE_MS,
                };

                if elapsed < thresholds.max_duration_ms && debounced {
                    self.last_fire = Some(now);
                    tracing::debug!(elapsed_ms = elapsed, "Flip detected");
                    Some(TriggerEvent { timestamp_ms: now })
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
