//! Admission control: may a trigger surface the capture UI right now?
//!
//! Precedence, first match wins:
//! 1. the foreground app is this app -> admit
//! 2. allow-list non-empty and contains the app -> admit
//! 3. allow-list non-empty and lacks the app -> deny
//! 4. allow-list empty -> admit only when the foreground app is unknown

use std::sync::Arc;
use std::time::Duration;

use crate::gesture::TriggerEvent;
use crate::store::AllowListStore;
use crate::ui::{UiCommand, UiDispatcher};

/// Haptic pulse length on admit
pub const ADMIT_PULSE: Duration = Duration::from_millis(50);

/// Resolves which application is in the foreground
pub trait ForegroundQuery: Send + Sync {
    /// `None` when unknown or when the privilege to ask is unavailable
    fn current_foreground_identity(&self) -> Option<String>;
}

/// Vibration (or any tactile/audible cue)
pub trait Haptics: Send + Sync {
    fn pulse(&self, duration: Duration);
}

/// No-op haptics for hosts without a motor
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&self, _duration: Duration) {}
}

/// Terminal bell
pub struct BellHaptics;

impl Haptics for BellHaptics {
    fn pulse(&self, _duration: Duration) {
        eprint!("\x07");
    }
}

/// Outcome of one admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admitted,
    Denied { identity: Option<String> },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }
}

/// Pure precedence rule
pub fn decide(own_identity: &str, foreground: Option<&str>, allow_list: &[String]) -> Decision {
    if foreground == Some(own_identity) {
        return Decision::Admitted;
    }

    let admitted = if allow_list.is_empty() {
        foreground.is_none()
    } else {
        foreground.is_some_and(|id| allow_list.iter().any(|a| a == id))
    };

    if admitted {
        Decision::Admitted
    } else {
        Decision::Denied {
            identity: foreground.map(str::to_string),
        }
    }
}

/// Runs on the sensor delivery thread
pub struct AdmissionController {
    own_identity: String,
    foreground: Arc<dyn ForegroundQuery>,
    allow_list: Arc<dyn AllowListStore>,
    haptics: Arc<dyn Haptics>,
    ui: UiDispatcher,
}

impl AdmissionController {
    pub fn new(
        own_identity: impl Into<String>,
        foreground: Arc<dyn ForegroundQuery>,
        allow_list: Arc<dyn AllowListStore>,
        haptics: Arc<dyn Haptics>,
        ui: UiDispatcher,
    ) -> Self {
        Self {
            own_identity: own_identity.into(),
            foreground,
            allow_list,
            haptics,
            ui,
        }
    }

    /// Decide, and on admit pulse then hand off to the UI owner
    #[tracing::instrument(skip(self))]
    pub fn on_trigger(&self, trigger: TriggerEvent) -> Decision {
        let identity = self.foreground.current_foreground_identity();
        let allow_list = self.allow_list.allow_list();
        let decision = decide(&self.own_identity, identity.as_deref(), &allow_list);

        match &decision {
            Decision::Admitted => {
                self.haptics.pulse(ADMIT_PULSE);
                if !self.ui.post(UiCommand::ShowCapture { trigger }) {
                    tracing::warn!("UI owner gone; dropping admitted trigger");
                }
            }
            Decision::Denied { identity } => {
                tracing::debug!(foreground = ?identity, "Trigger denied");
            }
        }

        decision
    }
}
