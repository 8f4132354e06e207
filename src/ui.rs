//! Cross-thread handoff to the UI-owning task.
//!
//! The sensor thread and extraction tasks never touch capture state
//! directly; they post a [`UiCommand`] and the owner applies it.

use tokio::sync::mpsc;

use crate::capture::AnalysisTicket;
use crate::domain::ReconciledCandidate;
use crate::gesture::TriggerEvent;

/// Work for the UI owner
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// An admitted trigger: surface (or reuse) the capture session
    ShowCapture { trigger: TriggerEvent },

    /// Extraction finished for a ticket; errors arrive pre-rendered
    AnalysisFinished {
        ticket: AnalysisTicket,
        result: Result<Vec<ReconciledCandidate>, String>,
    },
}

/// Sending half, cheap to clone into any thread
#[derive(Debug, Clone)]
pub struct UiDispatcher {
    tx: mpsc::UnboundedSender<UiCommand>,
}

impl UiDispatcher {
    /// Post a command; returns false once the UI owner is gone
    pub fn post(&self, command: UiCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Create the dispatcher and the receiver the UI owner drains
pub fn ui_channel() -> (UiDispatcher, mpsc::UnboundedReceiver<UiCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiDispatcher { tx }, rx)
}
