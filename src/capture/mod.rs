//! Capture queue: review, edit and commit extracted candidates.
//!
//! A [`CaptureCoordinator`] owns at most one [`CaptureSession`] and is driven
//! by the UI-owning task. Everything else reaches it through
//! [`crate::ui::UiCommand`].

pub mod coordinator;
pub mod form;
pub mod session;

use thiserror::Error;

use crate::domain::BillKind;
use crate::store::StoreError;

pub use coordinator::{CaptureCoordinator, CaptureEvent};
pub use form::{CaptureForm, PreparedCommit};
pub use session::{
    AnalysisOutcome, AnalysisTicket, BulkOutcome, CaptureServices, CaptureSession, CommitAction,
    CommitOutcome, NextStep, RecordingOutcome, SessionOptions, SessionState,
};

/// Errors raised by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("Amount must be greater than zero (got {0})")]
    InvalidAmount(f64),

    #[error("{0} needs both a source and a destination account")]
    MissingAccounts(BillKind),

    #[error("Action {0:?} is not offered for this candidate")]
    ActionUnavailable(CommitAction),

    #[error("Nothing to analyze: text is empty")]
    EmptyText,

    #[error("No candidate under review")]
    NothingToCommit,

    #[error("No capture session is open")]
    NoSession,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
