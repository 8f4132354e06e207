//! One capture session: input, analysis, queued review, commit or cancel.
//!
//! ```text
//! Input -> Recording (<-> CancelPending) -> Analyzing -> Reviewing -> Committed
//!                                                     any live state -> Cancelled
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::form::CaptureForm;
use super::SessionError;
use crate::adapters::ledger::{build_ledger_url, LedgerLauncher};
use crate::domain::{Bill, ReconciledCandidate};
use crate::extract::ExtractionMode;
use crate::store::{BillStore, CurrencyStore, TaxonomyStore};

/// Drag distance past which releasing discards the recording
pub const CANCEL_DRAG_THRESHOLD: f32 = 150.0;

/// Notice shown when analysis succeeded but found nothing
pub const NOTHING_RECOGNISED: &str = "Nothing recognised; edit the text and try again";

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Input,
    Recording,
    CancelPending,
    Analyzing,
    Reviewing,
    Committed,
    Cancelled,
}

impl SessionState {
    /// False once the session reached a terminal state
    pub fn is_live(self) -> bool {
        !matches!(self, SessionState::Committed | SessionState::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Input => "input",
            SessionState::Recording => "recording",
            SessionState::CancelPending => "cancel_pending",
            SessionState::Analyzing => "analyzing",
            SessionState::Reviewing => "reviewing",
            SessionState::Committed => "committed",
            SessionState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Identifies one analysis request; results for stale tickets are dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTicket {
    pub session_id: Uuid,
    pub generation: u64,
    pub text: String,
}

/// How a candidate is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitAction {
    /// Write to the local bill store only
    SaveLocal,

    /// Write locally, then hand off to the external ledger
    SaveAndForward,
}

/// Host switches for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub mode: ExtractionMode,

    /// Offer SaveLocal in Single sessions as well
    pub single_save_local: bool,
}

/// Collaborators used on commit
#[derive(Clone)]
pub struct CaptureServices {
    pub bills: Arc<dyn BillStore>,
    pub ledger: Arc<dyn LedgerLauncher>,
    pub currencies: Arc<dyn CurrencyStore>,
    pub taxonomy: Arc<dyn TaxonomyStore>,
    pub book_name: Option<String>,
}

/// Result of releasing the record control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingOutcome {
    /// Released inside the cancel zone; the recording is gone
    Discarded,

    /// Released normally; transcribe and submit the text
    Kept,
}

/// What applying an analysis result did
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Ticket no longer current; nothing changed
    Stale,

    /// Back to input with the text preserved
    Failed { message: String },

    /// Success without candidates; back to input with the text preserved
    Empty,

    /// Reviewing the queue head; `pending` counts it and everything queued
    Reviewing { pending: usize },
}

/// What happens after a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// The next candidate was loaded into the same form
    Refilled { remaining: usize },

    /// Queue exhausted; the surface is released
    Finished,
}

/// Result of one commit
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub bill: Bill,
    pub forwarded: bool,

    /// Ledger launch failure; the local write stands
    pub ledger_error: Option<String>,

    pub next: NextStep,
}

/// Result of saving a whole Multi result without review
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub saved: Vec<Bill>,

    /// Candidates that failed validation or could not be written, with the reason
    pub skipped: Vec<String>,
}

/// State machine for one capture surface
#[derive(Debug)]
pub struct CaptureSession {
    id: Uuid,
    options: SessionOptions,
    state: SessionState,
    generation: u64,
    text: String,
    notice: Option<String>,
    form: Option<CaptureForm>,
    queue: VecDeque<ReconciledCandidate>,
}

impl CaptureSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            options,
            state: SessionState::Input,
            generation: 0,
            text: String::new(),
            notice: None,
            form: None,
            queue: VecDeque::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn mode(&self) -> ExtractionMode {
        self.options.mode
    }

    /// Current input text (kept across failed or empty analyses)
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Take the latest user-facing notice
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn form(&self) -> Option<&CaptureForm> {
        self.form.as_ref()
    }

    /// Edit the form under review
    pub fn form_mut(&mut self) -> Option<&mut CaptureForm> {
        if self.state == SessionState::Reviewing {
            self.form.as_mut()
        } else {
            None
        }
    }

    /// Candidates waiting behind the one under review
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn expect_state(&self, action: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.expect_state("edit text", &[SessionState::Input])?;
        self.text = text.into();
        Ok(())
    }

    pub fn start_recording(&mut self) -> Result<(), SessionError> {
        self.expect_state("start recording", &[SessionState::Input])?;
        self.state = SessionState::Recording;
        Ok(())
    }

    /// Track the cancel drag while recording
    pub fn drag(&mut self, distance: f32) -> Result<SessionState, SessionError> {
        self.expect_state(
            "drag",
            &[SessionState::Recording, SessionState::CancelPending],
        )?;
        self.state = if distance > CANCEL_DRAG_THRESHOLD {
            SessionState::CancelPending
        } else {
            SessionState::Recording
        };
        Ok(self.state)
    }

    /// Release the record control
    pub fn finish_recording(&mut self) -> Result<RecordingOutcome, SessionError> {
        self.expect_state(
            "finish recording",
            &[SessionState::Recording, SessionState::CancelPending],
        )?;
        if self.state == SessionState::CancelPending {
            self.state = SessionState::Input;
            Ok(RecordingOutcome::Discarded)
        } else {
            Ok(RecordingOutcome::Kept)
        }
    }

    /// Transcription failed; return to input keeping the typed text
    pub fn abort_recording(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        self.expect_state("abort recording", &[SessionState::Recording])?;
        self.state = SessionState::Input;
        self.notice = Some(message.into());
        Ok(())
    }

    /// Start an analysis; the returned ticket must accompany the result
    pub fn submit_text(&mut self, text: impl Into<String>) -> Result<AnalysisTicket, SessionError> {
        self.expect_state("submit", &[SessionState::Input, SessionState::Recording])?;
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::EmptyText);
        }

        self.text = text.clone();
        self.generation += 1;
        self.state = SessionState::Analyzing;
        Ok(AnalysisTicket {
            session_id: self.id,
            generation: self.generation,
            text,
        })
    }

    pub fn is_current(&self, ticket: &AnalysisTicket) -> bool {
        ticket.session_id == self.id
            && ticket.generation == self.generation
            && self.state == SessionState::Analyzing
    }

    /// Apply an analysis result. Stale tickets change nothing.
    pub fn apply_analysis(
        &mut self,
        ticket: &AnalysisTicket,
        result: Result<Vec<ReconciledCandidate>, String>,
    ) -> AnalysisOutcome {
        if !self.is_current(ticket) {
            tracing::debug!(generation = ticket.generation, "Dropping stale analysis result");
            return AnalysisOutcome::Stale;
        }

        match result {
            Err(message) => {
                self.state = SessionState::Input;
                self.text = ticket.text.clone();
                self.notice = Some(message.clone());
                AnalysisOutcome::Failed { message }
            }
            Ok(candidates) if candidates.is_empty() => {
                self.state = SessionState::Input;
                self.text = ticket.text.clone();
                self.notice = Some(NOTHING_RECOGNISED.to_string());
                AnalysisOutcome::Empty
            }
            Ok(candidates) => {
                self.queue = candidates.into();
                self.state = SessionState::Reviewing;
                self.load_next();
                AnalysisOutcome::Reviewing {
                    pending: self.queue.len() + 1,
                }
            }
        }
    }

    fn load_next(&mut self) -> bool {
        match self.queue.pop_front() {
            Some(candidate) => {
                self.form = Some(CaptureForm::from_candidate(candidate));
                true
            }
            None => {
                self.form = None;
                false
            }
        }
    }

    /// Actions offered for the form under review
    pub fn available_actions(&self) -> Vec<CommitAction> {
        if self.state != SessionState::Reviewing {
            return Vec::new();
        }
        let forward_override = self.form.as_ref().is_some_and(|f| f.forward_override);
        match self.options.mode {
            ExtractionMode::Single if self.options.single_save_local => {
                vec![CommitAction::SaveLocal, CommitAction::SaveAndForward]
            }
            ExtractionMode::Single => vec![CommitAction::SaveAndForward],
            ExtractionMode::Multi if forward_override => {
                vec![CommitAction::SaveLocal, CommitAction::SaveAndForward]
            }
            ExtractionMode::Multi => vec![CommitAction::SaveLocal],
        }
    }

    /// Change the kind of the form under review
    pub fn change_kind(
        &mut self,
        kind: crate::domain::BillKind,
        taxonomy: &dyn TaxonomyStore,
    ) -> Result<(), SessionError> {
        self.expect_state("change kind", &[SessionState::Reviewing])?;
        let nodes = kind.taxonomy().map(|t| taxonomy.taxonomy(t)).unwrap_or_default();
        if let Some(form) = self.form.as_mut() {
            form.set_kind(kind, &nodes);
        }
        Ok(())
    }

    /// Commit the form under review, then refill or finish
    #[tracing::instrument(skip(self, services), fields(session = %self.id))]
    pub fn commit(
        &mut self,
        action: CommitAction,
        services: &CaptureServices,
    ) -> Result<CommitOutcome, SessionError> {
        self.expect_state("commit", &[SessionState::Reviewing])?;
        if !self.available_actions().contains(&action) {
            return Err(SessionError::ActionUnavailable(action));
        }
        let form = self.form.as_ref().ok_or(SessionError::NothingToCommit)?;

        let prepared = form.prepare(&services.currencies.currencies(), services.book_name.as_deref())?;

        // Local write first; a ledger failure never undoes it
        services.bills.add(prepared.bill.clone())?;
        tracing::info!(amount = prepared.bill.amount, kind = %prepared.bill.kind, "Bill saved");

        let mut forwarded = false;
        let mut ledger_error = None;
        if action == CommitAction::SaveAndForward {
            let url = build_ledger_url(&prepared.ledger);
            match services.ledger.launch(&url) {
                Ok(()) => forwarded = true,
                Err(e) => {
                    tracing::warn!("Ledger launch failed: {}", e);
                    ledger_error = Some(e.to_string());
                }
            }
        }

        let next = if self.load_next() {
            NextStep::Refilled {
                remaining: self.queue.len() + 1,
            }
        } else {
            self.state = SessionState::Committed;
            NextStep::Finished
        };

        Ok(CommitOutcome {
            bill: prepared.bill,
            forwarded,
            ledger_error,
            next,
        })
    }

    /// Save the form under review and everything queued, without review.
    /// Multi sessions only. Store failures land in `skipped`; the session
    /// always ends `Committed`.
    pub fn bulk_save(&mut self, services: &CaptureServices) -> Result<BulkOutcome, SessionError> {
        self.expect_state("bulk save", &[SessionState::Reviewing])?;
        if self.options.mode != ExtractionMode::Multi {
            return Err(SessionError::InvalidState {
                action: "bulk save",
                state: self.state,
            });
        }

        let currencies = services.currencies.currencies();
        let mut outcome = BulkOutcome::default();
        let forms = self
            .form
            .take()
            .into_iter()
            .chain(self.queue.drain(..).map(CaptureForm::from_candidate));

        for form in forms {
            match form.prepare(&currencies, services.book_name.as_deref()) {
                Ok(prepared) => match services.bills.add(prepared.bill.clone()) {
                    Ok(()) => outcome.saved.push(prepared.bill),
                    Err(e) => {
                        tracing::warn!("Bulk save could not write bill: {}", e);
                        outcome.skipped.push(e.to_string());
                    }
                },
                Err(e) => outcome.skipped.push(e.to_string()),
            }
        }

        tracing::info!(
            saved = outcome.saved.len(),
            skipped = outcome.skipped.len(),
            "Bulk save finished"
        );
        self.state = SessionState::Committed;
        Ok(outcome)
    }

    /// Abandon the session from any live state; the queue is cleared
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        if !self.state.is_live() {
            return Err(SessionError::InvalidState {
                action: "cancel",
                state: self.state,
            });
        }
        let dropped = self.queue.len() + usize::from(self.form.is_some());
        self.queue.clear();
        self.form = None;
        self.state = SessionState::Cancelled;
        tracing::info!(dropped, "Capture cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ledger::{LedgerError, LogLauncher};
    use crate::domain::BillKind;
    use crate::domain::BillIdentity;
    use crate::store::{JsonBillStore, MemoryBillStore, Settings, SettingsStore, StoreError};
    use chrono::Timelike;

    fn candidate(amount: f64) -> ReconciledCandidate {
        ReconciledCandidate {
            amount,
            kind: BillKind::Expense,
            asset_name: "微信".into(),
            asset_known: true,
            counter_asset_name: None,
            category: Some("餐饮/::/午餐".into()),
            icon: String::new(),
            time: None,
            memo: String::new(),
            currency: None,
            fee: 0.0,
        }
    }

    fn services(ledger: Arc<dyn LedgerLauncher>) -> (CaptureServices, Arc<MemoryBillStore>) {
        let settings = Arc::new(SettingsStore::in_memory(Settings::default()));
        let bills = Arc::new(MemoryBillStore::new());
        let services = CaptureServices {
            bills: bills.clone(),
            ledger,
            currencies: settings.clone(),
            taxonomy: settings,
            book_name: None,
        };
        (services, bills)
    }

    fn reviewing(mode: ExtractionMode, amounts: &[f64]) -> CaptureSession {
        let mut s = CaptureSession::new(SessionOptions {
            mode,
            single_save_local: false,
        });
        let ticket = s.submit_text("text").unwrap();
        let cands = amounts.iter().map(|a| candidate(*a)).collect();
        s.apply_analysis(&ticket, Ok(cands));
        s
    }

    struct BrokenLedger;

    impl LedgerLauncher for BrokenLedger {
        fn launch(&self, _url: &str) -> Result<(), LedgerError> {
            Err(LedgerError::OpenerUnavailable("open".into()))
        }
    }

    #[test]
    fn test_cancel_drag_threshold() {
        let mut s = CaptureSession::new(SessionOptions::default());
        s.start_recording().unwrap();
        assert_eq!(s.drag(150.0).unwrap(), SessionState::Recording);
        assert_eq!(s.drag(151.0).unwrap(), SessionState::CancelPending);
        assert_eq!(s.drag(20.0).unwrap(), SessionState::Recording);
        s.drag(400.0).unwrap();
        assert_eq!(s.finish_recording().unwrap(), RecordingOutcome::Discarded);
        assert_eq!(s.state(), SessionState::Input);
    }

    #[test]
    fn test_kept_recording_submits() {
        let mut s = CaptureSession::new(SessionOptions::default());
        s.start_recording().unwrap();
        assert_eq!(s.finish_recording().unwrap(), RecordingOutcome::Kept);
        s.submit_text("coffee 12").unwrap();
        assert_eq!(s.state(), SessionState::Analyzing);
    }

    #[test]
    fn test_failure_and_empty_keep_text() {
        let mut s = CaptureSession::new(SessionOptions::default());
        let t = s.submit_text("dinner 80").unwrap();
        assert!(matches!(
            s.apply_analysis(&t, Err("timeout".into())),
            AnalysisOutcome::Failed { .. }
        ));
        assert_eq!(s.state(), SessionState::Input);
        assert_eq!(s.text(), "dinner 80");
        assert_eq!(s.take_notice().as_deref(), Some("timeout"));

        let t = s.submit_text("dinner 80").unwrap();
        assert_eq!(s.apply_analysis(&t, Ok(vec![])), AnalysisOutcome::Empty);
        assert_eq!(s.text(), "dinner 80");
        assert_eq!(s.take_notice().as_deref(), Some(NOTHING_RECOGNISED));
    }

    #[test]
    fn test_stale_ticket_dropped() {
        let mut s = CaptureSession::new(SessionOptions::default());
        let old = s.submit_text("first").unwrap();
        s.apply_analysis(&old, Err("x".into()));
        let current = s.submit_text("second").unwrap();

        assert_eq!(s.apply_analysis(&old, Ok(vec![candidate(1.0)])), AnalysisOutcome::Stale);
        assert_eq!(s.state(), SessionState::Analyzing);

        let other = CaptureSession::new(SessionOptions::default());
        let foreign = AnalysisTicket {
            session_id: other.id(),
            ..current.clone()
        };
        assert_eq!(s.apply_analysis(&foreign, Ok(vec![])), AnalysisOutcome::Stale);
        assert!(s.is_current(&current));
    }

    #[test]
    fn test_available_actions() {
        let s = reviewing(ExtractionMode::Single, &[1.0]);
        assert_eq!(s.available_actions(), vec![CommitAction::SaveAndForward]);

        let mut s = CaptureSession::new(SessionOptions {
            mode: ExtractionMode::Single,
            single_save_local: true,
        });
        let t = s.submit_text("x").unwrap();
        s.apply_analysis(&t, Ok(vec![candidate(1.0)]));
        assert_eq!(
            s.available_actions(),
            vec![CommitAction::SaveLocal, CommitAction::SaveAndForward]
        );

        let mut s = reviewing(ExtractionMode::Multi, &[1.0]);
        assert_eq!(s.available_actions(), vec![CommitAction::SaveLocal]);
        s.form_mut().unwrap().forward_override = true;
        assert!(s.available_actions().contains(&CommitAction::SaveAndForward));
    }

    #[test]
    fn test_commit_refills_then_finishes() {
        let (svc, bills) = services(Arc::new(LogLauncher));
        let mut s = reviewing(ExtractionMode::Multi, &[1.0, 2.0]);

        let first = s.commit(CommitAction::SaveLocal, &svc).unwrap();
        assert_eq!(first.next, NextStep::Refilled { remaining: 1 });
        assert!(!first.forwarded);
        assert_eq!(s.form().unwrap().amount, 2.0);

        let second = s.commit(CommitAction::SaveLocal, &svc).unwrap();
        assert_eq!(second.next, NextStep::Finished);
        assert_eq!(s.state(), SessionState::Committed);
        assert_eq!(bills.all().unwrap().len(), 2);
    }

    #[test]
    fn test_ledger_failure_keeps_local_write() {
        let (svc, bills) = services(Arc::new(BrokenLedger));
        let mut s = reviewing(ExtractionMode::Single, &[9.0]);
        let out = s.commit(CommitAction::SaveAndForward, &svc).unwrap();
        assert!(!out.forwarded);
        assert!(out.ledger_error.is_some());
        assert_eq!(bills.all().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_commit_rejected() {
        let (svc, bills) = services(Arc::new(LogLauncher));
        let mut s = reviewing(ExtractionMode::Single, &[0.0]);
        assert!(matches!(
            s.commit(CommitAction::SaveLocal, &svc),
            Err(SessionError::ActionUnavailable(_))
        ));
        assert!(matches!(
            s.commit(CommitAction::SaveAndForward, &svc),
            Err(SessionError::InvalidAmount(_))
        ));
        assert_eq!(s.state(), SessionState::Reviewing);
        assert!(bills.all().unwrap().is_empty());
    }

    struct FullBillStore {
        inner: MemoryBillStore,
        capacity: usize,
    }

    impl BillStore for FullBillStore {
        fn add(&self, bill: Bill) -> Result<(), StoreError> {
            if self.inner.all()?.len() >= self.capacity {
                return Err(StoreError::Lock("bills.lock".into()));
            }
            self.inner.add(bill)
        }

        fn delete_many(&self, identities: &[BillIdentity]) -> Result<usize, StoreError> {
            self.inner.delete_many(identities)
        }

        fn all(&self) -> Result<Vec<Bill>, StoreError> {
            self.inner.all()
        }

        fn replace_all(&self, bills: Vec<Bill>) -> Result<(), StoreError> {
            self.inner.replace_all(bills)
        }
    }

    #[test]
    fn test_bulk_save_write_failure_still_terminates() {
        let (mut svc, _) = services(Arc::new(LogLauncher));
        let store = Arc::new(FullBillStore {
            inner: MemoryBillStore::new(),
            capacity: 1,
        });
        let bills: Arc<dyn BillStore> = store.clone();
        svc.bills = bills;

        let mut s = reviewing(ExtractionMode::Multi, &[1.0, 2.0, 3.0]);
        let out = s.bulk_save(&svc).unwrap();
        assert_eq!(out.saved.len(), 1);
        assert_eq!(out.skipped.len(), 2);
        assert_eq!(s.state(), SessionState::Committed);
        assert_eq!(s.queued(), 0);
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn test_committed_bill_matches_stored_identity() {
        let temp = tempfile::TempDir::new().unwrap();
        let (mut svc, _) = services(Arc::new(LogLauncher));
        let store = Arc::new(JsonBillStore::at(temp.path().join("bills.json")));
        let bills: Arc<dyn BillStore> = store.clone();
        svc.bills = bills;

        let mut s = reviewing(ExtractionMode::Multi, &[12.5]);
        assert!(s.form().unwrap().time.is_none());
        let out = s.commit(CommitAction::SaveLocal, &svc).unwrap();

        assert_eq!(out.bill.time.nanosecond(), 0);
        let stored = store.all().unwrap();
        assert_eq!(stored[0].identity(), out.bill.identity());
        assert_eq!(store.delete_many(&[out.bill.identity()]).unwrap(), 1);
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_clears_queue() {
        let mut s = reviewing(ExtractionMode::Multi, &[1.0, 2.0, 3.0]);
        assert_eq!(s.queued(), 2);
        s.cancel().unwrap();
        assert_eq!(s.queued(), 0);
        assert!(s.form().is_none());
        assert_eq!(s.state(), SessionState::Cancelled);
        assert!(s.cancel().is_err());
    }
}
