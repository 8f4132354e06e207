//! UI-thread owner of the capture surface.

use uuid::Uuid;

use super::session::{
    AnalysisOutcome, AnalysisTicket, BulkOutcome, CaptureServices, CaptureSession, CommitAction,
    CommitOutcome, SessionOptions,
};
use super::SessionError;
use crate::extract::{ExtractionMode, ExtractionService};
use crate::ui::{UiCommand, UiDispatcher};

/// What handling a [`UiCommand`] did, for the host to render
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The surface is up; `reused` when a live session was already open
    Shown { session_id: Uuid, reused: bool },

    Analysis(AnalysisOutcome),

    /// Multi result saved without review
    BulkSaved(BulkOutcome),
}

/// Owns at most one session and runs extraction off-thread
pub struct CaptureCoordinator {
    defaults: SessionOptions,
    bulk_save_multi: bool,
    extraction: ExtractionService,
    services: CaptureServices,
    ui: UiDispatcher,
    session: Option<CaptureSession>,
}

impl CaptureCoordinator {
    pub fn new(
        defaults: SessionOptions,
        extraction: ExtractionService,
        services: CaptureServices,
        ui: UiDispatcher,
    ) -> Self {
        Self {
            defaults,
            bulk_save_multi: false,
            extraction,
            services,
            ui,
            session: None,
        }
    }

    /// Save Multi results straight away instead of reviewing them
    pub fn with_bulk_save(mut self, enabled: bool) -> Self {
        self.bulk_save_multi = enabled;
        self
    }

    pub fn services(&self) -> &CaptureServices {
        &self.services
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut CaptureSession> {
        self.session.as_mut()
    }

    /// Surface the capture UI with the default options
    pub fn show(&mut self) -> CaptureEvent {
        self.show_with(self.defaults)
    }

    /// Surface the capture UI; a live session is reused as is
    pub fn show_with(&mut self, options: SessionOptions) -> CaptureEvent {
        if let Some(session) = self.session.as_ref().filter(|s| s.state().is_live()) {
            tracing::debug!(session = %session.id(), "Reusing live capture session");
            return CaptureEvent::Shown {
                session_id: session.id(),
                reused: true,
            };
        }

        let session = CaptureSession::new(options);
        let session_id = session.id();
        tracing::info!(session = %session_id, mode = %options.mode, "Capture session opened");
        self.session = Some(session);
        CaptureEvent::Shown {
            session_id,
            reused: false,
        }
    }

    fn live_session(&mut self) -> Result<&mut CaptureSession, SessionError> {
        self.session
            .as_mut()
            .filter(|s| s.state().is_live())
            .ok_or(SessionError::NoSession)
    }

    /// Submit text and start extraction in a background task.
    ///
    /// The result comes back as [`UiCommand::AnalysisFinished`].
    pub fn submit(&mut self, text: impl Into<String>) -> Result<AnalysisTicket, SessionError> {
        let session = self.live_session()?;
        let mode = session.mode();
        let ticket = session.submit_text(text)?;

        let extraction = self.extraction.clone();
        let ui = self.ui.clone();
        let job = ticket.clone();
        tokio::spawn(async move {
            let result = extraction
                .analyze(&job.text, mode)
                .await
                .map_err(|e| e.to_string());
            if !ui.post(UiCommand::AnalysisFinished { ticket: job, result }) {
                tracing::debug!("UI owner gone; dropping analysis result");
            }
        });

        Ok(ticket)
    }

    /// Apply one command from the dispatcher
    pub fn handle(&mut self, command: UiCommand) -> Result<CaptureEvent, SessionError> {
        match command {
            UiCommand::ShowCapture { trigger } => {
                tracing::debug!(at = trigger.timestamp_ms, "Trigger admitted");
                Ok(self.show())
            }
            UiCommand::AnalysisFinished { ticket, result } => {
                let Some(session) = self.session.as_mut() else {
                    return Ok(CaptureEvent::Analysis(AnalysisOutcome::Stale));
                };
                let outcome = session.apply_analysis(&ticket, result);

                let bulk = self.bulk_save_multi
                    && session.mode() == ExtractionMode::Multi
                    && matches!(outcome, AnalysisOutcome::Reviewing { .. });
                if bulk {
                    let saved = session.bulk_save(&self.services)?;
                    self.release();
                    return Ok(CaptureEvent::BulkSaved(saved));
                }
                Ok(CaptureEvent::Analysis(outcome))
            }
        }
    }

    /// Commit the candidate under review
    pub fn commit(&mut self, action: CommitAction) -> Result<CommitOutcome, SessionError> {
        let services = self.services.clone();
        let outcome = self.live_session()?.commit(action, &services)?;
        self.release();
        Ok(outcome)
    }

    /// Cancel the live session, dropping anything still queued
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.live_session()?.cancel()?;
        self.release();
        Ok(())
    }

    /// Drop a session that reached a terminal state
    fn release(&mut self) {
        if self.session.as_ref().is_some_and(|s| !s.state().is_live()) {
            self.session = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ledger::LogLauncher;
    use crate::adapters::llm::{ChatRequest, CompletionClient};
    use crate::capture::SessionState;
    use crate::extract::ExtractionError;
    use crate::gesture::TriggerEvent;
    use crate::store::{BillStore, MemoryBillStore, Settings, SettingsStore};
    use crate::ui::ui_channel;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Fixed(&'static str);

    #[async_trait]
    impl CompletionClient for Fixed {
        async fn complete(&self, _request: ChatRequest) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    fn coordinator(
        reply: &'static str,
        mode: ExtractionMode,
    ) -> (
        CaptureCoordinator,
        Arc<MemoryBillStore>,
        tokio::sync::mpsc::UnboundedReceiver<UiCommand>,
    ) {
        let settings = Arc::new(SettingsStore::in_memory(Settings::default()));
        let bills = Arc::new(MemoryBillStore::new());
        let extraction = ExtractionService::new(
            Arc::new(Fixed(reply)),
            settings.clone(),
            settings.clone(),
            settings.clone(),
            settings.clone(),
        );
        let services = CaptureServices {
            bills: bills.clone(),
            ledger: Arc::new(LogLauncher),
            currencies: settings.clone(),
            taxonomy: settings,
            book_name: None,
        };
        let (ui, rx) = ui_channel();
        let options = SessionOptions {
            mode,
            single_save_local: false,
        };
        (CaptureCoordinator::new(options, extraction, services, ui), bills, rx)
    }

    #[tokio::test]
    async fn test_show_reuses_live_session() {
        let (mut c, _, _rx) = coordinator("{}", ExtractionMode::Single);
        let trigger = TriggerEvent { timestamp_ms: 1 };

        let first = match c.handle(UiCommand::ShowCapture { trigger }).unwrap() {
            CaptureEvent::Shown { session_id, reused } => {
                assert!(!reused);
                session_id
            }
            other => panic!("unexpected {:?}", other),
        };
        match c.handle(UiCommand::ShowCapture { trigger }).unwrap() {
            CaptureEvent::Shown { session_id, reused } => {
                assert!(reused);
                assert_eq!(session_id, first);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_round_trip_and_commit() {
        let reply = r#"{"amount":18,"type":0,"asset_name":"微信","category_name":"午餐"}"#;
        let (mut c, bills, mut rx) = coordinator(reply, ExtractionMode::Single);
        c.show();
        c.submit("lunch 18").unwrap();

        let command = rx.recv().await.unwrap();
        match c.handle(command).unwrap() {
            CaptureEvent::Analysis(AnalysisOutcome::Reviewing { pending }) => assert_eq!(pending, 1),
            other => panic!("unexpected {:?}", other),
        }

        let outcome = c.commit(CommitAction::SaveAndForward).unwrap();
        assert!(outcome.forwarded);
        assert!(c.session().is_none());
        assert_eq!(bills.all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_save_multi() {
        let reply = r#"{"candidates":[{"amount":3},{"amount":0},{"amount":5}]}"#;
        let (c, bills, mut rx) = coordinator(reply, ExtractionMode::Multi);
        let mut c = c.with_bulk_save(true);
        c.show();
        c.submit("three things").unwrap();

        let command = rx.recv().await.unwrap();
        match c.handle(command).unwrap() {
            CaptureEvent::BulkSaved(out) => {
                assert_eq!(out.saved.len(), 2);
                assert_eq!(out.skipped.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(bills.all().unwrap().len(), 2);
        assert!(c.session().is_none());
    }

    fn shown_id(event: CaptureEvent, expect_reused: bool) -> Uuid {
        match event {
            CaptureEvent::Shown { session_id, reused } => {
                assert_eq!(reused, expect_reused);
                session_id
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_show_reuses_analyzing_and_reviewing_session() {
        let reply = r#"{"amount":18,"type":0,"asset_name":"微信"}"#;
        let (mut c, _, mut rx) = coordinator(reply, ExtractionMode::Single);
        let id = shown_id(c.show(), false);

        c.submit("lunch 18").unwrap();
        assert_eq!(shown_id(c.show(), true), id);
        assert_eq!(c.session().unwrap().state(), SessionState::Analyzing);

        let command = rx.recv().await.unwrap();
        c.handle(command).unwrap();
        assert_eq!(c.session().unwrap().state(), SessionState::Reviewing);
        assert_eq!(shown_id(c.show(), true), id);
        assert_eq!(c.session().unwrap().state(), SessionState::Reviewing);
    }

    #[tokio::test]
    async fn test_late_result_after_cancel_is_stale() {
        let reply = r#"{"amount":18,"type":0,"asset_name":"微信"}"#;
        let (mut c, bills, mut rx) = coordinator(reply, ExtractionMode::Single);
        c.show();
        c.submit("lunch 18").unwrap();
        c.cancel().unwrap();
        assert!(c.session().is_none());

        let command = rx.recv().await.unwrap();
        match c.handle(command).unwrap() {
            CaptureEvent::Analysis(outcome) => assert_eq!(outcome, AnalysisOutcome::Stale),
            other => panic!("unexpected {:?}", other),
        }
        assert!(c.session().is_none());
        assert!(bills.all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commands_without_session() {
        let (mut c, _, _rx) = coordinator("{}", ExtractionMode::Single);
        assert!(matches!(c.submit("x"), Err(SessionError::NoSession)));
        assert!(matches!(c.cancel(), Err(SessionError::NoSession)));
    }
}
