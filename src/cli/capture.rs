//! Capture commands: the terminal stands in for the capture surface.
//!
//! - `flipledger capture [TEXT]` - analyze text (or `--audio FILE`) and review
//! - `flipledger listen --trace FILE` - replay an orientation trace; every
//!   admitted flip opens the same review flow on stdin

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;

use super::{open_stores, Stores};
use crate::adapters::{
    HttpTranscriber, LedgerLauncher, OpenAiCompatibleClient, OpenerLauncher, ShellForegroundQuery,
    Transcriber,
};
use crate::admission::{AdmissionController, BellHaptics};
use crate::capture::{
    AnalysisOutcome, CaptureCoordinator, CaptureEvent, CaptureForm, CaptureServices, CommitAction,
    NextStep, RecordingOutcome, SessionError, SessionOptions, SessionState,
};
use crate::domain::taxonomy::display_path;
use crate::domain::{BillKind, TIME_FORMAT};
use crate::extract::{ExtractionMode, ExtractionService};
use crate::gesture::{GestureMonitor, LineSensor, TriggerHandler};
use crate::ui::{ui_channel, UiCommand, UiDispatcher};

/// One line typed while reviewing a candidate
#[derive(Debug, Clone, PartialEq)]
enum ReviewCommand {
    Save,
    Forward,
    ToggleForward,
    Kind(BillKind),
    Amount(f64),
    Fee(f64),
    Memo(String),
    Category(String),
    Asset(String),
    CounterAsset(String),
    Cancel,
    Help,
}

const REVIEW_HELP: &str = "\
  s               save locally
  f               save and forward to the ledger app
  o               toggle forwarding for this candidate (multi)
  k <kind>        expense | income | transfer | repayment
  a <amount>      set amount
  e <fee>         set fee (transfer)
  m <memo>        set memo
  c <category>    set category path
  w <asset>       set asset
  t <asset>       set destination asset (transfer, repayment)
  x               cancel everything";

impl ReviewCommand {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((h, r)) => (h, r.trim()),
            None => (line, ""),
        };
        let number = |s: &str| s.parse::<f64>().map_err(|_| format!("Not a number: {}", s));

        match head {
            "s" | "save" => Ok(Self::Save),
            "f" | "forward" => Ok(Self::Forward),
            "o" => Ok(Self::ToggleForward),
            "k" | "kind" => rest
                .parse::<BillKind>()
                .map(Self::Kind)
                .map_err(|e| e.to_string()),
            "a" | "amount" => number(rest).map(Self::Amount),
            "e" | "fee" => number(rest).map(Self::Fee),
            "m" | "memo" => Ok(Self::Memo(rest.to_string())),
            "c" | "category" => Ok(Self::Category(rest.to_string())),
            "w" | "asset" => Ok(Self::Asset(rest.to_string())),
            "t" | "to" => Ok(Self::CounterAsset(rest.to_string())),
            "x" | "cancel" => Ok(Self::Cancel),
            "" | "?" | "h" | "help" => Ok(Self::Help),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// Preferred action when committing without review
fn default_action(actions: &[CommitAction]) -> Option<CommitAction> {
    actions
        .iter()
        .copied()
        .find(|a| *a == CommitAction::SaveAndForward)
        .or_else(|| actions.first().copied())
}

fn print_form(form: &CaptureForm, queued: usize) {
    let visible = form.visible_fields();
    println!();
    println!("── {} ─────────────────────────", form.kind);
    println!("  Amount:   {:.2} {}", form.amount, form.currency.as_deref().unwrap_or(""));
    println!("  Asset:    {}", form.asset_name);
    if visible.category {
        println!(
            "  Category: {}",
            form.category.as_deref().map(display_path).unwrap_or_default()
        );
    }
    if visible.counter_asset {
        println!("  To:       {}", form.counter_asset_name);
    }
    if visible.fee {
        println!("  Fee:      {:.2}", form.fee);
    }
    println!(
        "  Time:     {}",
        form.time
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| "now".to_string())
    );
    println!("  Memo:     {}", form.memo);
    if form.forward_override {
        println!("  (will be forwarded)");
    }
    if queued > 0 {
        println!("  {} more queued", queued);
    }
}

/// The capture surface on a terminal
struct Host {
    coordinator: CaptureCoordinator,
    rx: UnboundedReceiver<UiCommand>,
    input: Lines<BufReader<Stdin>>,
    auto_commit: bool,
}

fn llm_client(stores: &Stores) -> OpenAiCompatibleClient {
    let llm = &stores.config.llm;
    OpenAiCompatibleClient::new(llm.api_key.clone())
        .with_base_url(llm.base_url.clone())
        .with_model(llm.model.clone())
}

fn ledger_launcher(stores: &Stores) -> Arc<dyn LedgerLauncher> {
    match &stores.config.ledger_opener {
        Some((program, args)) => Arc::new(OpenerLauncher::new(program.clone(), args.clone())),
        None => Arc::new(OpenerLauncher::platform()),
    }
}

fn build_host(stores: &Stores, multi: bool, auto_commit: bool) -> (Host, UiDispatcher) {
    let (ui, rx) = ui_channel();
    let settings = stores.settings.clone();

    let extraction = ExtractionService::new(
        Arc::new(llm_client(stores)),
        settings.clone(),
        settings.clone(),
        settings.clone(),
        settings.clone(),
    );
    let services = CaptureServices {
        bills: stores.bills.clone(),
        ledger: ledger_launcher(stores),
        currencies: settings.clone(),
        taxonomy: settings,
        book_name: stores.config.capture.book_name.clone(),
    };
    let options = SessionOptions {
        mode: if multi { ExtractionMode::Multi } else { ExtractionMode::Single },
        single_save_local: stores.config.capture.single_save_local,
    };

    let coordinator = CaptureCoordinator::new(options, extraction, services, ui.clone())
        .with_bulk_save(stores.config.capture.bulk_save_multi);

    let host = Host {
        coordinator,
        rx,
        input: BufReader::new(tokio::io::stdin()).lines(),
        auto_commit,
    };
    (host, ui)
}

impl Host {
    /// `None` on end of input
    async fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        eprint!("{}> ", label);
        std::io::stderr().flush().ok();
        self.input.next_line().await.context("Failed to read from stdin")
    }

    /// Drive the open session until it commits or is cancelled
    async fn run(&mut self, mut initial: Option<String>) -> Result<()> {
        loop {
            let Some(state) = self.coordinator.session().map(|s| s.state()) else {
                return Ok(());
            };

            match state {
                SessionState::Input | SessionState::Recording => {
                    let text = match initial.take() {
                        Some(t) => Some(t),
                        None => self.prompt("What did you spend").await?,
                    };
                    match text.filter(|t| !t.trim().is_empty()) {
                        Some(text) => {
                            self.coordinator.submit(text)?;
                            eprintln!("⏳ Analyzing...");
                        }
                        None => {
                            self.coordinator.cancel()?;
                            println!("🛑 Capture cancelled");
                        }
                    }
                }
                SessionState::Analyzing => self.await_analysis().await?,
                SessionState::Reviewing => self.review_step().await?,
                SessionState::CancelPending | SessionState::Committed | SessionState::Cancelled => {
                    return Ok(())
                }
            }
        }
    }

    async fn await_analysis(&mut self) -> Result<()> {
        let command = self.rx.recv().await.context("UI channel closed")?;
        match self.coordinator.handle(command)? {
            CaptureEvent::Analysis(AnalysisOutcome::Reviewing { pending }) => {
                println!("🧾 {} candidate(s) to review", pending);
            }
            CaptureEvent::Analysis(AnalysisOutcome::Failed { .. })
            | CaptureEvent::Analysis(AnalysisOutcome::Empty) => {
                let notice = self
                    .coordinator
                    .session_mut()
                    .and_then(|s| s.take_notice())
                    .unwrap_or_default();
                eprintln!("⚠️  {}", notice);
                if self.auto_commit {
                    self.coordinator.cancel()?;
                    anyhow::bail!("Capture failed: {}", notice);
                }
            }
            CaptureEvent::BulkSaved(out) => {
                println!("✅ Saved {} bill(s) without review", out.saved.len());
                for reason in out.skipped {
                    eprintln!("⚠️  Skipped: {}", reason);
                }
            }
            CaptureEvent::Analysis(AnalysisOutcome::Stale) | CaptureEvent::Shown { .. } => {}
        }
        Ok(())
    }

    async fn review_step(&mut self) -> Result<()> {
        let Some(session) = self.coordinator.session() else {
            return Ok(());
        };
        let actions = session.available_actions();
        if let Some(form) = session.form() {
            print_form(form, session.queued());
        }

        if self.auto_commit {
            let action = default_action(&actions).context("No commit action available")?;
            return self.commit(action).map(|_| ());
        }

        let Some(line) = self.prompt("s/f/o/k/a/e/m/c/w/t/x, ? for help").await? else {
            self.coordinator.cancel()?;
            println!("🛑 Capture cancelled");
            return Ok(());
        };

        let command = match ReviewCommand::parse(&line) {
            Ok(c) => c,
            Err(message) => {
                eprintln!("⚠️  {}", message);
                return Ok(());
            }
        };

        let taxonomy = self.coordinator.services().taxonomy.clone();
        let Some(session) = self.coordinator.session_mut() else {
            return Ok(());
        };

        match command {
            ReviewCommand::Save => {
                self.commit(CommitAction::SaveLocal)?;
            }
            ReviewCommand::Forward => {
                self.commit(CommitAction::SaveAndForward)?;
            }
            ReviewCommand::Cancel => {
                self.coordinator.cancel()?;
                println!("🛑 Capture cancelled; queued candidates dropped");
            }
            ReviewCommand::Help => println!("{}", REVIEW_HELP),
            ReviewCommand::Kind(kind) => session.change_kind(kind, taxonomy.as_ref())?,
            ReviewCommand::Category(path) => {
                if let Some(form) = session.form_mut() {
                    form.category = Some(path).filter(|p| !p.is_empty());
                }
                let kind = session.form().map(|f| f.kind).unwrap_or_default();
                session.change_kind(kind, taxonomy.as_ref())?;
            }
            other => {
                if let Some(form) = session.form_mut() {
                    match other {
                        ReviewCommand::ToggleForward => form.forward_override = !form.forward_override,
                        ReviewCommand::Amount(v) => form.amount = v,
                        ReviewCommand::Fee(v) => form.fee = v,
                        ReviewCommand::Memo(m) => form.memo = m,
                        ReviewCommand::Asset(a) => form.asset_name = a,
                        ReviewCommand::CounterAsset(a) => form.counter_asset_name = a,
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Commit and report; validation problems keep the form open
    fn commit(&mut self, action: CommitAction) -> Result<bool> {
        match self.coordinator.commit(action) {
            Ok(outcome) => {
                let bill = &outcome.bill;
                println!(
                    "✅ Saved {:.2} {} ({})",
                    bill.amount,
                    display_path(&bill.category),
                    bill.asset_name
                );
                if outcome.forwarded {
                    println!("   → handed to the ledger app");
                }
                if let Some(err) = outcome.ledger_error {
                    eprintln!("⚠️  Ledger launch failed, bill kept locally: {}", err);
                }
                match outcome.next {
                    NextStep::Refilled { remaining } => println!("📥 {} remaining", remaining),
                    NextStep::Finished => println!("🏁 All done"),
                }
                Ok(true)
            }
            Err(
                e @ (SessionError::InvalidAmount(_)
                | SessionError::MissingAccounts(_)
                | SessionError::ActionUnavailable(_)),
            ) => {
                eprintln!("⚠️  {}", e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Record-style input: transcribe, then submit through the session
    async fn transcribe_into_session(&mut self, audio: &Path, transcriber: &dyn Transcriber) -> Result<Option<String>> {
        let Some(session) = self.coordinator.session_mut() else {
            return Ok(None);
        };
        session.start_recording()?;
        if session.finish_recording()? == RecordingOutcome::Discarded {
            return Ok(None);
        }

        eprintln!("🎙️  Transcribing {}...", audio.display());
        match transcriber.transcribe(audio).await {
            Ok(text) => {
                println!("📝 {}", text);
                Ok(Some(text))
            }
            Err(e) => {
                if let Some(session) = self.coordinator.session_mut() {
                    session.abort_recording(format!("Transcription failed: {}", e))?;
                    if let Some(notice) = session.take_notice() {
                        eprintln!("⚠️  {}", notice);
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Capture from text or audio
pub async fn execute_capture(
    text: Option<String>,
    audio: Option<PathBuf>,
    multi: bool,
    yes: bool,
) -> Result<()> {
    let stores = open_stores()?;
    let (mut host, _ui) = build_host(&stores, multi, yes);
    host.coordinator.show();

    let initial = match audio {
        Some(path) => {
            let transcriber = HttpTranscriber::new(llm_client(&stores))
                .with_model(stores.config.llm.transcription_model.clone());
            host.transcribe_into_session(&path, &transcriber).await?
        }
        None => text,
    };

    if yes && initial.is_none() {
        anyhow::bail!("--yes needs text or a successful transcription");
    }
    host.run(initial).await
}

/// Replay a trace through detector and admission; admitted flips open a capture
pub async fn execute_listen(trace: &Path, multi: bool) -> Result<()> {
    let stores = open_stores()?;
    let (mut host, ui) = build_host(&stores, multi, false);

    let foreground = Arc::new(ShellForegroundQuery::new(stores.config.foreground_wrapper.clone()));
    let admission = Arc::new(AdmissionController::new(
        stores.config.capture.own_identity.clone(),
        foreground,
        stores.settings.clone(),
        Arc::new(BellHaptics),
        ui,
    ));
    let on_trigger: TriggerHandler = {
        let admission = admission.clone();
        Arc::new(move |trigger| {
            admission.on_trigger(trigger);
        })
    };

    let file = std::fs::File::open(trace)
        .with_context(|| format!("Failed to open trace: {}", trace.display()))?;
    let sensor = Arc::new(LineSensor::new(std::io::BufReader::new(file)));
    let mut monitor = GestureMonitor::new(sensor, stores.settings.clone(), on_trigger);

    let watch = stores.settings.watch().context("Failed to watch settings")?;
    if !monitor.start() {
        anyhow::bail!("No orientation sensor available");
    }

    println!("👁️  Listening: {}", trace.display());
    println!("    Sensitivity: {}", stores.settings.snapshot().sensitivity);
    println!("    Press Ctrl+C to stop, Ctrl+D cancels an open capture");
    println!();

    let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        let _ = stop_tx.send(());
    });

    loop {
        tokio::select! {
            Some(command) = host.rx.recv() => {
                if let CaptureEvent::Shown { reused: false, .. } = host.coordinator.handle(command)? {
                    println!("📳 Flip detected");
                    host.run(None).await?;
                }
            }
            _ = &mut stop_rx => {
                println!();
                println!("🛑 Stopping listener...");
                break;
            }
        }
    }

    monitor.stop();
    watch.stop();
    Ok(())
}
