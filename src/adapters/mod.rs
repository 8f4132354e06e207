//! Adapters for external systems.
//!
//! - `llm`: OpenAI-compatible chat completion
//! - `transcriber`: speech-to-text upload
//! - `ledger`: external bookkeeping app URL scheme
//! - `foreground`: which app is on screen

pub mod foreground;
pub mod ledger;
pub mod llm;
pub mod transcriber;

pub use foreground::{FixedForeground, ShellForegroundQuery};
pub use ledger::{build_ledger_url, LedgerError, LedgerLauncher, LedgerRequest, LogLauncher, OpenerLauncher};
pub use llm::{ChatMessage, ChatRequest, CompletionClient, OpenAiCompatibleClient};
pub use transcriber::{HttpTranscriber, Transcriber};
