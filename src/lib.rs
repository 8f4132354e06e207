//! flipledger - gesture-triggered bookkeeping
//!
//! Flip the phone, say or type what happened, review the bills the model
//! found, and commit them locally and to an external ledger app.
//!
//! # Architecture
//!
//! The capture pipeline runs leaves first:
//! - `gesture`: orientation samples -> flip triggers
//! - `admission`: may this trigger surface UI over the foreground app?
//! - `extract`: text -> transaction candidates via one chat completion
//! - `reconcile`: candidates -> existing category paths and icons
//! - `capture`: queued review, edit, commit or cancel
//!
//! Supporting modules:
//! - `domain`: data structures (Bill, Asset, taxonomy, currencies)
//! - `store`: settings and bill persistence
//! - `adapters`: LLM, transcription, ledger URL scheme, foreground lookup
//! - `backup`: whole-data export and import
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Capture from text
//! flipledger capture "lunch 25 with wechat, taxi 18"  --multi
//!
//! # Replay a sensor trace; flips open the capture flow
//! flipledger listen --trace flips.txt
//!
//! # Inspect what was saved
//! flipledger bills list
//! ```

pub mod adapters;
pub mod admission;
pub mod backup;
pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod extract;
pub mod gesture;
pub mod reconcile;
pub mod store;
pub mod ui;

// Re-export main types at crate root for convenience
pub use admission::{AdmissionController, Decision};
pub use capture::{CaptureCoordinator, CaptureSession, CommitAction, SessionState};
pub use domain::{Bill, BillKind, ReconciledCandidate};
pub use extract::{ExtractionMode, ExtractionService};
pub use gesture::{FlipDetector, GestureMonitor, SensitivityProfile, TriggerEvent};
pub use store::{JsonBillStore, SettingsStore};
