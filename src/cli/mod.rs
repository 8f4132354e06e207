//! Command-line interface for flipledger.
//!
//! Provides commands for listening to the flip gesture, capturing bills from
//! text or audio, and managing bills, backups and settings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, paths, ResolvedConfig};
use crate::store::{JsonBillStore, SettingsStore};

pub mod bills;
pub mod capture;
pub mod settings;

/// flipledger - flip the phone, say what you spent, get a bill
#[derive(Parser, Debug)]
#[command(name = "flipledger")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch an orientation trace for flips and open the capture flow
    Listen {
        /// Trace of `t_ms x y z` lines
        #[arg(short, long)]
        trace: PathBuf,

        /// Expect several transactions per capture
        #[arg(long)]
        multi: bool,
    },

    /// Capture bills from text or a recording
    Capture {
        /// Text to analyze (prompted for if omitted)
        text: Option<String>,

        /// Transcribe this recording instead of taking text
        #[arg(short, long, conflicts_with = "text")]
        audio: Option<PathBuf>,

        /// Expect several transactions
        #[arg(long)]
        multi: bool,

        /// Commit every candidate with the default action, no review
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage committed bills
    Bills {
        #[command(subcommand)]
        command: bills::BillsCommands,
    },

    /// Export or import all data
    Backup {
        #[command(subcommand)]
        command: bills::BackupCommands,
    },

    /// Show or change the flip sensitivity
    Sensitivity {
        #[command(subcommand)]
        command: settings::SensitivityCommands,
    },

    /// Manage the foreground allow-list
    Allow {
        #[command(subcommand)]
        command: settings::AllowCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Listen { trace, multi } => capture::execute_listen(&trace, multi).await,
            Commands::Capture {
                text,
                audio,
                multi,
                yes,
            } => capture::execute_capture(text, audio, multi, yes).await,
            Commands::Bills { command } => bills::execute(command).await,
            Commands::Backup { command } => bills::execute_backup(command).await,
            Commands::Sensitivity { command } => settings::execute_sensitivity(command).await,
            Commands::Allow { command } => settings::execute_allow(command).await,
            Commands::Config => show_config().await,
        }
    }
}

/// File-backed stores under the configured home
pub(crate) struct Stores {
    pub config: &'static ResolvedConfig,
    pub settings: Arc<SettingsStore>,
    pub bills: Arc<JsonBillStore>,
}

/// Open the stores, creating the home directory on first use
pub(crate) fn open_stores() -> Result<Stores> {
    let config = config::config()?;
    std::fs::create_dir_all(&config.home)
        .with_context(|| format!("Failed to create home: {}", config.home.display()))?;

    let (settings_path, bills_path, lock_path) = paths::under(&config.home);
    let settings = SettingsStore::open(&settings_path)
        .with_context(|| format!("Failed to open settings: {}", settings_path.display()))?;

    Ok(Stores {
        config,
        settings: Arc::new(settings),
        bills: Arc::new(JsonBillStore::new(bills_path, lock_path)),
    })
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let config = config::config()?;
    let (settings_path, bills_path, _) = paths::under(&config.home);

    println!("flipledger Configuration");
    println!("════════════════════════════════════════");
    println!();

    if let Some(ref path) = config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!("Config file: (none found, using defaults)");
    }
    println!();

    println!("Paths:");
    println!("  Home:     {}", config.home.display());
    println!("  Settings: {}", settings_path.display());
    println!("  Bills:    {}", bills_path.display());
    println!();

    println!("Model:");
    println!("  Endpoint:      {}", config.llm.base_url);
    println!("  Model:         {}", config.llm.model);
    println!("  Transcription: {}", config.llm.transcription_model);
    println!(
        "  API key:       {}",
        if config.llm.api_key.is_some() { "set" } else { "missing" }
    );
    println!();

    println!("Capture:");
    println!("  Own identity:      {}", config.capture.own_identity);
    println!("  Single save local: {}", config.capture.single_save_local);
    println!("  Bulk save multi:   {}", config.capture.bulk_save_multi);
    println!(
        "  Book:              {}",
        config.capture.book_name.as_deref().unwrap_or("(default)")
    );
    println!();

    println!("Environment overrides:");
    for var in [
        "FLIPLEDGER_HOME",
        "FLIPLEDGER_API_KEY",
        "FLIPLEDGER_API_URL",
        "FLIPLEDGER_MODEL",
    ] {
        println!(
            "  {:<20} {}",
            var,
            if std::env::var(var).is_ok() { "set" } else { "(not set)" }
        );
    }

    Ok(())
}
