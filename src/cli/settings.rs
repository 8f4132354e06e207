//! Sensitivity and allow-list commands.

use anyhow::{Context, Result};
use clap::Subcommand;

use super::open_stores;
use crate::gesture::SensitivityProfile;
use crate::store::AllowListStore;

/// Sensitivity subcommands
#[derive(Subcommand, Debug)]
pub enum SensitivityCommands {
    /// Show the active profile and its thresholds
    Show,

    /// Use the standard slider (0 = gentle, 100 = hard and fast)
    Set { level: u8 },

    /// Use explicit thresholds
    Custom {
        /// Gravity threshold in g (1..=20)
        #[arg(short, long)]
        gravity: f32,

        /// Flip window in ms (50..=5000)
        #[arg(short, long)]
        duration_ms: u64,
    },
}

/// Allow-list subcommands
#[derive(Subcommand, Debug)]
pub enum AllowCommands {
    /// Show the allow-list
    List,

    /// Allow the capture flow over an app
    Add { identity: String },

    /// Remove an app from the allow-list
    Remove { identity: String },
}

pub async fn execute_sensitivity(command: SensitivityCommands) -> Result<()> {
    let stores = open_stores()?;

    let profile = match command {
        SensitivityCommands::Show => {
            println!("{}", stores.settings.snapshot().sensitivity);
            return Ok(());
        }
        SensitivityCommands::Set { level } => SensitivityProfile::standard(level)?,
        SensitivityCommands::Custom {
            gravity,
            duration_ms,
        } => SensitivityProfile::custom(gravity, duration_ms)?,
    };

    stores
        .settings
        .set_sensitivity(profile)
        .context("Failed to save sensitivity")?;
    println!("✅ Sensitivity: {}", profile);
    Ok(())
}

/// Add or remove one identity, keeping order and dropping duplicates
fn edit_allow_list(mut list: Vec<String>, identity: &str, add: bool) -> (Vec<String>, bool) {
    let present = list.iter().any(|a| a == identity);
    match (add, present) {
        (true, false) => {
            list.push(identity.to_string());
            (list, true)
        }
        (false, true) => {
            list.retain(|a| a != identity);
            (list, true)
        }
        _ => (list, false),
    }
}

pub async fn execute_allow(command: AllowCommands) -> Result<()> {
    let stores = open_stores()?;
    let current = stores.settings.allow_list();

    let (identity, add) = match command {
        AllowCommands::List => {
            if current.is_empty() {
                println!("Allow-list is empty: triggers surface only when the foreground app is unknown");
            } else {
                for id in &current {
                    println!("{}", id);
                }
            }
            return Ok(());
        }
        AllowCommands::Add { identity } => (identity, true),
        AllowCommands::Remove { identity } => (identity, false),
    };

    let identity = identity.trim().to_string();
    if identity.is_empty() {
        anyhow::bail!("Identity must not be empty");
    }

    let (next, changed) = edit_allow_list(current, &identity, add);
    if !changed {
        println!("ℹ️  Nothing to change for {}", identity);
        return Ok(());
    }
    stores.settings.set_allow_list(next)?;
    println!("✅ {} {}", if add { "Allowed" } else { "Removed" }, identity);
    Ok(())
}
