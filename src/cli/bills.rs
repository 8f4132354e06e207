//! Bill and backup commands.
//!
//! - `flipledger bills list` - Show committed bills, newest first
//! - `flipledger bills delete <key>...` - Delete by short key
//! - `flipledger backup export|import <file>`

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use super::open_stores;
use crate::backup;
use crate::domain::taxonomy::display_path;
use crate::domain::{Bill, BillIdentity, TIME_FORMAT};
use crate::store::BillStore;

/// Bill subcommands
#[derive(Subcommand, Debug)]
pub enum BillsCommands {
    /// List committed bills
    List {
        /// Maximum number of bills to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete bills by the key shown in `list` (prefixes accepted)
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

/// Backup subcommands
#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Write everything to one JSON file
    Export { path: PathBuf },

    /// Replace everything with the contents of a backup file
    Import { path: PathBuf },
}

/// Execute a bills command
pub async fn execute(command: BillsCommands) -> Result<()> {
    match command {
        BillsCommands::List { limit } => execute_list(limit).await,
        BillsCommands::Delete { keys } => execute_delete(&keys).await,
    }
}

/// Execute a backup command
pub async fn execute_backup(command: BackupCommands) -> Result<()> {
    let stores = open_stores()?;
    match command {
        BackupCommands::Export { path } => {
            let backup = backup::export_to(&path, &stores.settings, stores.bills.as_ref())?;
            println!(
                "✅ Exported {} bill(s), {} asset(s) to {}",
                backup.bills.len(),
                backup.assets.len(),
                path.display()
            );
        }
        BackupCommands::Import { path } => {
            let backup = backup::import_from(&path, &stores.settings, stores.bills.as_ref())?;
            println!(
                "✅ Imported {} bill(s), {} asset(s) from {}",
                backup.bills.len(),
                backup.assets.len(),
                path.display()
            );
        }
    }
    Ok(())
}

/// Newest first
fn sorted(mut bills: Vec<Bill>) -> Vec<Bill> {
    bills.sort_by(|a, b| b.time.cmp(&a.time));
    bills
}

async fn execute_list(limit: usize) -> Result<()> {
    let stores = open_stores()?;
    let bills = sorted(stores.bills.all()?);

    if bills.is_empty() {
        println!("No bills yet");
        return Ok(());
    }

    println!(
        "{:<14} {:<20} {:<10} {:>10}  {:<12} {:<24} {}",
        "KEY", "TIME", "KIND", "AMOUNT", "ASSET", "CATEGORY", "MEMO"
    );
    println!("{}", "-".repeat(110));

    for bill in bills.iter().take(limit) {
        println!(
            "{:<14} {:<20} {:<10} {:>10.2}  {:<12} {:<24} {}",
            bill.short_key(),
            bill.time.format(TIME_FORMAT),
            bill.kind.to_string(),
            bill.amount,
            bill.asset_name,
            display_path(&bill.category),
            bill.memo
        );
    }

    if bills.len() > limit {
        println!();
        println!("({} more not shown)", bills.len() - limit);
    }

    Ok(())
}

/// Identities of bills whose short key starts with one of `keys`
fn matching_identities(bills: &[Bill], keys: &[String]) -> Vec<BillIdentity> {
    bills
        .iter()
        .filter(|b| {
            let key = b.short_key();
            keys.iter().any(|k| !k.is_empty() && key.starts_with(k.as_str()))
        })
        .map(Bill::identity)
        .collect()
}

async fn execute_delete(keys: &[String]) -> Result<()> {
    let stores = open_stores()?;
    let identities = matching_identities(&stores.bills.all()?, keys);

    if identities.is_empty() {
        anyhow::bail!("No bill matches {}", keys.join(", "));
    }

    let removed = stores.bills.delete_many(&identities)?;
    println!("✅ Deleted {} bill(s)", removed);
    Ok(())
}
