//! Whole-data backup: one JSON document, import overwrites.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Asset, Bill, CurrencyTable, TaxonomyNode};
use crate::gesture::SensitivityProfile;
use crate::store::{BillStore, PromptOverrides, Settings, SettingsStore};

pub const BACKUP_VERSION: u32 = 1;

/// Everything the user owns, in one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub assets: Vec<Asset>,
    pub expense_categories: Vec<TaxonomyNode>,
    pub income_categories: Vec<TaxonomyNode>,
    pub bills: Vec<Bill>,
    pub allow_list: Vec<String>,
    pub currencies: CurrencyTable,
    pub sensitivity: SensitivityProfile,
    #[serde(default)]
    pub prompts: PromptOverrides,
}

impl Backup {
    /// Snapshot settings and bills
    pub fn collect(settings: &SettingsStore, bills: &dyn BillStore) -> Result<Self> {
        let s = settings.snapshot();
        let bills = bills.all().context("Failed to read bills")?;
        Ok(Self {
            version: BACKUP_VERSION,
            exported_at: Utc::now(),
            assets: s.assets,
            expense_categories: s.expense_categories,
            income_categories: s.income_categories,
            bills,
            allow_list: s.allow_list,
            currencies: s.currencies,
            sensitivity: s.sensitivity,
            prompts: s.prompts,
        })
    }

    /// The settings half of the document
    pub fn settings(&self) -> Settings {
        Settings {
            sensitivity: self.sensitivity,
            allow_list: self.allow_list.clone(),
            expense_categories: self.expense_categories.clone(),
            income_categories: self.income_categories.clone(),
            assets: self.assets.clone(),
            currencies: self.currencies.clone(),
            prompts: self.prompts.clone(),
        }
    }

    /// Overwrite settings and bills with this document.
    ///
    /// Settings are validated first, so a rejected document leaves the bills
    /// untouched.
    pub fn restore(&self, settings: &SettingsStore, bills: &dyn BillStore) -> Result<()> {
        if self.version > BACKUP_VERSION {
            anyhow::bail!("Backup version {} is newer than supported ({})", self.version, BACKUP_VERSION);
        }
        settings
            .replace(self.settings())
            .context("Backup settings rejected")?;
        bills
            .replace_all(self.bills.clone())
            .context("Failed to write bills")?;
        tracing::info!(bills = self.bills.len(), assets = self.assets.len(), "Backup restored");
        Ok(())
    }
}

/// Write a backup document to `path`
pub fn export_to(path: &Path, settings: &SettingsStore, bills: &dyn BillStore) -> Result<Backup> {
    let backup = Backup::collect(settings, bills)?;
    let json = serde_json::to_string_pretty(&backup)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write backup: {}", path.display()))?;
    Ok(backup)
}

/// Read a backup document from `path` and restore it
pub fn import_from(path: &Path, settings: &SettingsStore, bills: &dyn BillStore) -> Result<Backup> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup: {}", path.display()))?;
    let backup: Backup = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse backup: {}", path.display()))?;
    backup.restore(settings, bills)?;
    Ok(backup)
}
