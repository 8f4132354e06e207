//! Persistent stores and the collaborator traits they implement.
//!
//! Reads are snapshots: callers get an owned clone and never hold a lock.

pub mod bills;
pub mod settings;

use thiserror::Error;

use crate::domain::{Asset, Bill, BillIdentity, CurrencyTable, TaxonomyKind, TaxonomyNode};

pub use bills::{JsonBillStore, MemoryBillStore};
pub use settings::{PromptOverrides, Settings, SettingsStore, SettingsWatch};

/// Errors from the file-backed stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to lock {0}")]
    Lock(String),

    #[error("Duplicate category '{0}' under the same parent")]
    DuplicateCategory(String),

    #[error("Duplicate asset name '{0}'")]
    DuplicateAsset(String),

    #[error("Invalid sensitivity: {0}")]
    Sensitivity(#[from] crate::gesture::SensitivityError),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Foreground apps allowed to surface the capture UI
pub trait AllowListStore: Send + Sync {
    fn allow_list(&self) -> Vec<String>;
    fn set_allow_list(&self, list: Vec<String>) -> Result<(), StoreError>;
}

/// The user's category forests
pub trait TaxonomyStore: Send + Sync {
    fn taxonomy(&self, kind: TaxonomyKind) -> Vec<TaxonomyNode>;
    fn set_taxonomy(&self, kind: TaxonomyKind, nodes: Vec<TaxonomyNode>) -> Result<(), StoreError>;
}

/// The user's accounts
pub trait AssetStore: Send + Sync {
    fn assets(&self) -> Vec<Asset>;
    fn set_assets(&self, assets: Vec<Asset>) -> Result<(), StoreError>;
}

/// Currency table used for prompts and conversion on commit
pub trait CurrencyStore: Send + Sync {
    fn currencies(&self) -> CurrencyTable;
    fn set_currencies(&self, table: CurrencyTable) -> Result<(), StoreError>;
}

/// Committed bills
pub trait BillStore: Send + Sync {
    fn add(&self, bill: Bill) -> Result<(), StoreError>;

    /// Delete every bill whose identity is listed; returns how many went
    fn delete_many(&self, identities: &[BillIdentity]) -> Result<usize, StoreError>;

    fn all(&self) -> Result<Vec<Bill>, StoreError>;

    /// Overwrite everything (backup import)
    fn replace_all(&self, bills: Vec<Bill>) -> Result<(), StoreError>;
}
