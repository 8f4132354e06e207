//! User settings: sensitivity, allow-list, taxonomies, assets, currencies.
//!
//! Backed by one `settings.json`. Every reader gets a cloned snapshot; writes
//! are serialized and land atomically (temp file + rename). A debounced file
//! watcher reloads the file when another process rewrites it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::{AllowListStore, AssetStore, CurrencyStore, StoreError, TaxonomyStore};
use crate::domain::asset::default_assets;
use crate::domain::taxonomy::{default_taxonomy, find_duplicate_sibling};
use crate::domain::{Asset, CurrencyTable, TaxonomyKind, TaxonomyNode};
use crate::gesture::{ProfileSource, SensitivityProfile};

/// User prompt templates; empty means the built-in default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptOverrides {
    #[serde(default)]
    pub single: String,

    #[serde(default)]
    pub multi: String,
}

/// Everything in settings.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub sensitivity: SensitivityProfile,

    #[serde(default)]
    pub allow_list: Vec<String>,

    #[serde(default = "default_expense")]
    pub expense_categories: Vec<TaxonomyNode>,

    #[serde(default = "default_income")]
    pub income_categories: Vec<TaxonomyNode>,

    #[serde(default = "default_assets")]
    pub assets: Vec<Asset>,

    #[serde(default)]
    pub currencies: CurrencyTable,

    #[serde(default)]
    pub prompts: PromptOverrides,
}

fn default_expense() -> Vec<TaxonomyNode> {
    default_taxonomy(TaxonomyKind::Expense)
}

fn default_income() -> Vec<TaxonomyNode> {
    default_taxonomy(TaxonomyKind::Income)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensitivity: SensitivityProfile::default(),
            allow_list: Vec::new(),
            expense_categories: default_expense(),
            income_categories: default_income(),
            assets: default_assets(),
            currencies: CurrencyTable::default(),
            prompts: PromptOverrides::default(),
        }
    }
}

impl Settings {
    pub fn taxonomy(&self, kind: TaxonomyKind) -> &Vec<TaxonomyNode> {
        match kind {
            TaxonomyKind::Expense => &self.expense_categories,
            TaxonomyKind::Income => &self.income_categories,
        }
    }

    fn taxonomy_mut(&mut self, kind: TaxonomyKind) -> &mut Vec<TaxonomyNode> {
        match kind {
            TaxonomyKind::Expense => &mut self.expense_categories,
            TaxonomyKind::Income => &mut self.income_categories,
        }
    }
}

/// Snapshot-on-read settings store
pub struct SettingsStore {
    /// `None` keeps everything in memory
    path: Option<PathBuf>,
    state: RwLock<Settings>,
    writer: Mutex<()>,
}

impl SettingsStore {
    /// Store that never touches disk
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            state: RwLock::new(settings),
            writer: Mutex::new(()),
        }
    }

    /// Open (or start fresh at) a settings file
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let settings = read_settings(&path)?.unwrap_or_default();
        Ok(Self {
            path: Some(path),
            state: RwLock::new(settings),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Owned copy of the current settings
    pub fn snapshot(&self) -> Settings {
        self.state.read().clone()
    }

    /// Apply a change and persist it. One writer at a time.
    pub fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Settings) -> Result<(), StoreError>,
    {
        let _guard = self.writer.lock();
        let mut next = self.snapshot();
        change(&mut next)?;

        if let Some(path) = &self.path {
            write_settings(path, &next)?;
        }
        *self.state.write() = next;
        Ok(())
    }

    /// Replace everything (backup import)
    pub fn replace(&self, settings: Settings) -> Result<(), StoreError> {
        validate(&settings)?;
        self.update(move |s| {
            *s = settings;
            Ok(())
        })
    }

    /// Re-read the file, keeping the current state if it vanished
    pub fn reload(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.writer.lock();
        if let Some(settings) = read_settings(path)? {
            *self.state.write() = settings;
            tracing::info!("Reloaded settings from {}", path.display());
        }
        Ok(())
    }

    pub fn set_sensitivity(&self, profile: SensitivityProfile) -> Result<(), StoreError> {
        profile.validate()?;
        self.update(|s| {
            s.sensitivity = profile;
            Ok(())
        })
    }

    pub fn prompts(&self) -> PromptOverrides {
        self.state.read().prompts.clone()
    }

    /// Watch the settings file and reload on external changes
    pub fn watch(self: &Arc<Self>) -> Result<SettingsWatch, StoreError> {
        let Some(path) = self.path.clone() else {
            return Ok(SettingsWatch::idle());
        };
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;
        debouncer.watcher().watch(&dir, RecursiveMode::NonRecursive)?;

        let stop = Arc::new(AtomicBool::new(false));
        let store = Arc::clone(self);
        let stop_flag = stop.clone();

        let thread = std::thread::spawn(move || {
            // Keep the debouncer alive for the life of the loop
            let _debouncer = debouncer;
            tracing::debug!("Watching {}", path.display());

            while !stop_flag.load(Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(250)) {
                    Ok(Ok(events)) => {
                        if events.iter().any(|e| e.path.file_name() == path.file_name()) {
                            if let Err(e) = store.reload() {
                                tracing::warn!("Settings reload failed: {}", e);
                            }
                        }
                    }
                    Ok(Err(e)) => tracing::warn!("Settings watcher error: {:?}", e),
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(SettingsWatch {
            stop,
            thread: Some(thread),
        })
    }
}

/// Handle to the settings watcher thread
pub struct SettingsWatch {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SettingsWatch {
    fn idle() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(true)),
            thread: None,
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SettingsWatch {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_settings(path: &Path) -> Result<Option<Settings>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(None),
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, settings)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn validate(settings: &Settings) -> Result<(), StoreError> {
    settings.sensitivity.validate()?;
    for kind in TaxonomyKind::all() {
        if let Some(dup) = find_duplicate_sibling(settings.taxonomy(kind)) {
            return Err(StoreError::DuplicateCategory(dup));
        }
    }
    check_unique_assets(&settings.assets)
}

fn check_unique_assets(assets: &[Asset]) -> Result<(), StoreError> {
    let mut seen = std::collections::HashSet::new();
    for asset in assets {
        if !seen.insert(asset.name.as_str()) {
            return Err(StoreError::DuplicateAsset(asset.name.clone()));
        }
    }
    Ok(())
}

impl ProfileSource for SettingsStore {
    fn active_profile(&self) -> SensitivityProfile {
        self.state.read().sensitivity
    }
}

impl AllowListStore for SettingsStore {
    fn allow_list(&self) -> Vec<String> {
        self.state.read().allow_list.clone()
    }

    fn set_allow_list(&self, list: Vec<String>) -> Result<(), StoreError> {
        let mut list: Vec<String> = list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        list.dedup();
        self.update(|s| {
            s.allow_list = list;
            Ok(())
        })
    }
}

impl TaxonomyStore for SettingsStore {
    fn taxonomy(&self, kind: TaxonomyKind) -> Vec<TaxonomyNode> {
        self.state.read().taxonomy(kind).clone()
    }

    fn set_taxonomy(&self, kind: TaxonomyKind, nodes: Vec<TaxonomyNode>) -> Result<(), StoreError> {
        if let Some(dup) = find_duplicate_sibling(&nodes) {
            return Err(StoreError::DuplicateCategory(dup));
        }
        self.update(|s| {
            *s.taxonomy_mut(kind) = nodes;
            Ok(())
        })
    }
}

impl AssetStore for SettingsStore {
    fn assets(&self) -> Vec<Asset> {
        self.state.read().assets.clone()
    }

    fn set_assets(&self, assets: Vec<Asset>) -> Result<(), StoreError> {
        check_unique_assets(&assets)?;
        self.update(|s| {
            s.assets = assets;
            Ok(())
        })
    }
}

impl CurrencyStore for SettingsStore {
    fn currencies(&self) -> CurrencyTable {
        self.state.read().currencies.clone()
    }

    fn set_currencies(&self, table: CurrencyTable) -> Result<(), StoreError> {
        self.update(|s| {
            s.currencies = table;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::open(temp.path().join("settings.json")).unwrap();
        assert_eq!(store.snapshot(), Settings::default());
    }

    #[test]
    fn test_update_persists_and_reopens() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");

        let store = SettingsStore::open(&path).unwrap();
        store
            .set_allow_list(vec!["com.tencent.mm".into(), " ".into()])
            .unwrap();
        store
            .set_sensitivity(SensitivityProfile::custom(8.0, 600).unwrap())
            .unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.allow_list(), vec!["com.tencent.mm".to_string()]);
        assert_eq!(
            reopened.active_profile(),
            SensitivityProfile::Custom {
                gravity_threshold: 8.0,
                max_duration_ms: 600
            }
        );
    }

    #[test]
    fn test_invalid_sensitivity_rejected() {
        let store = SettingsStore::in_memory(Settings::default());
        let bad = SensitivityProfile::Custom {
            gravity_threshold: 30.0,
            max_duration_ms: 600,
        };
        assert!(store.set_sensitivity(bad).is_err());
        assert_eq!(store.active_profile(), SensitivityProfile::default());
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let store = SettingsStore::in_memory(Settings::default());
        let nodes = vec![TaxonomyNode::leaf("交通", ""), TaxonomyNode::leaf("交通", "")];
        assert!(matches!(
            store.set_taxonomy(TaxonomyKind::Expense, nodes),
            Err(StoreError::DuplicateCategory(_))
        ));
    }

    #[test]
    fn test_reload_picks_up_external_write() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();

        let other = SettingsStore::open(&path).unwrap();
        other.set_allow_list(vec!["com.eg.android.AlipayGphone".into()]).unwrap();

        assert!(store.allow_list().is_empty());
        store.reload().unwrap();
        assert_eq!(store.allow_list(), vec!["com.eg.android.AlipayGphone".to_string()]);
    }
}
