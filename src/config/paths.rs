//! Canonical on-disk locations under the flipledger home.
//!
//! Import these instead of joining file names by hand.

use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";
pub const BILLS_FILE: &str = "bills.json";
pub const BILLS_LOCK_FILE: &str = "bills.lock";

/// `(settings.json, bills.json, bills.lock)` under `home`
pub fn under(home: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (
        home.join(SETTINGS_FILE),
        home.join(BILLS_FILE),
        home.join(BILLS_LOCK_FILE),
    )
}
