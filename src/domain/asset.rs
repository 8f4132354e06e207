//! Money accounts (cash, cards, wallets).

use serde::{Deserialize, Serialize};

/// A user asset. Names are unique within the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,

    /// Free-form account type ("cash", "debit", "credit", ...)
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub icon: String,
}

fn default_currency() -> String {
    "CNY".to_string()
}

impl Asset {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            currency: default_currency(),
            icon: String::new(),
        }
    }
}

/// Starter assets used before the user configures any
pub fn default_assets() -> Vec<Asset> {
    vec![
        Asset::new("微信", "wallet"),
        Asset::new("支付宝", "wallet"),
        Asset::new("现金", "cash"),
    ]
}

/// True when `name` matches an asset exactly
pub fn asset_exists(assets: &[Asset], name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && assets.iter().any(|a| a.name == name)
}
