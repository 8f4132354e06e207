//! Transaction kind and the per-kind behaviour that hangs off it.
//!
//! Every place that used to branch on "is this a transfer?" goes through one
//! of the resolvers here instead: visible form fields, icon source and ledger
//! parameters.

use serde::{Deserialize, Serialize};

/// Kind of a bill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillKind {
    /// Money leaving an asset for a category
    #[default]
    Expense,

    /// Money arriving into an asset from a category
    Income,

    /// Money moving between two of the user's assets
    Transfer,

    /// Paying down a liability (credit card) from an asset
    Repayment,
}

/// Which optional form fields a kind shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleFields {
    pub category: bool,
    pub counter_asset: bool,
    pub fee: bool,
}

/// Where the display icon of a candidate comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconSource {
    /// Resolve through the category taxonomy of this kind
    Taxonomy(TaxonomyKind),

    /// Fixed transfer icon
    Transfer,
}

/// The two category forests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyKind {
    Expense,
    Income,
}

impl TaxonomyKind {
    pub fn all() -> [TaxonomyKind; 2] {
        [TaxonomyKind::Expense, TaxonomyKind::Income]
    }
}

impl BillKind {
    /// Ledger / model wire code
    pub fn code(self) -> u8 {
        match self {
            Self::Expense => 0,
            Self::Income => 1,
            Self::Transfer => 2,
            Self::Repayment => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Expense),
            1 => Some(Self::Income),
            2 => Some(Self::Transfer),
            3 => Some(Self::Repayment),
            _ => None,
        }
    }

    /// Lenient name parsing for model output ("expense", "支出", "2", ...)
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if let Ok(code) = label.parse::<i64>() {
            return Self::from_code(code);
        }
        match label.to_lowercase().as_str() {
            "expense" | "expenditure" | "spend" | "支出" => Some(Self::Expense),
            "income" | "收入" => Some(Self::Income),
            "transfer" | "转账" => Some(Self::Transfer),
            "repayment" | "repay" | "还款" => Some(Self::Repayment),
            _ => None,
        }
    }

    pub fn all() -> &'static [BillKind] {
        &[
            BillKind::Expense,
            BillKind::Income,
            BillKind::Transfer,
            BillKind::Repayment,
        ]
    }

    /// Taxonomy this kind is categorized against, if any
    pub fn taxonomy(self) -> Option<TaxonomyKind> {
        match self {
            Self::Expense => Some(TaxonomyKind::Expense),
            Self::Income => Some(TaxonomyKind::Income),
            Self::Transfer | Self::Repayment => None,
        }
    }

    /// True for kinds that move money between two assets
    pub fn is_account_move(self) -> bool {
        self.taxonomy().is_none()
    }

    pub fn visible_fields(self) -> VisibleFields {
        match self {
            Self::Expense | Self::Income => VisibleFields {
                category: true,
                counter_asset: false,
                fee: false,
            },
            Self::Transfer | Self::Repayment => VisibleFields {
                category: false,
                counter_asset: true,
                fee: true,
            },
        }
    }

    pub fn icon_source(self) -> IconSource {
        match self.taxonomy() {
            Some(kind) => IconSource::Taxonomy(kind),
            None => IconSource::Transfer,
        }
    }

    /// Label stored on a bill in place of a category for account moves
    pub fn counterparty_label(self, counter_asset: &str) -> Option<String> {
        match self {
            Self::Transfer => Some(format!("转账到 {}", counter_asset)),
            Self::Repayment => Some(format!("还款到 {}", counter_asset)),
            Self::Expense | Self::Income => None,
        }
    }
}

impl std::fmt::Display for BillKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillKind::Expense => write!(f, "expense"),
            BillKind::Income => write!(f, "income"),
            BillKind::Transfer => write!(f, "transfer"),
            BillKind::Repayment => write!(f, "repayment"),
        }
    }
}

impl std::str::FromStr for BillKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Self::from_label(s).ok_or_else(|| anyhow::anyhow!("Unknown bill kind: {}", s))
    }
}
