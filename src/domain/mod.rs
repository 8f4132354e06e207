//! Domain types for flipledger.
//!
//! - Kind: transaction kind and its per-kind behaviour
//! - Taxonomy: two-level category forests
//! - Asset, Currency: accounts and conversion
//! - Candidate: model output before and after reconciliation
//! - Bill: the persisted record

pub mod asset;
pub mod bill;
pub mod candidate;
pub mod currency;
pub mod kind;
pub mod taxonomy;

// Re-export commonly used types
pub use asset::Asset;
pub use bill::{now_bill_time, parse_bill_time, to_bill_time, Bill, BillIdentity, TIME_FORMAT};
pub use candidate::{RawCandidate, ReconciledCandidate};
pub use currency::{Conversion, CurrencyTable};
pub use kind::{BillKind, IconSource, TaxonomyKind, VisibleFields};
pub use taxonomy::{TaxonomyNode, PATH_SEPARATOR, TRANSFER_ICON, UNCATEGORIZED};
