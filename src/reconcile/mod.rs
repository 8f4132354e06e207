//! Reconciliation: raw model candidates -> candidates that fit the user's
//! taxonomy, with icons resolved.

pub mod category;
pub mod icon;

use crate::domain::asset::asset_exists;
use crate::domain::taxonomy::{flatten_paths, leaf_name};
use crate::domain::{
    parse_bill_time, Asset, IconSource, RawCandidate, ReconciledCandidate, TaxonomyKind, TaxonomyNode,
    TRANSFER_ICON,
};
use crate::store::{AssetStore, TaxonomyStore};

pub use category::{find_best_match, normalize_path, resolve_category};
pub use icon::resolve_icon;

/// Snapshot of everything reconciliation reads
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    expense: Vec<TaxonomyNode>,
    income: Vec<TaxonomyNode>,
    expense_paths: Vec<String>,
    income_paths: Vec<String>,
    assets: Vec<Asset>,
}

impl ReconcileContext {
    pub fn new(expense: Vec<TaxonomyNode>, income: Vec<TaxonomyNode>, assets: Vec<Asset>) -> Self {
        Self {
            expense_paths: flatten_paths(&expense),
            income_paths: flatten_paths(&income),
            expense,
            income,
            assets,
        }
    }

    /// Take a snapshot from the stores
    pub fn from_stores(taxonomy: &dyn TaxonomyStore, assets: &dyn AssetStore) -> Self {
        Self::new(
            taxonomy.taxonomy(TaxonomyKind::Expense),
            taxonomy.taxonomy(TaxonomyKind::Income),
            assets.assets(),
        )
    }

    pub fn paths(&self, kind: TaxonomyKind) -> &[String] {
        match kind {
            TaxonomyKind::Expense => &self.expense_paths,
            TaxonomyKind::Income => &self.income_paths,
        }
    }

    pub fn nodes(&self, kind: TaxonomyKind) -> &[TaxonomyNode] {
        match kind {
            TaxonomyKind::Expense => &self.expense,
            TaxonomyKind::Income => &self.income,
        }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }
}

/// Reconcile one candidate
pub fn reconcile(raw: RawCandidate, ctx: &ReconcileContext) -> ReconciledCandidate {
    let (category, icon) = match raw.kind.icon_source() {
        IconSource::Taxonomy(kind) => {
            let category = resolve_category(raw.category_path.as_deref(), ctx.paths(kind));
            let icon = category
                .as_deref()
                .map(|c| resolve_icon(leaf_name(c), kind, ctx.nodes(kind)))
                .unwrap_or_default();
            (category, icon)
        }
        IconSource::Transfer => (None, TRANSFER_ICON.to_string()),
    };

    let counter_asset_name = if raw.kind.is_account_move() {
        raw.counter_asset_name
    } else {
        None
    };

    ReconciledCandidate {
        amount: raw.amount,
        kind: raw.kind,
        asset_known: asset_exists(&ctx.assets, &raw.asset_name),
        asset_name: raw.asset_name,
        counter_asset_name,
        category,
        icon,
        time: raw.time.as_deref().and_then(parse_bill_time),
        memo: raw.memo.unwrap_or_default(),
        currency: raw.currency,
        fee: raw.fee.unwrap_or(0.0),
    }
}

/// Reconcile a batch, preserving order
pub fn reconcile_all(raws: Vec<RawCandidate>, ctx: &ReconcileContext) -> Vec<ReconciledCandidate> {
    raws.into_iter().map(|raw| reconcile(raw, ctx)).collect()
}
