//! The editable form showing one candidate under review.

use chrono::{NaiveDateTime, Utc};

use super::SessionError;
use crate::adapters::ledger::LedgerRequest;
use crate::domain::bill::{now_bill_time, to_bill_time};
use crate::domain::taxonomy::{leaf_name, UNCATEGORIZED};
use crate::domain::{
    Bill, BillKind, CurrencyTable, ReconciledCandidate, TaxonomyNode, VisibleFields, TRANSFER_ICON,
};
use crate::reconcile::icon::resolve_icon;

/// Form state; every field stays editable regardless of kind
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureForm {
    pub kind: BillKind,
    pub amount: f64,
    pub asset_name: String,
    pub counter_asset_name: String,
    pub category: Option<String>,
    pub fee: f64,
    pub time: Option<NaiveDateTime>,
    pub memo: String,
    pub currency: Option<String>,
    pub icon: String,

    /// Multi sessions: the user asked to forward this one candidate too
    pub forward_override: bool,
}

/// A validated form turned into what gets written and forwarded
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCommit {
    pub bill: Bill,
    pub ledger: LedgerRequest,
}

impl CaptureForm {
    pub fn from_candidate(candidate: ReconciledCandidate) -> Self {
        Self {
            kind: candidate.kind,
            amount: candidate.amount,
            asset_name: candidate.asset_name,
            counter_asset_name: candidate.counter_asset_name.unwrap_or_default(),
            category: candidate.category,
            fee: candidate.fee,
            time: candidate.time,
            memo: candidate.memo,
            currency: candidate.currency,
            icon: candidate.icon,
            forward_override: false,
        }
    }

    pub fn visible_fields(&self) -> VisibleFields {
        self.kind.visible_fields()
    }

    /// Switch kind. Amount, memo and time are kept; hidden fields keep their
    /// values but are ignored on commit. `nodes` is the taxonomy of the new
    /// kind, used to refresh the icon.
    pub fn set_kind(&mut self, kind: BillKind, nodes: &[TaxonomyNode]) {
        self.kind = kind;
        self.icon = match kind.taxonomy() {
            Some(tax) => self
                .category
                .as_deref()
                .map(|c| resolve_icon(leaf_name(c), tax, nodes))
                .unwrap_or_default(),
            None => TRANSFER_ICON.to_string(),
        };
    }

    /// Validate and build the bill plus the ledger request
    pub fn prepare(&self, currencies: &CurrencyTable, book_name: Option<&str>) -> Result<PreparedCommit, SessionError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(SessionError::InvalidAmount(self.amount));
        }

        let visible = self.visible_fields();
        let asset = self.asset_name.trim().to_string();
        let counter = self.counter_asset_name.trim().to_string();

        if self.kind.is_account_move() && (asset.is_empty() || counter.is_empty()) {
            return Err(SessionError::MissingAccounts(self.kind));
        }

        let currency = currencies.normalize(self.currency.as_deref());
        let (amount, memo) = match currencies.convert(self.amount, &currency) {
            Some(conv) => {
                let memo = if self.memo.trim().is_empty() {
                    conv.note
                } else {
                    format!("{} {}", self.memo.trim(), conv.note)
                };
                (conv.base_amount, memo)
            }
            None => (self.amount, self.memo.trim().to_string()),
        };

        let time = self.time.map(to_bill_time).unwrap_or_else(now_bill_time);
        let category = if visible.category {
            self.category.clone().filter(|c| !c.trim().is_empty())
        } else {
            None
        };

        let bill_category = match self.kind.counterparty_label(&counter) {
            Some(label) => label,
            None => category.clone().unwrap_or_else(|| UNCATEGORIZED.to_string()),
        };

        let bill = Bill {
            amount,
            kind: self.kind,
            asset_name: asset.clone(),
            category: bill_category,
            time,
            memo: memo.clone(),
            icon: self.icon.clone(),
            captured_at: Utc::now(),
        };

        let ledger = LedgerRequest {
            kind: self.kind,
            amount,
            currency: Some(currencies.base.clone()),
            fee: if visible.fee { self.fee } else { 0.0 },
            time: Some(time),
            category,
            asset,
            counter_asset: if visible.counter_asset { Some(counter) } else { None },
            book_name: book_name.map(str::to_string),
            remark: Some(memo),
            show_result: false,
        };

        Ok(PreparedCommit { bill, ledger })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_bill_time;

    fn form(kind: BillKind) -> CaptureForm {
        CaptureForm {
            kind,
            amount: 20.0,
            asset_name: "微信".into(),
            counter_asset_name: String::new(),
            category: Some("餐饮/::/午餐".into()),
            fee: 1.5,
            time: parse_bill_time("2024-05-01 12:30:00"),
            memo: "noodles".into(),
            currency: None,
            icon: "icon".into(),
            forward_override: false,
        }
    }

    #[test]
    fn test_kind_change_keeps_values() {
        let mut f = form(BillKind::Expense);
        f.set_kind(BillKind::Transfer, &[]);
        assert_eq!(f.amount, 20.0);
        assert_eq!(f.memo, "noodles");
        assert!(f.time.is_some());
        assert_eq!(f.icon, TRANSFER_ICON);
        assert!(f.visible_fields().counter_asset && f.visible_fields().fee);

        f.set_kind(BillKind::Repayment, &[]);
        assert!(f.visible_fields().counter_asset && f.visible_fields().fee);

        // Back to expense: the category survived the round trip
        f.set_kind(BillKind::Expense, &[TaxonomyNode::leaf("午餐", "lunch.png")]);
        assert_eq!(f.category.as_deref(), Some("餐饮/::/午餐"));
        assert_eq!(f.icon, "lunch.png");
    }

    #[test]
    fn test_invalid_amount_blocks() {
        let table = CurrencyTable::default();
        for amount in [0.0, -3.0, f64::NAN] {
            let f = CaptureForm { amount, ..form(BillKind::Expense) };
            assert!(matches!(f.prepare(&table, None), Err(SessionError::InvalidAmount(_))));
        }
    }

    #[test]
    fn test_account_move_needs_both_accounts() {
        let table = CurrencyTable::default();
        let f = form(BillKind::Transfer);
        assert!(matches!(
            f.prepare(&table, None),
            Err(SessionError::MissingAccounts(BillKind::Transfer))
        ));

        let f = CaptureForm {
            counter_asset_name: "招行".into(),
            ..form(BillKind::Transfer)
        };
        let prepared = f.prepare(&table, None).unwrap();
        assert_eq!(prepared.bill.category, "转账到 招行");
        assert_eq!(prepared.ledger.category, None);
        assert_eq!(prepared.ledger.fee, 1.5);
        assert_eq!(prepared.ledger.counter_asset.as_deref(), Some("招行"));
    }

    #[test]
    fn test_repayment_fee_kept_off_the_ledger_url() {
        let f = CaptureForm {
            counter_asset_name: "花呗".into(),
            ..form(BillKind::Repayment)
        };
        let prepared = f.prepare(&CurrencyTable::default(), None).unwrap();
        assert_eq!(prepared.bill.category, "还款到 花呗");
        assert_eq!(prepared.ledger.fee, 1.5);
        let url = crate::adapters::ledger::build_ledger_url(&prepared.ledger);
        assert!(url.contains("accountname2="));
        assert!(!url.contains("fee="));
    }

    #[test]
    fn test_expense_bill_and_hidden_fields_ignored() {
        let prepared = form(BillKind::Expense).prepare(&CurrencyTable::default(), Some("日常")).unwrap();
        assert_eq!(prepared.bill.category, "餐饮/::/午餐");
        assert_eq!(prepared.bill.memo, "noodles");
        assert_eq!(prepared.ledger.fee, 0.0);
        assert_eq!(prepared.ledger.counter_asset, None);
        assert_eq!(prepared.ledger.book_name.as_deref(), Some("日常"));
    }

    #[test]
    fn test_missing_category_becomes_uncategorized() {
        let f = CaptureForm {
            category: None,
            ..form(BillKind::Expense)
        };
        let prepared = f.prepare(&CurrencyTable::default(), None).unwrap();
        assert_eq!(prepared.bill.category, "其他");
        assert_eq!(prepared.ledger.category, None);
    }

    #[test]
    fn test_foreign_currency_converted() {
        let f = CaptureForm {
            amount: 10.0,
            currency: Some("EUR".into()),
            ..form(BillKind::Expense)
        };
        let prepared = f.prepare(&CurrencyTable::default(), None).unwrap();
        assert_eq!(prepared.bill.amount, 76.92);
        assert_eq!(prepared.bill.memo, "noodles (10.00 EUR ≈ 76.92 CNY)");
        assert_eq!(prepared.ledger.currency.as_deref(), Some("CNY"));
    }
}
