//! Transaction candidates: raw model output and its reconciled form.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kind::BillKind;

/// One transaction as the model returned it, with every field defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub amount: f64,
    pub kind: BillKind,
    pub asset_name: String,
    pub counter_asset_name: Option<String>,
    pub category_path: Option<String>,
    pub time: Option<String>,
    pub memo: Option<String>,
    pub currency: Option<String>,
    pub fee: Option<f64>,
}

impl RawCandidate {
    /// Build from a loosely-typed JSON object.
    ///
    /// Wrong types never fail: amounts accept numbers or numeric strings,
    /// `type` accepts a code or a name, anything else falls back to defaults.
    pub fn from_json(value: &Value) -> Self {
        let field = |keys: &[&str]| keys.iter().find_map(|k| value.get(*k)).filter(|v| !v.is_null());

        Self {
            amount: field(&["amount", "money"]).and_then(number).unwrap_or(0.0),
            kind: field(&["type", "kind"]).and_then(kind).unwrap_or_default(),
            asset_name: field(&["asset_name", "accountname"])
                .and_then(text)
                .unwrap_or_default(),
            counter_asset_name: field(&["to_asset_name", "counter_asset_name"]).and_then(text),
            category_path: field(&["category_name", "category"]).and_then(text),
            time: field(&["time"]).and_then(text),
            memo: field(&["remarks", "remark", "memo"]).and_then(text),
            currency: field(&["currency"]).and_then(text),
            fee: field(&["fee"]).and_then(number),
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches(['¥', '$', '€']).parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

fn kind(value: &Value) -> Option<BillKind> {
    match value {
        Value::Number(n) => n.as_i64().and_then(BillKind::from_code),
        Value::String(s) => BillKind::from_label(s),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A candidate whose category and icon have been resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledCandidate {
    pub amount: f64,
    pub kind: BillKind,
    pub asset_name: String,

    /// Whether `asset_name` names a configured asset
    pub asset_known: bool,

    pub counter_asset_name: Option<String>,

    /// Existing taxonomy path, the uncategorized label, or `None`
    pub category: Option<String>,

    pub icon: String,
    pub time: Option<NaiveDateTime>,
    pub memo: String,
    pub currency: Option<String>,
    pub fee: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_full() {
        let raw = RawCandidate::from_json(&json!({
            "amount": 25.5,
            "type": 0,
            "asset_name": "微信",
            "category_name": "餐饮/::/午餐",
            "time": "2024-05-01 12:30:00",
            "remarks": "牛肉面",
            "currency": "CNY"
        }));
        assert_eq!(raw.amount, 25.5);
        assert_eq!(raw.kind, BillKind::Expense);
        assert_eq!(raw.asset_name, "微信");
        assert_eq!(raw.category_path.as_deref(), Some("餐饮/::/午餐"));
        assert_eq!(raw.memo.as_deref(), Some("牛肉面"));
        assert_eq!(raw.fee, None);
    }

    #[test]
    fn test_from_json_lenient() {
        let raw = RawCandidate::from_json(&json!({
            "amount": "12.80",
            "type": "transfer",
            "to_asset_name": "招行",
            "fee": "1",
            "category_name": ""
        }));
        assert_eq!(raw.amount, 12.8);
        assert_eq!(raw.kind, BillKind::Transfer);
        assert_eq!(raw.counter_asset_name.as_deref(), Some("招行"));
        assert_eq!(raw.fee, Some(1.0));
        assert_eq!(raw.category_path, None);
    }

    #[test]
    fn test_from_json_garbage_defaults() {
        let raw = RawCandidate::from_json(&json!({"amount": [1], "type": 9, "asset_name": {}}));
        assert_eq!(raw, RawCandidate::default());
    }
}
