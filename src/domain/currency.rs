//! Currency table and base-currency conversion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rates are units of currency per one base unit (1 CNY = 0.14 USD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyTable {
    pub base: String,

    pub rates: BTreeMap<String, f64>,

    /// Codes offered to the model and the form
    pub active: Vec<String>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        let rates: BTreeMap<String, f64> = [
            ("CNY", 1.0),
            ("USD", 0.14),
            ("EUR", 0.13),
            ("PLN", 0.56),
            ("HKD", 1.09),
            ("JPY", 20.0),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        Self {
            base: "CNY".to_string(),
            active: rates.keys().cloned().collect(),
            rates,
        }
    }
}

/// Result of converting a foreign amount into the base currency
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub base_amount: f64,

    /// Memo suffix, e.g. `(10.00 EUR ≈ 76.92 CNY)`
    pub note: String,
}

impl CurrencyTable {
    /// Normalize a currency code; blank means base
    pub fn normalize(&self, code: Option<&str>) -> String {
        match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => code.to_uppercase(),
            None => self.base.clone(),
        }
    }

    /// Convert `amount` in `code` to the base currency.
    ///
    /// Returns `None` when the code already is the base currency or when no
    /// usable rate is known; the amount is then committed unchanged.
    pub fn convert(&self, amount: f64, code: &str) -> Option<Conversion> {
        let code = code.trim().to_uppercase();
        if code == self.base {
            return None;
        }
        let rate = *self.rates.get(&code)?;
        if rate <= 0.0 {
            return None;
        }
        let base_amount = round_cents(amount / rate);
        Some(Conversion {
            base_amount,
            note: format!("({:.2} {} ≈ {:.2} {})", amount, code, base_amount, self.base),
        })
    }
}

/// Round to two decimal places
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_eur() {
        let table = CurrencyTable::default();
        let conv = table.convert(10.0, "eur").unwrap();
        assert_eq!(conv.base_amount, 76.92);
        assert_eq!(conv.note, "(10.00 EUR ≈ 76.92 CNY)");
    }

    #[test]
    fn test_base_and_unknown_are_unconverted() {
        let table = CurrencyTable::default();
        assert!(table.convert(10.0, "CNY").is_none());
        assert!(table.convert(10.0, "XYZ").is_none());
    }

    #[test]
    fn test_normalize() {
        let table = CurrencyTable::default();
        assert_eq!(table.normalize(Some(" usd ")), "USD");
        assert_eq!(table.normalize(Some("")), "CNY");
        assert_eq!(table.normalize(None), "CNY");
    }
}
