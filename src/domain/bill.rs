//! Persisted bills.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::kind::BillKind;

/// Wire format of bill times (ledger URL, backups, prompts)
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A committed transaction. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub amount: f64,

    pub kind: BillKind,

    pub asset_name: String,

    /// Resolved category path, or the counterparty label for account moves
    pub category: String,

    #[serde(with = "bill_time")]
    pub time: NaiveDateTime,

    #[serde(default)]
    pub memo: String,

    #[serde(default)]
    pub icon: String,

    /// When the bill was written locally
    pub captured_at: DateTime<Utc>,
}

/// Identity used for deletion and dedup: `(time, amount, category, asset)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BillIdentity {
    pub time: NaiveDateTime,
    pub amount_cents: i64,
    pub category: String,
    pub asset_name: String,
}

impl Bill {
    pub fn identity(&self) -> BillIdentity {
        BillIdentity {
            time: self.time,
            amount_cents: (self.amount * 100.0).round() as i64,
            category: self.category.clone(),
            asset_name: self.asset_name.clone(),
        }
    }

    /// Short key (SHA256(identity)[0:12]) used to address a bill from the CLI
    pub fn short_key(&self) -> String {
        self.identity().short_key()
    }
}

impl BillIdentity {
    pub fn short_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.time.format(TIME_FORMAT).to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.amount_cents.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.category.as_bytes());
        hasher.update(b"|");
        hasher.update(self.asset_name.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..12].to_string()
    }
}

/// Bill times carry whole seconds only, matching [`TIME_FORMAT`]
pub fn to_bill_time(time: NaiveDateTime) -> NaiveDateTime {
    time.trunc_subsecs(0)
}

/// Current local time as a bill time
pub fn now_bill_time() -> NaiveDateTime {
    to_bill_time(Local::now().naive_local())
}

/// Parse the time formats models and users commonly produce
pub fn parse_bill_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in [TIME_FORMAT, "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(t);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

mod bill_time {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::{parse_bill_time, TIME_FORMAT};

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_bill_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid bill time: {}", raw)))
    }
}
