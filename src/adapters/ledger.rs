//! External ledger hand-off via the `qianji://publicapi/addbill` URL scheme.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::{BillKind, TIME_FORMAT};

const ADD_BILL_BASE: &str = "qianji://publicapi/addbill?";

/// Errors from launching the external ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No URL opener available: {0}")]
    OpenerUnavailable(String),

    #[error("Opener exited with status {0}")]
    OpenerFailed(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the ledger's add-bill call accepts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerRequest {
    pub kind: BillKind,
    pub amount: f64,
    pub currency: Option<String>,
    pub fee: f64,
    pub time: Option<NaiveDateTime>,
    pub category: Option<String>,
    pub asset: String,
    pub counter_asset: Option<String>,
    pub book_name: Option<String>,
    pub remark: Option<String>,
    pub show_result: bool,
}

/// Format an amount without trailing zeros (`12.5`, `30`)
pub fn format_amount(amount: f64) -> String {
    let s = format!("{:.2}", amount);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Build the add-bill URL. Blank values are left out entirely.
pub fn build_ledger_url(req: &LedgerRequest) -> String {
    let mut url = String::from(ADD_BILL_BASE);

    let mut push = |key: &str, value: Option<&str>| {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            return;
        };
        if !url.ends_with('?') {
            url.push('&');
        }
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    };

    push("type", Some(&req.kind.code().to_string()));
    push("money", Some(&format_amount(req.amount)));

    let currency = req
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| "CNY".to_string());
    push("currency", Some(&currency));

    if req.kind == BillKind::Transfer && req.fee != 0.0 {
        push("fee", Some(&format_amount(req.fee)));
    }

    let time = req
        .time
        .unwrap_or_else(|| chrono::Local::now().naive_local())
        .format(TIME_FORMAT)
        .to_string();
    push("time", Some(&time));

    push("catename", req.category.as_deref());
    push("accountname", Some(&req.asset));
    push("accountname2", req.counter_asset.as_deref());
    push("bookname", req.book_name.as_deref());
    push("remark", req.remark.as_deref());
    push("showresult", Some(if req.show_result { "1" } else { "0" }));

    url
}

/// Opens ledger URLs
pub trait LedgerLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<(), LedgerError>;
}

/// Hands the URL to the platform opener (`xdg-open`, `open`, `am start`, ...)
pub struct OpenerLauncher {
    program: String,
    args: Vec<String>,
}

impl OpenerLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Opener for the current platform
    pub fn platform() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("open", Vec::new())
        } else if cfg!(target_os = "android") {
            Self::new(
                "am",
                ["start", "-a", "android.intent.action.VIEW", "-d"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            )
        } else if cfg!(target_os = "windows") {
            Self::new("cmd", vec!["/C".into(), "start".into(), String::new()])
        } else {
            Self::new("xdg-open", Vec::new())
        }
    }
}

impl LedgerLauncher for OpenerLauncher {
    fn launch(&self, url: &str) -> Result<(), LedgerError> {
        let status = std::process::Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .status()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LedgerError::OpenerUnavailable(self.program.clone()),
                _ => LedgerError::Io(e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(LedgerError::OpenerFailed(status.code().unwrap_or(-1)))
        }
    }
}

/// Launcher that only logs; used when no ledger app is wanted
pub struct LogLauncher;

impl LedgerLauncher for LogLauncher {
    fn launch(&self, url: &str) -> Result<(), LedgerError> {
        tracing::info!("Ledger URL: {}", url);
        Ok(())
    }
}
