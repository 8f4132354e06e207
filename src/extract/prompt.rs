//! System prompt templates and the context substituted into them.

use chrono::NaiveDateTime;

use super::ExtractionMode;
use crate::domain::taxonomy::flatten_paths;
use crate::domain::{Asset, CurrencyTable, TaxonomyNode};
use crate::store::{PromptOverrides, SettingsStore};

pub const SINGLE_TEMPLATE: &str = r#"You extract one bookkeeping transaction from the user's message.

Context
- Assets: {{ASSETS}}
- Expense categories: {{EXPENSE_CATS}}
- Income categories: {{INCOME_CATS}}
- Currencies: {{CURRENCIES}}
- Current time: {{TIME}}

Rules
1. category_name must be copied from the matching category list. Two-level
   categories are written in full with "/::/", e.g. "{{DEMO_EXPENSE_CAT}}".
2. asset_name must be one of the assets.
3. type: 0 expense, 1 income, 2 transfer between own assets, 3 credit repayment.
   Transfers and repayments set to_asset_name and leave category_name empty.
4. Resolve relative times ("just now", "last night") against the current time
   and write them as "yyyy-MM-dd HH:mm:ss".
5. remarks holds the concrete detail (shop, item); fall back to the category name.

Reply with a single JSON object and nothing else, for example:
{"amount":0.0,"type":0,"asset_name":"{{DEMO_ASSET}}","category_name":"{{DEMO_EXPENSE_CAT}}","time":"2024-01-01 12:00:00","remarks":"","currency":"CNY","to_asset_name":"","fee":0.0}
"#;

pub const MULTI_TEMPLATE: &str = r#"You extract every bookkeeping transaction mentioned in the user's message.

Context
- Assets: {{ASSETS}}
- Expense categories: {{EXPENSE_CATS}}
- Income categories: {{INCOME_CATS}}
- Currencies: {{CURRENCIES}}
- Current time: {{TIME}}

Rules
1. Each separate amount is its own transaction.
2. Categories and assets must be copied from the lists above; two-level
   categories use "/::/", e.g. "{{DEMO_EXPENSE_CAT}}" or "{{DEMO_INCOME_CAT}}".
3. type: 0 expense, 1 income, 2 transfer, 3 repayment.
4. Keep times consistent across the message ("then", "after that"), relative
   to the current time, formatted "yyyy-MM-dd HH:mm:ss".
5. remarks holds the concrete detail of each transaction.

Reply with JSON only, in this shape:
{"candidates":[{"amount":0.0,"type":0,"asset_name":"{{DEMO_ASSET}}","category_name":"{{DEMO_EXPENSE_CAT}}","time":"2024-01-01 12:00:00","remarks":"","currency":"CNY"}]}
"#;

/// Source of user template overrides
pub trait PromptSource: Send + Sync {
    fn prompt_overrides(&self) -> PromptOverrides;
}

impl PromptSource for PromptOverrides {
    fn prompt_overrides(&self) -> PromptOverrides {
        self.clone()
    }
}

impl PromptSource for SettingsStore {
    fn prompt_overrides(&self) -> PromptOverrides {
        self.prompts()
    }
}

/// Built-in template for a mode
pub fn default_template(mode: ExtractionMode) -> &'static str {
    match mode {
        ExtractionMode::Single => SINGLE_TEMPLATE,
        ExtractionMode::Multi => MULTI_TEMPLATE,
    }
}

/// User template if set, else the built-in one
pub fn select_template(mode: ExtractionMode, overrides: &PromptOverrides) -> String {
    let custom = match mode {
        ExtractionMode::Single => &overrides.single,
        ExtractionMode::Multi => &overrides.multi,
    };
    if custom.trim().is_empty() {
        default_template(mode).to_string()
    } else {
        custom.clone()
    }
}

/// Values substituted into a template
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub assets: Vec<String>,
    pub expense_paths: Vec<String>,
    pub income_paths: Vec<String>,
    pub currencies: Vec<String>,
    pub now: NaiveDateTime,
}

impl PromptContext {
    pub fn new(
        assets: &[Asset],
        expense: &[TaxonomyNode],
        income: &[TaxonomyNode],
        currencies: &CurrencyTable,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            assets: assets.iter().map(|a| a.name.clone()).collect(),
            expense_paths: flatten_paths(expense),
            income_paths: flatten_paths(income),
            currencies: currencies.active.clone(),
            now,
        }
    }

    /// `yyyy-MM-dd HH:mm:ss (Weekday)`
    pub fn time_label(&self) -> String {
        self.now.format("%Y-%m-%d %H:%M:%S (%A)").to_string()
    }

    /// Substitute every placeholder
    pub fn render(&self, template: &str) -> String {
        let json = |items: &[String]| serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
        let first_or = |items: &[String], fallback: &str| {
            items.first().cloned().unwrap_or_else(|| fallback.to_string())
        };

        template
            .replace("{{TIME}}", &self.time_label())
            .replace("{{ASSETS}}", &json(&self.assets))
            .replace("{{EXPENSE_CATS}}", &json(&self.expense_paths))
            .replace("{{INCOME_CATS}}", &json(&self.income_paths))
            .replace("{{CURRENCIES}}", &json(&self.currencies))
            .replace("{{DEMO_ASSET}}", &first_or(&self.assets, "微信"))
            .replace("{{DEMO_EXPENSE_CAT}}", &first_or(&self.expense_paths, "餐饮/::/午餐"))
            .replace("{{DEMO_INCOME_CAT}}", &first_or(&self.income_paths, "工资"))
    }
}
