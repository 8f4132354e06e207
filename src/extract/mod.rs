//! Natural-language extraction: text -> transaction candidates.
//!
//! One chat-completion request per call. The system prompt carries the
//! user's assets, categories, currencies and the current time; the reply is
//! parsed leniently and reconciled against the same snapshot.

pub mod parse;
pub mod prompt;

use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::adapters::llm::{ChatRequest, CompletionClient};
use crate::domain::{RawCandidate, ReconciledCandidate, TaxonomyKind};
use crate::reconcile::{reconcile_all, ReconcileContext};
use crate::store::{AssetStore, CurrencyStore, TaxonomyStore};

pub use parse::{parse_candidates, strip_code_fences};
pub use prompt::{PromptContext, PromptSource};

/// Errors from one extraction round trip
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction is not configured: missing API key")]
    NotConfigured,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model returned no choices")]
    EmptyChoices,

    #[error("Model returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unrecognized response shape: {0}")]
    UnrecognizedShape(String),
}

/// How many transactions the text is expected to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    #[default]
    Single,
    Multi,
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMode::Single => write!(f, "single"),
            ExtractionMode::Multi => write!(f, "multi"),
        }
    }
}

/// Extraction + reconciliation against live store snapshots
#[derive(Clone)]
pub struct ExtractionService {
    client: Arc<dyn CompletionClient>,
    taxonomy: Arc<dyn TaxonomyStore>,
    assets: Arc<dyn AssetStore>,
    currencies: Arc<dyn CurrencyStore>,
    prompts: Arc<dyn PromptSource>,
}

impl ExtractionService {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        taxonomy: Arc<dyn TaxonomyStore>,
        assets: Arc<dyn AssetStore>,
        currencies: Arc<dyn CurrencyStore>,
        prompts: Arc<dyn PromptSource>,
    ) -> Self {
        Self {
            client,
            taxonomy,
            assets,
            currencies,
            prompts,
        }
    }

    fn reconcile_context(&self) -> ReconcileContext {
        ReconcileContext::from_stores(self.taxonomy.as_ref(), self.assets.as_ref())
    }

    /// Build the system prompt for `mode` at time `now`
    pub fn system_prompt(&self, ctx: &ReconcileContext, mode: ExtractionMode, now: NaiveDateTime) -> String {
        let prompt_ctx = PromptContext::new(
            ctx.assets(),
            ctx.nodes(TaxonomyKind::Expense),
            ctx.nodes(TaxonomyKind::Income),
            &self.currencies.currencies(),
            now,
        );
        let template = prompt::select_template(mode, &self.prompts.prompt_overrides());
        prompt_ctx.render(&template)
    }

    /// Ask the model; returns raw candidates
    pub async fn extract(&self, text: &str, mode: ExtractionMode) -> Result<Vec<RawCandidate>, ExtractionError> {
        let ctx = self.reconcile_context();
        self.extract_with(&ctx, text, mode).await
    }

    async fn extract_with(
        &self,
        ctx: &ReconcileContext,
        text: &str,
        mode: ExtractionMode,
    ) -> Result<Vec<RawCandidate>, ExtractionError> {
        let now = chrono::Local::now().naive_local();
        let request = ChatRequest::json(self.system_prompt(ctx, mode, now), text);
        let content = self.client.complete(request).await?;
        tracing::debug!(response = %content, "Model response");
        parse_candidates(&content, mode)
    }

    /// Extract and reconcile with the same snapshot
    #[tracing::instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn analyze(
        &self,
        text: &str,
        mode: ExtractionMode,
    ) -> Result<Vec<ReconciledCandidate>, ExtractionError> {
        let ctx = self.reconcile_context();
        let raws = self.extract_with(&ctx, text, mode).await?;
        tracing::info!(count = raws.len(), "Extracted candidates");
        Ok(reconcile_all(raws, &ctx))
    }
}
