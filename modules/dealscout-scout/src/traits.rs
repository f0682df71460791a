// Trait abstractions for the pipeline's external collaborators.
//
// SearchProvider fronts the text-search capability, Generative the
// verification model, CostGovernor the budget ledger. These enable
// deterministic testing with MockSearcher, MockGenerative and MockGovernor:
// no network, no API keys. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;

use ai_client::{Claude, Completion};
use tavily_client::{SearchDepth, SearchResult, TavilyClient};

// ---------------------------------------------------------------------------
// SearchProvider — text-search capability
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchResult>>;
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchResult>> {
        Ok(TavilyClient::search(self, query, max_results, depth).await?)
    }
}

// ---------------------------------------------------------------------------
// Generative — verification capability
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Generative: Send + Sync {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<Completion>;
}

#[async_trait]
impl Generative for Claude {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<Completion> {
        Ok(Claude::complete(self, system, user, max_tokens).await?)
    }
}

// ---------------------------------------------------------------------------
// CostGovernor — budget check / usage recorder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct BudgetStatus {
    pub allowed: bool,
    pub used_cents: u64,
    /// 0 = unlimited.
    pub limit_cents: u64,
}

/// Consulted before the costly verification step. Implementations backing
/// shared counters must make the check-then-record pair transactional so two
/// concurrent runs cannot both pass a check only one should have passed.
#[async_trait]
pub trait CostGovernor: Send + Sync {
    async fn check_budget(&self) -> Result<BudgetStatus>;

    async fn record_usage(
        &self,
        label: &str,
        input_tokens: u64,
        output_tokens: u64,
        other_cost_cents: i64,
    ) -> Result<()>;
}
