//! Budget governance: the check consulted before verification and the usage
//! ledger written after it. `MemoryGovernor` is the in-process
//! implementation; production deployments back the same trait with a shared
//! store whose check-then-record pair is transactional across runs.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use dealscout_common::{PipelineConfig, TokenUsage};

use crate::traits::{BudgetStatus, CostGovernor};

/// Price token usage in cents using per-million rates, rounding half up.
pub fn token_cost_cents(tokens: TokenUsage, config: &PipelineConfig) -> i64 {
    let input = tokens.input_tokens as i64 * config.input_cents_per_mtok;
    let output = tokens.output_tokens as i64 * config.output_cents_per_mtok;
    (input + output + 500_000) / 1_000_000
}

/// Search calls are near-free but not free; they fold into one estimate with
/// the token cost.
pub fn estimate_run_cost_cents(
    tokens: TokenUsage,
    search_calls: u32,
    config: &PipelineConfig,
) -> i64 {
    token_cost_cents(tokens, config) + search_calls as i64 * config.search_cost_cents
}

/// Tracks spend against a limit. Thread-safe via atomics; `0 = unlimited`.
pub struct MemoryGovernor {
    limit_cents: u64,
    used_cents: AtomicU64,
    input_cents_per_mtok: i64,
    output_cents_per_mtok: i64,
}

impl MemoryGovernor {
    pub fn new(limit_cents: u64, config: &PipelineConfig) -> Self {
        Self {
            limit_cents,
            used_cents: AtomicU64::new(0),
            input_cents_per_mtok: config.input_cents_per_mtok,
            output_cents_per_mtok: config.output_cents_per_mtok,
        }
    }

    pub fn used_cents(&self) -> u64 {
        self.used_cents.load(Ordering::Relaxed)
    }

    pub fn log_status(&self) {
        if self.limit_cents > 0 {
            info!(
                used_cents = self.used_cents(),
                limit_cents = self.limit_cents,
                "Budget status"
            );
        }
    }
}

#[async_trait]
impl CostGovernor for MemoryGovernor {
    async fn check_budget(&self) -> Result<BudgetStatus> {
        let used_cents = self.used_cents();
        Ok(BudgetStatus {
            allowed: self.limit_cents == 0 || used_cents < self.limit_cents,
            used_cents,
            limit_cents: self.limit_cents,
        })
    }

    async fn record_usage(
        &self,
        label: &str,
        input_tokens: u64,
        output_tokens: u64,
        other_cost_cents: i64,
    ) -> Result<()> {
        let input = input_tokens as i64 * self.input_cents_per_mtok;
        let output = output_tokens as i64 * self.output_cents_per_mtok;
        let cents = ((input + output + 500_000) / 1_000_000 + other_cost_cents).max(0) as u64;
        let total = self.used_cents.fetch_add(cents, Ordering::Relaxed) + cents;
        debug!(label, cents, total, "Usage recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_governor_always_allows() {
        let governor = MemoryGovernor::new(0, &PipelineConfig::default());
        let status = governor.check_budget().await.unwrap();
        assert!(status.allowed);
        assert_eq!(status.limit_cents, 0);
    }

    #[tokio::test]
    async fn governor_denies_at_limit() {
        let governor = MemoryGovernor::new(100, &PipelineConfig::default());
        governor.record_usage("run", 0, 0, 100).await.unwrap();
        let status = governor.check_budget().await.unwrap();
        assert!(!status.allowed);
        assert_eq!(status.used_cents, 100);
    }

    #[tokio::test]
    async fn record_prices_tokens_with_rates() {
        let config = PipelineConfig::default();
        let governor = MemoryGovernor::new(0, &config);
        // 1M input at 100¢/M + 1M output at 500¢/M = 600¢.
        governor
            .record_usage("verify", 1_000_000, 1_000_000, 7)
            .await
            .unwrap();
        assert_eq!(governor.used_cents(), 607);
    }

    #[test]
    fn token_cost_rounds_half_up() {
        let config = PipelineConfig::default();
        // 5_000 input tokens at 100¢/M = 0.5¢ -> rounds to 1.
        let cost = token_cost_cents(
            TokenUsage {
                input_tokens: 5_000,
                output_tokens: 0,
            },
            &config,
        );
        assert_eq!(cost, 1);
    }

    #[test]
    fn run_estimate_includes_search_calls() {
        let config = PipelineConfig::default();
        let tokens = TokenUsage {
            input_tokens: 2_000_000,
            output_tokens: 0,
        };
        assert_eq!(
            estimate_run_cost_cents(tokens, 12, &config),
            200 + 12 * config.search_cost_cents
        );
    }
}
