//! The run orchestrator: harvest → source → budget check → verify, strictly
//! sequential under one wall-clock deadline.
//!
//! Phases never overlap. Each phase future runs under
//! `tokio::time::timeout_at`, so crossing the deadline drops the in-flight
//! future and releases the underlying request, rather than merely announcing
//! the breach. Empty phases short-circuit; a denied budget aborts before the
//! costly verification call; any other error is caught here and converted
//! into a failed result. `run()` never returns an error.

use std::future::Future;
use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use dealscout_common::{
    DealscoutError, EventSink, Phase, PipelineConfig, PipelineResult, PipelineStats, ProgressKind,
    TokenUsage,
};

use crate::budget;
use crate::harvester::IntentHarvester;
use crate::matcher::SourceMatcher;
use crate::traits::{CostGovernor, Generative, SearchProvider};
use crate::verifier::VerificationGateway;

pub struct PipelineOrchestrator {
    harvester: IntentHarvester,
    matcher: SourceMatcher,
    verifier: VerificationGateway,
    governor: Arc<dyn CostGovernor>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        searcher: Arc<dyn SearchProvider>,
        generative: Arc<dyn Generative>,
        governor: Arc<dyn CostGovernor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            harvester: IntentHarvester::new(searcher.clone(), config.clone()),
            matcher: SourceMatcher::new(searcher, config.clone()),
            verifier: VerificationGateway::new(generative, config.clone()),
            governor,
            config,
        }
    }

    /// Run one full pipeline cycle. Always returns a well-formed result;
    /// failures are data. Progress events flow through `sink` in strict
    /// chronological order.
    pub async fn run(&self, mut sink: EventSink) -> PipelineResult {
        let deadline = Instant::now() + std::time::Duration::from_secs(self.config.deadline_secs);
        let mut stats = PipelineStats::default();

        let result = match self.run_phases(&mut sink, &mut stats, deadline).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Pipeline run failed");
                PipelineResult::failed(e.to_string(), std::mem::take(&mut stats))
            }
        };

        sink.emit(
            ProgressKind::Done {
                success: result.success,
            },
            format!(
                "Run complete: {} opportunities, ~{}¢ spent",
                result.opportunities.len(),
                result.estimated_cost_cents
            ),
        );
        result
    }

    async fn run_phases(
        &self,
        sink: &mut EventSink,
        stats: &mut PipelineStats,
        deadline: Instant,
    ) -> Result<PipelineResult, DealscoutError> {
        // --- HARVEST ---
        sink.emit(
            ProgressKind::PhaseStarted {
                phase: Phase::Harvest,
            },
            "Harvesting buy intents",
        );
        let harvest = self
            .bounded(deadline, Phase::Harvest, sink, self.harvester.harvest())
            .await?;
        stats.intents_found = harvest.intents.len() as u32;
        stats.intents_priced = harvest.intents.iter().filter(|i| i.has_stated_price).count() as u32;
        stats.search_calls += harvest.search_calls;
        stats.diagnostics.extend(harvest.diagnostics);
        sink.emit(
            ProgressKind::HarvestComplete {
                intents: stats.intents_found,
                priced: stats.intents_priced,
            },
            format!(
                "Harvested {} buy intents ({} priced)",
                stats.intents_found, stats.intents_priced
            ),
        );

        if harvest.intents.is_empty() {
            return Ok(self.empty_result("no buy intents harvested", stats));
        }

        // --- SOURCE ---
        sink.emit(
            ProgressKind::PhaseStarted {
                phase: Phase::Source,
            },
            "Searching marketplaces for matches",
        );
        let sourcing = self
            .bounded(
                deadline,
                Phase::Source,
                sink,
                self.matcher
                    .find_matches(&harvest.intents, self.config.match_cap),
            )
            .await?;
        stats.matches_found = sourcing.matched.len() as u32;
        stats.search_calls += sourcing.search_calls;
        stats.diagnostics.extend(sourcing.diagnostics);
        sink.emit(
            ProgressKind::SourceComplete {
                matches: stats.matches_found,
            },
            format!("Found {} candidate matches", stats.matches_found),
        );

        if sourcing.matched.is_empty() {
            return Ok(self.empty_result("no profitable matches found", stats));
        }

        // --- BUDGET CHECK ---
        sink.emit(
            ProgressKind::PhaseStarted {
                phase: Phase::BudgetCheck,
            },
            "Checking budget before verification",
        );
        let status = self.governor.check_budget().await?;
        if !status.allowed {
            warn!(
                used_cents = status.used_cents,
                limit_cents = status.limit_cents,
                "Budget denied, skipping verification"
            );
            sink.emit(
                ProgressKind::BudgetDenied {
                    used_cents: status.used_cents,
                    limit_cents: status.limit_cents,
                },
                "Budget exhausted before verification",
            );
            let mut result = PipelineResult::failed(
                format!(
                    "budget denied: {}¢ used of {}¢ limit",
                    status.used_cents, status.limit_cents
                ),
                std::mem::take(stats),
            );
            result.estimated_cost_cents = budget::estimate_run_cost_cents(
                TokenUsage::default(),
                result.stats.search_calls,
                &self.config,
            );
            return Ok(result);
        }

        // --- VERIFY ---
        sink.emit(
            ProgressKind::PhaseStarted {
                phase: Phase::Verify,
            },
            "Verifying top matches",
        );
        let verified = self
            .bounded(
                deadline,
                Phase::Verify,
                sink,
                self.verifier.verify(&sourcing.matched),
            )
            .await??;
        stats.opportunities_verified = verified.opportunities.len() as u32;
        sink.emit(
            ProgressKind::VerifyComplete {
                opportunities: stats.opportunities_verified,
            },
            format!("{} opportunities verified", stats.opportunities_verified),
        );

        let estimated_cost_cents =
            budget::estimate_run_cost_cents(verified.tokens, stats.search_calls, &self.config);
        let search_cost = stats.search_calls as i64 * self.config.search_cost_cents;
        if let Err(e) = self
            .governor
            .record_usage(
                "verification",
                verified.tokens.input_tokens,
                verified.tokens.output_tokens,
                search_cost,
            )
            .await
        {
            warn!(error = %e, "Failed to record usage, continuing");
        }

        info!(
            opportunities = stats.opportunities_verified,
            cost_cents = estimated_cost_cents,
            "Pipeline run complete"
        );

        Ok(PipelineResult {
            success: true,
            opportunities: verified.opportunities,
            reasoning: verified.reasoning,
            tokens: verified.tokens,
            estimated_cost_cents,
            abort_reason: None,
            error: None,
            stats: std::mem::take(stats),
        })
    }

    /// Run one phase future under the shared deadline. On expiry the future
    /// is dropped, cancelling whatever call was in flight; an error event
    /// is emitted and the run resolves as failed.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        phase: Phase,
        sink: &mut EventSink,
        fut: impl Future<Output = T>,
    ) -> Result<T, DealscoutError> {
        match timeout_at(deadline, fut).await {
            Ok(value) => Ok(value),
            Err(_) => {
                error!(%phase, "Deadline exceeded, cancelling in-flight work");
                sink.emit(
                    ProgressKind::Error { phase },
                    format!("Deadline exceeded during {phase}"),
                );
                Err(DealscoutError::DeadlineExceeded(self.config.deadline_secs))
            }
        }
    }

    /// A phase produced nothing: a successful run with an explicit reason
    /// and no verification spend.
    fn empty_result(&self, reason: &str, stats: &mut PipelineStats) -> PipelineResult {
        info!(reason, "Pipeline short-circuit");
        let stats = std::mem::take(stats);
        let estimated_cost_cents = budget::estimate_run_cost_cents(
            TokenUsage::default(),
            stats.search_calls,
            &self.config,
        );
        PipelineResult {
            success: true,
            opportunities: Vec::new(),
            reasoning: String::new(),
            tokens: TokenUsage::default(),
            estimated_cost_cents,
            abort_reason: Some(reason.to_string()),
            error: None,
            stats,
        }
    }
}
