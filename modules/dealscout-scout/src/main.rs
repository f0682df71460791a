use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use dealscout_common::{Config, EventSink, PipelineConfig, ProgressEvent};
use dealscout_scout::budget::MemoryGovernor;
use dealscout_scout::pipeline::PipelineOrchestrator;
use dealscout_scout::run_log::RunLog;
use tavily_client::TavilyClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dealscout=info".parse()?))
        .init();

    info!("Dealscout starting...");

    // Load config
    let config = Config::from_env();
    let pipeline_config = PipelineConfig::default();

    let searcher = Arc::new(TavilyClient::new(&config.tavily_api_key));
    let generative = Arc::new(Claude::new(
        &config.anthropic_api_key,
        &config.anthropic_model,
    ));
    let governor = Arc::new(MemoryGovernor::new(
        config.daily_budget_cents,
        &pipeline_config,
    ));

    let orchestrator = PipelineOrchestrator::new(
        searcher,
        generative,
        governor.clone(),
        pipeline_config,
    );

    let run_id = uuid::Uuid::new_v4().to_string();
    let mut run_log = RunLog::new(run_id.clone());

    // Event stream: log as they arrive, keep them for the run log.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            info!(seq = event.seq, "{}", event.message);
            events.push(event);
        }
        events
    });

    let result = orchestrator.run(EventSink::new(tx)).await;

    for event in printer.await? {
        run_log.record(event);
    }
    run_log.save(&result)?;
    governor.log_status();

    info!("{}", result.stats);
    if let Some(reason) = &result.abort_reason {
        info!(reason = reason.as_str(), "Run ended early");
    }
    for op in &result.opportunities {
        info!(
            title = op.title.as_str(),
            buy = op.buy_price_cents,
            sell = op.sell_price_cents,
            confidence = op.confidence,
            "Opportunity"
        );
    }

    Ok(())
}
