//! Run log — persisted JSON timeline of every progress event in a run.
//!
//! Each run produces a single `{DATA_DIR}/scout-runs/{run_id}.json` file
//! containing the ordered event list plus the final stats.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use dealscout_common::{PipelineResult, PipelineStats, ProgressEvent};

/// Root data directory, controlled by `DATA_DIR` env var (default: `"data"`).
pub fn data_dir() -> PathBuf {
    PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

pub struct RunLog {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    events: Vec<ProgressEvent>,
}

impl RunLog {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, event: ProgressEvent) {
        self.events.push(event);
    }

    /// Serialize the run log to JSON and write to disk.
    /// Returns the file path on success.
    pub fn save(&self, result: &PipelineResult) -> Result<PathBuf> {
        let dir = data_dir().join("scout-runs");
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", self.run_id));

        let output = SerializedRunLog {
            run_id: &self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            success: result.success,
            opportunities: result.opportunities.len(),
            estimated_cost_cents: result.estimated_cost_cents,
            abort_reason: result.abort_reason.as_deref(),
            stats: &result.stats,
            events: &self.events,
        };

        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), events = self.events.len(), "Run log saved");

        Ok(path)
    }
}

#[derive(Serialize)]
struct SerializedRunLog<'a> {
    run_id: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    success: bool,
    opportunities: usize,
    estimated_cost_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    abort_reason: Option<&'a str>,
    stats: &'a PipelineStats,
    events: &'a [ProgressEvent],
}
