//! In-memory doubles for the pipeline's collaborators, plus fixture
//! builders. No network, no API keys; every test runs on `cargo test` alone.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use ai_client::{Completion, Usage};
use dealscout_common::{
    BuyIntent, FeeBreakdown, Marketplace, MatchedOpportunity, PipelineConfig, SourceListing,
};
use tavily_client::{SearchDepth, SearchResult};

use crate::traits::{BudgetStatus, CostGovernor, Generative, SearchProvider};

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

enum CannedResponse {
    Results(Vec<SearchResult>),
    Error(String),
}

/// Pattern-keyed search double: the first pattern contained in the query
/// wins. Unmatched queries return no results. Records every query it sees.
pub struct MockSearcher {
    responses: Vec<(String, CannedResponse)>,
    queries: Mutex<Vec<String>>,
    delay_ms: u64,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            queries: Mutex::new(Vec::new()),
            delay_ms: 0,
        }
    }

    /// Simulate a slow upstream; lets deadline tests observe cancellation.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_results(mut self, pattern: &str, results: Vec<SearchResult>) -> Self {
        self.responses
            .push((pattern.to_string(), CannedResponse::Results(results)));
        self
    }

    pub fn with_error(mut self, pattern: &str, message: &str) -> Self {
        self.responses
            .push((pattern.to_string(), CannedResponse::Error(message.to_string())));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for MockSearcher {
    async fn search(
        &self,
        query: &str,
        _max_results: usize,
        _depth: SearchDepth,
    ) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        for (pattern, response) in &self.responses {
            if query.contains(pattern.as_str()) {
                return match response {
                    CannedResponse::Results(results) => Ok(results.clone()),
                    CannedResponse::Error(message) => Err(anyhow!("{message}")),
                };
            }
        }
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// MockGenerative
// ---------------------------------------------------------------------------

pub struct MockGenerative {
    response: Result<String, String>,
    calls: AtomicU32,
    last_user: Mutex<String>,
}

impl MockGenerative {
    pub fn with_response(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            calls: AtomicU32::new(0),
            last_user: Mutex::new(String::new()),
        }
    }

    pub fn with_error(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicU32::new(0),
            last_user: Mutex::new(String::new()),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn last_user_content(&self) -> String {
        self.last_user.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generative for MockGenerative {
    async fn complete(&self, _system: &str, user: &str, _max_tokens: u32) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *self.last_user.lock().unwrap() = user.to_string();
        match &self.response {
            Ok(text) => Ok(Completion {
                text: text.clone(),
                usage: Usage {
                    input_tokens: 100,
                    output_tokens: 42,
                },
            }),
            Err(message) => Err(anyhow!("{message}")),
        }
    }
}

// ---------------------------------------------------------------------------
// MockGovernor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUsage {
    pub label: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub other_cost_cents: i64,
}

pub struct MockGovernor {
    allowed: bool,
    used_cents: u64,
    limit_cents: u64,
    recorded: Mutex<Vec<RecordedUsage>>,
}

impl MockGovernor {
    pub fn allowing() -> Self {
        Self {
            allowed: true,
            used_cents: 0,
            limit_cents: 0,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn denying(used_cents: u64, limit_cents: u64) -> Self {
        Self {
            allowed: false,
            used_cents,
            limit_cents,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<RecordedUsage> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl CostGovernor for MockGovernor {
    async fn check_budget(&self) -> Result<BudgetStatus> {
        Ok(BudgetStatus {
            allowed: self.allowed,
            used_cents: self.used_cents,
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
        self.recorded.lock().unwrap().push(RecordedUsage {
            label: label.to_string(),
            input_tokens,
            output_tokens,
            other_cost_cents,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn base36_encode(mut n: u64) -> String {
    let mut out = Vec::new();
    loop {
        let d = (n % 36) as u32;
        out.push(std::char::from_digit(d, 36).expect("digit < 36"));
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.into_iter().rev().collect()
}

/// A swap-venue posting as it comes back from the search intermediary.
pub fn swap_result(post_id: u64, title: &str, content: &str) -> SearchResult {
    SearchResult {
        url: format!(
            "https://www.reddit.com/r/hardwareswap/comments/{}/post/",
            base36_encode(post_id)
        ),
        title: title.to_string(),
        content: content.to_string(),
        published_date: None,
    }
}

/// A marketplace listing as it comes back from the search intermediary.
/// The asking price lives in the title, where listings put it.
pub fn listing_result(url: &str, title: &str) -> SearchResult {
    SearchResult {
        url: url.to_string(),
        title: title.to_string(),
        content: String::new(),
        published_date: None,
    }
}

pub fn priced_intent(item: &str, max_price_cents: i64) -> BuyIntent {
    BuyIntent {
        item_wanted: item.to_string(),
        max_price_cents,
        has_stated_price: true,
        location: Some("USA-NY".to_string()),
        counterpart_handle: "dealmaker".to_string(),
        counterpart_reputation: 30,
        source: "hardwareswap".to_string(),
        post_url: "https://www.reddit.com/r/hardwareswap/comments/1abc2d/post".to_string(),
        post_age_hours: 12.0,
        created_at: Utc::now(),
    }
}

pub fn priceless_intent(item: &str) -> BuyIntent {
    BuyIntent {
        max_price_cents: 0,
        has_stated_price: false,
        ..priced_intent(item, 0)
    }
}

/// A matched opportunity with fees computed the way the matcher computes
/// them, so invariants hold in fixtures too.
pub fn matched_opportunity(
    item: &str,
    sell_price_cents: i64,
    listing_price_cents: i64,
) -> MatchedOpportunity {
    let config = PipelineConfig::default();
    let fees = crate::fees::compute_fees(sell_price_cents, "hardwareswap", &config);
    MatchedOpportunity {
        intent: priced_intent(item, sell_price_cents),
        listing: SourceListing {
            title: format!("{item} - listing"),
            price_cents: listing_price_cents,
            url: "https://www.ebay.com/itm/1234567890".to_string(),
            marketplace: Marketplace::Ebay,
        },
        estimated_profit_cents: sell_price_cents - listing_price_cents - fees.total_cents,
        fees,
        confidence: 70,
        estimated_market_price_cents: None,
    }
}

/// FeeBreakdown re-export convenience for assertions.
pub fn fees_for(sell_price_cents: i64, venue: &str) -> FeeBreakdown {
    crate::fees::compute_fees(sell_price_cents, venue, &PipelineConfig::default())
}
