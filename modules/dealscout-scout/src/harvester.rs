//! Phase 1: harvest buy intents from discussion venues.
//!
//! One search per configured venue through the text-search capability, each
//! attempted independently: a venue failure becomes a diagnostic, never an
//! abort. A fixed politeness delay separates queries. Classification and
//! price extraction live in [`crate::intent`]; freshness in
//! [`crate::freshness`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use dealscout_common::{canonical_url, BuyIntent, PipelineConfig, SourceDiagnostic, Venue};
use tavily_client::{SearchDepth, SearchResult};

use crate::freshness;
use crate::intent;
use crate::traits::SearchProvider;

/// Age assumed when the intermediary returns no usable publish date.
const DEFAULT_POST_AGE_HOURS: f64 = 48.0;

#[derive(Debug, Default)]
pub struct HarvestOutcome {
    pub intents: Vec<BuyIntent>,
    pub diagnostics: Vec<SourceDiagnostic>,
    pub search_calls: u32,
}

pub struct IntentHarvester {
    searcher: Arc<dyn SearchProvider>,
    config: PipelineConfig,
}

impl IntentHarvester {
    pub fn new(searcher: Arc<dyn SearchProvider>, config: PipelineConfig) -> Self {
        Self { searcher, config }
    }

    pub async fn harvest(&self) -> HarvestOutcome {
        let mut outcome = HarvestOutcome::default();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for (i, venue) in self.config.venues.iter().enumerate() {
            if i > 0 {
                sleep(Duration::from_millis(self.config.search_delay_ms)).await;
            }

            let started = Instant::now();
            outcome.search_calls += 1;

            let results = match self
                .searcher
                .search(&venue.query, self.config.results_per_venue, SearchDepth::Basic)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    warn!(venue = venue.name.as_str(), error = %e, "Venue search failed");
                    outcome.diagnostics.push(SourceDiagnostic::error(
                        &venue.name,
                        started.elapsed().as_millis() as u64,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            if results.is_empty() {
                outcome.diagnostics.push(SourceDiagnostic::empty(
                    &venue.name,
                    started.elapsed().as_millis() as u64,
                ));
                continue;
            }

            let mut accepted = 0u32;
            for result in &results {
                let Some(candidate) = self.intent_from_result(venue, result) else {
                    continue;
                };
                if seen_urls.insert(candidate.post_url.clone()) {
                    outcome.intents.push(candidate);
                    accepted += 1;
                }
            }

            outcome.diagnostics.push(SourceDiagnostic::success(
                &venue.name,
                accepted,
                started.elapsed().as_millis() as u64,
            ));
        }

        let dropped = freshness::retain_fresh(&mut outcome.intents, self.config.freshness_id_window);

        // Stated-price postings first; within each group, highest price first.
        outcome.intents.sort_by(|a, b| {
            b.has_stated_price
                .cmp(&a.has_stated_price)
                .then(b.max_price_cents.cmp(&a.max_price_cents))
        });

        info!(
            intents = outcome.intents.len(),
            stale_dropped = dropped,
            search_calls = outcome.search_calls,
            "Harvest complete"
        );
        outcome
    }

    /// Classify and normalize one search result. `None` drops the record
    /// silently: not buy-intent, or item text too thin.
    fn intent_from_result(&self, venue: &Venue, result: &SearchResult) -> Option<BuyIntent> {
        if !intent::is_buy_intent(&result.title) {
            return None;
        }

        let item_wanted = intent::item_text(&result.title)?;

        let max_price_cents = intent::ceiling_price_cents(
            &result.title,
            &result.content,
            self.config.body_scan_chars,
            self.config.price_floor_cents,
            self.config.price_ceiling_cents,
        )
        .unwrap_or(0);

        Some(BuyIntent {
            item_wanted,
            max_price_cents,
            has_stated_price: max_price_cents > 0,
            location: intent::location_tag(&result.title),
            counterpart_handle: intent::counterpart_handle(&result.content),
            counterpart_reputation: intent::counterpart_reputation(&result.content),
            source: venue.name.clone(),
            post_url: canonical_url(&result.url),
            post_age_hours: post_age_hours(result.published_date.as_deref()),
            created_at: Utc::now(),
        })
    }
}

fn post_age_hours(published_date: Option<&str>) -> f64 {
    let Some(raw) = published_date else {
        return DEFAULT_POST_AGE_HOURS;
    };
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| {
                d.and_hms_opt(0, 0, 0)
                    .expect("midnight is valid")
                    .and_utc()
            })
        });
    match parsed {
        Ok(dt) => ((Utc::now() - dt).num_minutes() as f64 / 60.0).max(0.0),
        Err(_) => DEFAULT_POST_AGE_HOURS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{swap_result, MockSearcher};

    fn config_with_one_venue() -> PipelineConfig {
        PipelineConfig {
            venues: vec![Venue::new(
                "hardwareswap",
                "site:reddit.com/r/hardwareswap buy",
            )],
            search_delay_ms: 0,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn harvest_extracts_classifies_and_orders() {
        let searcher = MockSearcher::new().with_results(
            "hardwareswap",
            vec![
                swap_result(900_001, "[USA-NY] [H] $500 PayPal [W] GPU", "u/alpha · 12 Trades"),
                swap_result(900_002, "[USA-CA] [H] PayPal [W] Mech keyboard", "u/beta"),
                swap_result(900_003, "[H] $800 cash [W] RTX 4080", "u/gamma · 57 Trades"),
                swap_result(900_004, "[USA-TX] [H] RTX 3090 [W] PayPal", "sell post"),
            ],
        );
        let harvester = IntentHarvester::new(Arc::new(searcher), config_with_one_venue());

        let outcome = harvester.harvest().await;

        // The sell post is rejected; three buy intents survive.
        assert_eq!(outcome.intents.len(), 3);
        assert_eq!(outcome.search_calls, 1);

        // Priced before priceless, highest price first.
        assert_eq!(outcome.intents[0].max_price_cents, 80_000);
        assert_eq!(outcome.intents[1].max_price_cents, 50_000);
        assert!(!outcome.intents[2].has_stated_price);
        assert_eq!(outcome.intents[2].max_price_cents, 0);

        // Invariant: has_stated_price == (max_price_cents > 0), price >= 0.
        for intent in &outcome.intents {
            assert!(intent.max_price_cents >= 0);
            assert_eq!(intent.has_stated_price, intent.max_price_cents > 0);
        }

        assert_eq!(outcome.intents[0].counterpart_handle, "gamma");
        assert_eq!(outcome.intents[0].counterpart_reputation, 57);
    }

    #[tokio::test]
    async fn harvest_dedups_by_canonical_url() {
        let searcher = MockSearcher::new().with_results(
            "hardwareswap",
            vec![
                swap_result(900_010, "[H] $500 PayPal [W] GPU", "u/alpha"),
                {
                    let mut dup = swap_result(900_010, "[H] $500 PayPal [W] GPU", "u/alpha");
                    dup.url = format!("{}?utm_source=share", dup.url);
                    dup
                },
            ],
        );
        let harvester = IntentHarvester::new(Arc::new(searcher), config_with_one_venue());

        let outcome = harvester.harvest().await;
        assert_eq!(outcome.intents.len(), 1);
    }

    #[tokio::test]
    async fn venue_failure_is_isolated() {
        let config = PipelineConfig {
            venues: vec![
                Venue::new("broken", "site:reddit.com/r/brokenvenue buy"),
                Venue::new("hardwareswap", "site:reddit.com/r/hardwareswap buy"),
            ],
            search_delay_ms: 0,
            ..PipelineConfig::default()
        };
        let searcher = MockSearcher::new()
            .with_error("brokenvenue", "504 gateway timeout")
            .with_results(
                "hardwareswap",
                vec![swap_result(900_020, "[H] $300 PayPal [W] SSD 2TB", "u/x")],
            );
        let harvester = IntentHarvester::new(Arc::new(searcher), config);

        let outcome = harvester.harvest().await;

        assert_eq!(outcome.intents.len(), 1);
        assert_eq!(outcome.search_calls, 2);
        assert_eq!(outcome.diagnostics.len(), 2);
        assert_eq!(
            outcome.diagnostics[0].status,
            dealscout_common::SourceStatus::Error
        );
        assert!(outcome.diagnostics[0].error.as_deref().unwrap().contains("504"));
        assert_eq!(
            outcome.diagnostics[1].status,
            dealscout_common::SourceStatus::Success
        );
    }

    #[tokio::test]
    async fn stale_postings_are_filtered_after_all_venues() {
        let mut config = config_with_one_venue();
        config.freshness_id_window = 100;
        let searcher = MockSearcher::new().with_results(
            "hardwareswap",
            vec![
                swap_result(900_000, "[H] $500 PayPal [W] GPU", "u/a"),
                swap_result(899_900, "[H] $400 PayPal [W] CPU", "u/b"),
                swap_result(899_899, "[H] $300 PayPal [W] PSU", "u/c"),
            ],
        );
        let harvester = IntentHarvester::new(Arc::new(searcher), config);

        let outcome = harvester.harvest().await;

        // Exactly-at-window retained, one past excluded.
        assert_eq!(outcome.intents.len(), 2);
        assert!(outcome
            .intents
            .iter()
            .all(|i| i.item_wanted == "GPU" || i.item_wanted == "CPU"));
    }

    #[test]
    fn post_age_parses_rfc3339_and_dates() {
        let recent = (Utc::now() - chrono::Duration::hours(3)).to_rfc3339();
        let age = post_age_hours(Some(&recent));
        assert!((2.9..3.1).contains(&age));

        assert_eq!(post_age_hours(None), DEFAULT_POST_AGE_HOURS);
        assert_eq!(post_age_hours(Some("garbage")), DEFAULT_POST_AGE_HOURS);
        assert!(post_age_hours(Some("2024-01-01")) > 0.0);
    }
}
