//! Phase 2: find cheaper marketplace listings for harvested intents.
//!
//! One marketplace search per intent, capped to bound external-call cost.
//! Two strategies keyed by `has_stated_price`: a priced intent is matched
//! against its stated ceiling; a priceless intent gets a market price imputed
//! from the median of comparable listings, with abnormally cheap listings
//! treated as candidate sources.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use dealscout_common::{
    BuyIntent, Marketplace, MatchedOpportunity, PipelineConfig, SourceDiagnostic, SourceListing,
};
use tavily_client::{SearchDepth, SearchResult};

use crate::confidence::{self, ConfidenceInputs};
use crate::fees;
use crate::intent;
use crate::traits::SearchProvider;

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedOpportunity>,
    pub diagnostics: Vec<SourceDiagnostic>,
    pub search_calls: u32,
}

pub struct SourceMatcher {
    searcher: Arc<dyn SearchProvider>,
    config: PipelineConfig,
}

impl SourceMatcher {
    pub fn new(searcher: Arc<dyn SearchProvider>, config: PipelineConfig) -> Self {
        Self { searcher, config }
    }

    /// Process at most `cap` intents, highest priority first (the harvester
    /// pre-sorts). Per-intent failures are isolated into diagnostics.
    pub async fn find_matches(&self, intents: &[BuyIntent], cap: usize) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        for (i, buy_intent) in intents.iter().take(cap).enumerate() {
            if i > 0 {
                sleep(Duration::from_millis(self.config.search_delay_ms)).await;
            }

            let label = format!("match:{}", buy_intent.item_wanted);
            let started = Instant::now();
            outcome.search_calls += 1;

            let query = format!(
                "{} for sale site:ebay.com OR site:mercari.com OR site:swappa.com",
                buy_intent.item_wanted
            );
            let results = match self
                .searcher
                .search(&query, self.config.results_per_match_search, SearchDepth::Basic)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    warn!(item = buy_intent.item_wanted.as_str(), error = %e, "Marketplace search failed");
                    outcome.diagnostics.push(SourceDiagnostic::error(
                        &label,
                        started.elapsed().as_millis() as u64,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            let listings = self.listings_from_results(&results);
            let mut matches = if buy_intent.has_stated_price {
                self.priced_matches(buy_intent, &listings)
            } else {
                self.priceless_matches(buy_intent, &listings)
            };
            dedup_matches(&mut matches);

            let elapsed = started.elapsed().as_millis() as u64;
            if matches.is_empty() {
                outcome
                    .diagnostics
                    .push(SourceDiagnostic::empty(&label, elapsed));
            } else {
                outcome.diagnostics.push(SourceDiagnostic::success(
                    &label,
                    matches.len() as u32,
                    elapsed,
                ));
            }
            outcome.matched.append(&mut matches);
        }

        // Rank by profit; confidence breaks ties.
        outcome.matched.sort_by(|a, b| {
            b.estimated_profit_cents
                .cmp(&a.estimated_profit_cents)
                .then(b.confidence.cmp(&a.confidence))
        });

        info!(
            matches = outcome.matched.len(),
            search_calls = outcome.search_calls,
            "Source matching complete"
        );
        outcome
    }

    /// Validate raw search results into listings: recognized individual
    /// listing URL, parseable sane price. Everything else drops silently.
    fn listings_from_results(&self, results: &[SearchResult]) -> Vec<SourceListing> {
        results
            .iter()
            .filter(|r| is_listing_url(&r.url))
            .filter_map(|r| {
                let price_cents = intent::first_plausible_amount_cents(
                    &r.title,
                    self.config.price_floor_cents,
                    self.config.price_ceiling_cents,
                )
                .or_else(|| {
                    intent::first_plausible_amount_cents(
                        &r.content,
                        self.config.price_floor_cents,
                        self.config.price_ceiling_cents,
                    )
                })?;
                Some(SourceListing {
                    title: r.title.clone(),
                    price_cents,
                    url: r.url.clone(),
                    marketplace: Marketplace::from_url(&r.url),
                })
            })
            .collect()
    }

    /// Stated ceiling: accept listings strictly below it that clear the
    /// profit floor after fees.
    fn priced_matches(
        &self,
        buy_intent: &BuyIntent,
        listings: &[SourceListing],
    ) -> Vec<MatchedOpportunity> {
        let sell = buy_intent.max_price_cents;
        let fee_breakdown = fees::compute_fees(sell, &buy_intent.source, &self.config);

        listings
            .iter()
            .filter(|l| l.price_cents < sell)
            .filter_map(|listing| {
                let profit = sell - listing.price_cents - fee_breakdown.total_cents;
                if profit < self.config.min_profit_cents {
                    return None;
                }
                Some(MatchedOpportunity {
                    intent: buy_intent.clone(),
                    listing: listing.clone(),
                    estimated_profit_cents: profit,
                    fees: fee_breakdown,
                    confidence: confidence::score(&ConfidenceInputs {
                        profit_cents: profit,
                        sell_price_cents: sell,
                        counterpart_reputation: buy_intent.counterpart_reputation,
                        post_age_hours: buy_intent.post_age_hours,
                        marketplace: listing.marketplace,
                        has_stated_price: true,
                    }),
                    estimated_market_price_cents: None,
                })
            })
            .collect()
    }

    /// No stated ceiling: estimate the market price from the median of
    /// comparables and treat abnormally cheap listings as sources. The sell
    /// side is imputed, so the priced-path confidence bonus is withheld.
    fn priceless_matches(
        &self,
        buy_intent: &BuyIntent,
        listings: &[SourceListing],
    ) -> Vec<MatchedOpportunity> {
        if listings.len() < self.config.priceless_min_comparables {
            return Vec::new();
        }

        let median = median_price_cents(listings);
        let cheap_ceiling = (median as f64 * self.config.priceless_discount) as i64;
        let fee_breakdown = fees::compute_fees(median, &buy_intent.source, &self.config);
        let priced_intent = buy_intent.with_price(median);

        listings
            .iter()
            .filter(|l| l.price_cents <= cheap_ceiling)
            .filter_map(|listing| {
                let profit = median - listing.price_cents - fee_breakdown.total_cents;
                if profit < self.config.min_profit_cents {
                    return None;
                }
                Some(MatchedOpportunity {
                    intent: priced_intent.clone(),
                    listing: listing.clone(),
                    estimated_profit_cents: profit,
                    fees: fee_breakdown,
                    confidence: confidence::score(&ConfidenceInputs {
                        profit_cents: profit,
                        sell_price_cents: median,
                        counterpart_reputation: buy_intent.counterpart_reputation,
                        post_age_hours: buy_intent.post_age_hours,
                        marketplace: listing.marketplace,
                        has_stated_price: false,
                    }),
                    estimated_market_price_cents: Some(median),
                })
            })
            .collect()
    }
}

/// Individual-listing URL check: rejects category and search-result pages
/// the intermediary routinely mixes in.
pub fn is_listing_url(url: &str) -> bool {
    let re = Regex::new(
        r"(?i)ebay\.com/itm/|mercari\.com/(?:us/)?item/|swappa\.com/listing/",
    )
    .expect("valid regex");
    re.is_match(url)
}

/// Median of listing prices. Even counts average the middle pair.
fn median_price_cents(listings: &[SourceListing]) -> i64 {
    let mut prices: Vec<i64> = listings.iter().map(|l| l.price_cents).collect();
    prices.sort_unstable();
    let mid = prices.len() / 2;
    if prices.len() % 2 == 1 {
        prices[mid]
    } else {
        (prices[mid - 1] + prices[mid]) / 2
    }
}

/// Per-intent dedup: matches sharing `(marketplace, price rounded to whole
/// dollars)` collapse to the first retained entry.
fn dedup_matches(matches: &mut Vec<MatchedOpportunity>) {
    let mut seen: HashSet<(Marketplace, i64)> = HashSet::new();
    matches.retain(|m| seen.insert((m.listing.marketplace, (m.listing.price_cents + 50) / 100)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{listing_result, priced_intent, priceless_intent, MockSearcher};

    fn quick_config() -> PipelineConfig {
        PipelineConfig {
            search_delay_ms: 0,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn priced_intent_matches_cheaper_listing() {
        let searcher = MockSearcher::new().with_results(
            "RTX 4080",
            vec![listing_result(
                "https://www.ebay.com/itm/1234567890",
                "RTX 4080 Founders Edition - $600",
            )],
        );
        let config = quick_config();
        let matcher = SourceMatcher::new(Arc::new(searcher), config.clone());
        let buy_intent = priced_intent("RTX 4080", 80_000);

        let outcome = matcher.find_matches(&[buy_intent], 5).await;

        assert_eq!(outcome.matched.len(), 1);
        let m = &outcome.matched[0];
        let expected_fees = (80_000.0 * config.payment_fee_rate).round() as i64
            + config.payment_fee_fixed_cents
            + config.shipping_estimate_cents("hardwareswap");
        assert_eq!(m.fees.total_cents, expected_fees);
        assert_eq!(m.estimated_profit_cents, 80_000 - 60_000 - expected_fees);
        assert!(m.estimated_profit_cents >= config.min_profit_cents);
        assert!(m.listing.price_cents < m.intent.max_price_cents);
        assert_eq!(m.estimated_market_price_cents, None);
    }

    #[tokio::test]
    async fn category_pages_are_rejected() {
        let searcher = MockSearcher::new().with_results(
            "RTX 4080",
            vec![
                listing_result(
                    "https://www.ebay.com/sch/i.html?_nkw=rtx+4080",
                    "rtx 4080 for sale | eBay - $600",
                ),
                listing_result("https://www.ebay.com/b/GPUs/27386", "GPUs category $600"),
            ],
        );
        let matcher = SourceMatcher::new(Arc::new(searcher), quick_config());

        let outcome = matcher
            .find_matches(&[priced_intent("RTX 4080", 80_000)], 5)
            .await;

        assert!(outcome.matched.is_empty());
        assert_eq!(
            outcome.diagnostics[0].status,
            dealscout_common::SourceStatus::Empty
        );
    }

    #[tokio::test]
    async fn listing_at_or_above_ceiling_is_rejected() {
        let searcher = MockSearcher::new().with_results(
            "RTX 4080",
            vec![
                listing_result("https://www.ebay.com/itm/1", "RTX 4080 - $800"),
                listing_result("https://www.ebay.com/itm/2", "RTX 4080 - $900"),
            ],
        );
        let matcher = SourceMatcher::new(Arc::new(searcher), quick_config());

        let outcome = matcher
            .find_matches(&[priced_intent("RTX 4080", 80_000)], 5)
            .await;
        assert!(outcome.matched.is_empty());
    }

    #[tokio::test]
    async fn thin_margin_fails_profit_floor() {
        // $800 ceiling, $790 listing: under fees this cannot clear min profit.
        let searcher = MockSearcher::new().with_results(
            "RTX 4080",
            vec![listing_result("https://www.ebay.com/itm/1", "RTX 4080 - $790")],
        );
        let matcher = SourceMatcher::new(Arc::new(searcher), quick_config());

        let outcome = matcher
            .find_matches(&[priced_intent("RTX 4080", 80_000)], 5)
            .await;
        assert!(outcome.matched.is_empty());
    }

    #[tokio::test]
    async fn priceless_intent_uses_median_and_flags_cheap_listings() {
        let searcher = MockSearcher::new().with_results(
            "Steam Deck",
            vec![
                listing_result("https://www.ebay.com/itm/1", "Steam Deck - $400"),
                listing_result("https://www.ebay.com/itm/2", "Steam Deck - $420"),
                listing_result("https://www.ebay.com/itm/3", "Steam Deck - $380"),
                // 55% of median: a candidate source.
                listing_result("https://www.ebay.com/itm/4", "Steam Deck - $220"),
            ],
        );
        let matcher = SourceMatcher::new(Arc::new(searcher), quick_config());

        let outcome = matcher
            .find_matches(&[priceless_intent("Steam Deck")], 5)
            .await;

        assert_eq!(outcome.matched.len(), 1);
        let m = &outcome.matched[0];
        // Median of 380/400/420/220 -> (380+400)/2 = 390.
        assert_eq!(m.estimated_market_price_cents, Some(39_000));
        assert_eq!(m.listing.price_cents, 22_000);
        assert_eq!(m.intent.max_price_cents, 39_000);
        assert_eq!(
            m.estimated_profit_cents,
            39_000 - 22_000 - m.fees.total_cents
        );
    }

    #[tokio::test]
    async fn priceless_intent_with_too_few_comparables_yields_empty_diag() {
        let searcher = MockSearcher::new().with_results(
            "Steam Deck",
            vec![listing_result("https://www.ebay.com/itm/1", "Steam Deck - $400")],
        );
        let matcher = SourceMatcher::new(Arc::new(searcher), quick_config());

        let outcome = matcher
            .find_matches(&[priceless_intent("Steam Deck")], 5)
            .await;

        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(
            outcome.diagnostics[0].status,
            dealscout_common::SourceStatus::Empty
        );
    }

    #[tokio::test]
    async fn dedup_collapses_same_marketplace_and_rounded_price() {
        let searcher = MockSearcher::new().with_results(
            "RTX 4080",
            vec![
                listing_result("https://www.ebay.com/itm/1", "RTX 4080 - $600"),
                listing_result("https://www.ebay.com/itm/2", "RTX 4080 OC - $600"),
                listing_result("https://www.mercari.com/us/item/m1", "RTX 4080 - $600"),
            ],
        );
        let matcher = SourceMatcher::new(Arc::new(searcher), quick_config());

        let outcome = matcher
            .find_matches(&[priced_intent("RTX 4080", 80_000)], 5)
            .await;

        // Two eBay listings at the same rounded price collapse; Mercari stays.
        assert_eq!(outcome.matched.len(), 2);
        let mut keys: Vec<(Marketplace, i64)> = outcome
            .matched
            .iter()
            .map(|m| (m.listing.marketplace, (m.listing.price_cents + 50) / 100))
            .collect();
        keys.sort_by_key(|k| k.0 as u8);
        keys.dedup();
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn cap_bounds_search_calls() {
        let searcher = MockSearcher::new();
        let matcher = SourceMatcher::new(Arc::new(searcher), quick_config());
        let intents: Vec<_> = (0..10)
            .map(|i| priced_intent(&format!("item {i}"), 50_000))
            .collect();

        let outcome = matcher.find_matches(&intents, 3).await;
        assert_eq!(outcome.search_calls, 3);
    }

    #[tokio::test]
    async fn search_failure_is_isolated_per_intent() {
        let searcher = MockSearcher::new()
            .with_error("RTX 4080", "connection reset")
            .with_results(
                "Steam Deck",
                vec![listing_result("https://www.ebay.com/itm/9", "Steam Deck - $300")],
            );
        let matcher = SourceMatcher::new(Arc::new(searcher), quick_config());

        let outcome = matcher
            .find_matches(
                &[priced_intent("RTX 4080", 80_000), priced_intent("Steam Deck", 45_000)],
                5,
            )
            .await;

        assert_eq!(outcome.matched.len(), 1);
        assert_eq!(
            outcome.diagnostics[0].status,
            dealscout_common::SourceStatus::Error
        );
        assert_eq!(
            outcome.diagnostics[1].status,
            dealscout_common::SourceStatus::Success
        );
    }

    #[test]
    fn listing_url_patterns() {
        assert!(is_listing_url("https://www.ebay.com/itm/123456"));
        assert!(is_listing_url("https://www.mercari.com/us/item/m987/"));
        assert!(is_listing_url("https://www.mercari.com/item/m987/"));
        assert!(is_listing_url("https://swappa.com/listing/view/123"));
        assert!(!is_listing_url("https://www.ebay.com/sch/i.html?_nkw=gpu"));
        assert!(!is_listing_url("https://www.ebay.com/b/GPUs/27386"));
        assert!(!is_listing_url("https://www.mercari.com/search/?keyword=gpu"));
    }

    #[test]
    fn median_handles_odd_and_even() {
        let mk = |cents: i64| SourceListing {
            title: String::new(),
            price_cents: cents,
            url: String::new(),
            marketplace: Marketplace::Ebay,
        };
        assert_eq!(median_price_cents(&[mk(100), mk(300), mk(200)]), 200);
        assert_eq!(median_price_cents(&[mk(100), mk(200)]), 150);
    }
}
