use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Buy intents
// ---------------------------------------------------------------------------

/// A normalized record of someone's stated or implied willingness to buy an
/// item at a ceiling price. Produced by the harvester, consumed by the
/// matcher; never mutated after creation except via [`BuyIntent::with_price`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyIntent {
    pub item_wanted: String,
    /// Ceiling price in cents. 0 when no price could be extracted.
    pub max_price_cents: i64,
    /// True iff `max_price_cents > 0`.
    pub has_stated_price: bool,
    pub location: Option<String>,
    pub counterpart_handle: String,
    pub counterpart_reputation: u32,
    /// Venue identifier, e.g. "hardwareswap".
    pub source: String,
    /// Canonical posting URL, unique within a harvest.
    pub post_url: String,
    pub post_age_hours: f64,
    pub created_at: DateTime<Utc>,
}

impl BuyIntent {
    /// Copy with the ceiling overwritten by an estimated market price.
    /// Used on the priceless path where the sell side is imputed.
    pub fn with_price(&self, price_cents: i64) -> Self {
        Self {
            max_price_cents: price_cents,
            has_stated_price: price_cents > 0,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Marketplace listings
// ---------------------------------------------------------------------------

/// Marketplaces the matcher recognizes, in descending trust order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Ebay,
    Mercari,
    Swappa,
    Unknown,
}

impl Marketplace {
    /// Classify a URL by marketplace domain.
    pub fn from_url(url: &str) -> Self {
        let host = host_of(url);
        if host.ends_with("ebay.com") {
            Marketplace::Ebay
        } else if host.ends_with("mercari.com") {
            Marketplace::Mercari
        } else if host.ends_with("swappa.com") {
            Marketplace::Swappa
        } else {
            Marketplace::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Marketplace::Ebay => "ebay",
            Marketplace::Mercari => "mercari",
            Marketplace::Swappa => "swappa",
            Marketplace::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One marketplace search result that survived listing-URL and price
/// validation. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceListing {
    pub title: String,
    /// Listing price in cents, > 0 and sanity-bounded at parse time.
    pub price_cents: i64,
    pub url: String,
    pub marketplace: Marketplace,
}

// ---------------------------------------------------------------------------
// Fees and matches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub payment_processing_cents: i64,
    pub shipping_estimate_cents: i64,
    pub total_cents: i64,
}

/// A buy intent paired with a cheaper source listing.
///
/// Invariant: `estimated_profit_cents = sell − listing.price_cents −
/// fees.total_cents`, where sell is the stated ceiling or, on the priceless
/// path, `estimated_market_price_cents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedOpportunity {
    pub intent: BuyIntent,
    pub listing: SourceListing,
    pub estimated_profit_cents: i64,
    pub fees: FeeBreakdown,
    /// Bounded heuristic score, always within [10, 95].
    pub confidence: u8,
    /// Present only when the intent had no stated price.
    pub estimated_market_price_cents: Option<i64>,
}

impl MatchedOpportunity {
    /// The sell price used for fee and profit computation.
    pub fn sell_price_cents(&self) -> i64 {
        self.estimated_market_price_cents
            .unwrap_or(self.intent.max_price_cents)
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    Empty,
    Error,
}

/// Audit record for one external call attempt. Append-only; never mutated
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDiagnostic {
    pub source: String,
    pub status: SourceStatus,
    pub item_count: u32,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceDiagnostic {
    pub fn success(source: impl Into<String>, item_count: u32, duration_ms: u64) -> Self {
        Self {
            source: source.into(),
            status: SourceStatus::Success,
            item_count,
            duration_ms,
            error: None,
        }
    }

    pub fn empty(source: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            source: source.into(),
            status: SourceStatus::Empty,
            item_count: 0,
            duration_ms,
            error: None,
        }
    }

    pub fn error(source: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            status: SourceStatus::Error,
            item_count: 0,
            duration_ms,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Verified opportunities
// ---------------------------------------------------------------------------

/// Human-facing opportunity as returned by the verification step. Only
/// objects passing field-presence validation are retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedOpportunity {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub buy_price_cents: i64,
    pub sell_price_cents: i64,
    pub buy_source: String,
    #[serde(default)]
    pub buy_url: String,
    pub sell_source: String,
    #[serde(default)]
    pub sell_url: String,
    #[serde(default)]
    pub fees_cents: i64,
    #[serde(default)]
    pub confidence: u8,
    #[serde(default)]
    pub risk_notes: String,
    #[serde(default)]
    pub reasoning: String,
}

// ---------------------------------------------------------------------------
// Pipeline result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Counts and merged diagnostics for one run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PipelineStats {
    pub intents_found: u32,
    pub intents_priced: u32,
    pub matches_found: u32,
    pub opportunities_verified: u32,
    pub search_calls: u32,
    pub diagnostics: Vec<SourceDiagnostic>,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Scout Run Complete ===")?;
        writeln!(f, "Buy intents found:  {}", self.intents_found)?;
        writeln!(f, "  with price:       {}", self.intents_priced)?;
        writeln!(f, "Matches found:      {}", self.matches_found)?;
        writeln!(f, "Verified:           {}", self.opportunities_verified)?;
        writeln!(f, "Search calls:       {}", self.search_calls)?;
        let errors = self
            .diagnostics
            .iter()
            .filter(|d| d.status == SourceStatus::Error)
            .count();
        writeln!(f, "Source errors:      {errors}")?;
        Ok(())
    }
}

/// Terminal aggregate for one pipeline run. Created once per run, immutable
/// after the run returns. Failures are data, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub opportunities: Vec<ParsedOpportunity>,
    pub reasoning: String,
    pub tokens: TokenUsage,
    pub estimated_cost_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: PipelineStats,
}

impl PipelineResult {
    pub fn failed(message: impl Into<String>, stats: PipelineStats) -> Self {
        let message = message.into();
        Self {
            success: false,
            opportunities: Vec::new(),
            reasoning: String::new(),
            tokens: TokenUsage::default(),
            estimated_cost_cents: 0,
            abort_reason: Some(message.clone()),
            error: Some(message),
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

fn host_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Strip tracking parameters and fragments so the same posting reached via
/// different query strings dedups to one URL.
pub fn canonical_url(url: &str) -> String {
    const TRACKING_PARAMS: &[&str] = &[
        "fbclid", "gclid", "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
        "ref", "share_id", "context",
    ];

    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.trim_end_matches('/').to_string();
    };

    parsed.set_fragment(None);

    if parsed.query().is_some() {
        let clean_pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if clean_pairs.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(clean_pairs);
        }
    }

    parsed.to_string().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marketplace_from_url_recognizes_known_domains() {
        assert_eq!(
            Marketplace::from_url("https://www.ebay.com/itm/1234"),
            Marketplace::Ebay
        );
        assert_eq!(
            Marketplace::from_url("https://www.mercari.com/us/item/m123/"),
            Marketplace::Mercari
        );
        assert_eq!(
            Marketplace::from_url("https://swappa.com/listing/view/abc"),
            Marketplace::Swappa
        );
        assert_eq!(
            Marketplace::from_url("https://example.com/shop"),
            Marketplace::Unknown
        );
    }

    #[test]
    fn canonical_url_strips_tracking_and_fragment() {
        let url = "https://www.reddit.com/r/hardwareswap/comments/1abc2d/post/?utm_source=share&context=3#top";
        assert_eq!(
            canonical_url(url),
            "https://www.reddit.com/r/hardwareswap/comments/1abc2d/post"
        );
    }

    #[test]
    fn canonical_url_keeps_meaningful_query() {
        let url = "https://www.ebay.com/itm/1234?var=5678";
        assert_eq!(canonical_url(url), "https://www.ebay.com/itm/1234?var=5678");
    }

    #[test]
    fn with_price_sets_stated_flag() {
        let intent = BuyIntent {
            item_wanted: "RTX 4080".into(),
            max_price_cents: 0,
            has_stated_price: false,
            location: None,
            counterpart_handle: "buyer".into(),
            counterpart_reputation: 10,
            source: "hardwareswap".into(),
            post_url: "https://example.com/p/1".into(),
            post_age_hours: 2.0,
            created_at: Utc::now(),
        };
        let priced = intent.with_price(80_000);
        assert!(priced.has_stated_price);
        assert_eq!(priced.max_price_cents, 80_000);
        assert!(!intent.has_stated_price);
    }
}
