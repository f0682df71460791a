use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider
    pub anthropic_api_key: String,
    pub anthropic_model: String,

    // Web search
    pub tavily_api_key: String,

    // Budget
    pub daily_budget_cents: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            tavily_api_key: required_env("TAVILY_API_KEY"),
            daily_budget_cents: env::var("DAILY_BUDGET_CENTS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .expect("DAILY_BUDGET_CENTS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

// ---------------------------------------------------------------------------
// Pipeline tunables
// ---------------------------------------------------------------------------

/// One venue the harvester searches: a community plus the search query that
/// reaches it through the search intermediary.
#[derive(Debug, Clone)]
pub struct Venue {
    /// Venue identifier, e.g. "hardwareswap". Also keys the shipping table.
    pub name: String,
    pub query: String,
}

impl Venue {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }
}

/// Every tunable in one place, passed into each component at construction.
/// Defaults carry the production calibration; tests override single fields.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // --- Harvest ---
    /// Venues and their search queries, searched in order.
    pub venues: Vec<Venue>,
    /// Max results requested per venue query.
    pub results_per_venue: usize,
    /// How many characters of body text the price scan reads.
    pub body_scan_chars: usize,
    /// Smallest amount accepted as a plausible price, in cents.
    pub price_floor_cents: i64,
    /// Largest amount accepted as a plausible price, in cents.
    pub price_ceiling_cents: i64,
    /// Max distance from the newest post identifier still considered recent.
    pub freshness_id_window: u64,

    // --- Source matching ---
    /// Max intents matched per run.
    pub match_cap: usize,
    /// Max results requested per marketplace search.
    pub results_per_match_search: usize,
    /// Minimum acceptable profit, in cents.
    pub min_profit_cents: i64,
    /// Payment processing fee rate applied to the sell price.
    pub payment_fee_rate: f64,
    /// Fixed payment processing fee, in cents.
    pub payment_fee_fixed_cents: i64,
    /// Fallback shipping estimate for unrecognized venues, in cents.
    pub default_shipping_cents: i64,
    /// Listings at or below this fraction of the estimated market price are
    /// candidate sources on the priceless path.
    pub priceless_discount: f64,
    /// Minimum comparable listings required to estimate a market price.
    pub priceless_min_comparables: usize,

    // --- Verification ---
    /// Max matches forwarded to verification, by profit.
    pub verify_cap: usize,
    pub verify_max_output_tokens: u32,

    // --- Pacing and deadline ---
    /// Politeness delay between successive external calls, in ms.
    pub search_delay_ms: u64,
    /// Wall-clock deadline for one pipeline run, in seconds.
    pub deadline_secs: u64,

    // --- Cost model ---
    /// Estimated cost per search call, in cents.
    pub search_cost_cents: i64,
    /// Generative input token price, cents per million.
    pub input_cents_per_mtok: i64,
    /// Generative output token price, cents per million.
    pub output_cents_per_mtok: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            venues: default_venues(),
            results_per_venue: 10,
            body_scan_chars: 300,
            price_floor_cents: 1_000,
            price_ceiling_cents: 1_000_000,
            freshness_id_window: 250_000,

            match_cap: 5,
            results_per_match_search: 8,
            min_profit_cents: 1_500,
            payment_fee_rate: 0.0349,
            payment_fee_fixed_cents: 49,
            default_shipping_cents: 1_200,
            priceless_discount: 0.75,
            priceless_min_comparables: 2,

            verify_cap: 10,
            verify_max_output_tokens: 2_048,

            search_delay_ms: 1_000,
            deadline_secs: 240,

            search_cost_cents: 1,
            input_cents_per_mtok: 100,
            output_cents_per_mtok: 500,
        }
    }
}

fn default_venues() -> Vec<Venue> {
    vec![
        Venue::new(
            "hardwareswap",
            "site:reddit.com/r/hardwareswap \"[H] paypal\" OR \"[H] cash\" \"[W]\"",
        ),
        Venue::new(
            "appleswap",
            "site:reddit.com/r/appleswap \"[H] paypal\" \"[W]\"",
        ),
        Venue::new(
            "avexchange",
            "site:reddit.com/r/AVexchange \"[H] paypal\" \"[W]\"",
        ),
        Venue::new(
            "photomarket",
            "site:reddit.com/r/photomarket \"[H] paypal\" \"[W]\"",
        ),
        Venue::new("gamesale", "site:reddit.com/r/GameSale WTB"),
    ]
}

impl PipelineConfig {
    /// Venue-keyed shipping estimate in cents, with a fallback for
    /// unrecognized venues.
    pub fn shipping_estimate_cents(&self, venue: &str) -> i64 {
        match venue {
            "hardwareswap" => 1_500,
            "appleswap" => 1_000,
            "avexchange" => 1_200,
            "photomarket" => 1_200,
            "gamesale" => 600,
            _ => self.default_shipping_cents,
        }
    }
}
