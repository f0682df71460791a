//! Phase 3: generative verification of matched opportunities.
//!
//! One request per run: the top matches by profit are summarized into a
//! structured prompt and the model returns a JSON array between fixed
//! delimiters. Anything malformed (missing delimiter, bad JSON, objects
//! missing required fields) yields an empty opportunity list, never an
//! error out of this component. Network/API failures do propagate; the
//! orchestrator owns that boundary.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use dealscout_common::{MatchedOpportunity, ParsedOpportunity, PipelineConfig, TokenUsage};

use crate::traits::Generative;

const OPEN_DELIM: &str = "===OPPORTUNITIES===";
const CLOSE_DELIM: &str = "===END===";

const VERIFY_SYSTEM_PROMPT: &str = r#"You are a resale-arbitrage deal verifier.

You receive candidate opportunities. Each pairs a buyer's posting (what they want and the most they will pay) with a marketplace listing that appears to be the same item for less. The numbers (fees, profit) are already computed.

Your job is to filter out obvious mismatches:
- The listing is a different model, generation, capacity, or bundle than the buyer asked for.
- The listing is for parts, broken, or a lot/accessory rather than the item.
- The buyer's posting is actually an offer to sell, not to buy.

Lean toward KEEPING a candidate when unsure. A human reviews everything you pass through; a wrongly discarded deal is lost money, a wrongly kept one costs a few seconds.

For each candidate you keep, write a short reasoning note and any risk notes (imputed market price, low counterpart reputation, stale posting).

Return a JSON array between the exact markers ===OPPORTUNITIES=== and ===END===. Each element:
{
  "title": "short deal name",
  "description": "one-sentence summary",
  "buy_price_cents": <listing price>,
  "sell_price_cents": <buyer ceiling or estimated market price>,
  "buy_source": "marketplace name",
  "buy_url": "listing url",
  "sell_source": "venue name",
  "sell_url": "posting url",
  "fees_cents": <fee total>,
  "confidence": <0-100>,
  "risk_notes": "...",
  "reasoning": "..."
}

Any text outside the markers is treated as commentary."#;

#[derive(Debug, Default)]
pub struct VerifyOutcome {
    pub opportunities: Vec<ParsedOpportunity>,
    pub reasoning: String,
    pub tokens: TokenUsage,
}

pub struct VerificationGateway {
    generative: Arc<dyn Generative>,
    config: PipelineConfig,
}

impl VerificationGateway {
    pub fn new(generative: Arc<dyn Generative>, config: PipelineConfig) -> Self {
        Self { generative, config }
    }

    /// Verify a batch of matches with a single generative call. Input is
    /// capped to the top matches by profit so prompt size stays bounded no
    /// matter how many matches the sourcing phase produced.
    pub async fn verify(&self, matches: &[MatchedOpportunity]) -> Result<VerifyOutcome> {
        let mut ranked: Vec<&MatchedOpportunity> = matches.iter().collect();
        ranked.sort_by(|a, b| b.estimated_profit_cents.cmp(&a.estimated_profit_cents));
        ranked.truncate(self.config.verify_cap);

        if ranked.is_empty() {
            return Ok(VerifyOutcome::default());
        }

        let user_content = build_user_content(&ranked);
        let completion = self
            .generative
            .complete(
                VERIFY_SYSTEM_PROMPT,
                &user_content,
                self.config.verify_max_output_tokens,
            )
            .await?;

        let (opportunities, reasoning) = parse_response(&completion.text);
        info!(
            submitted = ranked.len(),
            verified = opportunities.len(),
            "Verification complete"
        );

        Ok(VerifyOutcome {
            opportunities,
            reasoning,
            tokens: TokenUsage {
                input_tokens: completion.usage.input_tokens,
                output_tokens: completion.usage.output_tokens,
            },
        })
    }
}

fn build_user_content(matches: &[&MatchedOpportunity]) -> String {
    let mut out = String::from("Candidate opportunities:\n");
    for (i, m) in matches.iter().enumerate() {
        let sell = m.sell_price_cents();
        out.push_str(&format!(
            "\n--- Candidate {} ---\n\
             Buyer wants: {}\n\
             Buyer posting: {} (venue: {}, handle: {}, {} trades, ~{:.0}h old)\n\
             Buyer pays up to: {}{}\n\
             Listing: {} at {} on {} ({})\n\
             Fees: {} payment processing + {} shipping = {}\n\
             Computed profit: {} (confidence {})\n",
            i + 1,
            m.intent.item_wanted,
            m.intent.post_url,
            m.intent.source,
            m.intent.counterpart_handle,
            m.intent.counterpart_reputation,
            m.intent.post_age_hours,
            fmt_usd(sell),
            if m.estimated_market_price_cents.is_some() {
                " (estimated market price, no stated ceiling)"
            } else {
                ""
            },
            m.listing.title,
            fmt_usd(m.listing.price_cents),
            m.listing.marketplace,
            m.listing.url,
            fmt_usd(m.fees.payment_processing_cents),
            fmt_usd(m.fees.shipping_estimate_cents),
            fmt_usd(m.fees.total_cents),
            fmt_usd(m.estimated_profit_cents),
            m.confidence,
        ));
    }
    out
}

/// Extract the delimited JSON block and decode it. Objects failing
/// field-presence validation are dropped individually; a missing or
/// malformed block yields zero opportunities.
fn parse_response(text: &str) -> (Vec<ParsedOpportunity>, String) {
    let Some(open) = text.find(OPEN_DELIM) else {
        warn!("Verification response missing opening delimiter");
        return (Vec::new(), text.trim().to_string());
    };
    let reasoning = text[..open].trim().to_string();

    let after_open = &text[open + OPEN_DELIM.len()..];
    let Some(close) = after_open.find(CLOSE_DELIM) else {
        warn!("Verification response missing closing delimiter");
        return (Vec::new(), reasoning);
    };
    let block = after_open[..close].trim();

    let values: Vec<serde_json::Value> = match serde_json::from_str(block) {
        Ok(values) => values,
        Err(e) => {
            warn!(error = %e, "Verification block is not a JSON array");
            return (Vec::new(), reasoning);
        }
    };

    let opportunities = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<ParsedOpportunity>(value) {
            Ok(op) if is_valid(&op) => Some(op),
            Ok(op) => {
                warn!(title = op.title.as_str(), "Dropping opportunity with missing fields");
                None
            }
            Err(e) => {
                warn!(error = %e, "Dropping undecodable opportunity object");
                None
            }
        })
        .collect();

    (opportunities, reasoning)
}

/// Required fields: title, positive numeric buy/sell prices, buy/sell source
/// identifiers.
fn is_valid(op: &ParsedOpportunity) -> bool {
    !op.title.trim().is_empty()
        && op.buy_price_cents > 0
        && op.sell_price_cents > 0
        && !op.buy_source.trim().is_empty()
        && !op.sell_source.trim().is_empty()
}

fn fmt_usd(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}
