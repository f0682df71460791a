//! Confidence scoring for matched opportunities.
//!
//! Additive buckets over a base value, clamped to a fixed range so the score
//! is always readable as a percentage-like quantity no matter how the terms
//! sum. The priced path gets a flat bonus the priceless path does not: an
//! observed sell price beats an imputed one.

use dealscout_common::Marketplace;

pub const CONFIDENCE_MIN: u8 = 10;
pub const CONFIDENCE_MAX: u8 = 95;

const BASE: i64 = 40;
const PRICED_BONUS: i64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceInputs {
    pub profit_cents: i64,
    pub sell_price_cents: i64,
    pub counterpart_reputation: u32,
    pub post_age_hours: f64,
    pub marketplace: Marketplace,
    pub has_stated_price: bool,
}

pub fn score(inputs: &ConfidenceInputs) -> u8 {
    let mut total = BASE
        + margin_bucket(inputs.profit_cents, inputs.sell_price_cents)
        + reputation_bucket(inputs.counterpart_reputation)
        + freshness_bucket(inputs.post_age_hours)
        + marketplace_bucket(inputs.marketplace);

    if inputs.has_stated_price {
        total += PRICED_BONUS;
    }

    total.clamp(CONFIDENCE_MIN as i64, CONFIDENCE_MAX as i64) as u8
}

/// Profit margin as a percentage of the sell price.
fn margin_bucket(profit_cents: i64, sell_price_cents: i64) -> i64 {
    if sell_price_cents <= 0 {
        return 0;
    }
    let margin_pct = profit_cents as f64 / sell_price_cents as f64 * 100.0;
    if margin_pct >= 50.0 {
        20
    } else if margin_pct >= 30.0 {
        15
    } else if margin_pct >= 15.0 {
        10
    } else if margin_pct >= 5.0 {
        5
    } else {
        0
    }
}

fn reputation_bucket(reputation: u32) -> i64 {
    if reputation >= 100 {
        10
    } else if reputation >= 25 {
        7
    } else if reputation >= 5 {
        3
    } else {
        0
    }
}

fn freshness_bucket(post_age_hours: f64) -> i64 {
    if post_age_hours <= 24.0 {
        10
    } else if post_age_hours <= 72.0 {
        6
    } else if post_age_hours <= 168.0 {
        3
    } else {
        0
    }
}

/// Known marketplaces score higher; the top tier highest.
fn marketplace_bucket(marketplace: Marketplace) -> i64 {
    match marketplace {
        Marketplace::Ebay => 10,
        Marketplace::Mercari | Marketplace::Swappa => 5,
        Marketplace::Unknown => 0,
    }
}
