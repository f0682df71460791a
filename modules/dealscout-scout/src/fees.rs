//! Fee model: percentage-plus-fixed payment processing on the sell price,
//! plus a venue-keyed shipping estimate. Fees are always computed against the
//! sell side, never the buy side.

use dealscout_common::{FeeBreakdown, PipelineConfig};

pub fn compute_fees(sell_price_cents: i64, venue: &str, config: &PipelineConfig) -> FeeBreakdown {
    let payment_processing_cents = (sell_price_cents as f64 * config.payment_fee_rate).round()
        as i64
        + config.payment_fee_fixed_cents;
    let shipping_estimate_cents = config.shipping_estimate_cents(venue);
    FeeBreakdown {
        payment_processing_cents,
        shipping_estimate_cents,
        total_cents: payment_processing_cents + shipping_estimate_cents,
    }
}
