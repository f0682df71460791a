//! Freshness filtering without timestamps.
//!
//! The search intermediary does not reliably return publish dates for forum
//! postings, so recency is approximated from the monotonically-increasing
//! base-36 identifier embedded in each posting URL. Postings whose identifier
//! lags the newest one in the batch by more than a fixed window are treated
//! as stale. Runs once per harvest, after all venue queries complete.

use dealscout_common::BuyIntent;
use tracing::debug;

/// Decode a base-36 string ("1abc2d") into a u64. `None` on invalid digits
/// or overflow.
pub fn base36_decode(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for c in s.chars() {
        let digit = c.to_digit(36)? as u64;
        value = value.checked_mul(36)?.checked_add(digit)?;
    }
    Some(value)
}

/// Pull the opaque post identifier out of a posting URL. Expects the
/// `/comments/<id>/` segment used by the target venues.
pub fn post_id_from_url(url: &str) -> Option<u64> {
    let idx = url.find("/comments/")?;
    let rest = &url[idx + "/comments/".len()..];
    let id = rest.split(['/', '?', '#']).next()?;
    base36_decode(&id.to_ascii_lowercase())
}

/// Keep only intents within `window` of the newest identifier in the batch.
/// A posting exactly at the window distance is retained; one unit beyond is
/// excluded. Postings whose identifier cannot be parsed are discarded, not
/// assumed fresh. Returns the number of intents dropped.
pub fn retain_fresh(intents: &mut Vec<BuyIntent>, window: u64) -> usize {
    let before = intents.len();

    let ids: Vec<Option<u64>> = intents
        .iter()
        .map(|i| post_id_from_url(&i.post_url))
        .collect();

    let Some(max_id) = ids.iter().flatten().copied().max() else {
        // No parseable identifier anywhere: nothing can be called fresh.
        intents.clear();
        return before;
    };

    let mut keep = ids
        .iter()
        .map(|id| matches!(id, Some(id) if max_id - id <= window));
    intents.retain(|_| keep.next().unwrap_or(false));

    let dropped = before - intents.len();
    if dropped > 0 {
        debug!(dropped, max_id, window, "Stale or unparseable postings dropped");
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn intent_with_url(url: &str) -> BuyIntent {
        BuyIntent {
            item_wanted: "widget".into(),
            max_price_cents: 10_000,
            has_stated_price: true,
            location: None,
            counterpart_handle: "u".into(),
            counterpart_reputation: 0,
            source: "hardwareswap".into(),
            post_url: url.into(),
            post_age_hours: 1.0,
            created_at: Utc::now(),
        }
    }

    fn url_for(id: u64) -> String {
        // Re-encode to base36 so parsing round-trips.
        let mut n = id;
        let mut out = Vec::new();
        loop {
            let d = (n % 36) as u32;
            out.push(std::char::from_digit(d, 36).unwrap());
            n /= 36;
            if n == 0 {
                break;
            }
        }
        let encoded: String = out.into_iter().rev().collect();
        format!("https://www.reddit.com/r/hardwareswap/comments/{encoded}/post")
    }

    #[test]
    fn base36_round_trips() {
        assert_eq!(base36_decode("0"), Some(0));
        assert_eq!(base36_decode("z"), Some(35));
        assert_eq!(base36_decode("10"), Some(36));
        assert_eq!(base36_decode("1abc2d"), Some(77_791_189));
        assert_eq!(base36_decode("not valid!"), None);
        assert_eq!(base36_decode(""), None);
    }

    #[test]
    fn post_id_parses_from_comment_urls() {
        assert_eq!(
            post_id_from_url("https://www.reddit.com/r/hardwareswap/comments/1abc2d/wtb_gpu/"),
            Some(77_791_189)
        );
        assert_eq!(
            post_id_from_url("https://www.reddit.com/r/hardwareswap/comments/1abc2d?share=1"),
            Some(77_791_189)
        );
        assert_eq!(post_id_from_url("https://example.com/listing/42"), None);
    }

    #[test]
    fn boundary_at_window_is_retained_one_past_is_excluded() {
        let window = 100;
        let newest = 10_000;
        let mut intents = vec![
            intent_with_url(&url_for(newest)),
            intent_with_url(&url_for(newest - window)),
            intent_with_url(&url_for(newest - window - 1)),
        ];
        let dropped = retain_fresh(&mut intents, window);
        assert_eq!(dropped, 1);
        assert_eq!(intents.len(), 2);
        assert!(intents
            .iter()
            .all(|i| post_id_from_url(&i.post_url).unwrap() >= newest - window));
    }

    #[test]
    fn unparseable_ids_are_dropped_not_assumed_fresh() {
        let mut intents = vec![
            intent_with_url(&url_for(10_000)),
            intent_with_url("https://example.com/no-id-here"),
        ];
        let dropped = retain_fresh(&mut intents, 100);
        assert_eq!(dropped, 1);
        assert_eq!(intents.len(), 1);
    }

    #[test]
    fn all_unparseable_clears_the_batch() {
        let mut intents = vec![intent_with_url("https://example.com/a")];
        let dropped = retain_fresh(&mut intents, 100);
        assert_eq!(dropped, 1);
        assert!(intents.is_empty());
    }
}
