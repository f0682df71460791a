//! Buy-intent classification and price extraction.
//!
//! Pure functions over posting titles and bodies. Each classification signal
//! is an independent predicate; [`is_buy_intent`] combines them with explicit
//! boolean composition so each signal stays unit-testable on its own.

use regex::Regex;

/// Payment vocabulary seen in swap-post "have" sections.
/// Longest entries first so "cash app" strips before "cash" gets a chance.
const PAYMENT_WORDS: &[&str] = &[
    "google pay",
    "apple pay",
    "cash app",
    "cashapp",
    "paypal",
    "crypto",
    "venmo",
    "zelle",
    "cash",
    "wire",
    "btc",
    "usd",
];

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£'];

fn amount_regex() -> Regex {
    // "$1,234.56", "$ 800", "800 usd", "800usd"
    Regex::new(r"(?i)\$\s*([0-9][0-9,]*)(?:\.[0-9]{2})?|([0-9][0-9,]*)(?:\.[0-9]{2})?\s*usd\b")
        .expect("valid regex")
}

fn bracket_regex() -> Regex {
    Regex::new(r"\[[^\]]*\]").expect("valid regex")
}

// ---------------------------------------------------------------------------
// Classification predicates
// ---------------------------------------------------------------------------

/// Signal (a): an explicit "buying" marker attached to the posting.
pub fn has_buying_marker(title: &str) -> bool {
    let lower = title.to_lowercase();
    lower.contains("[buying]") || lower.contains("(buying)")
}

/// Signal (c): an explicit want-to-buy tag.
pub fn has_wtb_tag(title: &str) -> bool {
    let lower = title.to_lowercase();
    lower.contains("[wtb]")
        || lower.contains("want to buy")
        || lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == "wtb")
}

/// Split a swap-style title into its `[H]` (have) and `[W]` (want) sections.
/// Returns `None` when either marker is missing or out of order.
pub fn swap_sections(title: &str) -> Option<(String, String)> {
    // ASCII-only case fold keeps byte offsets aligned with the original.
    let upper: String = title.chars().map(|c| c.to_ascii_uppercase()).collect();
    let h = upper.find("[H]")?;
    let w = upper[h..].find("[W]")? + h;
    let have = title[h + 3..w].trim().to_string();
    let want = title[w + 3..].trim().to_string();
    Some((have, want))
}

/// Whether the text mentions payment at all: payment vocabulary or a
/// currency symbol.
pub fn mentions_payment(text: &str) -> bool {
    let lower = text.to_lowercase();
    text.chars().any(|c| CURRENCY_SYMBOLS.contains(&c))
        || PAYMENT_WORDS.iter().any(|w| lower.contains(w))
}

/// Whether the text consists solely of payment language: nothing substantive
/// left after payment vocabulary, currency amounts and separators are
/// removed. Guards against misreading a sell post ("[H] GPU [W] PayPal") as a
/// buy post.
pub fn is_solely_payment(text: &str) -> bool {
    let mut stripped = amount_regex().replace_all(text, " ").to_string();
    stripped = stripped.to_lowercase();
    for word in PAYMENT_WORDS {
        stripped = stripped.replace(word, " ");
    }
    for sym in CURRENCY_SYMBOLS {
        stripped = stripped.replace(*sym, " ");
    }
    let residue: String = stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    residue.len() < 3
}

/// Signal (b): bracketed two-section title where the have-section carries
/// payment language and the want-section is not itself just payment language.
pub fn has_buy_title_shape(title: &str) -> bool {
    match swap_sections(title) {
        Some((have, want)) => mentions_payment(&have) && !is_solely_payment(&want),
        None => false,
    }
}

/// A posting qualifies as buy-intent if any signal fires.
pub fn is_buy_intent(title: &str) -> bool {
    has_buying_marker(title) || has_buy_title_shape(title) || has_wtb_tag(title)
}

// ---------------------------------------------------------------------------
// Item text
// ---------------------------------------------------------------------------

/// Extract the wanted-item text. The `[W]` section when present, else the
/// title with bracket tags, currency amounts and payment vocabulary stripped.
/// Returns `None` when fewer than 3 characters survive.
pub fn item_text(title: &str) -> Option<String> {
    let base = match swap_sections(title) {
        Some((_, want)) => want,
        None => title.to_string(),
    };

    let mut cleaned = bracket_regex().replace_all(&base, " ").to_string();
    cleaned = amount_regex().replace_all(&cleaned, " ").to_string();

    let lower: String = cleaned.chars().map(|c| c.to_ascii_lowercase()).collect();
    let mut out = String::with_capacity(cleaned.len());
    let mut skip_until = 0usize;
    for (i, c) in cleaned.char_indices() {
        if i < skip_until {
            continue;
        }
        if let Some(word) = PAYMENT_WORDS
            .iter()
            .find(|w| lower[i..].starts_with(*w) && is_word_boundary(&lower, i, w.len()))
        {
            skip_until = i + word.len();
            out.push(' ');
            continue;
        }
        if CURRENCY_SYMBOLS.contains(&c) {
            out.push(' ');
            continue;
        }
        out.push(c);
    }

    let collapsed = out
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string();

    (collapsed.chars().count() >= 3).then_some(collapsed)
}

fn is_word_boundary(text: &str, start: usize, len: usize) -> bool {
    let before_ok = start == 0
        || !text[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric());
    let after_ok = !text[start + len..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric());
    before_ok && after_ok
}

// ---------------------------------------------------------------------------
// Price extraction
// ---------------------------------------------------------------------------

/// Scan text for currency amounts and return the largest one inside the sane
/// range, in cents. A buyer states an upper budget, not an ideal price, so
/// the maximum plausible amount is the ceiling.
pub fn max_plausible_amount_cents(text: &str, floor_cents: i64, ceiling_cents: i64) -> Option<i64> {
    amount_regex()
        .captures_iter(text)
        .filter_map(|cap| {
            let digits = cap.get(1).or_else(|| cap.get(2))?.as_str().replace(',', "");
            let whole: i64 = digits.parse().ok()?;
            // Amounts are quoted in whole currency units; cents matter only
            // for fee math downstream.
            Some(whole * 100)
        })
        .filter(|cents| (floor_cents..=ceiling_cents).contains(cents))
        .max()
}

/// First plausible amount in the text, in cents. Listings lead with their
/// asking price, so first beats max there.
pub fn first_plausible_amount_cents(
    text: &str,
    floor_cents: i64,
    ceiling_cents: i64,
) -> Option<i64> {
    amount_regex()
        .captures_iter(text)
        .filter_map(|cap| {
            let digits = cap.get(1).or_else(|| cap.get(2))?.as_str().replace(',', "");
            let whole: i64 = digits.parse().ok()?;
            Some(whole * 100)
        })
        .find(|cents| (floor_cents..=ceiling_cents).contains(cents))
}

/// Ceiling-price extraction in priority order: `[H]` section → full title →
/// body prefix. `None` when no plausible amount appears anywhere; the caller
/// keeps the intent as priceless rather than discarding it.
pub fn ceiling_price_cents(
    title: &str,
    body: &str,
    body_scan_chars: usize,
    floor_cents: i64,
    ceiling_cents: i64,
) -> Option<i64> {
    if let Some((have, _)) = swap_sections(title) {
        if let Some(cents) = max_plausible_amount_cents(&have, floor_cents, ceiling_cents) {
            return Some(cents);
        }
    }
    if let Some(cents) = max_plausible_amount_cents(title, floor_cents, ceiling_cents) {
        return Some(cents);
    }
    let prefix: String = body.chars().take(body_scan_chars).collect();
    max_plausible_amount_cents(&prefix, floor_cents, ceiling_cents)
}

// ---------------------------------------------------------------------------
// Counterpart heuristics
// ---------------------------------------------------------------------------

/// Pull a "u/handle" mention out of the snippet, else "unknown".
pub fn counterpart_handle(content: &str) -> String {
    let re = Regex::new(r"(?i)\bu/([A-Za-z0-9_-]{3,20})").expect("valid regex");
    re.captures(content)
        .map(|cap| cap[1].to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Trade-count flair ("Trades: 57") when the snippet carries one.
pub fn counterpart_reputation(content: &str) -> u32 {
    let re = Regex::new(r"(?i)\b([0-9]{1,4})\s*(?:trades|transactions|confirmed trades)")
        .expect("valid regex");
    re.captures(content)
        .and_then(|cap| cap[1].parse().ok())
        .unwrap_or(0)
}

/// Bracketed location tag like "[USA-NY]" when present.
pub fn location_tag(title: &str) -> Option<String> {
    let re = Regex::new(r"\[([A-Z]{2,3}(?:-[A-Z]{2,3})?)\]").expect("valid regex");
    let tag = re
        .captures_iter(title)
        .map(|cap| cap[1].to_string())
        .find(|tag| tag != "H" && tag != "W" && tag != "WTB");
    tag
}
