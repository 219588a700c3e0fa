//! Price parsing for currency-formatted Dutch listing text.

use once_cell::sync::Lazy;
use regex::Regex;

static AMOUNT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"€?\s*([0-9][0-9.,]*)").expect("valid regex"));

/// Sentinel phrases meaning no numeric price is published.
const ON_REQUEST_PHRASES: &[&str] = &["op aanvraag", "n.o.t.k.", "prijs op verzoek"];

/// Outcome of parsing a price display string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedPrice {
    /// A numeric amount in euros
    Amount(f64),
    /// The site's "price on request" sentinel; not an error
    OnRequest,
    /// Text that is neither an amount nor a known sentinel; callers attach a
    /// record-level warning and continue
    Unparsed,
}

impl ParsedPrice {
    /// The numeric amount, if one was parsed.
    #[must_use]
    pub fn amount(&self) -> Option<f64> {
        match self {
            ParsedPrice::Amount(v) => Some(*v),
            _ => None,
        }
    }
}

/// Parse currency-formatted text such as `€ 45,00` or `€ 1.250,50`.
///
/// Dutch formatting uses the comma as decimal separator and dots as optional
/// thousands separators. Known "price unavailable" phrases map to
/// [`ParsedPrice::OnRequest`]; anything else unparseable maps to
/// [`ParsedPrice::Unparsed`] rather than an error.
#[must_use]
pub fn parse_price(text: &str) -> ParsedPrice {
    let lowered = text.trim().to_lowercase();

    if ON_REQUEST_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return ParsedPrice::OnRequest;
    }

    let Some(captures) = AMOUNT_REGEX.captures(text) else {
        return ParsedPrice::Unparsed;
    };
    let raw = &captures[1];

    // Comma is the decimal separator; any dots are thousands separators.
    // Without a comma, a lone dot followed by exactly three digits is a
    // thousands separator ("1.250" is 1250); anything else reads the dot
    // as the decimal point.
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else if raw.matches('.').count() > 1 {
        raw.replace('.', "")
    } else if matches!(raw.split_once('.'), Some((_, frac)) if frac.len() == 3) {
        raw.replace('.', "")
    } else {
        raw.to_string()
    };

    match normalized.parse::<f64>() {
        Ok(value) => ParsedPrice::Amount(value),
        Err(_) => ParsedPrice::Unparsed,
    }
}
