//! Shared canonicalization of provider drafts.
//!
//! Every provider's [`ProductDraft`] goes through the same parsers here so
//! that prices, quantities, delivery estimates and platform names compare
//! equal across providers.

use std::time::Duration;

use url::Url;

use crate::config::CurrencyTable;
use crate::error::NormalizationLoss;
use crate::types::{CanonicalProduct, ProductDraft, Provenance, Quantity, RawRecord, Unit};

/// Currency symbols and words recognised in price text, lowercased.
const CURRENCY_MARKERS: &[(&str, &str)] = &[
    ("₹", "INR"),
    ("rs.", "INR"),
    ("rs", "INR"),
    ("inr", "INR"),
    ("$", "USD"),
    ("usd", "USD"),
    ("€", "EUR"),
    ("eur", "EUR"),
    ("£", "GBP"),
    ("gbp", "GBP"),
    ("¥", "JPY"),
    ("jpy", "JPY"),
    ("aed", "AED"),
    ("aud", "AUD"),
    ("cad", "CAD"),
    ("sgd", "SGD"),
];

/// Host labels skipped when deriving a platform from a URL.
const HOST_PREFIXES: &[&str] = &["www", "m", "shop", "store"];

/// Parse price text into an amount in the table's base currency.
///
/// Accepts thousands separators (`"₹1,299"`), a leading or trailing
/// currency marker (`"$3.99"`, `"45 INR"`, `"Rs. 30"`) or a bare number,
/// which is read as the base currency.
///
/// # Errors
///
/// Returns a reason string when no positive number is present or the
/// currency has no known exchange rate.
pub fn parse_price(text: &str, currencies: &CurrencyTable) -> Result<f64, String> {
    let lower = text.trim().to_lowercase();
    let amount = first_number(&lower)
        .filter(|n| n.is_finite() && *n > 0.0)
        .ok_or_else(|| format!("unparseable price {text:?}"))?;

    let currency = detect_currency(&lower).unwrap_or(currencies.base.as_str());
    currencies
        .to_base(amount, currency)
        .ok_or_else(|| format!("unknown currency {currency}"))
}

/// Parse a quantity such as `"500 ml"`, `"1kg"`, `"1.5 L"` or `"6 pcs"`.
///
/// Kilograms and litres are converted to grams and millilitres. The first
/// number followed by a recognised unit wins.
pub fn parse_quantity(text: &str) -> Option<Quantity> {
    let lower = text.to_lowercase();
    let mut rest = lower.as_str();
    while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
        let (number, after) = split_number(&rest[start..]);
        let word: String = after
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if let (Some(value), Some((unit, factor))) = (number, unit_for(&word)) {
            if value > 0.0 {
                return Some(Quantity {
                    amount: value * factor,
                    unit,
                });
            }
        }
        rest = after;
    }
    None
}

/// Parse a delivery estimate such as `"10 mins"`, `"2 hours"` or `"1 day"`.
pub fn parse_delivery(text: &str) -> Option<Duration> {
    let lower = text.trim().to_lowercase();
    match lower.as_str() {
        "same day" | "today" => return Some(Duration::from_secs(12 * 3600)),
        "next day" | "tomorrow" => return Some(Duration::from_secs(24 * 3600)),
        _ => {}
    }

    let start = lower.find(|c: char| c.is_ascii_digit())?;
    let (number, after) = split_number(&lower[start..]);
    let value = number?;
    let word: String = after
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let seconds_per = match word.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
        "d" | "day" | "days" => 86_400.0,
        _ => return None,
    };
    // Out-of-range estimates read as unknown.
    Duration::try_from_secs_f64(value * seconds_per).ok()
}

/// Canonical platform identifier from a store name or URL.
///
/// `"https://www.bigbasket.com/pd/1"`, `"bigbasket.com"` and `"Big Basket"`
/// all become `"bigbasket"`.
pub fn canonical_platform(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(host) = host_of(trimmed) {
        let label = host
            .split('.')
            .find(|label| !HOST_PREFIXES.contains(label))
            .unwrap_or(host.as_str());
        let id: String = label.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        return (!id.is_empty()).then_some(id);
    }

    let id: String = trimmed
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    (!id.is_empty()).then_some(id)
}

/// Deterministic identity of a listing.
///
/// Sorted, de-duplicated title tokens with quantity tokens removed, joined
/// with the platform and the normalized quantity.
pub fn dedup_key(title: &str, platform: &str, quantity: Option<&Quantity>) -> String {
    let lower = title.to_lowercase();
    let mut tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '.')
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty() && !is_quantity_token(t))
        .collect();
    tokens.sort_unstable();
    tokens.dedup();

    let quantity = quantity.map_or_else(|| "-".to_string(), |q| q.to_string());
    format!("{}|{platform}|{quantity}", tokens.join(" "))
}

/// Map one extracted draft to a canonical product.
///
/// # Errors
///
/// Returns a [`NormalizationLoss`] when the title, price or platform cannot
/// be read.
pub fn canonicalize(
    provider: &str,
    record: &RawRecord,
    draft: &ProductDraft,
    currencies: &CurrencyTable,
) -> Result<CanonicalProduct, NormalizationLoss> {
    let loss = |reason: String| NormalizationLoss::new(record.reference.clone(), reason);

    let title = draft.title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        return Err(loss("missing title".into()));
    }
    let price = parse_price(&draft.price, currencies).map_err(loss)?;
    let platform = canonical_platform(&draft.platform)
        .ok_or_else(|| loss(format!("unrecognised platform {:?}", draft.platform)))?;

    let quantity = draft
        .quantity
        .as_deref()
        .and_then(parse_quantity)
        .or_else(|| parse_quantity(&title));
    let delivery = draft.delivery.as_deref().and_then(parse_delivery);
    let url = draft.url.clone().or_else(|| {
        record
            .reference
            .starts_with("http")
            .then(|| record.reference.clone())
    });
    let dedup_key = dedup_key(&title, &platform, quantity.as_ref());

    Ok(CanonicalProduct {
        title,
        platform,
        price,
        currency: currencies.base.clone(),
        quantity,
        delivery,
        url,
        provenance: Provenance {
            provider: provider.to_string(),
            reference: record.reference.clone(),
        },
        dedup_key,
    })
}

/// Parse the leading `digits[,digits][.digits]` run of `text`.
fn split_number(text: &str) -> (Option<f64>, &str) {
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == ',' || *c == '.'))
        .map_or(text.len(), |(i, _)| i);
    let digits: String = text[..end]
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| *c != ',')
        .collect();
    (digits.parse().ok(), &text[end..])
}

fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    split_number(&text[start..]).0
}

fn detect_currency(lower: &str) -> Option<&'static str> {
    for (marker, code) in CURRENCY_MARKERS {
        if marker.chars().all(|c| c.is_ascii_alphabetic() || c == '.') {
            let word_match = lower
                .split(|c: char| !c.is_ascii_alphabetic() && c != '.')
                .any(|word| word == *marker || word.trim_end_matches('.') == *marker);
            if word_match {
                return Some(code);
            }
        } else if lower.contains(marker) {
            return Some(code);
        }
    }
    None
}

fn unit_for(word: &str) -> Option<(Unit, f64)> {
    let unit = match word {
        "g" | "gm" | "gms" | "gram" | "grams" | "gr" => (Unit::Gram, 1.0),
        "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => (Unit::Gram, 1000.0),
        "ml" | "mls" | "millilitre" | "milliliter" | "millilitres" | "milliliters" => {
            (Unit::Millilitre, 1.0)
        }
        "l" | "lt" | "ltr" | "ltrs" | "litre" | "liter" | "litres" | "liters" => {
            (Unit::Millilitre, 1000.0)
        }
        "pc" | "pcs" | "piece" | "pieces" | "pack" | "packs" | "unit" | "units" | "n" => {
            (Unit::Piece, 1.0)
        }
        _ => return None,
    };
    Some(unit)
}

/// Numbers, unit words and fused forms like `500ml`.
fn is_quantity_token(token: &str) -> bool {
    if unit_for(token).is_some() {
        return true;
    }
    let split = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    if split == 0 {
        return false;
    }
    let suffix = &token[split..];
    suffix.is_empty() || unit_for(suffix).is_some()
}

fn host_of(text: &str) -> Option<String> {
    let candidate = if text.contains("://") {
        text.to_string()
    } else if !text.contains(char::is_whitespace) && text.contains('.') {
        format!("https://{text}")
    } else {
        return None;
    };
    let parsed = Url::parse(&candidate).ok()?;
    parsed.host_str().map(str::to_lowercase)
}
