//! Concrete [`crate::Provider`] implementations.
//!
//! | Provider | Source | Fallback |
//! |----------|--------|----------|
//! | [`TavilyProvider`] | Tavily JSON search API | reference catalog |
//! | [`DuckDuckGoProvider`] | DuckDuckGo HTML endpoint | reference catalog |
//! | [`LocalIndexProvider`] | in-process vector index | keyword match over the index |
//! | [`CatalogProvider`] | static catalog | the same catalog |

pub mod catalog;
pub mod duckduckgo;
pub mod local_index;
pub mod tavily;

pub use catalog::CatalogProvider;
pub use duckduckgo::{DuckDuckGoConfig, DuckDuckGoProvider};
pub use local_index::{LocalIndexConfig, LocalIndexProvider};
pub use tavily::{TavilyConfig, TavilyProvider};

use crate::catalog::{self as reference, CatalogEntry};
use crate::types::{Query, RawRecord};

/// Markers that may precede a price in free text.
const PRICE_MARKERS: &[&str] = &["₹", "Rs.", "Rs", "INR", "$", "€", "£"];

/// Find the first price written as `marker + number` in `text`, e.g. `"₹1,299"`.
pub fn mine_price(text: &str) -> Option<String> {
    let mut best: Option<(usize, String)> = None;
    for marker in PRICE_MARKERS {
        for (start, _) in text.match_indices(marker) {
            if best.as_ref().is_some_and(|(pos, _)| *pos <= start) {
                break;
            }
            let rest = text[start + marker.len()..].trim_start();
            let number: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
                .collect();
            let number = number.trim_end_matches(['.', ',']);
            if number.chars().any(|c| c.is_ascii_digit()) {
                best = Some((start, format!("{marker}{number}")));
                break;
            }
        }
    }
    best.map(|(_, price)| price)
}

/// Find a delivery estimate such as `"delivery in 10 mins"` in `text`.
pub fn mine_delivery(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let at = lower.find("deliver")?;
    let tail = &lower[at..];
    let start = tail.find(|c: char| c.is_ascii_digit())?;
    let phrase: String = tail[start..].chars().take(16).collect();
    let mut words = phrase.split_whitespace();
    let number = words.next()?;
    match words.next() {
        Some(unit) if number.chars().all(|c| c.is_ascii_digit()) => {
            let unit: String = unit.chars().take_while(char::is_ascii_alphabetic).collect();
            Some(format!("{number} {unit}"))
        }
        _ => {
            let split = number.find(|c: char| !c.is_ascii_digit())?;
            Some(format!("{} {}", &number[..split], &number[split..]))
        }
    }
}

/// Reference-catalog records for `query`, used as the remote providers' fallback.
fn catalog_fallback(entries: &[CatalogEntry], query: &Query, limit: usize) -> Vec<RawRecord> {
    reference::find(entries, query)
        .into_iter()
        .take(limit)
        .map(CatalogEntry::to_record)
        .collect()
}
