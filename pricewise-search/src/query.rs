//! Raw query text to [`Query`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Query;

/// Caller-supplied hints that override anything read from the text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryHints {
    /// Category hint.
    pub category: Option<String>,
    /// Quantity hint; replaces a quantity found in the text.
    pub quantity: Option<String>,
    /// Result cap.
    pub max_results: Option<usize>,
}

/// Deterministic raw-text normalization.
pub trait QueryNormalizer: Send + Sync {
    /// Normalize `raw` into a query, applying `hints`.
    fn normalize(&self, raw: &str, hints: &QueryHints) -> Query;
}

/// Common regional grocery words mapped to their English search terms.
const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("doodh", "milk"),
    ("dahi", "curd"),
    ("chawal", "rice"),
    ("atta", "wheat flour"),
    ("anda", "eggs"),
    ("ande", "eggs"),
    ("pyaz", "onion"),
    ("aloo", "potato"),
    ("tamatar", "tomato"),
    ("chini", "sugar"),
    ("namak", "salt"),
    ("makhan", "butter"),
    ("sabzi", "vegetables"),
];

/// Unit words accepted in a quantity hint.
const QUANTITY_UNITS: &[&str] = &[
    "g", "gm", "gms", "gram", "grams", "kg", "kgs", "ml", "l", "ltr", "litre", "liter", "litres",
    "liters", "pc", "pcs", "piece", "pieces", "pack", "dozen",
];

/// Lowercases, strips punctuation, collapses whitespace, pulls out a
/// quantity such as `"2 kg"` and rewrites words through a synonym table.
#[derive(Debug, Clone)]
pub struct DictionaryNormalizer {
    synonyms: BTreeMap<String, String>,
}

impl Default for DictionaryNormalizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_SYNONYMS
                .iter()
                .map(|(from, to)| ((*from).to_string(), (*to).to_string())),
        )
    }
}

impl DictionaryNormalizer {
    /// Normalizer with exactly the given synonym pairs. Keys are lowercased.
    pub fn new<I>(synonyms: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            synonyms: synonyms
                .into_iter()
                .map(|(from, to)| (from.trim().to_lowercase(), to.trim().to_lowercase()))
                .filter(|(from, _)| !from.is_empty())
                .collect(),
        }
    }

    /// Add entries on top of the current table, replacing existing keys.
    #[must_use]
    pub fn with_synonyms<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (from, to) in extra {
            let from = from.trim().to_lowercase();
            if !from.is_empty() {
                self.synonyms.insert(from, to.trim().to_lowercase());
            }
        }
        self
    }

    /// Number of dictionary entries.
    pub fn len(&self) -> usize {
        self.synonyms.len()
    }

    /// Returns `true` if the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.synonyms.is_empty()
    }
}

impl QueryNormalizer for DictionaryNormalizer {
    fn normalize(&self, raw: &str, hints: &QueryHints) -> Query {
        let cleaned = strip_punctuation(&raw.to_lowercase());
        let tokens: Vec<&str> = cleaned.split_whitespace().collect();
        let (tokens, found_quantity) = take_quantity(&tokens);

        let text = if let Some(whole) = self.synonyms.get(&tokens.join(" ")) {
            whole.clone()
        } else {
            tokens
                .iter()
                .map(|t| self.synonyms.get(*t).map_or(*t, String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        };
        tracing::trace!(raw, normalized = %text, "query normalized");

        let mut query = Query::new(text);
        if let Some(category) = hints.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            query = query.with_category(category.to_lowercase());
        }
        if let Some(quantity) = hints.quantity.clone().or(found_quantity) {
            query = query.with_quantity(quantity);
        }
        if let Some(max) = hints.max_results {
            query = query.with_max_results(max);
        }
        query
    }
}

/// Replace punctuation with spaces, keeping decimal points between digits.
fn strip_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let decimal = c == '.'
                && i > 0
                && chars[i - 1].is_ascii_digit()
                && chars.get(i + 1).is_some_and(char::is_ascii_digit);
            if c.is_alphanumeric() || c.is_whitespace() || decimal {
                c
            } else {
                ' '
            }
        })
        .collect()
}

/// Remove the first quantity (`"2 kg"` or `"2kg"`) and return it fused.
fn take_quantity<'a>(tokens: &[&'a str]) -> (Vec<&'a str>, Option<String>) {
    for (i, token) in tokens.iter().enumerate() {
        let split = token
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(token.len());
        if split == 0 {
            continue;
        }
        let (number, suffix) = token.split_at(split);
        if QUANTITY_UNITS.contains(&suffix) {
            let mut rest = tokens.to_vec();
            rest.remove(i);
            return (rest, Some(format!("{number}{suffix}")));
        }
        if suffix.is_empty() {
            if let Some(unit) = tokens.get(i + 1).filter(|u| QUANTITY_UNITS.contains(*u)) {
                let mut rest = tokens.to_vec();
                rest.drain(i..=i + 1);
                return (rest, Some(format!("{number}{unit}")));
            }
        }
    }
    (tokens.to_vec(), None)
}
