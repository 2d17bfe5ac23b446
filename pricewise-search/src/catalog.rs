//! Built-in reference catalog of grocery listings.
//!
//! Backs the static catalog provider, the local index and the fallback
//! path of the remote providers. Prices are in INR.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::SearchError;
use crate::types::{Query, RawRecord};

/// One listing of one product on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable identifier, used as the raw record reference.
    pub id: String,
    /// Product title as listed.
    pub name: String,
    /// Coarse category (`"dairy"`, `"grains"`, ...).
    pub category: String,
    /// Listed price.
    pub price: f64,
    /// Store display name.
    pub platform: String,
    /// Pack size text.
    pub quantity: String,
    /// Delivery estimate text.
    #[serde(default)]
    pub delivery: Option<String>,
    /// Product page.
    #[serde(default)]
    pub url: Option<String>,
}

impl CatalogEntry {
    /// Lowercased name and category words.
    pub fn tokens(&self) -> Vec<String> {
        format!("{} {}", self.name, self.category)
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Text embedded by the local index.
    pub fn document(&self) -> String {
        if self.name.contains(&self.quantity) {
            format!("{} {}", self.name, self.category)
        } else {
            format!("{} {} {}", self.name, self.category, self.quantity)
        }
    }

    /// Convert into the common raw record layout.
    pub fn to_record(&self) -> RawRecord {
        RawRecord::new(
            self.id.clone(),
            json!({
                "name": self.name,
                "price": self.price,
                "platform": self.platform,
                "quantity": self.quantity,
                "delivery_time": self.delivery,
                "category": self.category,
                "url": self.url,
            }),
        )
    }
}

/// (platform, price multiplier, delivery estimate, url host)
const PLATFORMS: &[(&str, f64, &str, &str)] = &[
    ("BigBasket", 1.00, "2 hours", "www.bigbasket.com"),
    ("Blinkit", 1.02, "10 mins", "blinkit.com"),
    ("Zepto", 0.98, "10 mins", "www.zeptonow.com"),
    ("Amazon Fresh", 0.97, "1 day", "www.amazon.in"),
    ("JioMart", 0.95, "1 day", "www.jiomart.com"),
];

/// (slug, name, category, quantity, reference price)
const PRODUCTS: &[(&str, &str, &str, &str, f64)] = &[
    ("amul-taaza-500ml", "Amul Taaza Toned Milk", "dairy", "500 ml", 27.0),
    ("mother-dairy-fc-1l", "Mother Dairy Full Cream Milk", "dairy", "1 l", 68.0),
    ("amul-butter-500g", "Amul Butter", "dairy", "500 g", 285.0),
    ("amul-dahi-400g", "Amul Masti Dahi Curd", "dairy", "400 g", 35.0),
    ("fresh-paneer-200g", "Fresh Paneer", "dairy", "200 g", 90.0),
    ("india-gate-basmati-1kg", "India Gate Basmati Rice", "grains", "1 kg", 140.0),
    ("aashirvaad-atta-5kg", "Aashirvaad Whole Wheat Flour Atta", "grains", "5 kg", 260.0),
    ("toor-dal-1kg", "Tata Sampann Toor Dal", "grains", "1 kg", 165.0),
    ("tata-salt-1kg", "Tata Salt", "staples", "1 kg", 28.0),
    ("madhur-sugar-1kg", "Madhur Sugar", "staples", "1 kg", 52.0),
    ("fortune-sunflower-1l", "Fortune Sunflower Oil", "staples", "1 l", 155.0),
    ("farm-eggs-6", "Farm Fresh Eggs", "eggs", "6 pcs", 48.0),
    ("onion-1kg", "Onion", "vegetables", "1 kg", 40.0),
    ("potato-1kg", "Potato", "vegetables", "1 kg", 35.0),
    ("tomato-500g", "Tomato Hybrid", "vegetables", "500 g", 25.0),
    ("britannia-bread-400g", "Britannia White Bread", "bakery", "400 g", 45.0),
    ("maggi-280g", "Maggi 2 Minute Noodles", "snacks", "280 g", 56.0),
    ("tata-tea-gold-500g", "Tata Tea Gold", "beverages", "500 g", 290.0),
];

/// Every product listed on every platform, deterministically priced.
pub fn builtin() -> Vec<CatalogEntry> {
    PRODUCTS
        .iter()
        .flat_map(|(slug, name, category, quantity, price)| {
            PLATFORMS.iter().map(move |(platform, factor, delivery, host)| {
                let platform_slug: String = platform
                    .to_lowercase()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect();
                CatalogEntry {
                    id: format!("{platform_slug}:{slug}"),
                    name: format!("{name} {quantity}"),
                    category: (*category).to_string(),
                    price: (price * factor).round(),
                    platform: (*platform).to_string(),
                    quantity: (*quantity).to_string(),
                    delivery: Some((*delivery).to_string()),
                    url: Some(format!("https://{host}/p/{slug}")),
                }
            })
        })
        .collect()
}

/// Parse a JSON array of catalog entries.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the JSON does not match the entry layout.
pub fn from_json(json: &str) -> Result<Vec<CatalogEntry>, SearchError> {
    serde_json::from_str(json).map_err(|e| SearchError::Config(format!("invalid catalog: {e}")))
}

/// Entries matching `query`.
///
/// Entries containing every query word win; when none do, entries sharing
/// any word are returned instead. A word matches an entry word it prefixes,
/// so `"egg"` finds `"eggs"`. A category hint narrows the result when it
/// leaves anything.
pub fn find<'a>(entries: &'a [CatalogEntry], query: &Query) -> Vec<&'a CatalogEntry> {
    let words: Vec<&str> = query.text().split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let scored: Vec<(usize, &CatalogEntry)> = entries
        .iter()
        .map(|entry| {
            let tokens = entry.tokens();
            let hits = words
                .iter()
                .filter(|w| tokens.iter().any(|t| t.starts_with(*w)))
                .count();
            (hits, entry)
        })
        .filter(|(hits, _)| *hits > 0)
        .collect();

    let all: Vec<&CatalogEntry> = scored
        .iter()
        .filter(|(hits, _)| *hits == words.len())
        .map(|(_, e)| *e)
        .collect();
    let matched = if all.is_empty() {
        scored.into_iter().map(|(_, e)| e).collect()
    } else {
        all
    };

    match query.category() {
        Some(category) => {
            let narrowed: Vec<&CatalogEntry> = matched
                .iter()
                .copied()
                .filter(|e| e.category.eq_ignore_ascii_case(category))
                .collect();
            if narrowed.is_empty() {
                matched
            } else {
                narrowed
            }
        }
        None => matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lists_every_product_on_every_platform() {
        let catalog = builtin();
        assert_eq!(catalog.len(), PRODUCTS.len() * PLATFORMS.len());
        let mut ids: Vec<_> = catalog.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len(), "ids must be unique");
        assert!(catalog.iter().all(|e| e.price > 0.0));
    }

    #[test]
    fn finds_all_word_matches_first() {
        let catalog = builtin();
        let hits = find(&catalog, &Query::new("toned milk"));
        assert_eq!(hits.len(), PLATFORMS.len());
        assert!(hits.iter().all(|e| e.name.contains("Toned")));
    }

    #[test]
    fn falls_back_to_any_word() {
        let catalog = builtin();
        let hits = find(&catalog, &Query::new("milk shake"));
        assert!(hits.iter().all(|e| e.name.contains("Milk")));
        assert_eq!(hits.len(), 2 * PLATFORMS.len());
    }

    #[test]
    fn prefix_matching_and_misses() {
        let catalog = builtin();
        assert!(!find(&catalog, &Query::new("egg")).is_empty());
        assert!(find(&catalog, &Query::new("caviar")).is_empty());
        assert!(find(&catalog, &Query::new("")).is_empty());
    }

    #[test]
    fn category_hint_narrows() {
        let catalog = builtin();
        let hits = find(&catalog, &Query::new("tata").with_category("staples"));
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|e| e.category == "staples"));
    }

    #[test]
    fn record_uses_common_layout() {
        let entry = &builtin()[0];
        let record = entry.to_record();
        assert_eq!(record.reference, entry.id);
        assert_eq!(record.text("platform").as_deref(), Some("BigBasket"));
        assert_eq!(record.text("delivery_time").as_deref(), Some("2 hours"));
    }

    #[test]
    fn json_loading() {
        let entries = from_json(
            r#"[{"id":"x1","name":"Ghee 1 l","category":"dairy","price":610,
                 "platform":"Blinkit","quantity":"1 l"}]"#,
        )
        .expect("parse");
        assert_eq!(entries[0].delivery, None);
        assert!(matches!(from_json("{}"), Err(SearchError::Config(_))));
    }
}
