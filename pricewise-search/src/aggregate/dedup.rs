//! Cross-provider deduplication by dedup key.
//!
//! Groups canonical products that describe the same listing and keeps a
//! single representative per group.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::CanonicalProduct;

/// A canonical product plus where it appeared, for tie-breaking.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The product.
    pub product: CanonicalProduct,
    /// Registration index of the provider that surfaced it.
    pub registration: usize,
    /// Position of the raw record within that provider's outcome.
    pub position: usize,
}

/// Survivor preference: cheaper, then faster delivery, then earlier
/// registration, then earlier record position. `Less` means `a` wins.
pub fn survivor_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.product
        .price
        .total_cmp(&b.product.price)
        .then_with(|| a.product.delivery_rank().cmp(&b.product.delivery_rank()))
        .then_with(|| a.registration.cmp(&b.registration))
        .then_with(|| a.position.cmp(&b.position))
}

/// Collapse candidates sharing a dedup key.
///
/// Returns the survivors (in no particular order) and how many candidates
/// were collapsed into another.
pub fn deduplicate(candidates: Vec<Candidate>) -> (Vec<CanonicalProduct>, usize) {
    let total = candidates.len();
    let mut groups: HashMap<String, Candidate> = HashMap::new();

    for candidate in candidates {
        groups
            .entry(candidate.product.dedup_key.clone())
            .and_modify(|best| {
                if survivor_order(&candidate, best) == Ordering::Less {
                    *best = candidate.clone();
                }
            })
            .or_insert(candidate);
    }

    let collapsed = total - groups.len();
    let survivors = groups.into_values().map(|c| c.product).collect();
    (survivors, collapsed)
}
