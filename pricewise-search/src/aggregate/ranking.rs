//! Total ordering of canonical products.

use std::cmp::Ordering;

use crate::types::CanonicalProduct;

/// Ascending by price, then delivery time (unknown last), then platform,
/// then dedup key. Keys are unique after deduplication, so the order is total.
pub fn compare(a: &CanonicalProduct, b: &CanonicalProduct) -> Ordering {
    a.price
        .total_cmp(&b.price)
        .then_with(|| a.delivery_rank().cmp(&b.delivery_rank()))
        .then_with(|| a.platform.cmp(&b.platform))
        .then_with(|| a.dedup_key.cmp(&b.dedup_key))
}

/// Sort products into comparison order.
pub fn rank(products: &mut [CanonicalProduct]) {
    products.sort_by(compare);
}
