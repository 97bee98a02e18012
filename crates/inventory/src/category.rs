//! Static product-reference-prefix → category lookup.

use std::collections::BTreeMap;

/// Prefix table used to derive an item's category from its product
/// reference when the caller does not supply one explicitly.
///
/// Matching is longest-prefix-wins, so `"EL-C"` beats `"EL"` for
/// `"EL-C-0042"`. The table is static configuration handed to the registry
/// at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    prefixes: BTreeMap<String, String>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, P, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let prefixes = pairs
            .into_iter()
            .map(|(p, c)| (p.into(), c.into()))
            .collect();
        Self { prefixes }
    }

    /// Derive a category for a product reference, if any prefix matches.
    pub fn derive(&self, product_ref: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .filter(|(prefix, _)| product_ref.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, category)| category.as_str())
    }
}
