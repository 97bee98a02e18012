use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeroom_core::{DomainError, DomainResult, ItemId, Quantity};

/// A tracked inventory item.
///
/// The cached `quantity` is maintained exclusively by the adjustment path
/// (or replaced wholesale by bulk reconciliation); it always equals the sum
/// of the item's committed ledger deltas since creation or since the last
/// absolute reset. `version` is the optimistic-concurrency counter the store
/// checks on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    /// Externally-meaningful product reference, unique across all items.
    pub product_ref: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub quantity: Quantity,
    pub minimum: Quantity,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Store-managed write version (compare-and-swap at commit time).
    pub version: u64,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.minimum
    }
}

/// Input for creating an item through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub product_ref: String,
    pub name: String,
    /// When absent, the registry derives the category from the product
    /// reference prefix table.
    pub category: Option<String>,
    pub unit: String,
    /// Initial quantity; defaults to zero.
    pub quantity: Option<Quantity>,
    pub minimum: Option<Quantity>,
    pub description: Option<String>,
}

impl ItemDraft {
    /// Validate the draft's required fields.
    pub fn validate(&self) -> DomainResult<()> {
        if self.product_ref.trim().is_empty() {
            return Err(DomainError::validation("product_ref cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.unit.trim().is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        Ok(())
    }
}

/// Descriptive-field update applied through the registry.
///
/// Quantity is deliberately absent: stock only moves through the adjustment
/// engine or a bulk reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub minimum: Option<Quantity>,
    pub description: Option<String>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.unit.is_none()
            && self.minimum.is_none()
            && self.description.is_none()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(unit) = &self.unit {
            if unit.trim().is_empty() {
                return Err(DomainError::validation("unit cannot be empty"));
            }
        }
        Ok(())
    }

    /// Fold the patch into an item, bumping `updated_at`.
    pub fn apply_to(&self, item: &mut InventoryItem, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(category) = &self.category {
            item.category = Some(category.clone());
        }
        if let Some(unit) = &self.unit {
            item.unit = unit.clone();
        }
        if let Some(minimum) = self.minimum {
            item.minimum = minimum;
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
        item.updated_at = now;
    }
}
