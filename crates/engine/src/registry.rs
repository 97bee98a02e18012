//! Item registry: identity and descriptive attributes.

use chrono::{DateTime, Utc};
use tracing::info;

use storeroom_core::{DomainError, DomainResult, ItemId, Quantity};
use storeroom_inventory::{CategoryMap, InventoryItem, ItemDraft, ItemPatch};
use storeroom_store::{StockStore, StoreError};

use crate::store_error;

/// Owns item creation, lookup and descriptive updates.
///
/// Quantity is not reachable through this service; stock only moves through
/// the adjustment engine or a bulk reconciliation.
#[derive(Debug)]
pub struct ItemRegistry<S> {
    store: S,
    categories: CategoryMap,
}

const MAX_UPDATE_ATTEMPTS: u32 = 16;

impl<S> ItemRegistry<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            categories: CategoryMap::new(),
        }
    }

    /// Registry with a static product-reference-prefix → category table.
    pub fn with_categories(store: S, categories: CategoryMap) -> Self {
        Self { store, categories }
    }
}

impl<S> ItemRegistry<S>
where
    S: StockStore,
{
    /// Create an item. Quantity starts at zero unless the draft seeds it.
    ///
    /// Fails with `Conflict` when the product reference is already taken.
    /// When the draft carries no category, one is derived from the prefix
    /// table (when a prefix matches).
    pub fn create(&self, draft: ItemDraft, now: DateTime<Utc>) -> DomainResult<InventoryItem> {
        draft.validate()?;

        let category = draft
            .category
            .clone()
            .or_else(|| self.categories.derive(&draft.product_ref).map(str::to_string));

        let item = InventoryItem {
            id: ItemId::new(),
            product_ref: draft.product_ref,
            name: draft.name,
            category,
            unit: draft.unit,
            quantity: draft.quantity.unwrap_or_else(Quantity::zero),
            minimum: draft.minimum.unwrap_or_else(Quantity::zero),
            description: draft.description,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let item = self.store.insert_item(item).map_err(store_error)?;
        info!(item_id = %item.id, product_ref = %item.product_ref, "item created");
        Ok(item)
    }

    pub fn get(&self, id: ItemId) -> DomainResult<InventoryItem> {
        self.store.get_item(id).map_err(store_error)
    }

    pub fn get_by_product_ref(&self, product_ref: &str) -> DomainResult<InventoryItem> {
        self.store
            .find_by_product_ref(product_ref)
            .map_err(store_error)?
            .ok_or(DomainError::NotFound)
    }

    /// Update descriptive fields. Retries internally when a concurrent
    /// adjustment bumped the item version between read and write.
    pub fn update(
        &self,
        id: ItemId,
        patch: ItemPatch,
        now: DateTime<Utc>,
    ) -> DomainResult<InventoryItem> {
        patch.validate()?;
        if patch.is_empty() {
            return self.get(id);
        }

        let mut attempts = 0;
        loop {
            let mut item = self.store.get_item(id).map_err(store_error)?;
            patch.apply_to(&mut item, now);

            match self.store.update_item(item) {
                Ok(updated) => return Ok(updated),
                Err(StoreError::VersionConflict { .. }) => {
                    attempts += 1;
                    if attempts >= MAX_UPDATE_ATTEMPTS {
                        return Err(DomainError::persistence(format!(
                            "update contention on item {id} not resolved after {attempts} attempts"
                        )));
                    }
                }
                Err(e) => return Err(store_error(e)),
            }
        }
    }

    pub fn delete(&self, id: ItemId) -> DomainResult<()> {
        self.store.delete_item(id).map_err(store_error)?;
        info!(item_id = %id, "item deleted");
        Ok(())
    }

    pub fn list(&self) -> DomainResult<Vec<InventoryItem>> {
        let mut items = self.store.list_items().map_err(store_error)?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    /// All items at or below their minimum threshold, ordered by name.
    ///
    /// Pure read-side query, computed fresh on every call.
    pub fn list_low_stock(&self) -> DomainResult<Vec<InventoryItem>> {
        let mut items = self.list()?;
        items.retain(InventoryItem::is_low_stock);
        Ok(items)
    }
}
