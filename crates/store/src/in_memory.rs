use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use storeroom_core::{EntryId, ItemId, Quantity};
use storeroom_inventory::{AdjustmentKind, CheckoutRecord, InventoryItem, LedgerEntryDraft};

use super::r#trait::{BatchOutcome, RowUpsert, StockStore, StoreError, StoredLedgerEntry};

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<ItemId, InventoryItem>,
    by_product_ref: HashMap<String, ItemId>,
    ledgers: HashMap<ItemId, Vec<StoredLedgerEntry>>,
    checkouts: HashMap<ItemId, Vec<CheckoutRecord>>,
    /// `(item, external_ref)` → committed consume entry id.
    consumptions: HashMap<(ItemId, String), EntryId>,
}

/// In-memory stock store.
///
/// Intended for tests/dev. Item writes are serialized through a single
/// `RwLock`; the per-item version check on top of it is what the contract
/// actually guarantees, so a SQL implementation with real row locks behaves
/// identically from the engine's point of view.
///
/// Ledger vectors and checkout records survive `delete_item` so the audit
/// trail is never orphaned.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    inner: RwLock<Inner>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(ledger: &[StoredLedgerEntry]) -> u64 {
        ledger.last().map(|e| e.sequence).unwrap_or(0) + 1
    }
}

fn poisoned(_: impl core::fmt::Debug) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl StockStore for InMemoryStockStore {
    fn insert_item(&self, item: InventoryItem) -> Result<InventoryItem, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        if inner.by_product_ref.contains_key(&item.product_ref) {
            return Err(StoreError::DuplicateProductRef(item.product_ref));
        }
        if inner.items.contains_key(&item.id) {
            return Err(StoreError::Backend(format!(
                "item id collision: {}",
                item.id
            )));
        }

        inner
            .by_product_ref
            .insert(item.product_ref.clone(), item.id);
        inner.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn get_item(&self, id: ItemId) -> Result<InventoryItem, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        inner.items.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn find_by_product_ref(&self, product_ref: &str) -> Result<Option<InventoryItem>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        let item = inner
            .by_product_ref
            .get(product_ref)
            .and_then(|id| inner.items.get(id))
            .cloned();
        Ok(item)
    }

    fn update_item(&self, item: InventoryItem) -> Result<InventoryItem, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        let stored = inner.items.get(&item.id).ok_or(StoreError::NotFound)?;
        if stored.version != item.version {
            return Err(StoreError::VersionConflict {
                expected: item.version,
                actual: stored.version,
            });
        }
        // Quantity moves only through commit_adjustment / apply_batch.
        if stored.quantity != item.quantity {
            return Err(StoreError::Backend(
                "update_item must not change quantity".to_string(),
            ));
        }

        let mut updated = item;
        updated.version += 1;
        inner.items.insert(updated.id, updated.clone());
        Ok(updated)
    }

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let item = inner.items.remove(&id).ok_or(StoreError::NotFound)?;
        inner.by_product_ref.remove(&item.product_ref);
        // Ledger and checkout history are retained on purpose.
        Ok(())
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.items.values().cloned().collect())
    }

    fn commit_adjustment(
        &self,
        expected_version: u64,
        new_quantity: Quantity,
        entry: LedgerEntryDraft,
        checkout: Option<CheckoutRecord>,
    ) -> Result<(InventoryItem, StoredLedgerEntry), StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        let item_id = entry.item_id;
        let stored = inner.items.get(&item_id).ok_or(StoreError::NotFound)?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: stored.version,
            });
        }

        // At most one consume per (item, external_ref).
        let index_key = match (&entry.kind, &entry.external_ref) {
            (AdjustmentKind::Consume, Some(external_ref)) => {
                let key = (item_id, external_ref.clone());
                if inner.consumptions.contains_key(&key) {
                    return Err(StoreError::DuplicateExternalRef(external_ref.clone()));
                }
                Some(key)
            }
            _ => None,
        };

        let ledger = inner.ledgers.entry(item_id).or_default();
        let sequence = Self::next_sequence(ledger);
        let committed = StoredLedgerEntry::from_draft(entry, EntryId::new(), sequence);
        ledger.push(committed.clone());

        if let Some(key) = index_key {
            inner.consumptions.insert(key, committed.entry_id);
        }
        if let Some(record) = checkout {
            inner.checkouts.entry(item_id).or_default().push(record);
        }

        let item = inner
            .items
            .get_mut(&item_id)
            .ok_or(StoreError::NotFound)?;
        item.quantity = new_quantity;
        item.updated_at = committed.recorded_at;
        item.version += 1;

        Ok((item.clone(), committed))
    }

    fn find_consumption(
        &self,
        item_id: ItemId,
        external_ref: &str,
    ) -> Result<Option<StoredLedgerEntry>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        let Some(entry_id) = inner
            .consumptions
            .get(&(item_id, external_ref.to_string()))
        else {
            return Ok(None);
        };

        let entry = inner
            .ledgers
            .get(&item_id)
            .and_then(|ledger| ledger.iter().find(|e| e.entry_id == *entry_id))
            .cloned();
        Ok(entry)
    }

    fn entries_for_item(&self, item_id: ItemId) -> Result<Vec<StoredLedgerEntry>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.ledgers.get(&item_id).cloned().unwrap_or_default())
    }

    fn checkouts_for_item(&self, item_id: ItemId) -> Result<Vec<CheckoutRecord>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.checkouts.get(&item_id).cloned().unwrap_or_default())
    }

    fn apply_batch(
        &self,
        rows: Vec<RowUpsert>,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        // Stage against copies; swap in only when every row applied.
        let mut items = inner.items.clone();
        let mut by_product_ref = inner.by_product_ref.clone();
        let mut outcome = BatchOutcome::default();

        for row in rows {
            match by_product_ref.get(&row.product_ref) {
                Some(id) => {
                    let item = items
                        .get_mut(id)
                        .ok_or_else(|| StoreError::Backend("index out of sync".to_string()))?;
                    item.name = row.name;
                    item.category = row.category;
                    item.unit = row.unit;
                    item.quantity = row.quantity;
                    item.minimum = row.minimum;
                    if row.description.is_some() {
                        item.description = row.description;
                    }
                    item.updated_at = now;
                    item.version += 1;
                    outcome.updated += 1;
                }
                None => {
                    let item = InventoryItem {
                        id: ItemId::new(),
                        product_ref: row.product_ref.clone(),
                        name: row.name,
                        category: row.category,
                        unit: row.unit,
                        quantity: row.quantity,
                        minimum: row.minimum,
                        description: row.description,
                        created_at: now,
                        updated_at: now,
                        version: 1,
                    };
                    by_product_ref.insert(row.product_ref, item.id);
                    items.insert(item.id, item);
                    outcome.created += 1;
                }
            }
        }

        inner.items = items;
        inner.by_product_ref = by_product_ref;
        Ok(outcome)
    }
}
