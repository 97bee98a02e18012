use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use storeroom_core::{EntryId, ItemId, Quantity};
use storeroom_inventory::{
    AdjustmentKind, Attribution, CheckoutRecord, InventoryItem, LedgerEntryDraft,
};

/// A committed ledger entry (assigned an id and a per-item sequence number).
///
/// Sequence numbers are assigned by the store during commit and are:
/// - **Strictly increasing per item**: each entry gets `last + 1`
/// - **Immutable**: once assigned they never change
///
/// The entry itself is append-only; nothing in the store ever updates or
/// deletes one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLedgerEntry {
    pub entry_id: EntryId,
    pub item_id: ItemId,
    /// Strictly increasing position in the item's ledger.
    pub sequence: u64,
    pub kind: AdjustmentKind,
    /// Signed delta actually applied.
    pub delta: Decimal,
    pub attribution: Attribution,
    pub external_ref: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl StoredLedgerEntry {
    pub fn from_draft(draft: LedgerEntryDraft, entry_id: EntryId, sequence: u64) -> Self {
        Self {
            entry_id,
            item_id: draft.item_id,
            sequence,
            kind: draft.kind,
            delta: draft.delta,
            attribution: draft.attribution,
            external_ref: draft.external_ref,
            recorded_at: draft.recorded_at,
        }
    }
}

/// One validated row handed to the atomic batch upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowUpsert {
    pub product_ref: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    /// Absolute quantity — overwrites whatever the item currently holds.
    pub quantity: Quantity,
    pub minimum: Quantity,
    pub description: Option<String>,
}

/// Counts reported by a successful batch upsert.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub created: usize,
    pub updated: usize,
}

/// Store operation error.
///
/// These are storage-layer failures, distinct from domain errors. The
/// engine maps them: `VersionConflict` drives its internal re-read loop,
/// `Backend` surfaces as a retryable persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found")]
    NotFound,

    #[error("duplicate product reference: {0}")]
    DuplicateProductRef(String),

    #[error("duplicate external reference: {0}")]
    DuplicateExternalRef(String),

    #[error("version conflict (expected {expected}, actual {actual})")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence contract for items, the ledger, and checkout records.
///
/// ## Design principles
///
/// - **No storage assumptions**: works with the in-memory implementation
///   (tests/dev) and a future SQL backend (production)
/// - **Append-only ledger**: entries and checkout records cannot be
///   modified or deleted
/// - **Optimistic locking**: every item write is conditioned on the version
///   the caller read; a stale version fails with `VersionConflict` and the
///   caller re-reads and retries, which serializes writers per item
/// - **Atomicity**: `commit_adjustment` installs the ledger entry, the new
///   quantity and the optional checkout record together or not at all;
///   `apply_batch` applies every upsert or none
///
/// Ledger rows survive item deletion: the audit trail is the store's
/// concern even when the item is gone.
pub trait StockStore: Send + Sync {
    /// Insert a freshly-built item. Fails with `DuplicateProductRef` when
    /// the product reference is already taken.
    fn insert_item(&self, item: InventoryItem) -> Result<InventoryItem, StoreError>;

    fn get_item(&self, id: ItemId) -> Result<InventoryItem, StoreError>;

    fn find_by_product_ref(&self, product_ref: &str) -> Result<Option<InventoryItem>, StoreError>;

    /// Replace an item's row with `item`, conditioned on `item.version`
    /// matching the stored version. The stored version is bumped by one.
    ///
    /// This path is for descriptive fields only; quantity changes go
    /// through `commit_adjustment` or `apply_batch`.
    fn update_item(&self, item: InventoryItem) -> Result<InventoryItem, StoreError>;

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError>;

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError>;

    /// The single atomic unit of the adjustment path: append the ledger
    /// entry (assigning id + sequence), install `new_quantity` and bump the
    /// item version, and record the optional checkout — all or nothing,
    /// conditioned on `expected_version`.
    fn commit_adjustment(
        &self,
        expected_version: u64,
        new_quantity: Quantity,
        entry: LedgerEntryDraft,
        checkout: Option<CheckoutRecord>,
    ) -> Result<(InventoryItem, StoredLedgerEntry), StoreError>;

    /// Look up the consume entry for an idempotency key, if one was ever
    /// committed for this item.
    fn find_consumption(
        &self,
        item_id: ItemId,
        external_ref: &str,
    ) -> Result<Option<StoredLedgerEntry>, StoreError>;

    /// An item's full ledger in sequence order.
    fn entries_for_item(&self, item_id: ItemId) -> Result<Vec<StoredLedgerEntry>, StoreError>;

    /// An item's checkout records in creation order.
    fn checkouts_for_item(&self, item_id: ItemId) -> Result<Vec<CheckoutRecord>, StoreError>;

    /// Apply a validated batch of upserts atomically: every row is applied
    /// (create or full-field replace keyed by product reference) or none
    /// is, leaving prior state untouched on failure.
    fn apply_batch(
        &self,
        rows: Vec<RowUpsert>,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, StoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn insert_item(&self, item: InventoryItem) -> Result<InventoryItem, StoreError> {
        (**self).insert_item(item)
    }

    fn get_item(&self, id: ItemId) -> Result<InventoryItem, StoreError> {
        (**self).get_item(id)
    }

    fn find_by_product_ref(&self, product_ref: &str) -> Result<Option<InventoryItem>, StoreError> {
        (**self).find_by_product_ref(product_ref)
    }

    fn update_item(&self, item: InventoryItem) -> Result<InventoryItem, StoreError> {
        (**self).update_item(item)
    }

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        (**self).delete_item(id)
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).list_items()
    }

    fn commit_adjustment(
        &self,
        expected_version: u64,
        new_quantity: Quantity,
        entry: LedgerEntryDraft,
        checkout: Option<CheckoutRecord>,
    ) -> Result<(InventoryItem, StoredLedgerEntry), StoreError> {
        (**self).commit_adjustment(expected_version, new_quantity, entry, checkout)
    }

    fn find_consumption(
        &self,
        item_id: ItemId,
        external_ref: &str,
    ) -> Result<Option<StoredLedgerEntry>, StoreError> {
        (**self).find_consumption(item_id, external_ref)
    }

    fn entries_for_item(&self, item_id: ItemId) -> Result<Vec<StoredLedgerEntry>, StoreError> {
        (**self).entries_for_item(item_id)
    }

    fn checkouts_for_item(&self, item_id: ItemId) -> Result<Vec<CheckoutRecord>, StoreError> {
        (**self).checkouts_for_item(item_id)
    }

    fn apply_batch(
        &self,
        rows: Vec<RowUpsert>,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, StoreError> {
        (**self).apply_batch(rows, now)
    }
}
