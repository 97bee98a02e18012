//! External sync adapter: work-driven consumption, applied at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use storeroom_core::{AdjustmentAmount, DomainError, DomainResult, UserId};
use storeroom_inventory::{AdjustmentKind, InventoryItem};
use storeroom_store::{StockStore, StoredLedgerEntry};

use crate::adjustment::{AdjustmentEngine, AdjustmentRequest};
use crate::store_error;

/// A completed work record reporting stock it consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConsumption {
    /// Originating work record id; the idempotency key.
    pub external_ref: String,
    pub product_ref: String,
    pub amount: AdjustmentAmount,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// `applied` is false when the event had already been absorbed; `entry` is
/// then the original commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub applied: bool,
    pub item: InventoryItem,
    pub entry: StoredLedgerEntry,
}

/// Translates one external consumption event into one idempotent call into
/// the adjustment engine.
#[derive(Debug)]
pub struct ExternalSyncAdapter<S> {
    store: S,
    engine: AdjustmentEngine<S>,
}

impl<S> ExternalSyncAdapter<S>
where
    S: StockStore + Clone,
{
    pub fn new(store: S) -> Self {
        let engine = AdjustmentEngine::new(store.clone());
        Self { store, engine }
    }

    /// Absorb one work-completion event.
    ///
    /// Resolves the product reference, then consumes with the event's
    /// `external_ref` as idempotency key. Replaying the same event is safe:
    /// the second call reports `applied: false` and surfaces the first
    /// call's ledger entry.
    pub fn sync_consumption(&self, event: SyncConsumption) -> DomainResult<SyncOutcome> {
        if event.external_ref.trim().is_empty() {
            return Err(DomainError::validation("external_ref cannot be blank"));
        }

        let item = self
            .store
            .find_by_product_ref(&event.product_ref)
            .map_err(store_error)?
            .ok_or(DomainError::NotFound)?;

        let outcome = self.engine.apply(AdjustmentRequest {
            item_id: item.id,
            kind: AdjustmentKind::Consume,
            amount: event.amount,
            actor: event.actor,
            requester: None,
            purpose: None,
            notes: None,
            external_ref: Some(event.external_ref.clone()),
            occurred_at: event.occurred_at,
        })?;

        if !outcome.newly_applied {
            info!(
                external_ref = %event.external_ref,
                product_ref = %event.product_ref,
                "consumption event replayed, nothing applied"
            );
        }

        Ok(SyncOutcome {
            applied: outcome.newly_applied,
            item: outcome.item,
            entry: outcome.entry,
        })
    }
}
