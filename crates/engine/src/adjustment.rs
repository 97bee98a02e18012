//! The adjustment engine: the one path through which stock moves.
//!
//! Every call is a single synchronous unit of work: read the item, plan the
//! change against the freshly-read quantity, and commit ledger entry +
//! quantity + version together. Concurrent writers to the same item are
//! serialized by the store's version check; a stale write re-reads and
//! re-runs the whole apply, which preserves per-item linearizability without
//! holding any lock across the validation step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use storeroom_core::{AdjustmentAmount, DomainError, DomainResult, CheckoutId, ItemId, UserId};
use storeroom_inventory::{
    plan_adjustment, AdjustmentKind, Attribution, CheckoutRecord, InventoryItem, LedgerEntryDraft,
};
use storeroom_store::{StockStore, StoreError, StoredLedgerEntry};

use crate::store_error;

/// Fixed, strongly-typed adjustment input. Unknown fields have nowhere to
/// hide: amounts are positive by construction, the kind is a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub item_id: ItemId,
    pub kind: AdjustmentKind,
    /// Delta magnitude for `receive`/`consume`; the new absolute target for
    /// `set`.
    pub amount: AdjustmentAmount,
    pub actor: UserId,
    pub requester: Option<String>,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    /// Idempotency key for externally-driven consumption.
    pub external_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Result of one apply: the updated item and its committed ledger entry.
///
/// `newly_applied` is false when an idempotent replay surfaced an earlier
/// commit instead of writing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentOutcome {
    pub item: InventoryItem,
    pub entry: StoredLedgerEntry,
    pub newly_applied: bool,
}

/// Serializes stock changes per item and records them in the ledger.
#[derive(Debug)]
pub struct AdjustmentEngine<S> {
    store: S,
}

/// Upper bound on version-conflict re-reads before the apply is reported as
/// a transient persistence failure.
const MAX_COMMIT_ATTEMPTS: u32 = 16;

impl<S> AdjustmentEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> AdjustmentEngine<S>
where
    S: StockStore,
{
    /// Apply one stock adjustment atomically.
    ///
    /// Semantics:
    /// - `receive`: quantity += amount
    /// - `consume`: quantity -= amount; fails with `InsufficientStock` when
    ///   the freshly-read quantity cannot cover the amount
    /// - `set`: quantity := amount; the ledger records the signed difference
    ///
    /// A `consume` carrying an `external_ref` that was already committed for
    /// this item is an idempotent no-op: the original entry is returned with
    /// `newly_applied = false`.
    ///
    /// On any failure nothing is observable: the store commit installs the
    /// ledger entry, the quantity and the version together or not at all.
    pub fn apply(&self, request: AdjustmentRequest) -> DomainResult<AdjustmentOutcome> {
        validate_request(&request)?;

        let mut attempts = 0;
        loop {
            let item = match self.store.get_item(request.item_id) {
                Ok(item) => item,
                Err(e) => return Err(store_error(e)),
            };

            // Idempotency check under the version we are about to commit
            // against: a replayed external event returns the original result.
            if request.kind == AdjustmentKind::Consume {
                if let Some(external_ref) = &request.external_ref {
                    if let Some(existing) = self
                        .store
                        .find_consumption(item.id, external_ref)
                        .map_err(store_error)?
                    {
                        debug!(
                            item_id = %item.id,
                            external_ref = %external_ref,
                            "consumption already applied, returning existing entry"
                        );
                        return Ok(AdjustmentOutcome {
                            item,
                            entry: existing,
                            newly_applied: false,
                        });
                    }
                }
            }

            let plan = plan_adjustment(request.kind, item.quantity, request.amount)?;

            let entry = LedgerEntryDraft {
                item_id: item.id,
                kind: request.kind,
                delta: plan.delta,
                attribution: Attribution {
                    actor: request.actor,
                    requester: request.requester.clone(),
                    purpose: request.purpose.clone(),
                    notes: request.notes.clone(),
                },
                external_ref: request.external_ref.clone(),
                recorded_at: request.occurred_at,
            };
            let checkout = checkout_record(&request);

            match self
                .store
                .commit_adjustment(item.version, plan.new_quantity, entry, checkout)
            {
                Ok((item, entry)) => {
                    info!(
                        item_id = %item.id,
                        kind = %entry.kind,
                        delta = %entry.delta,
                        quantity = %item.quantity,
                        sequence = entry.sequence,
                        "adjustment committed"
                    );
                    return Ok(AdjustmentOutcome {
                        item,
                        entry,
                        newly_applied: true,
                    });
                }
                // Another writer got in between our read and our commit.
                // Re-read and re-run the whole apply against fresh state.
                Err(StoreError::VersionConflict { .. })
                | Err(StoreError::DuplicateExternalRef(_)) => {
                    attempts += 1;
                    if attempts >= MAX_COMMIT_ATTEMPTS {
                        return Err(DomainError::persistence(format!(
                            "adjustment contention on item {} not resolved after {attempts} attempts",
                            request.item_id
                        )));
                    }
                    debug!(
                        item_id = %request.item_id,
                        attempts,
                        "version conflict, re-reading item"
                    );
                }
                Err(e) => return Err(store_error(e)),
            }
        }
    }

    /// An item's ledger in sequence order (audit trail).
    pub fn ledger(&self, item_id: ItemId) -> DomainResult<Vec<StoredLedgerEntry>> {
        // Surface NotFound for unknown items rather than an empty ledger.
        self.store.get_item(item_id).map_err(store_error)?;
        self.store.entries_for_item(item_id).map_err(store_error)
    }

    /// An item's checkout records in creation order.
    pub fn checkouts(&self, item_id: ItemId) -> DomainResult<Vec<CheckoutRecord>> {
        self.store.get_item(item_id).map_err(store_error)?;
        self.store.checkouts_for_item(item_id).map_err(store_error)
    }
}

fn validate_request(request: &AdjustmentRequest) -> DomainResult<()> {
    if let Some(external_ref) = &request.external_ref {
        if external_ref.trim().is_empty() {
            return Err(DomainError::validation("external_ref cannot be blank"));
        }
        if request.kind != AdjustmentKind::Consume {
            return Err(DomainError::validation(
                "external_ref is only valid for consume adjustments",
            ));
        }
    }
    Ok(())
}

/// Attributed consumption also produces a checkout record, committed in the
/// same unit as the ledger entry.
fn checkout_record(request: &AdjustmentRequest) -> Option<CheckoutRecord> {
    if request.kind != AdjustmentKind::Consume {
        return None;
    }
    if request.requester.is_none() && request.purpose.is_none() {
        return None;
    }
    Some(CheckoutRecord {
        id: CheckoutId::new(),
        item_id: request.item_id,
        quantity: request.amount,
        actor: request.actor,
        requester: request.requester.clone(),
        purpose: request.purpose.clone(),
        checked_out_at: request.occurred_at,
    })
}
