//! `storeroom-engine` — application services over the stock store.
//!
//! The services compose a `StockStore` the way a dispatcher composes its
//! backends: constructed explicitly, injected, and swappable in tests.

pub mod adjustment;
pub mod reconcile;
pub mod registry;
pub mod retry;
pub mod sync;
pub mod tabular;

#[cfg(test)]
mod integration_tests;

pub use adjustment::{AdjustmentEngine, AdjustmentOutcome, AdjustmentRequest};
pub use reconcile::{BulkReconciler, ImportRow, ReconcileReport, RowError};
pub use registry::ItemRegistry;
pub use retry::RetryPolicy;
pub use sync::{ExternalSyncAdapter, SyncConsumption, SyncOutcome};

use storeroom_core::DomainError;
use storeroom_store::StoreError;

/// Map storage-layer failures into the domain taxonomy.
///
/// `VersionConflict` is normally consumed by the engines' internal re-read
/// loops and only reaches this mapping from paths that do not retry.
pub(crate) fn store_error(e: StoreError) -> DomainError {
    match e {
        StoreError::NotFound => DomainError::NotFound,
        StoreError::DuplicateProductRef(r) => {
            DomainError::conflict(format!("product reference already exists: {r}"))
        }
        StoreError::DuplicateExternalRef(r) => {
            DomainError::conflict(format!("external reference already applied: {r}"))
        }
        StoreError::VersionConflict { expected, actual } => DomainError::persistence(format!(
            "write version conflict (expected {expected}, actual {actual})"
        )),
        StoreError::Backend(msg) => DomainError::persistence(msg),
    }
}
