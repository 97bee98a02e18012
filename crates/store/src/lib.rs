//! `storeroom-store` — persistence abstraction for items and the ledger.
//!
//! The trait keeps the engine free of storage assumptions; the in-memory
//! implementation is the reference used by tests and development.

mod in_memory;
mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use r#trait::{BatchOutcome, RowUpsert, StockStore, StoreError, StoredLedgerEntry};
