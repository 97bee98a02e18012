//! Inventory domain module.
//!
//! This crate contains business rules for stock movement, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod category;
pub mod item;
pub mod ledger;

pub use category::CategoryMap;
pub use item::{InventoryItem, ItemDraft, ItemPatch};
pub use ledger::{
    plan_adjustment, AdjustmentKind, AdjustmentPlan, Attribution, CheckoutRecord, LedgerEntryDraft,
};
