//! `storeroom-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod quantity;

pub use error::{DomainError, DomainResult};
pub use id::{CheckoutId, EntryId, ItemId, UserId};
pub use quantity::{AdjustmentAmount, Quantity};
