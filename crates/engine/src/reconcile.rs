//! Bulk reconciler: atomic mass loads from tabular input.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use storeroom_core::{DomainError, DomainResult, Quantity};
use storeroom_store::{RowUpsert, StockStore};

use crate::store_error;

/// One row of tabular input, as parsed (not yet validated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    pub product_ref: String,
    pub name: String,
    pub unit: String,
    /// Absolute quantity the row asserts as the source of truth.
    pub quantity: Decimal,
    pub category: Option<String>,
    pub minimum: Option<Decimal>,
    pub description: Option<String>,
}

/// A row rejected during validation, with its 1-based index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// Outcome of a reconcile run.
///
/// `row_errors` holds per-row validation rejections; those rows were simply
/// excluded from the batch. When the batch itself failed, `apply_error` is
/// set, the counts are zero and no row was applied — prior state is intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub row_errors: Vec<RowError>,
    pub apply_error: Option<DomainError>,
}

/// Validates rows individually, then applies all valid rows in one
/// all-or-nothing batch keyed by product reference.
///
/// The batch is an absolute reset: descriptive fields are replaced and the
/// quantity is overwritten without writing ledger entries.
#[derive(Debug)]
pub struct BulkReconciler<S> {
    store: S,
}

impl<S> BulkReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> BulkReconciler<S>
where
    S: StockStore,
{
    /// Reconcile a batch of rows.
    ///
    /// Phase 1 validates every row with no side effects; failures are
    /// collected per row and never abort the batch. Phase 2 hands all valid
    /// rows to the store as a single atomic upsert.
    pub fn reconcile(&self, rows: Vec<ImportRow>, now: DateTime<Utc>) -> DomainResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut upserts = Vec::with_capacity(rows.len());

        for (idx, row) in rows.into_iter().enumerate() {
            match validate_row(row) {
                Ok(upsert) => upserts.push(upsert),
                Err(message) => report.row_errors.push(RowError {
                    row: idx + 1,
                    message,
                }),
            }
        }

        if upserts.is_empty() {
            return Ok(report);
        }

        match self.store.apply_batch(upserts, now) {
            Ok(outcome) => {
                report.created = outcome.created;
                report.updated = outcome.updated;
                info!(
                    created = report.created,
                    updated = report.updated,
                    rejected = report.row_errors.len(),
                    "reconcile applied"
                );
            }
            Err(e) => {
                // All-or-nothing: the store rolled the whole batch back.
                let err = store_error(e);
                warn!(error = %err, "reconcile batch failed, no rows applied");
                report.apply_error = Some(err);
            }
        }

        Ok(report)
    }
}

fn validate_row(row: ImportRow) -> Result<RowUpsert, String> {
    if row.product_ref.trim().is_empty() {
        return Err("product_ref is required".to_string());
    }
    if row.name.trim().is_empty() {
        return Err("name is required".to_string());
    }
    if row.unit.trim().is_empty() {
        return Err("unit is required".to_string());
    }

    let quantity = Quantity::new(row.quantity)
        .map_err(|_| format!("quantity cannot be negative (got {})", row.quantity))?;
    let minimum = match row.minimum {
        Some(value) => Quantity::new(value)
            .map_err(|_| format!("minimum cannot be negative (got {value})"))?,
        None => Quantity::zero(),
    };

    Ok(RowUpsert {
        product_ref: row.product_ref,
        name: row.name,
        category: row.category,
        unit: row.unit,
        quantity,
        minimum,
        description: row.description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(product_ref: &str, name: &str, quantity: i64) -> ImportRow {
        ImportRow {
            product_ref: product_ref.to_string(),
            name: name.to_string(),
            unit: "pcs".to_string(),
            quantity: Decimal::from(quantity),
            category: None,
            minimum: None,
            description: None,
        }
    }

    #[test]
    fn validation_reports_one_based_rows() {
        let bad = row("", "Widget", 5);
        let good = row("P1", "Widget", 5);
        let negative = ImportRow {
            quantity: Decimal::from(-1),
            ..row("P2", "Gadget", 0)
        };

        let mut errors = Vec::new();
        for (idx, r) in [bad, good, negative].into_iter().enumerate() {
            if let Err(message) = validate_row(r) {
                errors.push(RowError {
                    row: idx + 1,
                    message,
                });
            }
        }

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].row, 1);
        assert_eq!(errors[1].row, 3);
    }

    #[test]
    fn missing_minimum_defaults_to_zero() {
        let upsert = validate_row(row("P1", "Widget", 5)).unwrap();
        assert_eq!(upsert.minimum, Quantity::zero());
    }
}
