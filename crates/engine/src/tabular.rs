//! Tabular (CSV) import and export of the item row schema.
//!
//! Column order matches the export the surrounding system exchanges:
//! `product_ref, name, unit, quantity, category, minimum`. All cells are
//! plain text or numbers; rows that fail to parse become 1-based row errors
//! consistent with the reconciler's validation phase.

use std::io;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storeroom_core::{DomainError, DomainResult};
use storeroom_inventory::InventoryItem;

use crate::reconcile::{ImportRow, RowError};

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    product_ref: String,
    name: String,
    unit: String,
    quantity: Decimal,
    category: Option<String>,
    minimum: Option<Decimal>,
}

/// Rows parsed from tabular input, alongside per-row parse failures.
#[derive(Debug, Default)]
pub struct ParsedRows {
    pub rows: Vec<ImportRow>,
    pub errors: Vec<RowError>,
}

/// Read import rows from CSV with a header line.
///
/// A malformed row is reported with its 1-based data-row index and skipped;
/// parsing always continues to the end of the input.
pub fn read_rows(reader: impl io::Read) -> DomainResult<ParsedRows> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut parsed = ParsedRows::default();
    for (idx, record) in csv_reader.deserialize::<CsvRow>().enumerate() {
        match record {
            Ok(row) => parsed.rows.push(ImportRow {
                product_ref: row.product_ref,
                name: row.name,
                unit: row.unit,
                quantity: row.quantity,
                category: row.category.filter(|c| !c.is_empty()),
                minimum: row.minimum,
                description: None,
            }),
            Err(e) => parsed.errors.push(RowError {
                row: idx + 1,
                message: format!("row failed to parse: {e}"),
            }),
        }
    }

    Ok(parsed)
}

/// Write items as CSV in the exchange column order.
pub fn write_rows(writer: impl io::Write, items: &[InventoryItem]) -> DomainResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for item in items {
        let row = CsvRow {
            product_ref: item.product_ref.clone(),
            name: item.name.clone(),
            unit: item.unit.clone(),
            quantity: item.quantity.value(),
            category: item.category.clone(),
            minimum: Some(item.minimum.value()),
        };
        csv_writer
            .serialize(row)
            .map_err(|e| DomainError::validation(format!("csv write failed: {e}")))?;
    }

    csv_writer
        .flush()
        .map_err(|e| DomainError::persistence(format!("csv flush failed: {e}")))?;
    Ok(())
}
