//! Integration tests for the full adjustment pipeline.
//!
//! Tests: Registry → AdjustmentEngine → StockStore, plus the sync adapter
//! and the bulk reconciler, all against the in-memory store.
//!
//! Verifies:
//! - quantities always equal the sum of committed ledger deltas
//! - consume never drives a quantity negative, even under concurrency
//! - external consumption events are absorbed at most once
//! - bulk reconciliation is all-or-nothing

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use storeroom_core::{AdjustmentAmount, DomainError, ItemId, Quantity, UserId};
    use storeroom_inventory::{
        AdjustmentKind, CategoryMap, CheckoutRecord, InventoryItem, ItemDraft, ItemPatch,
        LedgerEntryDraft,
    };
    use storeroom_store::{
        BatchOutcome, InMemoryStockStore, RowUpsert, StockStore, StoreError, StoredLedgerEntry,
    };

    use crate::adjustment::{AdjustmentEngine, AdjustmentRequest};
    use crate::reconcile::{BulkReconciler, ImportRow};
    use crate::registry::ItemRegistry;
    use crate::sync::{ExternalSyncAdapter, SyncConsumption};

    fn qty(v: i64) -> Quantity {
        Quantity::new(Decimal::from(v)).unwrap()
    }

    fn amount(v: i64) -> AdjustmentAmount {
        AdjustmentAmount::new(Decimal::from(v)).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn draft(product_ref: &str, name: &str, quantity: i64, minimum: i64) -> ItemDraft {
        ItemDraft {
            product_ref: product_ref.to_string(),
            name: name.to_string(),
            category: None,
            unit: "pcs".to_string(),
            quantity: Some(qty(quantity)),
            minimum: Some(qty(minimum)),
            description: None,
        }
    }

    fn consume(item_id: ItemId, v: i64) -> AdjustmentRequest {
        AdjustmentRequest {
            item_id,
            kind: AdjustmentKind::Consume,
            amount: amount(v),
            actor: UserId::new(),
            requester: None,
            purpose: None,
            notes: None,
            external_ref: None,
            occurred_at: now(),
        }
    }

    fn setup() -> (
        Arc<InMemoryStockStore>,
        ItemRegistry<Arc<InMemoryStockStore>>,
        AdjustmentEngine<Arc<InMemoryStockStore>>,
    ) {
        storeroom_observability::init_with_filter("warn");
        let store = Arc::new(InMemoryStockStore::new());
        let registry = ItemRegistry::new(store.clone());
        let engine = AdjustmentEngine::new(store.clone());
        (store, registry, engine)
    }

    #[test]
    fn create_starts_at_zero_and_derives_category() {
        let store = Arc::new(InMemoryStockStore::new());
        let categories = CategoryMap::from_pairs([("EL", "Electronics"), ("EL-C", "Cables")]);
        let registry = ItemRegistry::with_categories(store, categories);

        let item = registry
            .create(
                ItemDraft {
                    quantity: None,
                    minimum: None,
                    ..draft("EL-C-0042", "HDMI cable", 0, 0)
                },
                now(),
            )
            .unwrap();

        assert_eq!(item.quantity, Quantity::zero());
        assert_eq!(item.category.as_deref(), Some("Cables"));
    }

    #[test]
    fn explicit_category_wins_over_derivation() {
        let store = Arc::new(InMemoryStockStore::new());
        let categories = CategoryMap::from_pairs([("EL", "Electronics")]);
        let registry = ItemRegistry::with_categories(store, categories);

        let item = registry
            .create(
                ItemDraft {
                    category: Some("Spares".to_string()),
                    ..draft("EL-0001", "Fuse", 0, 0)
                },
                now(),
            )
            .unwrap();
        assert_eq!(item.category.as_deref(), Some("Spares"));
    }

    #[test]
    fn duplicate_product_ref_conflicts() {
        let (_, registry, _) = setup();
        registry.create(draft("P1", "Widget", 0, 0), now()).unwrap();

        let err = registry
            .create(draft("P1", "Widget again", 0, 0), now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn consume_reduces_quantity_and_insufficient_stock_changes_nothing() {
        let (_, registry, engine) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 5), now()).unwrap();

        let outcome = engine.apply(consume(item.id, 4)).unwrap();
        assert_eq!(outcome.item.quantity, qty(6));
        assert_eq!(outcome.entry.delta, Decimal::from(-4));
        assert!(outcome.newly_applied);

        let err = engine.apply(consume(item.id, 10)).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                available,
                requested,
            } => {
                assert_eq!(available, Decimal::from(6));
                assert_eq!(requested, Decimal::from(10));
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // The failed consume left no trace.
        assert_eq!(registry.get(item.id).unwrap().quantity, qty(6));
        assert_eq!(engine.ledger(item.id).unwrap().len(), 1);
    }

    #[test]
    fn set_records_signed_delta() {
        let (_, registry, engine) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();

        let outcome = engine
            .apply(AdjustmentRequest {
                kind: AdjustmentKind::Set,
                amount: amount(4),
                ..consume(item.id, 1)
            })
            .unwrap();

        assert_eq!(outcome.item.quantity, qty(4));
        assert_eq!(outcome.entry.delta, Decimal::from(-6));
    }

    #[test]
    fn quantity_always_equals_sum_of_committed_deltas() {
        let (_, registry, engine) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();

        engine
            .apply(AdjustmentRequest {
                kind: AdjustmentKind::Receive,
                amount: amount(7),
                ..consume(item.id, 1)
            })
            .unwrap();
        engine.apply(consume(item.id, 3)).unwrap();
        engine
            .apply(AdjustmentRequest {
                kind: AdjustmentKind::Set,
                amount: amount(5),
                ..consume(item.id, 1)
            })
            .unwrap();

        let ledger = engine.ledger(item.id).unwrap();
        let delta_sum: Decimal = ledger.iter().map(|e| e.delta).sum();
        let final_quantity = registry.get(item.id).unwrap().quantity;

        // Seeded at 10, then +7, -3, set-to-5.
        assert_eq!(final_quantity.value(), Decimal::from(10) + delta_sum);
        assert_eq!(final_quantity, qty(5));
        // Ledger sequences are strictly increasing from 1.
        let sequences: Vec<u64> = ledger.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn external_ref_on_non_consume_is_rejected() {
        let (_, registry, engine) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();

        let err = engine
            .apply(AdjustmentRequest {
                kind: AdjustmentKind::Receive,
                external_ref: Some("wl-1".to_string()),
                ..consume(item.id, 1)
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn malformed_request_json_never_reaches_the_store() {
        let (_, registry, engine) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();

        // A request with a negative amount must die in deserialization,
        // not flow through apply() and sign-flip a receive.
        let negative = serde_json::json!({
            "item_id": item.id,
            "kind": "receive",
            "amount": "-20",
            "actor": UserId::new(),
            "requester": null,
            "purpose": null,
            "notes": null,
            "external_ref": null,
            "occurred_at": now(),
        });
        assert!(serde_json::from_value::<AdjustmentRequest>(negative).is_err());

        let unknown_kind = serde_json::json!({
            "item_id": item.id,
            "kind": "evaporate",
            "amount": "1",
            "actor": UserId::new(),
            "requester": null,
            "purpose": null,
            "notes": null,
            "external_ref": null,
            "occurred_at": now(),
        });
        assert!(serde_json::from_value::<AdjustmentRequest>(unknown_kind).is_err());

        assert_eq!(registry.get(item.id).unwrap().quantity, qty(10));
        assert!(engine.ledger(item.id).unwrap().is_empty());
    }

    #[test]
    fn attributed_consume_writes_checkout_record() {
        let (_, registry, engine) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();

        engine
            .apply(AdjustmentRequest {
                requester: Some("Dana".to_string()),
                purpose: Some("bench repair".to_string()),
                ..consume(item.id, 2)
            })
            .unwrap();
        // Unattributed consume: ledger only.
        engine.apply(consume(item.id, 1)).unwrap();

        let checkouts = engine.checkouts(item.id).unwrap();
        assert_eq!(checkouts.len(), 1);
        assert_eq!(checkouts[0].requester.as_deref(), Some("Dana"));
        assert_eq!(checkouts[0].quantity, amount(2));
        assert_eq!(engine.ledger(item.id).unwrap().len(), 2);
    }

    #[test]
    fn sync_consumption_applies_at_most_once() {
        let (store, registry, _) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();
        let adapter = ExternalSyncAdapter::new(store);

        let event = SyncConsumption {
            external_ref: "wl-1".to_string(),
            product_ref: "P1".to_string(),
            amount: amount(3),
            actor: UserId::new(),
            occurred_at: now(),
        };

        let first = adapter.sync_consumption(event.clone()).unwrap();
        assert!(first.applied);
        assert_eq!(first.item.quantity, qty(7));

        let second = adapter.sync_consumption(event).unwrap();
        assert!(!second.applied);
        assert_eq!(second.entry.entry_id, first.entry.entry_id);
        // Reduced by 3 exactly once.
        assert_eq!(registry.get(item.id).unwrap().quantity, qty(7));
    }

    #[test]
    fn sync_consumption_unknown_product_is_not_found() {
        let (store, _, _) = setup();
        let adapter = ExternalSyncAdapter::new(store);

        let err = adapter
            .sync_consumption(SyncConsumption {
                external_ref: "wl-1".to_string(),
                product_ref: "missing".to_string(),
                amount: amount(1),
                actor: UserId::new(),
                occurred_at: now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn reconcile_creates_with_absolute_quantity() {
        let (store, registry, _) = setup();
        let reconciler = BulkReconciler::new(store);

        let report = reconciler
            .reconcile(
                vec![ImportRow {
                    product_ref: "P1".to_string(),
                    name: "Widget".to_string(),
                    unit: "pcs".to_string(),
                    quantity: Decimal::from(20),
                    category: None,
                    minimum: None,
                    description: None,
                }],
                now(),
            )
            .unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 0);
        assert!(report.row_errors.is_empty());
        assert!(report.apply_error.is_none());

        let item = registry.get_by_product_ref("P1").unwrap();
        assert_eq!(item.quantity, qty(20));
    }

    #[test]
    fn reconcile_excludes_invalid_rows_and_applies_the_rest() {
        let (store, registry, engine) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();
        let reconciler = BulkReconciler::new(store);

        let rows = vec![
            ImportRow {
                product_ref: "P1".to_string(),
                name: "Widget".to_string(),
                unit: "pcs".to_string(),
                quantity: Decimal::from(50),
                category: None,
                minimum: None,
                description: None,
            },
            ImportRow {
                product_ref: String::new(), // invalid: missing product_ref
                name: "Nameless".to_string(),
                unit: "pcs".to_string(),
                quantity: Decimal::from(1),
                category: None,
                minimum: None,
                description: None,
            },
            ImportRow {
                product_ref: "P2".to_string(),
                name: "Gadget".to_string(),
                unit: "pcs".to_string(),
                quantity: Decimal::from(5),
                category: None,
                minimum: None,
                description: None,
            },
        ];

        let report = reconciler.reconcile(rows, now()).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.row_errors.len(), 1);
        assert_eq!(report.row_errors[0].row, 2);

        // The reconcile overwrote quantity silently: no new ledger entries.
        assert_eq!(registry.get(item.id).unwrap().quantity, qty(50));
        assert!(engine.ledger(item.id).unwrap().is_empty());
    }

    /// Store wrapper whose batch apply always fails, to exercise the
    /// all-or-nothing path.
    struct FailingBatchStore {
        inner: InMemoryStockStore,
    }

    impl StockStore for FailingBatchStore {
        fn insert_item(&self, item: InventoryItem) -> Result<InventoryItem, StoreError> {
            self.inner.insert_item(item)
        }
        fn get_item(&self, id: ItemId) -> Result<InventoryItem, StoreError> {
            self.inner.get_item(id)
        }
        fn find_by_product_ref(
            &self,
            product_ref: &str,
        ) -> Result<Option<InventoryItem>, StoreError> {
            self.inner.find_by_product_ref(product_ref)
        }
        fn update_item(&self, item: InventoryItem) -> Result<InventoryItem, StoreError> {
            self.inner.update_item(item)
        }
        fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
            self.inner.delete_item(id)
        }
        fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
            self.inner.list_items()
        }
        fn commit_adjustment(
            &self,
            expected_version: u64,
            new_quantity: Quantity,
            entry: LedgerEntryDraft,
            checkout: Option<CheckoutRecord>,
        ) -> Result<(InventoryItem, StoredLedgerEntry), StoreError> {
            self.inner
                .commit_adjustment(expected_version, new_quantity, entry, checkout)
        }
        fn find_consumption(
            &self,
            item_id: ItemId,
            external_ref: &str,
        ) -> Result<Option<StoredLedgerEntry>, StoreError> {
            self.inner.find_consumption(item_id, external_ref)
        }
        fn entries_for_item(&self, item_id: ItemId) -> Result<Vec<StoredLedgerEntry>, StoreError> {
            self.inner.entries_for_item(item_id)
        }
        fn checkouts_for_item(&self, item_id: ItemId) -> Result<Vec<CheckoutRecord>, StoreError> {
            self.inner.checkouts_for_item(item_id)
        }
        fn apply_batch(
            &self,
            _rows: Vec<RowUpsert>,
            _now: DateTime<Utc>,
        ) -> Result<BatchOutcome, StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }
    }

    #[test]
    fn reconcile_apply_failure_leaves_prior_state_intact() {
        let store = Arc::new(FailingBatchStore {
            inner: InMemoryStockStore::new(),
        });
        let registry = ItemRegistry::new(store.clone());
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();
        let reconciler = BulkReconciler::new(store);

        let rows = vec![
            ImportRow {
                product_ref: "P1".to_string(),
                name: "Widget".to_string(),
                unit: "pcs".to_string(),
                quantity: Decimal::from(99),
                category: None,
                minimum: None,
                description: None,
            },
            ImportRow {
                product_ref: String::new(),
                name: "Nameless".to_string(),
                unit: "pcs".to_string(),
                quantity: Decimal::from(1),
                category: None,
                minimum: None,
                description: None,
            },
        ];

        let report = reconciler.reconcile(rows, now()).unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 0);
        // Phase-1 errors still reported alongside the apply failure.
        assert_eq!(report.row_errors.len(), 1);
        assert!(matches!(
            report.apply_error,
            Some(DomainError::Persistence(_))
        ));

        assert_eq!(registry.get(item.id).unwrap().quantity, qty(10));
    }

    #[test]
    fn concurrent_consumes_never_oversell() {
        let (store, registry, _) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 0), now()).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let item_id = item.id;
                thread::spawn(move || {
                    let engine = AdjustmentEngine::new(store);
                    engine.apply(consume(item_id, 6))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(DomainError::InsufficientStock { .. })))
            .count();

        assert_eq!(succeeded, 1);
        assert_eq!(insufficient, 1);
        assert_eq!(registry.get(item.id).unwrap().quantity, qty(4));
    }

    #[test]
    fn concurrent_adjustments_lose_no_updates() {
        let (store, registry, engine) = setup();
        let item = registry.create(draft("P1", "Widget", 0, 0), now()).unwrap();

        let threads: i64 = 8;
        let per_thread: i64 = 25;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = store.clone();
                let item_id = item.id;
                thread::spawn(move || {
                    let engine = AdjustmentEngine::new(store);
                    for _ in 0..per_thread {
                        engine
                            .apply(AdjustmentRequest {
                                kind: AdjustmentKind::Receive,
                                amount: amount(1),
                                ..consume(item_id, 1)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let final_item = registry.get(item.id).unwrap();
        assert_eq!(final_item.quantity, qty(threads * per_thread));

        let ledger = engine.ledger(item.id).unwrap();
        assert_eq!(ledger.len(), (threads * per_thread) as usize);
        let delta_sum: Decimal = ledger.iter().map(|e| e.delta).sum();
        assert_eq!(delta_sum, Decimal::from(threads * per_thread));
    }

    #[test]
    fn update_patches_descriptive_fields_only() {
        let (_, registry, _) = setup();
        let item = registry.create(draft("P1", "Widget", 10, 2), now()).unwrap();

        let updated = registry
            .update(
                item.id,
                ItemPatch {
                    name: Some("Widget Mk2".to_string()),
                    minimum: Some(qty(4)),
                    ..ItemPatch::default()
                },
                now(),
            )
            .unwrap();

        assert_eq!(updated.name, "Widget Mk2");
        assert_eq!(updated.minimum, qty(4));
        assert_eq!(updated.quantity, qty(10));
    }

    #[test]
    fn low_stock_lists_at_or_below_minimum_ordered_by_name() {
        let (_, registry, _) = setup();
        registry.create(draft("P1", "Zinc plate", 2, 5), now()).unwrap();
        registry.create(draft("P2", "Anvil", 5, 5), now()).unwrap();
        registry.create(draft("P3", "Mallet", 9, 5), now()).unwrap();

        let low = registry.list_low_stock().unwrap();
        let names: Vec<&str> = low.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Anvil", "Zinc plate"]);
    }

    #[test]
    fn ledger_for_unknown_item_is_not_found() {
        let (_, _, engine) = setup();
        assert!(matches!(
            engine.ledger(ItemId::new()),
            Err(DomainError::NotFound)
        ));
    }
}
