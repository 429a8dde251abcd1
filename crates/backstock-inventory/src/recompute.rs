//! Perpetual-closing recomputation.
//!
//! Full-refresh batch job, not incremental: every run rereads the complete
//! ledgers, reconciles them per (outlet, barcode) and atomically replaces the
//! derived table. Assumed to run single-writer; readers are protected by the
//! transactional replace.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use backstock_db::models::{ClosingStock, NewPerpetualClosing};

use crate::error::Result;
use crate::store::LedgerStore;

/// Counters from one recompute run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeStats {
    /// Rows written to the derived table.
    pub rows_computed: u64,
    /// Distinct (outlet, barcode) keys across all four sources.
    pub distinct_keys: u64,
    /// Closing-stock snapshot rows considered before latest-per-key selection.
    pub opening_records: u64,
    pub purchase_qty: Decimal,
    pub purchase_return_qty: Decimal,
    pub sales_qty: Decimal,
}

#[derive(Debug, Default)]
struct KeyState {
    opening_qty: Decimal,
    purchase_qty: Decimal,
    return_qty: Decimal,
    sales_qty: Decimal,
    closing_date: Option<NaiveDate>,
    sale_date: Option<NaiveDate>,
    return_date: Option<NaiveDate>,
}

/// Perpetual-closing recompute engine.
#[derive(Clone)]
pub struct RecomputeService {
    ledgers: Arc<dyn LedgerStore>,
}

impl RecomputeService {
    #[must_use]
    pub fn new(ledgers: Arc<dyn LedgerStore>) -> Self {
        Self { ledgers }
    }

    /// Recompute the derived on-hand quantity for every (outlet, barcode).
    ///
    /// `qty = opening + purchases - returns - sales`, where opening is the
    /// latest closing snapshot per key. `as_of_date` prefers the snapshot
    /// date, then the latest sale date, then the latest return date.
    pub async fn recompute(&self, computed_by: Option<&str>) -> Result<RecomputeStats> {
        let mut stats = RecomputeStats::default();

        // BTreeMap keeps the output ordered, so reruns over unchanged
        // ledgers produce identical row sets.
        let mut keys: BTreeMap<(Uuid, String), KeyState> = BTreeMap::new();

        let snapshots = self.ledgers.closing_stock_rows().await?;
        stats.opening_records = snapshots.len() as u64;
        for (key, row) in latest_snapshot_per_key(snapshots) {
            let state = keys.entry(key).or_default();
            state.opening_qty = row.qty;
            state.closing_date = row.as_of_date;
        }

        for total in self.ledgers.purchase_totals().await? {
            let state = keys.entry((total.outlet_id, total.barcode)).or_default();
            state.purchase_qty = total.qty;
            stats.purchase_qty += total.qty;
        }

        for total in self.ledgers.purchase_return_totals().await? {
            let state = keys.entry((total.outlet_id, total.barcode)).or_default();
            state.return_qty = total.qty;
            state.return_date = total.latest_date;
            stats.purchase_return_qty += total.qty;
        }

        for total in self.ledgers.sale_totals().await? {
            let state = keys.entry((total.outlet_id, total.barcode)).or_default();
            state.sales_qty = total.qty;
            state.sale_date = total.latest_date;
            stats.sales_qty += total.qty;
        }

        stats.distinct_keys = keys.len() as u64;

        let rows: Vec<NewPerpetualClosing> = keys
            .into_iter()
            .map(|((outlet_id, barcode), state)| NewPerpetualClosing {
                outlet_id,
                barcode,
                qty: state.opening_qty + state.purchase_qty
                    - state.return_qty
                    - state.sales_qty,
                as_of_date: state
                    .closing_date
                    .or(state.sale_date)
                    .or(state.return_date),
            })
            .collect();

        stats.rows_computed = self
            .ledgers
            .replace_perpetual_closing(&rows, computed_by)
            .await?;

        tracing::info!(
            rows = stats.rows_computed,
            keys = stats.distinct_keys,
            opening_records = stats.opening_records,
            "perpetual closing recomputed"
        );
        Ok(stats)
    }
}

/// Latest snapshot per (outlet, barcode): greatest `uploaded_at`, with the
/// insert-order `seq` breaking ties in favor of the most recent insert.
fn latest_snapshot_per_key(
    snapshots: Vec<ClosingStock>,
) -> HashMap<(Uuid, String), ClosingStock> {
    let mut latest: HashMap<(Uuid, String), ClosingStock> = HashMap::new();
    for row in snapshots {
        let key = (row.outlet_id, row.barcode.clone());
        match latest.get(&key) {
            Some(current) if (current.uploaded_at, current.seq) >= (row.uploaded_at, row.seq) => {}
            _ => {
                latest.insert(key, row);
            }
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use backstock_db::models::{
        NewClosingStock, NewPurchase, NewPurchaseReturn, NewSale,
    };

    use crate::store::InMemoryLedgerStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn closing(outlet: Uuid, barcode: &str, qty: Decimal, as_of: Option<NaiveDate>) -> NewClosingStock {
        NewClosingStock {
            outlet_id: outlet,
            barcode: barcode.to_string(),
            qty,
            as_of_date: as_of,
            uploaded_by: None,
        }
    }

    fn sale(outlet: Uuid, barcode: &str, qty: Decimal, on: NaiveDate) -> NewSale {
        NewSale {
            outlet_id: outlet,
            barcode: barcode.to_string(),
            qty,
            sale_amount: Decimal::ZERO,
            sale_date: on,
            uploaded_by: None,
        }
    }

    fn purchase(outlet: Uuid, barcode: &str, qty: Decimal) -> NewPurchase {
        NewPurchase {
            raw_id: None,
            outlet_id: outlet,
            product_id: Uuid::new_v4(),
            barcode: barcode.to_string(),
            article_name: String::new(),
            item_name: String::new(),
            product_name: String::new(),
            brand_name: String::new(),
            size: String::new(),
            division: String::new(),
            section: String::new(),
            department: String::new(),
            qty,
            net_amount: Decimal::ZERO,
            rsp: Decimal::ZERO,
            mrp: Decimal::ZERO,
            cgst: None,
            sgst: None,
            cess: None,
            igst: None,
            tax: None,
            processed_by: None,
        }
    }

    fn purchase_return(outlet: Uuid, barcode: &str, qty: Decimal, on: NaiveDate) -> NewPurchaseReturn {
        NewPurchaseReturn {
            outlet_id: outlet,
            barcode: barcode.to_string(),
            article_name: None,
            invoice_no: None,
            entry_no: "GRV-1".to_string(),
            entry_date: on,
            supplier_name: "Acme Textiles".to_string(),
            category_6: None,
            qty,
            amount: Decimal::ZERO,
            uploaded_by: None,
        }
    }

    #[tokio::test]
    async fn test_reconciliation_formula() {
        let ledgers = Arc::new(InMemoryLedgerStore::new());
        let service = RecomputeService::new(ledgers.clone());
        let outlet = Uuid::new_v4();

        ledgers
            .add_closing_stock(closing(outlet, "111", dec!(100), Some(date(2025, 3, 31))))
            .await
            .unwrap();
        ledgers
            .add_purchase(purchase(outlet, "111", dec!(40)))
            .await
            .unwrap();
        ledgers
            .add_purchase_return(purchase_return(outlet, "111", dec!(10), date(2025, 4, 2)))
            .await
            .unwrap();
        ledgers
            .add_sale(sale(outlet, "111", dec!(25), date(2025, 4, 5)))
            .await
            .unwrap();

        let stats = service.recompute(Some("batch")).await.unwrap();
        assert_eq!(stats.rows_computed, 1);
        assert_eq!(stats.distinct_keys, 1);
        assert_eq!(stats.opening_records, 1);

        let rows = ledgers.perpetual_closing().await.unwrap();
        assert_eq!(rows[0].qty, dec!(105));
        assert_eq!(rows[0].as_of_date, Some(date(2025, 3, 31)));
        assert_eq!(rows[0].computed_by.as_deref(), Some("batch"));
    }

    #[tokio::test]
    async fn test_additivity_over_all_keys() {
        let ledgers = Arc::new(InMemoryLedgerStore::new());
        let service = RecomputeService::new(ledgers.clone());
        let outlet_a = Uuid::new_v4();
        let outlet_b = Uuid::new_v4();

        ledgers
            .add_closing_stock(closing(outlet_a, "111", dec!(10), None))
            .await
            .unwrap();
        ledgers
            .add_closing_stock(closing(outlet_b, "222", dec!(20), None))
            .await
            .unwrap();
        ledgers
            .add_purchase(purchase(outlet_a, "111", dec!(5)))
            .await
            .unwrap();
        ledgers
            .add_purchase(purchase(outlet_b, "333", dec!(7)))
            .await
            .unwrap();
        ledgers
            .add_sale(sale(outlet_a, "111", dec!(3), date(2025, 4, 1)))
            .await
            .unwrap();
        ledgers
            .add_sale(sale(outlet_b, "444", dec!(-2), date(2025, 4, 1)))
            .await
            .unwrap();
        ledgers
            .add_purchase_return(purchase_return(outlet_a, "555", dec!(4), date(2025, 4, 1)))
            .await
            .unwrap();

        let stats = service.recompute(None).await.unwrap();
        let rows = ledgers.perpetual_closing().await.unwrap();

        let total: Decimal = rows.iter().map(|r| r.qty).sum();
        let expected = dec!(10) + dec!(20) + stats.purchase_qty
            - stats.purchase_return_qty
            - stats.sales_qty;
        assert_eq!(total, expected);
        assert_eq!(stats.distinct_keys, 5);
        assert_eq!(rows.len(), 5);
    }

    #[tokio::test]
    async fn test_latest_snapshot_wins_with_seq_tiebreak() {
        let ledgers = Arc::new(InMemoryLedgerStore::new());
        let service = RecomputeService::new(ledgers.clone());
        let outlet = Uuid::new_v4();

        // Same key uploaded twice; the later insert wins even when the
        // wall-clock timestamps are equal.
        ledgers
            .add_closing_stock(closing(outlet, "111", dec!(50), Some(date(2025, 3, 1))))
            .await
            .unwrap();
        ledgers
            .add_closing_stock(closing(outlet, "111", dec!(80), Some(date(2025, 3, 31))))
            .await
            .unwrap();

        service.recompute(None).await.unwrap();
        let rows = ledgers.perpetual_closing().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].qty, dec!(80));
        assert_eq!(rows[0].as_of_date, Some(date(2025, 3, 31)));
    }

    #[tokio::test]
    async fn test_as_of_date_priority_falls_back_to_sale_then_return() {
        let ledgers = Arc::new(InMemoryLedgerStore::new());
        let service = RecomputeService::new(ledgers.clone());
        let outlet = Uuid::new_v4();

        // Key with sales only: sale date is the freshness date.
        ledgers
            .add_sale(sale(outlet, "111", dec!(1), date(2025, 4, 2)))
            .await
            .unwrap();
        ledgers
            .add_sale(sale(outlet, "111", dec!(1), date(2025, 4, 9)))
            .await
            .unwrap();
        // Key with returns only: entry date is the freshness date.
        ledgers
            .add_purchase_return(purchase_return(outlet, "222", dec!(2), date(2025, 4, 4)))
            .await
            .unwrap();
        // Key with purchases only: no date available.
        ledgers
            .add_purchase(purchase(outlet, "333", dec!(3)))
            .await
            .unwrap();

        service.recompute(None).await.unwrap();
        let rows = ledgers.perpetual_closing().await.unwrap();
        let by_barcode: HashMap<&str, &backstock_db::models::PerpetualClosing> =
            rows.iter().map(|r| (r.barcode.as_str(), r)).collect();

        assert_eq!(by_barcode["111"].as_of_date, Some(date(2025, 4, 9)));
        assert_eq!(by_barcode["111"].qty, dec!(-2));
        assert_eq!(by_barcode["222"].as_of_date, Some(date(2025, 4, 4)));
        assert_eq!(by_barcode["222"].qty, dec!(-2));
        assert_eq!(by_barcode["333"].as_of_date, None);
        assert_eq!(by_barcode["333"].qty, dec!(3));
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent_on_unchanged_ledgers() {
        let ledgers = Arc::new(InMemoryLedgerStore::new());
        let service = RecomputeService::new(ledgers.clone());
        let outlet = Uuid::new_v4();

        ledgers
            .add_closing_stock(closing(outlet, "111", dec!(10), Some(date(2025, 3, 31))))
            .await
            .unwrap();
        ledgers
            .add_sale(sale(outlet, "111", dec!(4), date(2025, 4, 1)))
            .await
            .unwrap();

        let first_stats = service.recompute(None).await.unwrap();
        let first: Vec<_> = ledgers
            .perpetual_closing()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.outlet_id, r.barcode, r.qty, r.as_of_date))
            .collect();

        let second_stats = service.recompute(None).await.unwrap();
        let second: Vec<_> = ledgers
            .perpetual_closing()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.outlet_id, r.barcode, r.qty, r.as_of_date))
            .collect();

        assert_eq!(first, second);
        assert_eq!(first_stats, second_stats);
    }
}
