//! # Inventory Reconciliation
//!
//! Conditional stock movements driven by the tenant's operating mode.
//!
//! ## Mode Behavior
//! ```text
//! ┌──────────────────────┬──────────────┬──────────────┬──────────────────┐
//! │ Event                │ sell from    │ prepare on   │ Delta            │
//! │                      │ stock        │ demand       │                  │
//! ├──────────────────────┼──────────────┼──────────────┼──────────────────┤
//! │ Sale registered      │ applies      │ skipped      │ -quantity        │
//! │ Return processed     │ applies*     │ skipped      │ +quantity        │
//! │ Return rejected      │ applies*     │ skipped      │ -quantity        │
//! └──────────────────────┴──────────────┴──────────────┴──────────────────┘
//!  * only for lines returned in new condition and carrying a catalog ref
//! ```
//!
//! Stock movements ride beside the sale/return transaction, not inside it.
//! A delta that cannot be applied never fails the business operation: it is
//! logged and written to the discrepancy audit so the gap stays visible.

use tracing::{debug, warn};
use uuid::Uuid;

use caja_core::{OperatingMode, ReturnItem, Sale, SaleItem, SaleReturn, StockDiscrepancy, StockSource};
use caja_db::ProductRepository;

/// Applies per-line stock deltas for sales and returns.
#[derive(Debug, Clone)]
pub struct InventoryReconciler {
    products: ProductRepository,
}

impl InventoryReconciler {
    pub fn new(products: ProductRepository) -> Self {
        InventoryReconciler { products }
    }

    /// Decrements stock for every catalog-backed line of a registered sale.
    ///
    /// No-op for tenants that prepare on demand.
    pub async fn consume_for_sale(&self, mode: OperatingMode, sale: &Sale, items: &[SaleItem]) {
        if !mode.tracks_stock() {
            debug!(sale_id = %sale.id, "Operating mode does not track stock, skipping deltas");
            return;
        }

        for item in items {
            let Some(product_id) = &item.product_id else {
                continue;
            };
            self.apply(
                &sale.tenant_id,
                product_id,
                -item.quantity,
                StockSource::Sale,
                &sale.id,
            )
            .await;
        }
    }

    /// Restores stock for returned lines that came back in sellable condition.
    pub async fn restock_for_return(
        &self,
        mode: OperatingMode,
        sale_return: &SaleReturn,
        items: &[ReturnItem],
    ) {
        if !mode.tracks_stock() {
            return;
        }

        for item in items {
            if !item.condition.restocks() {
                debug!(
                    return_id = %sale_return.id,
                    item = %item.name,
                    condition = ?item.condition,
                    "Returned item not restocked"
                );
                continue;
            }
            let Some(product_id) = &item.product_id else {
                continue;
            };
            self.apply(
                &sale_return.tenant_id,
                product_id,
                item.quantity,
                StockSource::Return,
                &sale_return.id,
            )
            .await;
        }
    }

    /// Backs out the restock of a return that was rejected.
    ///
    /// Applies the exact inverse of [`restock_for_return`], so lines that
    /// never re-entered stock are left alone.
    ///
    /// [`restock_for_return`]: InventoryReconciler::restock_for_return
    pub async fn unwind_rejected_return(
        &self,
        mode: OperatingMode,
        sale_return: &SaleReturn,
        items: &[ReturnItem],
    ) {
        if !mode.tracks_stock() {
            return;
        }

        for item in items {
            if !item.condition.restocks() {
                continue;
            }
            let Some(product_id) = &item.product_id else {
                continue;
            };
            self.apply(
                &sale_return.tenant_id,
                product_id,
                -item.quantity,
                StockSource::ReturnRejection,
                &sale_return.id,
            )
            .await;
        }
    }

    /// Applies one signed delta, downgrading failure to an audit record.
    async fn apply(
        &self,
        tenant_id: &str,
        product_id: &str,
        delta: i64,
        source: StockSource,
        source_id: &str,
    ) {
        let Err(err) = self.products.adjust_stock(tenant_id, product_id, delta).await else {
            return;
        };

        warn!(
            tenant_id,
            product_id,
            delta,
            source = ?source,
            source_id,
            error = %err,
            "Stock delta failed, recording discrepancy"
        );

        let discrepancy = StockDiscrepancy {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            product_id: product_id.to_string(),
            source,
            source_id: source_id.to_string(),
            delta,
            detail: err.to_string(),
            created_at: chrono::Utc::now(),
        };

        if let Err(audit_err) = self.products.record_discrepancy(&discrepancy).await {
            // Last resort: both the delta and the audit write failed.
            tracing::error!(
                tenant_id,
                product_id,
                delta,
                error = %audit_err,
                "Failed to record stock discrepancy"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
