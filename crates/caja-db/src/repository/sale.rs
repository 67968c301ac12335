//! # Sale Repository
//!
//! Database operations for sales, their line items and payment breakdowns.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Write Paths                                  │
//! │                                                                         │
//! │  1. CREATE (once)                                                       │
//! │     └── insert_sale() → sale + items + payment rows, one transaction   │
//! │                                                                         │
//! │  2. STATUS / TOTALS (repeatedly, guarded)                               │
//! │     └── update_status_guarded() → CAS on version                       │
//! │     └── (returns repository updates totals, same CAS discipline)       │
//! │                                                                         │
//! │  Items and payment rows are immutable snapshots; nothing ever          │
//! │  rewrites them after creation.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use caja_core::{Sale, SaleItem, SalePayment, SaleStatus};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a complete sale (header, items, payment breakdown) in one
    /// transaction. Either everything lands or nothing does.
    pub async fn insert_sale(
        &self,
        sale: &Sale,
        items: &[SaleItem],
        payments: &[SalePayment],
    ) -> DbResult<()> {
        debug!(id = %sale.id, folio = %sale.folio, "Inserting sale");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, store_id, folio, status,
                total_cents, discount_cents, total_returned_cents,
                payment_kind, payment_method, fulfillment, delivery_assignee,
                created_by, created_at, updated_at, version
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.store_id)
        .bind(sale.folio)
        .bind(sale.status)
        .bind(sale.total_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_returned_cents)
        .bind(sale.payment_kind)
        .bind(sale.payment_method)
        .bind(sale.fulfillment)
        .bind(&sale.delivery_assignee)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.version)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, name, quantity,
                    unit_price_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for payment in payments {
            sqlx::query(
                r#"
                INSERT INTO sale_payments (
                    id, sale_id, method, amount_cents, received_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&payment.id)
            .bind(&payment.sale_id)
            .bind(payment.method)
            .bind(payment.amount_cents)
            .bind(payment.received_cents)
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Gets a sale by ID within a tenant scope.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, tenant_id, store_id, folio, status,
                   total_cents, discount_cents, total_returned_cents,
                   payment_kind, payment_method, fulfillment, delivery_assignee,
                   created_by, created_at, updated_at, version
            FROM sales
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets all items for a sale, in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, name, quantity,
                   unit_price_cents, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the payment breakdown for a sale.
    ///
    /// Empty for single-method sales; those carry the method on the sale row.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<SalePayment>> {
        let payments = sqlx::query_as::<_, SalePayment>(
            r#"
            SELECT id, sale_id, method, amount_cents, received_cents, created_at
            FROM sale_payments
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Lists a tenant's most recent sales.
    pub async fn list_recent(&self, tenant_id: &str, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, tenant_id, store_id, folio, status,
                   total_cents, discount_cents, total_returned_cents,
                   payment_kind, payment_method, fulfillment, delivery_assignee,
                   created_by, created_at, updated_at, version
            FROM sales
            WHERE tenant_id = ?1
            ORDER BY created_at DESC, folio DESC
            LIMIT ?2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Updates a sale's status, guarded by the version the caller read.
    ///
    /// Returns [`DbError::Conflict`] when the row was modified since that
    /// read (or no longer exists); the caller reloads and retries.
    pub async fn update_status_guarded(
        &self,
        tenant_id: &str,
        sale_id: &str,
        expected_version: i64,
        status: SaleStatus,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = ?4,
                updated_at = ?5,
                version = version + 1
            WHERE tenant_id = ?1 AND id = ?2 AND version = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .bind(expected_version)
        .bind(status)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Sale", sale_id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
