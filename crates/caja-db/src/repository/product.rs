//! # Product Repository
//!
//! Catalog rows, atomic stock deltas and the stock discrepancy audit trail.
//!
//! ## Stock Update Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: Read-modify-write (loses updates under concurrency)         │
//! │     let p = get(id); set_stock(id, p.stock - 3);                       │
//! │                                                                         │
//! │  ✅ CORRECT: Signed delta applied inside the UPDATE                    │
//! │     UPDATE products SET stock = COALESCE(stock, 0) - 3                 │
//! │                                                                         │
//! │  Why?                                                                   │
//! │  Till A: sells 3 → stock - 3                                           │
//! │  Till B: sells 2 → stock - 2                                           │
//! │  Any interleaving lands on -5 total                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine only ever calls [`ProductRepository::adjust_stock`] with signed
//! deltas; it never reads a stock level to compute the next one.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use caja_core::{Product, StockDiscrepancy};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, name, price_cents, stock,
                created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by ID within a tenant scope.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, tenant_id, sku, name, price_cents, stock,
                   created_at, updated_at, version
            FROM products
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Applies a signed stock delta atomically.
    ///
    /// ## Arguments
    /// * `tenant_id` - Owning tenant
    /// * `id` - Product ID
    /// * `delta` - Change in stock (negative for sales, positive for returns)
    pub async fn adjust_stock(&self, tenant_id: &str, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                stock = COALESCE(stock, 0) + ?3,
                updated_at = ?4,
                version = version + 1
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Records a stock adjustment that could not be applied.
    ///
    /// Stock deltas are best-effort beside sale/return persistence; when one
    /// fails, the gap becomes an explicit audit row rather than only a log
    /// line.
    pub async fn record_discrepancy(&self, discrepancy: &StockDiscrepancy) -> DbResult<()> {
        debug!(
            product_id = %discrepancy.product_id,
            delta = %discrepancy.delta,
            "Recording stock discrepancy"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_discrepancies (
                id, tenant_id, product_id, source, source_id,
                delta, detail, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&discrepancy.id)
        .bind(&discrepancy.tenant_id)
        .bind(&discrepancy.product_id)
        .bind(discrepancy.source)
        .bind(&discrepancy.source_id)
        .bind(discrepancy.delta)
        .bind(&discrepancy.detail)
        .bind(discrepancy.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists recorded stock discrepancies for a tenant, newest first.
    pub async fn list_discrepancies(&self, tenant_id: &str) -> DbResult<Vec<StockDiscrepancy>> {
        let rows = sqlx::query_as::<_, StockDiscrepancy>(
            r#"
            SELECT id, tenant_id, product_id, source, source_id,
                   delta, detail, created_at
            FROM stock_discrepancies
            WHERE tenant_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
