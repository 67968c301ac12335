//! # Return Repository
//!
//! Database operations for returns and the coupled sale-totals updates.
//!
//! ## The Coupled Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Return Persistence + Sale Totals, One Transaction          │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    INSERT INTO returns ...                                              │
//! │    INSERT INTO return_items ... (per line)                              │
//! │    INSERT INTO return_payments ... (mixed refunds only)                 │
//! │    UPDATE sales SET total_returned_cents = ?, status = ?,               │
//! │                    version = version + 1                                │
//! │    WHERE id = ? AND tenant_id = ? AND version = ?   ← CAS guard         │
//! │  COMMIT (or ROLLBACK when the guard matched no row)                     │
//! │                                                                         │
//! │  The guard is what serializes concurrent returns against one sale:     │
//! │  whichever transaction loses the version race rolls back completely    │
//! │  and the engine revalidates against the fresh balance.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use caja_core::{RefundLine, ReturnItem, SaleReturn, SaleStatus};

// =============================================================================
// Sale Totals Update
// =============================================================================

/// The new accumulated totals and status a return (or its rejection) writes
/// onto the owning sale, guarded by the version the caller validated against.
#[derive(Debug, Clone)]
pub struct SaleTotalsUpdate {
    pub tenant_id: String,
    pub sale_id: String,
    /// Version of the sale row the caller read and validated against.
    pub expected_version: i64,
    pub total_returned_cents: i64,
    pub status: SaleStatus,
}

// =============================================================================
// Return Repository
// =============================================================================

/// Repository for return database operations.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Persists a processed return and applies its totals to the owning sale
    /// in one transaction.
    ///
    /// Returns [`DbError::Conflict`] and persists nothing when the sale's
    /// version moved since the caller validated the refund; the caller
    /// reloads the sale and revalidates.
    pub async fn insert_processed(
        &self,
        ret: &SaleReturn,
        items: &[ReturnItem],
        refund_lines: &[RefundLine],
        totals: &SaleTotalsUpdate,
    ) -> DbResult<()> {
        debug!(id = %ret.id, sale_id = %ret.sale_id, folio = %ret.folio, "Inserting return");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO returns (
                id, sale_id, tenant_id, store_id, folio, status,
                refund_amount_cents, refund_kind, refund_method,
                processed_by, created_at, decided_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&ret.id)
        .bind(&ret.sale_id)
        .bind(&ret.tenant_id)
        .bind(&ret.store_id)
        .bind(ret.folio)
        .bind(ret.status)
        .bind(ret.refund_amount_cents)
        .bind(ret.refund_kind)
        .bind(ret.refund_method)
        .bind(&ret.processed_by)
        .bind(ret.created_at)
        .bind(ret.decided_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO return_items (
                    id, return_id, product_id, name, quantity,
                    original_unit_price_cents, refund_unit_price_cents,
                    reason, condition, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&item.id)
            .bind(&item.return_id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.original_unit_price_cents)
            .bind(item.refund_unit_price_cents)
            .bind(&item.reason)
            .bind(item.condition)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for line in refund_lines {
            sqlx::query(
                r#"
                INSERT INTO return_payments (
                    id, return_id, method, amount_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&line.id)
            .bind(&line.return_id)
            .bind(line.method)
            .bind(line.amount_cents)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await?;
        }

        let updated = apply_sale_totals(&mut tx, totals).await?;
        if !updated {
            // Dropping the transaction rolls everything back.
            return Err(DbError::conflict("Sale", &totals.sale_id));
        }

        tx.commit().await?;

        Ok(())
    }

    /// Gets a return by ID within a tenant scope.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<SaleReturn>> {
        let ret = sqlx::query_as::<_, SaleReturn>(
            r#"
            SELECT id, sale_id, tenant_id, store_id, folio, status,
                   refund_amount_cents, refund_kind, refund_method,
                   processed_by, created_at, decided_at
            FROM returns
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ret)
    }

    /// Gets all items for a return, in insertion order.
    pub async fn get_items(&self, return_id: &str) -> DbResult<Vec<ReturnItem>> {
        let items = sqlx::query_as::<_, ReturnItem>(
            r#"
            SELECT id, return_id, product_id, name, quantity,
                   original_unit_price_cents, refund_unit_price_cents,
                   reason, condition, created_at
            FROM return_items
            WHERE return_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(return_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the refund breakdown for a return.
    ///
    /// Empty for single-method refunds; those carry the method on the return
    /// row.
    pub async fn get_refund_lines(&self, return_id: &str) -> DbResult<Vec<RefundLine>> {
        let lines = sqlx::query_as::<_, RefundLine>(
            r#"
            SELECT id, return_id, method, amount_cents, created_at
            FROM return_payments
            WHERE return_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(return_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Lists all returns recorded against one sale, oldest first.
    pub async fn list_for_sale(&self, tenant_id: &str, sale_id: &str) -> DbResult<Vec<SaleReturn>> {
        let returns = sqlx::query_as::<_, SaleReturn>(
            r#"
            SELECT id, sale_id, tenant_id, store_id, folio, status,
                   refund_amount_cents, refund_kind, refund_method,
                   processed_by, created_at, decided_at
            FROM returns
            WHERE tenant_id = ?1 AND sale_id = ?2
            ORDER BY created_at, folio
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(returns)
    }

    /// Marks a processed return as approved.
    ///
    /// The `status = 'processed'` guard makes the decision single-shot;
    /// a return decided before (or never processed) matches no row.
    pub async fn decide_approved(&self, tenant_id: &str, return_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE returns SET
                status = 'approved',
                decided_at = ?3
            WHERE tenant_id = ?1 AND id = ?2 AND status = 'processed'
            "#,
        )
        .bind(tenant_id)
        .bind(return_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Return (processed)", return_id));
        }

        Ok(())
    }

    /// Marks a processed return as rejected and backs its refund out of the
    /// owning sale, in one transaction.
    ///
    /// Error contract mirrors the other guarded writes: a not-found means the
    /// return is not in `processed` state; a conflict means the sale row
    /// moved and the caller should recompute the reversal.
    pub async fn decide_rejected(
        &self,
        tenant_id: &str,
        return_id: &str,
        totals: &SaleTotalsUpdate,
    ) -> DbResult<()> {
        debug!(id = %return_id, sale_id = %totals.sale_id, "Rejecting return");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE returns SET
                status = 'rejected',
                decided_at = ?3
            WHERE tenant_id = ?1 AND id = ?2 AND status = 'processed'
            "#,
        )
        .bind(tenant_id)
        .bind(return_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            return Err(DbError::not_found("Return (processed)", return_id));
        }

        let updated = apply_sale_totals(&mut tx, totals).await?;
        if !updated {
            return Err(DbError::conflict("Sale", &totals.sale_id));
        }

        tx.commit().await?;

        Ok(())
    }
}

/// Applies a guarded totals-and-status update to the sales row inside an open
/// transaction. Returns whether the version guard matched.
async fn apply_sale_totals(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    totals: &SaleTotalsUpdate,
) -> DbResult<bool> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE sales SET
            total_returned_cents = ?4,
            status = ?5,
            updated_at = ?6,
            version = version + 1
        WHERE tenant_id = ?1 AND id = ?2 AND version = ?3
        "#,
    )
    .bind(&totals.tenant_id)
    .bind(&totals.sale_id)
    .bind(totals.expected_version)
    .bind(totals.total_returned_cents)
    .bind(totals.status)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caja_core::{
        Fulfillment, ItemCondition, OperatingMode, PaymentKind, PaymentMethod, ReturnStatus,
        Sale, Tenant,
    };
    use uuid::Uuid;

    async fn db_with_sale() -> (Database, Sale) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.tenants()
            .insert(&Tenant {
                id: "t1".to_string(),
                name: "Tienda Uno".to_string(),
                mode: OperatingMode::SellFromStock,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id: "t1".to_string(),
            store_id: Some("store-1".to_string()),
            folio: 1,
            status: SaleStatus::EntregadoYCobrado,
            total_cents: 10_000,
            discount_cents: 0,
            total_returned_cents: 0,
            payment_kind: PaymentKind::Single,
            payment_method: Some(PaymentMethod::Cash),
            fulfillment: Fulfillment::Counter,
            delivery_assignee: None,
            created_by: "cashier-1".to_string(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        db.sales().insert_sale(&sale, &[], &[]).await.unwrap();

        (db, sale)
    }

    fn processed_return(sale: &Sale, folio: i64, refund_cents: i64) -> SaleReturn {
        SaleReturn {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            tenant_id: sale.tenant_id.clone(),
            store_id: "store-1".to_string(),
            folio,
            status: ReturnStatus::Processed,
            refund_amount_cents: refund_cents,
            refund_kind: PaymentKind::Single,
            refund_method: Some(PaymentMethod::Cash),
            processed_by: "manager-1".to_string(),
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    fn returned_item(return_id: &str, name: &str, quantity: i64, price: i64) -> ReturnItem {
        ReturnItem {
            id: Uuid::new_v4().to_string(),
            return_id: return_id.to_string(),
            product_id: None,
            name: name.to_string(),
            quantity,
            original_unit_price_cents: price,
            refund_unit_price_cents: price,
            reason: None,
            condition: ItemCondition::New,
            created_at: Utc::now(),
        }
    }

    fn totals(sale: &Sale, expected_version: i64, returned: i64, status: SaleStatus) -> SaleTotalsUpdate {
        SaleTotalsUpdate {
            tenant_id: sale.tenant_id.clone(),
            sale_id: sale.id.clone(),
            expected_version,
            total_returned_cents: returned,
            status,
        }
    }

    #[tokio::test]
    async fn test_insert_processed_updates_sale_atomically() {
        let (db, sale) = db_with_sale().await;
        let repo = db.returns();

        let ret = processed_return(&sale, 1, 4_000);
        let items = vec![returned_item(&ret.id, "Playera", 2, 2_000)];

        repo.insert_processed(
            &ret,
            &items,
            &[],
            &totals(&sale, 0, 4_000, SaleStatus::ParcialmenteDevuelta),
        )
        .await
        .unwrap();

        let loaded = repo.get_by_id("t1", &ret.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ReturnStatus::Processed);
        assert_eq!(loaded.refund_amount_cents, 4_000);
        assert_eq!(repo.get_items(&ret.id).await.unwrap().len(), 1);

        let updated_sale = db.sales().get_by_id("t1", &sale.id).await.unwrap().unwrap();
        assert_eq!(updated_sale.total_returned_cents, 4_000);
        assert_eq!(updated_sale.status, SaleStatus::ParcialmenteDevuelta);
        assert_eq!(updated_sale.version, 1);
    }

    #[tokio::test]
    async fn test_insert_processed_rolls_back_on_version_conflict() {
        let (db, sale) = db_with_sale().await;
        let repo = db.returns();

        let ret = processed_return(&sale, 1, 4_000);
        // Stale version: someone else already bumped the sale.
        db.sales()
            .update_status_guarded("t1", &sale.id, 0, SaleStatus::Enviado)
            .await
            .unwrap();

        let result = repo
            .insert_processed(
                &ret,
                &[returned_item(&ret.id, "Playera", 2, 2_000)],
                &[],
                &totals(&sale, 0, 4_000, SaleStatus::ParcialmenteDevuelta),
            )
            .await;
        assert!(matches!(result, Err(DbError::Conflict { .. })));

        // Nothing from the failed transaction is visible.
        assert!(repo.get_by_id("t1", &ret.id).await.unwrap().is_none());
        assert!(repo.get_items(&ret.id).await.unwrap().is_empty());

        let unchanged = db.sales().get_by_id("t1", &sale.id).await.unwrap().unwrap();
        assert_eq!(unchanged.total_returned_cents, 0);
    }

    #[tokio::test]
    async fn test_decide_approved_is_single_shot() {
        let (db, sale) = db_with_sale().await;
        let repo = db.returns();

        let ret = processed_return(&sale, 1, 4_000);
        repo.insert_processed(
            &ret,
            &[],
            &[],
            &totals(&sale, 0, 4_000, SaleStatus::ParcialmenteDevuelta),
        )
        .await
        .unwrap();

        repo.decide_approved("t1", &ret.id).await.unwrap();

        let loaded = repo.get_by_id("t1", &ret.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ReturnStatus::Approved);
        assert!(loaded.decided_at.is_some());

        // Second decision fails: the status guard no longer matches.
        let again = repo.decide_approved("t1", &ret.id).await;
        assert!(matches!(again, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_decide_rejected_backs_out_refund() {
        let (db, sale) = db_with_sale().await;
        let repo = db.returns();

        let ret = processed_return(&sale, 1, 4_000);
        repo.insert_processed(
            &ret,
            &[],
            &[],
            &totals(&sale, 0, 4_000, SaleStatus::ParcialmenteDevuelta),
        )
        .await
        .unwrap();

        // Sale is now at version 1; reversal zeroes the returned total.
        repo.decide_rejected(
            "t1",
            &ret.id,
            &totals(&sale, 1, 0, SaleStatus::EntregadoYCobrado),
        )
        .await
        .unwrap();

        let loaded = repo.get_by_id("t1", &ret.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ReturnStatus::Rejected);

        let updated_sale = db.sales().get_by_id("t1", &sale.id).await.unwrap().unwrap();
        assert_eq!(updated_sale.total_returned_cents, 0);
        assert_eq!(updated_sale.status, SaleStatus::EntregadoYCobrado);
        assert_eq!(updated_sale.version, 2);
    }

    #[tokio::test]
    async fn test_decide_rejected_keeps_return_processed_on_conflict() {
        let (db, sale) = db_with_sale().await;
        let repo = db.returns();

        let ret = processed_return(&sale, 1, 4_000);
        repo.insert_processed(
            &ret,
            &[],
            &[],
            &totals(&sale, 0, 4_000, SaleStatus::ParcialmenteDevuelta),
        )
        .await
        .unwrap();

        // Wrong expected version: the sale guard fails, so the status flip
        // must roll back with it.
        let result = repo
            .decide_rejected("t1", &ret.id, &totals(&sale, 0, 0, SaleStatus::EntregadoYCobrado))
            .await;
        assert!(matches!(result, Err(DbError::Conflict { .. })));

        let loaded = repo.get_by_id("t1", &ret.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ReturnStatus::Processed);
    }

    #[tokio::test]
    async fn test_refund_lines_roundtrip() {
        let (db, sale) = db_with_sale().await;
        let repo = db.returns();

        let mut ret = processed_return(&sale, 1, 4_000);
        ret.refund_kind = PaymentKind::Mixed;
        ret.refund_method = None;

        let lines = vec![
            RefundLine {
                id: Uuid::new_v4().to_string(),
                return_id: ret.id.clone(),
                method: PaymentMethod::Cash,
                amount_cents: 2_500,
                created_at: Utc::now(),
            },
            RefundLine {
                id: Uuid::new_v4().to_string(),
                return_id: ret.id.clone(),
                method: PaymentMethod::Card,
                amount_cents: 1_500,
                created_at: Utc::now(),
            },
        ];

        repo.insert_processed(
            &ret,
            &[],
            &lines,
            &totals(&sale, 0, 4_000, SaleStatus::ParcialmenteDevuelta),
        )
        .await
        .unwrap();

        let loaded = repo.get_refund_lines(&ret.id).await.unwrap();
        assert_eq!(loaded.len(), 2);
        let refunded: i64 = loaded.iter().map(|l| l.amount_cents).sum();
        assert_eq!(refunded, 4_000);
    }

    #[tokio::test]
    async fn test_list_for_sale() {
        let (db, sale) = db_with_sale().await;
        let repo = db.returns();

        repo.insert_processed(
            &processed_return(&sale, 1, 2_000),
            &[],
            &[],
            &totals(&sale, 0, 2_000, SaleStatus::ParcialmenteDevuelta),
        )
        .await
        .unwrap();
        repo.insert_processed(
            &processed_return(&sale, 2, 3_000),
            &[],
            &[],
            &totals(&sale, 1, 5_000, SaleStatus::ParcialmenteDevuelta),
        )
        .await
        .unwrap();

        let listed = repo.list_for_sale("t1", &sale.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].folio, 1);
        assert_eq!(listed[1].folio, 2);
    }
}
