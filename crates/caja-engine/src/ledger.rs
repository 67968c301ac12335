//! # Sale Ledger
//!
//! Registers sales and drives the manual side of the status lifecycle.
//!
//! ## Registration Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(request)                                                   │
//! │      │                                                                  │
//! │      ├─ 1. validate scope ids and store context                         │
//! │      ├─ 2. resolve tenant operating mode                                │
//! │      ├─ 3. validate items and amounts                                   │
//! │      ├─ 4. compose payment (single / mixed, tolerance checked)          │
//! │      ├─ 5. draw the next sale folio for the tenant                      │
//! │      ├─ 6. persist sale + items + payment rows in one transaction       │
//! │      └─ 7. apply stock deltas (best-effort, mode permitting)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status updates go through a compare-and-swap on the sale version and
//! retry a bounded number of times when a concurrent writer got there first.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use caja_core::{
    payment, status, validation, FolioKind, Fulfillment, Money, Sale, SaleItem, SalePayment,
    SaleStatus,
};
use caja_db::{Database, DbError};

use crate::error::{EngineError, EngineResult};
use crate::inventory::InventoryReconciler;
use crate::requests::{CreateSaleRequest, SaleDetail};
use crate::CAS_MAX_RETRIES;

/// Entry point for sale registration and manual status changes.
#[derive(Debug, Clone)]
pub struct SaleLedger {
    db: Database,
    inventory: InventoryReconciler,
}

impl SaleLedger {
    pub fn new(db: Database) -> Self {
        let inventory = InventoryReconciler::new(db.products());
        SaleLedger { db, inventory }
    }

    /// Registers a new sale.
    ///
    /// Assigns the tenant's next sale folio, derives the initial status from
    /// the operating mode (sell-from-stock tenants settle immediately,
    /// prepare-on-demand tenants start in preparation) and, mode permitting,
    /// decrements stock for every catalog-backed line.
    pub async fn create_sale(&self, request: CreateSaleRequest) -> EngineResult<SaleDetail> {
        validation::validate_scope_id("tenantId", &request.tenant_id)?;
        validation::validate_scope_id("createdBy", &request.created_by)?;

        let store_id = request
            .store_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(EngineError::StoreRequired)?;

        let mode = self
            .db
            .tenants()
            .operating_mode(&request.tenant_id)
            .await?
            .ok_or_else(|| EngineError::TenantNotFound(request.tenant_id.clone()))?;

        validation::validate_item_count(request.items.len())?;
        validation::validate_non_negative_cents("totalCents", request.total_cents)?;
        validation::validate_non_negative_cents("discountCents", request.discount_cents)?;
        for item in &request.items {
            validation::validate_name(&item.name)?;
            validation::validate_quantity(item.quantity)?;
            validation::validate_non_negative_cents("unitPriceCents", item.unit_price_cents)?;
        }

        let total = Money::from_cents(request.total_cents);
        let descriptor = payment::compose(total, &request.payment)?;

        let folio = self
            .db
            .folios()
            .next_folio(&request.tenant_id, FolioKind::Sale)
            .await?;

        // An assignee only means something on delivery sales.
        let delivery_assignee = match request.fulfillment {
            Fulfillment::Delivery => request
                .delivery_assignee
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Fulfillment::Counter => None,
        };

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id: request.tenant_id.clone(),
            store_id: Some(store_id),
            folio,
            status: status::initial_status(mode),
            total_cents: request.total_cents,
            discount_cents: request.discount_cents,
            total_returned_cents: 0,
            payment_kind: descriptor.kind,
            payment_method: descriptor.method,
            fulfillment: request.fulfillment,
            delivery_assignee,
            created_by: request.created_by.clone(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let items: Vec<SaleItem> = request
            .items
            .iter()
            .map(|input| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: input.product_id.clone(),
                name: input.name.trim().to_string(),
                quantity: input.quantity,
                unit_price_cents: input.unit_price_cents,
                created_at: now,
            })
            .collect();

        let payments: Vec<SalePayment> = descriptor
            .lines
            .iter()
            .map(|line| SalePayment {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                method: line.method,
                amount_cents: line.amount_cents,
                received_cents: line.received_cents,
                created_at: now,
            })
            .collect();

        self.db
            .sales()
            .insert_sale(&sale, &items, &payments)
            .await?;

        // Stock moves once the sale is durable; a failed delta becomes a
        // discrepancy record, never an error.
        self.inventory.consume_for_sale(mode, &sale, &items).await;

        info!(
            tenant_id = %sale.tenant_id,
            sale_id = %sale.id,
            folio = %sale.folio,
            total = %sale.total(),
            status = %sale.status,
            "Sale registered"
        );

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }

    /// Manually moves a sale to one of the operational statuses.
    ///
    /// Return-driven statuses are off limits here: `parcialmente_devuelta`
    /// is never manually assignable and `cancelada` is only reachable while
    /// the sale is still in preparation or ready to ship.
    pub async fn update_status(
        &self,
        tenant_id: &str,
        sale_id: &str,
        target: SaleStatus,
    ) -> EngineResult<Sale> {
        validation::validate_scope_id("tenantId", tenant_id)?;

        for attempt in 0..CAS_MAX_RETRIES {
            let sale = self
                .db
                .sales()
                .get_by_id(tenant_id, sale_id)
                .await?
                .ok_or_else(|| EngineError::SaleNotFound(sale_id.to_string()))?;

            status::validate_manual_transition(sale.status, target)?;

            match self
                .db
                .sales()
                .update_status_guarded(tenant_id, sale_id, sale.version, target)
                .await
            {
                Ok(()) => {
                    info!(
                        tenant_id,
                        sale_id,
                        from = %sale.status,
                        to = %target,
                        "Sale status updated"
                    );
                    return self
                        .db
                        .sales()
                        .get_by_id(tenant_id, sale_id)
                        .await?
                        .ok_or_else(|| EngineError::SaleNotFound(sale_id.to_string()));
                }
                Err(DbError::Conflict { .. }) => {
                    debug!(tenant_id, sale_id, attempt, "Status update lost the race, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::Conflict(sale_id.to_string()))
    }

    /// Loads a sale with its lines and payment breakdown.
    pub async fn get_sale(&self, tenant_id: &str, sale_id: &str) -> EngineResult<SaleDetail> {
        let sale = self
            .db
            .sales()
            .get_by_id(tenant_id, sale_id)
            .await?
            .ok_or_else(|| EngineError::SaleNotFound(sale_id.to_string()))?;

        let items = self.db.sales().get_items(&sale.id).await?;
        let payments = self.db.sales().get_payments(&sale.id).await?;

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }

    /// Lists the most recent sales of a tenant.
    pub async fn list_sales(&self, tenant_id: &str, limit: i64) -> EngineResult<Vec<Sale>> {
        Ok(self.db.sales().list_recent(tenant_id, limit).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::SaleItemInput;
    use caja_core::{
        OperatingMode, PaymentError, PaymentInput, PaymentKind, PaymentLine, PaymentMethod,
        Product, Tenant, TransitionError, ValidationError,
    };
    use caja_db::DbConfig;

    const RETAIL: &str = "tnt-retail";
    const KITCHEN: &str = "tnt-kitchen";

    async fn setup() -> (Database, SaleLedger) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        for (id, mode) in [
            (RETAIL, OperatingMode::SellFromStock),
            (KITCHEN, OperatingMode::PrepareOnDemand),
        ] {
            db.tenants()
                .insert(&Tenant {
                    id: id.to_string(),
                    name: id.to_string(),
                    mode,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        seed_product(&db, RETAIL, "p-cola", 2_500, Some(10)).await;
        seed_product(&db, KITCHEN, "p-burger", 9_000, Some(10)).await;

        let ledger = SaleLedger::new(db.clone());
        (db, ledger)
    }

    async fn seed_product(db: &Database, tenant: &str, id: &str, price: i64, stock: Option<i64>) {
        let now = Utc::now();
        db.products()
            .insert(&Product {
                id: id.to_string(),
                tenant_id: tenant.to_string(),
                sku: format!("SKU-{}", id),
                name: id.to_string(),
                price_cents: price,
                stock,
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await
            .unwrap();
    }

    fn item(product_id: Option<&str>, name: &str, quantity: i64, unit_price: i64) -> SaleItemInput {
        SaleItemInput {
            product_id: product_id.map(str::to_string),
            name: name.to_string(),
            quantity,
            unit_price_cents: unit_price,
        }
    }

    fn request(
        tenant: &str,
        total: i64,
        payment: PaymentInput,
        items: Vec<SaleItemInput>,
    ) -> CreateSaleRequest {
        CreateSaleRequest {
            tenant_id: tenant.to_string(),
            store_id: Some("store-1".to_string()),
            created_by: "user-1".to_string(),
            items,
            total_cents: total,
            discount_cents: 0,
            payment,
            fulfillment: Fulfillment::Counter,
            delivery_assignee: None,
        }
    }

    fn cash(amount: i64, received: i64) -> PaymentLine {
        PaymentLine {
            method: PaymentMethod::Cash,
            amount_cents: amount,
            received_cents: Some(received),
        }
    }

    fn card(amount: i64) -> PaymentLine {
        PaymentLine {
            method: PaymentMethod::Card,
            amount_cents: amount,
            received_cents: None,
        }
    }

    #[tokio::test]
    async fn test_create_sale_single_method() {
        let (db, ledger) = setup().await;

        let detail = ledger
            .create_sale(request(
                RETAIL,
                5_000,
                PaymentInput::Single {
                    method: PaymentMethod::Cash,
                },
                vec![item(Some("p-cola"), "Cola", 2, 2_500)],
            ))
            .await
            .unwrap();

        assert_eq!(detail.sale.folio, 1);
        assert_eq!(detail.sale.status, SaleStatus::EntregadoYCobrado);
        assert_eq!(detail.sale.payment_kind, PaymentKind::Single);
        assert_eq!(detail.sale.payment_method, Some(PaymentMethod::Cash));
        assert!(detail.payments.is_empty());

        // Retail tenant sells from stock: 10 - 2 = 8.
        let product = db.products().get_by_id(RETAIL, "p-cola").await.unwrap().unwrap();
        assert_eq!(product.stock, Some(8));
    }

    #[tokio::test]
    async fn test_create_sale_mixed_breakdown() {
        let (db, ledger) = setup().await;

        let detail = ledger
            .create_sale(request(
                RETAIL,
                18_000,
                PaymentInput::Mixed {
                    lines: vec![cash(10_000, 10_000), card(8_000)],
                },
                vec![item(None, "Combo", 1, 18_000)],
            ))
            .await
            .unwrap();

        assert_eq!(detail.sale.payment_kind, PaymentKind::Mixed);
        assert_eq!(detail.sale.payment_method, None);
        assert_eq!(detail.payments.len(), 2);

        let stored = db.sales().get_payments(&detail.sale.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.iter().map(|p| p.amount_cents).sum::<i64>(), 18_000);
    }

    #[tokio::test]
    async fn test_create_sale_mixed_accepts_one_cent_drift() {
        let (_db, ledger) = setup().await;

        let detail = ledger
            .create_sale(request(
                RETAIL,
                18_000,
                PaymentInput::Mixed {
                    lines: vec![cash(9_999, 10_000), card(8_000)],
                },
                vec![item(None, "Combo", 1, 18_000)],
            ))
            .await
            .unwrap();

        assert_eq!(detail.sale.total_cents, 18_000);
    }

    #[tokio::test]
    async fn test_create_sale_mixed_sum_mismatch() {
        let (_db, ledger) = setup().await;

        let err = ledger
            .create_sale(request(
                RETAIL,
                18_000,
                PaymentInput::Mixed {
                    lines: vec![cash(10_000, 10_000), card(7_000)],
                },
                vec![item(None, "Combo", 1, 18_000)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::InvalidPayment(PaymentError::SumMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_sale_requires_store() {
        let (_db, ledger) = setup().await;

        let mut req = request(
            RETAIL,
            2_500,
            PaymentInput::Single {
                method: PaymentMethod::Cash,
            },
            vec![item(None, "Cola", 1, 2_500)],
        );
        req.store_id = None;
        let err = ledger.create_sale(req.clone()).await.unwrap_err();
        assert!(matches!(err, EngineError::StoreRequired));

        req.store_id = Some("   ".to_string());
        let err = ledger.create_sale(req).await.unwrap_err();
        assert!(matches!(err, EngineError::StoreRequired));
    }

    #[tokio::test]
    async fn test_create_sale_unknown_tenant() {
        let (_db, ledger) = setup().await;

        let err = ledger
            .create_sale(request(
                "tnt-ghost",
                2_500,
                PaymentInput::Single {
                    method: PaymentMethod::Cash,
                },
                vec![item(None, "Cola", 1, 2_500)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::TenantNotFound(id) if id == "tnt-ghost"));
    }

    #[tokio::test]
    async fn test_folio_series_per_tenant() {
        let (_db, ledger) = setup().await;

        let single = PaymentInput::Single {
            method: PaymentMethod::Cash,
        };

        let first = ledger
            .create_sale(request(RETAIL, 2_500, single.clone(), vec![item(None, "A", 1, 2_500)]))
            .await
            .unwrap();
        let second = ledger
            .create_sale(request(RETAIL, 2_500, single.clone(), vec![item(None, "B", 1, 2_500)]))
            .await
            .unwrap();
        let other_tenant = ledger
            .create_sale(request(KITCHEN, 9_000, single, vec![item(None, "C", 1, 9_000)]))
            .await
            .unwrap();

        assert_eq!(first.sale.folio, 1);
        assert_eq!(second.sale.folio, 2);
        // Each tenant numbers its own series.
        assert_eq!(other_tenant.sale.folio, 1);
    }

    #[tokio::test]
    async fn test_prepare_on_demand_starts_in_preparation() {
        let (db, ledger) = setup().await;

        let detail = ledger
            .create_sale(request(
                KITCHEN,
                9_000,
                PaymentInput::Single {
                    method: PaymentMethod::Card,
                },
                vec![item(Some("p-burger"), "Hamburguesa", 1, 9_000)],
            ))
            .await
            .unwrap();

        assert_eq!(detail.sale.status, SaleStatus::EnPreparacion);

        // Stock untouched for prepare-on-demand tenants.
        let product = db.products().get_by_id(KITCHEN, "p-burger").await.unwrap().unwrap();
        assert_eq!(product.stock, Some(10));
    }

    #[tokio::test]
    async fn test_delivery_assignee_normalization() {
        let (_db, ledger) = setup().await;

        let single = PaymentInput::Single {
            method: PaymentMethod::Cash,
        };

        // Counter sales drop any assignee.
        let mut req = request(RETAIL, 2_500, single.clone(), vec![item(None, "A", 1, 2_500)]);
        req.delivery_assignee = Some("Luis".to_string());
        let counter = ledger.create_sale(req).await.unwrap();
        assert_eq!(counter.sale.delivery_assignee, None);

        // Delivery sales keep a non-blank assignee.
        let mut req = request(RETAIL, 2_500, single.clone(), vec![item(None, "B", 1, 2_500)]);
        req.fulfillment = Fulfillment::Delivery;
        req.delivery_assignee = Some("  Luis ".to_string());
        let delivery = ledger.create_sale(req).await.unwrap();
        assert_eq!(delivery.sale.delivery_assignee, Some("Luis".to_string()));

        // Blank assignees are cleared even on delivery.
        let mut req = request(RETAIL, 2_500, single, vec![item(None, "C", 1, 2_500)]);
        req.fulfillment = Fulfillment::Delivery;
        req.delivery_assignee = Some("   ".to_string());
        let blank = ledger.create_sale(req).await.unwrap();
        assert_eq!(blank.sale.delivery_assignee, None);
    }

    #[tokio::test]
    async fn test_manual_status_walk() {
        let (_db, ledger) = setup().await;

        let detail = ledger
            .create_sale(request(
                KITCHEN,
                9_000,
                PaymentInput::Single {
                    method: PaymentMethod::Cash,
                },
                vec![item(None, "Hamburguesa", 1, 9_000)],
            ))
            .await
            .unwrap();
        let sale_id = detail.sale.id;

        let sale = ledger
            .update_status(KITCHEN, &sale_id, SaleStatus::ListoParaEnvio)
            .await
            .unwrap();
        assert_eq!(sale.status, SaleStatus::ListoParaEnvio);
        assert_eq!(sale.version, 1);

        let sale = ledger
            .update_status(KITCHEN, &sale_id, SaleStatus::Enviado)
            .await
            .unwrap();
        assert_eq!(sale.status, SaleStatus::Enviado);

        let sale = ledger
            .update_status(KITCHEN, &sale_id, SaleStatus::EntregadoYCobrado)
            .await
            .unwrap();
        assert_eq!(sale.status, SaleStatus::EntregadoYCobrado);
        assert_eq!(sale.version, 3);
    }

    #[tokio::test]
    async fn test_cancel_only_from_open_states() {
        let (_db, ledger) = setup().await;

        // Kitchen sales start in preparation and may cancel.
        let open = ledger
            .create_sale(request(
                KITCHEN,
                9_000,
                PaymentInput::Single {
                    method: PaymentMethod::Cash,
                },
                vec![item(None, "A", 1, 9_000)],
            ))
            .await
            .unwrap();
        let cancelled = ledger
            .update_status(KITCHEN, &open.sale.id, SaleStatus::Cancelada)
            .await
            .unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelada);

        // Retail sales settle on creation; cancelling them is not allowed.
        let settled = ledger
            .create_sale(request(
                RETAIL,
                2_500,
                PaymentInput::Single {
                    method: PaymentMethod::Cash,
                },
                vec![item(None, "B", 1, 2_500)],
            ))
            .await
            .unwrap();
        let err = ledger
            .update_status(RETAIL, &settled.sale.id, SaleStatus::Cancelada)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::IllegalTransition(TransitionError::CancelNotAllowed { .. })
        ));
    }

    #[tokio::test]
    async fn test_partially_returned_never_manual() {
        let (_db, ledger) = setup().await;

        let detail = ledger
            .create_sale(request(
                RETAIL,
                2_500,
                PaymentInput::Single {
                    method: PaymentMethod::Cash,
                },
                vec![item(None, "A", 1, 2_500)],
            ))
            .await
            .unwrap();

        let err = ledger
            .update_status(RETAIL, &detail.sale.id, SaleStatus::ParcialmenteDevuelta)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::IllegalTransition(TransitionError::NotManuallyAssignable { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_status_unknown_sale() {
        let (_db, ledger) = setup().await;

        let err = ledger
            .update_status(RETAIL, "sale-ghost", SaleStatus::Enviado)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SaleNotFound(id) if id == "sale-ghost"));
    }

    #[tokio::test]
    async fn test_create_sale_field_validation() {
        let (_db, ledger) = setup().await;

        let single = PaymentInput::Single {
            method: PaymentMethod::Cash,
        };

        // No items.
        let err = ledger
            .create_sale(request(RETAIL, 0, single.clone(), vec![]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::Required { .. })
        ));

        // Zero quantity.
        let err = ledger
            .create_sale(request(RETAIL, 2_500, single.clone(), vec![item(None, "A", 0, 2_500)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::OutOfRange { .. })
        ));

        // Negative total.
        let err = ledger
            .create_sale(request(RETAIL, -100, single, vec![item(None, "A", 1, 2_500)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::Negative { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_sale_and_listing() {
        let (_db, ledger) = setup().await;

        let created = ledger
            .create_sale(request(
                RETAIL,
                5_000,
                PaymentInput::Mixed {
                    lines: vec![cash(2_500, 2_500), card(2_500)],
                },
                vec![item(Some("p-cola"), "Cola", 2, 2_500)],
            ))
            .await
            .unwrap();

        let detail = ledger.get_sale(RETAIL, &created.sale.id).await.unwrap();
        assert_eq!(detail.sale.id, created.sale.id);
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.payments.len(), 2);

        // Scoped: another tenant cannot see it.
        let err = ledger.get_sale(KITCHEN, &created.sale.id).await.unwrap_err();
        assert!(matches!(err, EngineError::SaleNotFound(_)));

        let listed = ledger.list_sales(RETAIL, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.sale.id);
    }
}
