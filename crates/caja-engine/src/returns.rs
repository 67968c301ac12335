//! # Returns Reconciliation
//!
//! Processes returns against committed sales and applies approve/reject
//! decisions.
//!
//! ## Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_return(request)                      ┌─ retried on version ─┐   │
//! │      │                                       │  conflict, bounded   │   │
//! │      ├─ 1. load sale (must exist, must have a store)              ◄─┤   │
//! │      ├─ 2. refund shape must mirror the original payment            │   │
//! │      ├─ 3. refund must fit the remaining refundable balance         │   │
//! │      ├─ 4. every line must match an original line, qty bounded      │   │
//! │      ├─ 5. refund must not exceed the returned item value           │   │
//! │      ├─ 6. persist return + roll the sale totals/status (CAS) ──────┘   │
//! │      └─ 7. restock sellable lines (best-effort, mode permitting)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concurrent returns against one sale serialize on the sale version: the
//! loser of a compare-and-swap reloads the sale and revalidates against the
//! fresh balance, so two refunds can never jointly exceed the total.
//!
//! A rejection is the compensating move: the refund leaves the accumulated
//! total, the sale status rolls back (any remainder keeps it partially
//! returned, a fully-reverted cancellation becomes settled again) and
//! restocked units are taken back out.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use caja_core::{
    status, validation, FolioKind, ItemCondition, Money, PaymentKind, PaymentMethod, RefundLine,
    ReturnItem, ReturnStatus, Sale, SaleItem, SalePayment, SaleReturn, PAYMENT_TOLERANCE_CENTS,
};
use caja_db::{Database, DbError, SaleTotalsUpdate};

use crate::error::{EngineError, EngineResult};
use crate::inventory::InventoryReconciler;
use crate::requests::{
    CreateReturnRequest, ProcessedReturn, RefundInput, RefundLineInput, ReturnDecision,
    ReturnDetail, ReturnItemInput,
};
use crate::CAS_MAX_RETRIES;

/// Entry point for processing and deciding returns.
#[derive(Debug, Clone)]
pub struct ReturnsReconciler {
    db: Database,
    inventory: InventoryReconciler,
}

impl ReturnsReconciler {
    pub fn new(db: Database) -> Self {
        let inventory = InventoryReconciler::new(db.products());
        ReturnsReconciler { db, inventory }
    }

    /// Processes a return against a sale.
    ///
    /// The return is persisted in `processed` status together with the new
    /// sale totals: the refund joins the accumulated returned amount and the
    /// sale moves to `parcialmente_devuelta`, or to `cancelada` once the
    /// accumulated refunds cover the total (within one cent).
    pub async fn create_return(
        &self,
        request: CreateReturnRequest,
    ) -> EngineResult<ProcessedReturn> {
        validation::validate_scope_id("tenantId", &request.tenant_id)?;
        validation::validate_scope_id("processedBy", &request.processed_by)?;
        validation::validate_item_count(request.items.len())?;
        validation::validate_positive_cents("refundAmountCents", request.refund_amount_cents)?;
        for item in &request.items {
            validation::validate_name(&item.name)?;
            validation::validate_quantity(item.quantity)?;
            if let Some(cents) = item.refund_unit_price_cents {
                validation::validate_non_negative_cents("refundUnitPriceCents", cents)?;
            }
        }

        let mode = self
            .db
            .tenants()
            .operating_mode(&request.tenant_id)
            .await?
            .ok_or_else(|| EngineError::TenantNotFound(request.tenant_id.clone()))?;

        for attempt in 0..CAS_MAX_RETRIES {
            // Fresh snapshot every attempt: a concurrent return moves the
            // refundable balance under us.
            let sale = self
                .db
                .sales()
                .get_by_id(&request.tenant_id, &request.sale_id)
                .await?
                .ok_or_else(|| EngineError::SaleNotFound(request.sale_id.clone()))?;

            // Legacy sales without a store cannot take returns.
            let Some(store_id) = sale.store_id.clone() else {
                return Err(EngineError::SaleNotFound(request.sale_id.clone()));
            };

            let original_payments = self.db.sales().get_payments(&sale.id).await?;
            let (refund_method, breakdown) = validate_refund_shape(
                &sale,
                &original_payments,
                &request.refund,
                request.refund_amount_cents,
            )?;

            let refund = Money::from_cents(request.refund_amount_cents);
            let remaining = sale.remaining_refundable();
            if refund.cents() > remaining.cents() {
                return Err(EngineError::RefundExceedsBalance {
                    requested: refund,
                    remaining,
                });
            }

            let sale_items = self.db.sales().get_items(&sale.id).await?;
            let resolved = resolve_returned_items(&sale_items, &request.items)?;

            let item_value: i64 = resolved
                .iter()
                .map(|line| line.refund_unit_price_cents * line.quantity)
                .sum();
            if request.refund_amount_cents > item_value {
                return Err(EngineError::RefundExceedsItemValue {
                    refund,
                    item_value: Money::from_cents(item_value),
                });
            }

            let folio = self
                .db
                .folios()
                .next_folio(&request.tenant_id, FolioKind::Return)
                .await?;

            let now = Utc::now();
            let sale_return = SaleReturn {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                tenant_id: request.tenant_id.clone(),
                store_id,
                folio,
                status: ReturnStatus::Processed,
                refund_amount_cents: request.refund_amount_cents,
                refund_kind: sale.payment_kind,
                refund_method,
                processed_by: request.processed_by.clone(),
                created_at: now,
                decided_at: None,
            };

            let items: Vec<ReturnItem> = resolved
                .iter()
                .map(|line| ReturnItem {
                    id: Uuid::new_v4().to_string(),
                    return_id: sale_return.id.clone(),
                    product_id: line.product_id.clone(),
                    name: line.name.clone(),
                    quantity: line.quantity,
                    original_unit_price_cents: line.original_unit_price_cents,
                    refund_unit_price_cents: line.refund_unit_price_cents,
                    reason: line.reason.clone(),
                    condition: line.condition,
                    created_at: now,
                })
                .collect();

            let refund_lines: Vec<RefundLine> = breakdown
                .iter()
                .map(|line| RefundLine {
                    id: Uuid::new_v4().to_string(),
                    return_id: sale_return.id.clone(),
                    method: line.method,
                    amount_cents: line.amount_cents,
                    created_at: now,
                })
                .collect();

            let new_returned = sale.total_returned_cents + request.refund_amount_cents;
            let new_status =
                status::status_after_return(sale.total(), Money::from_cents(new_returned));

            let totals = SaleTotalsUpdate {
                tenant_id: request.tenant_id.clone(),
                sale_id: sale.id.clone(),
                expected_version: sale.version,
                total_returned_cents: new_returned,
                status: new_status,
            };

            match self
                .db
                .returns()
                .insert_processed(&sale_return, &items, &refund_lines, &totals)
                .await
            {
                Ok(()) => {
                    self.inventory
                        .restock_for_return(mode, &sale_return, &items)
                        .await;

                    let sale_updated = self
                        .db
                        .sales()
                        .get_by_id(&request.tenant_id, &sale.id)
                        .await?
                        .ok_or_else(|| EngineError::SaleNotFound(sale.id.clone()))?;

                    info!(
                        tenant_id = %sale_return.tenant_id,
                        return_id = %sale_return.id,
                        sale_id = %sale_return.sale_id,
                        folio = %sale_return.folio,
                        refund = %sale_return.refund_amount(),
                        sale_status = %sale_updated.status,
                        "Return processed"
                    );

                    return Ok(ProcessedReturn {
                        sale_return,
                        items,
                        sale_updated,
                    });
                }
                Err(DbError::Conflict { .. }) => {
                    debug!(
                        sale_id = %sale.id,
                        attempt,
                        "Concurrent return won the race, revalidating"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::Conflict(request.sale_id))
    }

    /// Applies an approve/reject decision to a processed return.
    ///
    /// Each return takes exactly one decision. Approval is bookkeeping only;
    /// rejection compensates: the refund leaves the sale's accumulated
    /// returned total, the status reverses and restocked units come back out.
    pub async fn decide_return(
        &self,
        tenant_id: &str,
        return_id: &str,
        decision: ReturnDecision,
    ) -> EngineResult<SaleReturn> {
        validation::validate_scope_id("tenantId", tenant_id)?;

        let sale_return = self
            .db
            .returns()
            .get_by_id(tenant_id, return_id)
            .await?
            .ok_or_else(|| EngineError::ReturnNotFound(return_id.to_string()))?;

        if sale_return.status != ReturnStatus::Processed {
            return Err(EngineError::AlreadyDecided(return_id.to_string()));
        }

        match decision {
            ReturnDecision::Approved => {
                match self.db.returns().decide_approved(tenant_id, return_id).await {
                    Ok(()) => {}
                    // Another decision landed between our read and the flip.
                    Err(DbError::NotFound { .. }) => {
                        return Err(EngineError::AlreadyDecided(return_id.to_string()));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            ReturnDecision::Rejected => self.reject(&sale_return).await?,
        }

        let decided = self
            .db
            .returns()
            .get_by_id(tenant_id, return_id)
            .await?
            .ok_or_else(|| EngineError::ReturnNotFound(return_id.to_string()))?;

        info!(
            tenant_id,
            return_id,
            status = %decided.status,
            "Return decided"
        );

        Ok(decided)
    }

    /// Rejects a processed return as a compensating transaction.
    async fn reject(&self, sale_return: &SaleReturn) -> EngineResult<()> {
        for attempt in 0..CAS_MAX_RETRIES {
            let sale = self
                .db
                .sales()
                .get_by_id(&sale_return.tenant_id, &sale_return.sale_id)
                .await?
                .ok_or_else(|| EngineError::SaleNotFound(sale_return.sale_id.clone()))?;

            let remaining =
                (sale.total_returned() - sale_return.refund_amount()).clamp_non_negative();
            let reverted_status = status::status_after_rejection(sale.status, remaining);

            let totals = SaleTotalsUpdate {
                tenant_id: sale_return.tenant_id.clone(),
                sale_id: sale_return.sale_id.clone(),
                expected_version: sale.version,
                total_returned_cents: remaining.cents(),
                status: reverted_status,
            };

            match self
                .db
                .returns()
                .decide_rejected(&sale_return.tenant_id, &sale_return.id, &totals)
                .await
            {
                Ok(()) => {
                    // The decision is durable; take the restocked units back
                    // out (best-effort, mode permitting).
                    let mode = self
                        .db
                        .tenants()
                        .operating_mode(&sale_return.tenant_id)
                        .await?
                        .ok_or_else(|| {
                            EngineError::TenantNotFound(sale_return.tenant_id.clone())
                        })?;
                    let items = self.db.returns().get_items(&sale_return.id).await?;
                    self.inventory
                        .unwind_rejected_return(mode, sale_return, &items)
                        .await;
                    return Ok(());
                }
                Err(DbError::Conflict { .. }) => {
                    debug!(
                        sale_id = %sale_return.sale_id,
                        attempt,
                        "Rejection lost the race, retrying"
                    );
                    continue;
                }
                // The guarded flip found no processed return row.
                Err(DbError::NotFound { .. }) => {
                    return Err(EngineError::AlreadyDecided(sale_return.id.clone()));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::Conflict(sale_return.sale_id.clone()))
    }

    /// Loads a return with its lines and refund breakdown.
    pub async fn get_return(&self, tenant_id: &str, return_id: &str) -> EngineResult<ReturnDetail> {
        let sale_return = self
            .db
            .returns()
            .get_by_id(tenant_id, return_id)
            .await?
            .ok_or_else(|| EngineError::ReturnNotFound(return_id.to_string()))?;

        let items = self.db.returns().get_items(&sale_return.id).await?;
        let refund_lines = self.db.returns().get_refund_lines(&sale_return.id).await?;

        Ok(ReturnDetail {
            sale_return,
            items,
            refund_lines,
        })
    }

    /// Lists every return processed against a sale, oldest first.
    pub async fn list_returns_for_sale(
        &self,
        tenant_id: &str,
        sale_id: &str,
    ) -> EngineResult<Vec<SaleReturn>> {
        Ok(self.db.returns().list_for_sale(tenant_id, sale_id).await?)
    }
}

// =============================================================================
// Refund Shape Validation
// =============================================================================

/// Checks the refund against the original payment and normalizes the
/// method/breakdown pair for persistence.
///
/// Single-method sales refund through the same method, or through cash when
/// the original was card or transfer. Mixed sales require a breakdown whose
/// entries reference methods actually used, stay within what each method
/// originally paid, and sum to the refund amount.
fn validate_refund_shape(
    sale: &Sale,
    original_payments: &[SalePayment],
    refund: &RefundInput,
    refund_amount_cents: i64,
) -> Result<(Option<PaymentMethod>, Vec<RefundLineInput>), EngineError> {
    match (sale.payment_kind, refund) {
        (PaymentKind::Single, RefundInput::Single { method }) => {
            let original = sale.payment_method.ok_or_else(|| {
                EngineError::InvalidRefundMethod(
                    "original payment method is missing".to_string(),
                )
            })?;

            let allowed = *method == original
                || (*method == PaymentMethod::Cash
                    && matches!(original, PaymentMethod::Card | PaymentMethod::Transfer));
            if !allowed {
                return Err(EngineError::InvalidRefundMethod(format!(
                    "cannot refund via {} a sale paid via {}",
                    method, original
                )));
            }

            Ok((Some(*method), Vec::new()))
        }

        (PaymentKind::Mixed, RefundInput::Mixed { lines }) => {
            if lines.is_empty() {
                return Err(EngineError::InvalidRefundMethod(
                    "mixed refund requires a breakdown".to_string(),
                ));
            }

            let mut paid_by_method: HashMap<PaymentMethod, i64> = HashMap::new();
            for payment in original_payments {
                *paid_by_method.entry(payment.method).or_insert(0) += payment.amount_cents;
            }

            for line in lines {
                if line.amount_cents <= 0 {
                    return Err(EngineError::InvalidRefundMethod(format!(
                        "refund line via {} must be positive",
                        line.method
                    )));
                }
                let Some(paid) = paid_by_method.get(&line.method) else {
                    return Err(EngineError::InvalidRefundMethod(format!(
                        "{} was not part of the original payment",
                        line.method
                    )));
                };
                if line.amount_cents > *paid {
                    return Err(EngineError::InvalidRefundMethod(format!(
                        "refund of {} via {} exceeds the {} originally paid that way",
                        Money::from_cents(line.amount_cents),
                        line.method,
                        Money::from_cents(*paid)
                    )));
                }
            }

            let sum: i64 = lines.iter().map(|line| line.amount_cents).sum();
            if (sum - refund_amount_cents).abs() > PAYMENT_TOLERANCE_CENTS {
                return Err(EngineError::InvalidRefundMethod(format!(
                    "refund breakdown sums to {}, expected {}",
                    Money::from_cents(sum),
                    Money::from_cents(refund_amount_cents)
                )));
            }

            Ok((None, lines.clone()))
        }

        (PaymentKind::Single, RefundInput::Mixed { .. }) => {
            Err(EngineError::InvalidRefundMethod(
                "sale was paid with a single method, a breakdown is not accepted".to_string(),
            ))
        }

        (PaymentKind::Mixed, RefundInput::Single { .. }) => {
            Err(EngineError::InvalidRefundMethod(
                "sale was paid with a mixed breakdown, submit a refund breakdown".to_string(),
            ))
        }
    }
}

// =============================================================================
// Item Matching
// =============================================================================

/// A requested return line matched against its original sale line.
struct ResolvedLine {
    product_id: Option<String>,
    name: String,
    quantity: i64,
    original_unit_price_cents: i64,
    refund_unit_price_cents: i64,
    reason: Option<String>,
    condition: ItemCondition,
}

/// Matches each requested line to an original sale line: by catalog
/// reference when one is supplied, by name otherwise.
///
/// The quantity bound is checked per line against the original line.
fn resolve_returned_items(
    sale_items: &[SaleItem],
    requested: &[ReturnItemInput],
) -> Result<Vec<ResolvedLine>, EngineError> {
    let mut resolved = Vec::with_capacity(requested.len());

    for input in requested {
        let original = match &input.product_id {
            Some(product_id) => sale_items
                .iter()
                .find(|item| item.product_id.as_deref() == Some(product_id.as_str())),
            None => sale_items.iter().find(|item| item.name == input.name),
        }
        .ok_or_else(|| EngineError::ItemNotInSale(input.name.clone()))?;

        if input.quantity > original.quantity {
            return Err(EngineError::QuantityExceedsOriginal {
                name: original.name.clone(),
                requested: input.quantity,
                sold: original.quantity,
            });
        }

        resolved.push(ResolvedLine {
            product_id: original.product_id.clone(),
            name: original.name.clone(),
            quantity: input.quantity,
            original_unit_price_cents: original.unit_price_cents,
            refund_unit_price_cents: input
                .refund_unit_price_cents
                .unwrap_or(original.unit_price_cents),
            reason: input.reason.clone(),
            condition: input.condition,
        });
    }

    Ok(resolved)
}

// =============================================================================
// Tests
// =============================================================================
