//! # Request & Response DTOs
//!
//! Wire-facing types for the engine operations. Field names follow the
//! camelCase convention of the JSON surface.
//!
//! ## Example: registering a sale
//! ```json
//! {
//!   "tenantId": "tnt-1",
//!   "storeId": "store-centro",
//!   "createdBy": "user-7",
//!   "items": [
//!     { "name": "Hamburguesa", "quantity": 2, "unitPriceCents": 9000 }
//!   ],
//!   "totalCents": 18000,
//!   "payment": {
//!     "kind": "mixed",
//!     "lines": [
//!       { "method": "cash", "amountCents": 10000, "receivedCents": 10000 },
//!       { "method": "card", "amountCents": 8000 }
//!     ]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

use caja_core::{
    Fulfillment, ItemCondition, PaymentInput, PaymentMethod, RefundLine, ReturnItem, Sale,
    SaleItem, SalePayment, SaleReturn,
};

// =============================================================================
// Sale Requests
// =============================================================================

/// Request to register a new sale.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub tenant_id: String,

    /// Store the sale is registered under. Required; legacy rows without
    /// a store exist in storage but new sales never omit it.
    #[serde(default)]
    pub store_id: Option<String>,

    /// User registering the sale.
    pub created_by: String,

    pub items: Vec<SaleItemInput>,

    /// Grand total charged to the customer, in cents.
    pub total_cents: i64,

    /// Discount already reflected in the total, in cents.
    #[serde(default)]
    pub discount_cents: i64,

    pub payment: PaymentInput,

    #[serde(default)]
    pub fulfillment: Fulfillment,

    /// Courier or staff member handling delivery. Only meaningful when
    /// `fulfillment` is delivery; cleared otherwise.
    #[serde(default)]
    pub delivery_assignee: Option<String>,
}

/// One line of a sale request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemInput {
    /// Catalog reference. Optional: open-keyed items carry only a name.
    #[serde(default)]
    pub product_id: Option<String>,

    pub name: String,

    pub quantity: i64,

    pub unit_price_cents: i64,
}

// =============================================================================
// Return Requests
// =============================================================================

/// Request to process a return against an existing sale.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReturnRequest {
    pub tenant_id: String,

    pub sale_id: String,

    /// User processing the return.
    pub processed_by: String,

    pub items: Vec<ReturnItemInput>,

    /// Amount refunded to the customer, in cents.
    pub refund_amount_cents: i64,

    pub refund: RefundInput,
}

/// One returned line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnItemInput {
    /// Catalog reference used to match the original line when present;
    /// otherwise matching falls back to the item name.
    #[serde(default)]
    pub product_id: Option<String>,

    pub name: String,

    pub quantity: i64,

    /// Unit price refunded for this line. Defaults to the unit price of
    /// the matched original line.
    #[serde(default)]
    pub refund_unit_price_cents: Option<i64>,

    #[serde(default)]
    pub reason: Option<String>,

    /// Physical condition of the returned merchandise. Only items coming
    /// back as new re-enter stock.
    #[serde(default)]
    pub condition: ItemCondition,
}

/// How the refund is handed back to the customer.
///
/// Mirrors the payment shape of the original sale: single-method sales
/// take a single refund method, mixed sales take a breakdown.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefundInput {
    Single { method: PaymentMethod },
    Mixed { lines: Vec<RefundLineInput> },
}

/// One entry of a mixed refund breakdown.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLineInput {
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

/// Decision on a processed return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnDecision {
    Approved,
    Rejected,
}

// =============================================================================
// Responses
// =============================================================================

/// A sale with its lines and payment breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,

    /// Populated for mixed payments; single-method sales keep the method
    /// on the sale itself and carry no breakdown rows.
    pub payments: Vec<SalePayment>,
}

/// Outcome of processing a return.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedReturn {
    #[serde(rename = "return")]
    pub sale_return: SaleReturn,

    pub items: Vec<ReturnItem>,

    /// The sale after the return was applied to its totals and status.
    pub sale_updated: Sale,
}

/// A return with its lines and refund breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDetail {
    #[serde(rename = "return")]
    pub sale_return: SaleReturn,

    pub items: Vec<ReturnItem>,

    /// Populated for mixed refunds.
    pub refund_lines: Vec<RefundLine>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sale_request_from_json() {
        let json = r#"{
            "tenantId": "tnt-1",
            "storeId": "store-centro",
            "createdBy": "user-7",
            "items": [
                { "name": "Hamburguesa", "quantity": 2, "unitPriceCents": 9000 }
            ],
            "totalCents": 18000,
            "payment": {
                "kind": "mixed",
                "lines": [
                    { "method": "cash", "amountCents": 10000, "receivedCents": 10000 },
                    { "method": "card", "amountCents": 8000 }
                ]
            }
        }"#;

        let request: CreateSaleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.tenant_id, "tnt-1");
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].product_id, None);
        assert_eq!(request.discount_cents, 0);
        assert_eq!(request.fulfillment, Fulfillment::Counter);
        assert!(matches!(request.payment, PaymentInput::Mixed { .. }));
    }

    #[test]
    fn test_return_item_input_defaults() {
        let json = r#"{ "name": "Refresco", "quantity": 1 }"#;

        let input: ReturnItemInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.product_id, None);
        assert_eq!(input.refund_unit_price_cents, None);
        assert_eq!(input.reason, None);
        assert_eq!(input.condition, ItemCondition::New);
    }

    #[test]
    fn test_refund_input_tagged_by_kind() {
        let single: RefundInput =
            serde_json::from_str(r#"{ "kind": "single", "method": "cash" }"#).unwrap();
        assert!(matches!(
            single,
            RefundInput::Single {
                method: PaymentMethod::Cash
            }
        ));

        let mixed: RefundInput = serde_json::from_str(
            r#"{ "kind": "mixed", "lines": [ { "method": "card", "amountCents": 500 } ] }"#,
        )
        .unwrap();
        assert!(matches!(mixed, RefundInput::Mixed { lines } if lines.len() == 1));
    }

    #[test]
    fn test_return_decision_wire_names() {
        let approved: ReturnDecision = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(approved, ReturnDecision::Approved);

        let rejected: ReturnDecision = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(rejected, ReturnDecision::Rejected);
    }
}
