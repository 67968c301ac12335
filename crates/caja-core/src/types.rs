//! # Domain Types
//!
//! Core domain types for the order lifecycle and returns engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │   │   SaleReturn    │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  folio          │   │  sale_id (FK)   │   │  sku            │       │
//! │  │  status         │   │  refund_amount  │   │  stock          │       │
//! │  │  total_returned │   │  status         │   │  price_cents    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   SaleStatus    │   │ PaymentMethod   │   │ ItemCondition   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  EnPreparacion  │   │  Cash           │   │  New            │       │
//! │  │  ...            │   │  Card           │   │  Damaged        │       │
//! │  │  Cancelada      │   │  Transfer       │   │  Used           │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where humans need one: `folio` (sales, returns), `sku`
//!
//! ## Tenant Scoping
//! Every aggregate carries `tenant_id` and every read/write is filtered by
//! it; no type in this module is meaningful outside a tenant scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Sale Status
// =============================================================================

/// Lifecycle status of a sale.
///
/// The wire and storage representation keeps the Spanish state names used on
/// printed tickets; see the status module for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Order accepted, being prepared (initial state for on-demand tenants).
    EnPreparacion,
    /// Prepared and waiting for dispatch.
    ListoParaEnvio,
    /// Handed to the courier / on its way.
    Enviado,
    /// Delivered and collected (initial state for sell-from-stock tenants).
    EntregadoYCobrado,
    /// One or more returns accumulated, but less than the full total.
    /// Never set manually; computed by the returns reconciliation.
    ParcialmenteDevuelta,
    /// Cancelled, either manually (guarded) or by a full return.
    Cancelada,
}

impl SaleStatus {
    /// Wire/storage name of the status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::EnPreparacion => "en_preparacion",
            SaleStatus::ListoParaEnvio => "listo_para_envio",
            SaleStatus::Enviado => "enviado",
            SaleStatus::EntregadoYCobrado => "entregado_y_cobrado",
            SaleStatus::ParcialmenteDevuelta => "parcialmente_devuelta",
            SaleStatus::Cancelada => "cancelada",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method & Kind
// =============================================================================

/// Tender types accepted at the till.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash.
    Cash,
    /// Card on an external terminal.
    Card,
    /// Bank transfer.
    Transfer,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a sale's payment: one method, or split across several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Single,
    Mixed,
}

// =============================================================================
// Operating Mode
// =============================================================================

/// How a tenant runs its business, as far as this engine cares.
///
/// Modeled as a capability flag rather than a type hierarchy: the engine
/// consults `tracks_stock()` at exactly two points (sale creation and return
/// restocking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Retail/grocery: sold items are inventory units. Stock decrements on
    /// sale and restores on return/cancellation. Sales are final at checkout.
    SellFromStock,
    /// Food-service: items are prepared on demand; stock is never touched by
    /// sales or returns. Orders start in preparation.
    PrepareOnDemand,
}

impl OperatingMode {
    /// Whether sales and returns under this mode mutate product stock.
    #[inline]
    pub const fn tracks_stock(&self) -> bool {
        matches!(self, OperatingMode::SellFromStock)
    }
}

// =============================================================================
// Fulfillment
// =============================================================================

/// How the goods reach the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    /// Handed over at the counter.
    Counter,
    /// Delivered; the only fulfillment type where a delivery assignee is
    /// meaningful.
    Delivery,
}

impl Default for Fulfillment {
    fn default() -> Self {
        Fulfillment::Counter
    }
}

// =============================================================================
// Return Status & Item Condition
// =============================================================================

/// Status of a return record.
///
/// Returns are created as `Processed` (the reconciliation side effects run at
/// creation) and are decided exactly once: `Processed -> Approved` or
/// `Processed -> Rejected`. `Pending` exists for imported legacy records and
/// is never produced by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Processed,
    Approved,
    Rejected,
    Pending,
}

impl ReturnStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Processed => "processed",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical state of a returned unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    New,
    Damaged,
    Used,
}

impl ItemCondition {
    /// Only pristine units go back on the shelf; damaged/used never restock.
    #[inline]
    pub const fn restocks(&self) -> bool {
        matches!(self, ItemCondition::New)
    }
}

impl Default for ItemCondition {
    fn default() -> Self {
        ItemCondition::New
    }
}

// =============================================================================
// Folio Kind
// =============================================================================

/// Document series a folio counter belongs to. Counters are independent and
/// monotonic per (tenant, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FolioKind {
    Sale,
    Return,
}

// =============================================================================
// Stock Adjustment Source
// =============================================================================

/// What caused a stock adjustment; recorded on the discrepancy audit trail
/// when an adjustment fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockSource {
    Sale,
    Return,
    ReturnRejection,
}

// =============================================================================
// Tenant
// =============================================================================

/// An isolated customer account. All business data is scoped by tenant id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub mode: OperatingMode,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
///
/// The engine never reads-then-writes `stock`; it only issues signed deltas
/// through the product repository's atomic adjust operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    /// Current stock level; None for products that are never stock-tracked.
    pub stock: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// One committed sale transaction.
///
/// After creation only `status`, `total_returned_cents`, `updated_at` and
/// `version` ever change, and only through the returns reconciliation or a
/// manual status update. Items and payment rows are immutable snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    /// Store that made the sale. Nullable to keep legacy rows representable;
    /// a sale without a store cannot take returns.
    pub store_id: Option<String>,
    /// Tenant-scoped monotone sequence number, assigned once, immutable.
    pub folio: i64,
    pub status: SaleStatus,
    pub total_cents: i64,
    pub discount_cents: i64,
    /// Accumulated refunds across this sale's returns. Bounded by
    /// `total_cents`; only decreases when a return is rejected.
    pub total_returned_cents: i64,
    pub payment_kind: PaymentKind,
    /// Set when `payment_kind` is Single; mixed sales keep their breakdown in
    /// the payment rows instead.
    pub payment_method: Option<PaymentMethod>,
    pub fulfillment: Fulfillment,
    /// Retained only for delivery sales with a non-blank assignee.
    pub delivery_assignee: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter; every update is a compare-and-swap on
    /// this field.
    pub version: i64,
}

impl Sale {
    /// Returns the sale total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the accumulated returned amount as Money.
    #[inline]
    pub fn total_returned(&self) -> Money {
        Money::from_cents(self.total_returned_cents)
    }

    /// Remaining refundable balance: `total − totalReturned`.
    #[inline]
    pub fn remaining_refundable(&self) -> Money {
        self.total() - self.total_returned()
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze name and price at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// Catalog reference, when the line came from the catalog. Free-form
    /// lines (e.g. an off-menu charge) have none and are matched by name.
    pub product_id: Option<String>,
    /// Name at time of sale (frozen).
    pub name: String,
    /// Quantity sold.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Sale Payment
// =============================================================================

/// One line of a mixed payment breakdown.
/// Single-method sales carry their method on the Sale itself and have none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalePayment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// For cash lines: amount the customer handed over (change is computed
    /// outside this engine).
    pub received_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl SalePayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Sale Return
// =============================================================================

/// One reconciliation event against exactly one sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleReturn {
    pub id: String,
    pub sale_id: String,
    pub tenant_id: String,
    pub store_id: String,
    /// Tenant-scoped credit-note number, independent of the sale series.
    pub folio: i64,
    pub status: ReturnStatus,
    pub refund_amount_cents: i64,
    /// Mirrors the original sale's payment shape.
    pub refund_kind: PaymentKind,
    /// Set when `refund_kind` is Single.
    pub refund_method: Option<PaymentMethod>,
    pub processed_by: String,
    pub created_at: DateTime<Utc>,
    /// When the return was approved or rejected; None while processed.
    pub decided_at: Option<DateTime<Utc>>,
}

impl SaleReturn {
    #[inline]
    pub fn refund_amount(&self) -> Money {
        Money::from_cents(self.refund_amount_cents)
    }
}

// =============================================================================
// Return Item
// =============================================================================

/// A returned line, validated against the original sale line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReturnItem {
    pub id: String,
    pub return_id: String,
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    /// Unit price on the original sale line (frozen for audit).
    pub original_unit_price_cents: i64,
    /// Unit price actually refunded; may be below the original.
    pub refund_unit_price_cents: i64,
    pub reason: Option<String>,
    pub condition: ItemCondition,
    pub created_at: DateTime<Utc>,
}

impl ReturnItem {
    /// Refund value of this line (refund unit price × quantity).
    #[inline]
    pub fn line_refund(&self) -> Money {
        Money::from_cents(self.refund_unit_price_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Refund Line
// =============================================================================

/// One line of a mixed refund breakdown. Each line must reference a method
/// actually used on the original sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RefundLine {
    pub id: String,
    pub return_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl RefundLine {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Stock Discrepancy
// =============================================================================

/// Audit record for a stock adjustment that could not be applied.
///
/// Stock deltas are best-effort beside the sale/return transaction; when one
/// fails the gap is made explicit here instead of only in the log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockDiscrepancy {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub source: StockSource,
    /// Sale or return id the failed delta belonged to.
    pub source_id: String,
    pub delta: i64,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        // Storage CHECK constraints and API consumers rely on these exact
        // snake_case names.
        let json = serde_json::to_string(&SaleStatus::EntregadoYCobrado).unwrap();
        assert_eq!(json, "\"entregado_y_cobrado\"");

        let parsed: SaleStatus = serde_json::from_str("\"parcialmente_devuelta\"").unwrap();
        assert_eq!(parsed, SaleStatus::ParcialmenteDevuelta);

        assert_eq!(SaleStatus::ListoParaEnvio.as_str(), "listo_para_envio");
        assert_eq!(SaleStatus::Cancelada.to_string(), "cancelada");
    }

    #[test]
    fn test_payment_method_wire_names() {
        let json = serde_json::to_string(&PaymentMethod::Transfer).unwrap();
        assert_eq!(json, "\"transfer\"");
        assert_eq!(PaymentMethod::Cash.as_str(), "cash");
    }

    #[test]
    fn test_operating_mode_tracks_stock() {
        assert!(OperatingMode::SellFromStock.tracks_stock());
        assert!(!OperatingMode::PrepareOnDemand.tracks_stock());
    }

    #[test]
    fn test_item_condition_restocks() {
        assert!(ItemCondition::New.restocks());
        assert!(!ItemCondition::Damaged.restocks());
        assert!(!ItemCondition::Used.restocks());
    }

    #[test]
    fn test_sale_money_helpers() {
        let now = Utc::now();
        let sale = Sale {
            id: "s1".to_string(),
            tenant_id: "t1".to_string(),
            store_id: Some("store1".to_string()),
            folio: 7,
            status: SaleStatus::EntregadoYCobrado,
            total_cents: 10_000,
            discount_cents: 0,
            total_returned_cents: 4_000,
            payment_kind: PaymentKind::Single,
            payment_method: Some(PaymentMethod::Cash),
            fulfillment: Fulfillment::Counter,
            delivery_assignee: None,
            created_by: "cashier-1".to_string(),
            created_at: now,
            updated_at: now,
            version: 1,
        };

        assert_eq!(sale.total().cents(), 10_000);
        assert_eq!(sale.total_returned().cents(), 4_000);
        assert_eq!(sale.remaining_refundable().cents(), 6_000);
    }

    #[test]
    fn test_line_totals() {
        let now = Utc::now();
        let item = SaleItem {
            id: "i1".to_string(),
            sale_id: "s1".to_string(),
            product_id: None,
            name: "Tacos al pastor".to_string(),
            quantity: 3,
            unit_price_cents: 2_500,
            created_at: now,
        };
        assert_eq!(item.line_total().cents(), 7_500);

        let returned = ReturnItem {
            id: "r1".to_string(),
            return_id: "ret1".to_string(),
            product_id: None,
            name: "Tacos al pastor".to_string(),
            quantity: 2,
            original_unit_price_cents: 2_500,
            refund_unit_price_cents: 2_000,
            reason: Some("cold".to_string()),
            condition: ItemCondition::Used,
            created_at: now,
        };
        assert_eq!(returned.line_refund().cents(), 4_000);
    }
}
