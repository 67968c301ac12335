//! # caja-core: Pure Business Logic for Caja POS
//!
//! This crate is the **heart** of the order lifecycle and returns engine.
//! It contains all business rules as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    caja-engine (orchestration)                  │   │
//! │  │     SaleLedger ── ReturnsReconciler ── InventoryReconciler     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  payment  │  │  status   │  │   │
//! │  │   │   Sale    │  │   Money   │  │  compose  │  │ lifecycle │  │   │
//! │  │   │  Return   │  │  (cents)  │  │   rules   │  │   rules   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    caja-db (Database Layer)                     │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, SaleReturn, Tenant, enums)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`payment`] - Payment composition: single vs mixed tender validation
//! - [`status`] - Sale status lifecycle: manual, return-driven and
//!   rejection-driven transitions
//! - [`validation`] - Field-level input validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Closed Enums**: Statuses, payment methods and item conditions are
//!    enums, never open strings, so the state machine is exhaustively checked

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod payment;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use caja_core::Money` instead of
// `use caja_core::money::Money`

pub use error::{PaymentError, TransitionError, ValidationError};
pub use money::Money;
pub use payment::{PaymentDescriptor, PaymentInput, PaymentLine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tolerance for payment reconciliation, in cents.
///
/// A mixed payment breakdown is accepted when the sum of its lines lands
/// within this distance of the sale total. The same tolerance decides when an
/// accumulated return covers the whole sale.
pub const PAYMENT_TOLERANCE_CENTS: i64 = 1;

/// Maximum line items allowed in a single sale.
///
/// Prevents runaway requests and keeps transaction sizes reasonable. Can be
/// made configurable per-tenant in future versions.
pub const MAX_SALE_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length for item and product names.
pub const MAX_NAME_LENGTH: usize = 200;
