//! # Engine Error Type
//!
//! Unified error type for the orchestration operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Error Flow in Caja POS                             │
//! │                                                                         │
//! │  Caller                       Engine                                    │
//! │  ──────                       ──────                                    │
//! │                                                                         │
//! │  create_sale(request)                                                   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Engine Operation                                                │  │
//! │  │  Result<T, EngineError>                                          │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Rule broken?  ── PaymentError / TransitionError ──┐             │  │
//! │  │         │                                          │             │  │
//! │  │         ▼                                          ▼             │  │
//! │  │  Storage failed? ── DbError ─────────────────── EngineError ────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ───────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error maps to an [`ErrorKind`] so callers can distinguish
//! rejected input from missing records, broken business rules, lost
//! concurrency races and storage failures without string matching.

use serde::Serialize;
use thiserror::Error;

use caja_core::{Money, PaymentError, TransitionError, ValidationError};
use caja_db::DbError;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced by the sale ledger and returns reconciler.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No tenant registered under the given id.
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// Sale registration requires a store context.
    #[error("A store is required to register a sale")]
    StoreRequired,

    /// Payment composition rejected the submitted payment.
    #[error("Invalid payment: {0}")]
    InvalidPayment(#[from] PaymentError),

    /// No sale visible under the given tenant and id.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// The requested status change is not allowed.
    #[error("Illegal status transition: {0}")]
    IllegalTransition(#[from] TransitionError),

    /// Refund method incompatible with how the sale was paid.
    #[error("Invalid refund method: {0}")]
    InvalidRefundMethod(String),

    /// Refund would take the sale past its refundable balance.
    #[error("Refund of {requested} exceeds the remaining refundable balance of {remaining}")]
    RefundExceedsBalance { requested: Money, remaining: Money },

    /// Returned item does not match any original sale line.
    #[error("Item not part of the original sale: {0}")]
    ItemNotInSale(String),

    /// Returned quantity is larger than the quantity sold.
    #[error("Cannot return {requested} x '{name}': only {sold} sold")]
    QuantityExceedsOriginal {
        name: String,
        requested: i64,
        sold: i64,
    },

    /// Refund amount is larger than the value of the returned items.
    #[error("Refund of {refund} exceeds the returned item value of {item_value}")]
    RefundExceedsItemValue { refund: Money, item_value: Money },

    /// No return visible under the given tenant and id.
    #[error("Return not found: {0}")]
    ReturnNotFound(String),

    /// The return already received an approve/reject decision.
    #[error("Return already decided: {0}")]
    AlreadyDecided(String),

    /// Field-level input validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Concurrent writers kept invalidating the operation.
    #[error("Operation on {0} conflicted with concurrent updates, retry")]
    Conflict(String),

    /// Storage layer failure.
    #[error(transparent)]
    Db(DbError),
}

/// Machine-readable error taxonomy.
///
/// Serialized for API surfaces that need a stable code next to the
/// human-readable message:
/// ```json
/// { "kind": "BUSINESS_RULE", "message": "Refund of $60.00 exceeds ..." }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Input was malformed or broke a field-level constraint (400)
    Validation,

    /// Referenced record does not exist under the tenant (404)
    NotFound,

    /// Input was well-formed but a business rule forbids it (422)
    BusinessRule,

    /// Lost a concurrency race after exhausting retries (409)
    Conflict,

    /// Storage failure (500)
    Storage,
}

impl EngineError {
    /// Classifies the error for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::StoreRequired
            | EngineError::InvalidPayment(_)
            | EngineError::InvalidRefundMethod(_)
            | EngineError::ItemNotInSale(_)
            | EngineError::QuantityExceedsOriginal { .. }
            | EngineError::Validation(_) => ErrorKind::Validation,

            EngineError::TenantNotFound(_)
            | EngineError::SaleNotFound(_)
            | EngineError::ReturnNotFound(_) => ErrorKind::NotFound,

            EngineError::IllegalTransition(_)
            | EngineError::RefundExceedsBalance { .. }
            | EngineError::RefundExceedsItemValue { .. }
            | EngineError::AlreadyDecided(_) => ErrorKind::BusinessRule,

            EngineError::Conflict(_) => ErrorKind::Conflict,

            EngineError::Db(err) => match err {
                DbError::NotFound { .. } => ErrorKind::NotFound,
                DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                    ErrorKind::Validation
                }
                _ => ErrorKind::Storage,
            },
        }
    }
}

/// Converts database errors, routing version conflicts to their own variant.
///
/// Guarded updates report a lost compare-and-swap as [`DbError::Conflict`];
/// the engine retries those internally, so one escaping here means retries
/// were exhausted.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { id, .. } => EngineError::Conflict(id),
            other => EngineError::Db(other),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
