//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── ValidationError  - Field-level input failures                     │
//! │  ├── PaymentError     - Payment composition rejections                 │
//! │  └── TransitionError  - Illegal manual status moves                    │
//! │                                                                         │
//! │  caja-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  caja-engine errors (separate crate)                                   │
//! │  └── EngineError      - Operation contract errors (wraps the above)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (amounts, statuses, field names)
//! 3. Errors are enum variants, never String
//! 4. Everything here is computable without touching storage

use thiserror::Error;

use crate::money::Money;
use crate::types::SaleStatus;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} cannot be negative")]
    Negative { field: String },
}

// =============================================================================
// Payment Error
// =============================================================================

/// Rejections raised while composing a payment descriptor from caller input.
///
/// Each variant identifies the first violated rule; composition never
/// partially applies.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Mixed payment submitted without a breakdown.
    #[error("mixed payment requires at least one breakdown line")]
    MissingBreakdown,

    /// A breakdown line with a zero or negative amount.
    #[error("payment line {index} must have a positive amount")]
    NonPositiveAmount { index: usize },

    /// A cash line where the customer handed over less than the charge.
    #[error("payment line {index}: received {received} is less than charged {amount}")]
    CashReceivedShort {
        index: usize,
        received: Money,
        amount: Money,
    },

    /// Breakdown sum differs from the sale total beyond tolerance.
    #[error("payment breakdown {paid} does not cover sale total {total}")]
    SumMismatch { total: Money, paid: Money },
}

// =============================================================================
// Transition Error
// =============================================================================

/// Rejections raised by the manual status transition guard.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The target status is computed by the returns reconciliation and can
    /// never be assigned by an operator.
    #[error("status '{target}' cannot be assigned manually")]
    NotManuallyAssignable { target: SaleStatus },

    /// Cancellation requested after the order left the store.
    #[error("sale in status '{current}' can no longer be cancelled")]
    CancelNotAllowed { current: SaleStatus },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "tenantId".to_string(),
        };
        assert_eq!(err.to_string(), "tenantId is required");

        let err = ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        };
        assert_eq!(err.to_string(), "name must be at most 200 characters");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 999,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 999");
    }

    #[test]
    fn test_payment_error_messages() {
        let err = PaymentError::MissingBreakdown;
        assert_eq!(
            err.to_string(),
            "mixed payment requires at least one breakdown line"
        );

        let err = PaymentError::CashReceivedShort {
            index: 0,
            received: Money::from_cents(1_000),
            amount: Money::from_cents(1_500),
        };
        assert_eq!(
            err.to_string(),
            "payment line 0: received $10.00 is less than charged $15.00"
        );

        let err = PaymentError::SumMismatch {
            total: Money::from_cents(10_000),
            paid: Money::from_cents(9_000),
        };
        assert_eq!(
            err.to_string(),
            "payment breakdown $90.00 does not cover sale total $100.00"
        );
    }

    #[test]
    fn test_transition_error_messages() {
        let err = TransitionError::NotManuallyAssignable {
            target: SaleStatus::ParcialmenteDevuelta,
        };
        assert_eq!(
            err.to_string(),
            "status 'parcialmente_devuelta' cannot be assigned manually"
        );

        let err = TransitionError::CancelNotAllowed {
            current: SaleStatus::Enviado,
        };
        assert_eq!(
            err.to_string(),
            "sale in status 'enviado' can no longer be cancelled"
        );
    }
}
