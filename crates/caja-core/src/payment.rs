//! # Payment Composition
//!
//! Turns caller-supplied payment input into a validated, storage-ready
//! descriptor. All the money rules for accepting a payment live here:
//!
//! - Single payments name one method and are covered by the sale total.
//! - Mixed payments carry a breakdown whose lines must be positive, whose
//!   cash lines must be fully received, and whose sum must match the sale
//!   total within [`PAYMENT_TOLERANCE_CENTS`](crate::PAYMENT_TOLERANCE_CENTS)
//!   to absorb rounding at the till.

use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::money::Money;
use crate::types::{PaymentKind, PaymentMethod};
use crate::PAYMENT_TOLERANCE_CENTS;

// =============================================================================
// Payment Input
// =============================================================================

/// Payment as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentInput {
    /// Whole total on one tender.
    Single { method: PaymentMethod },
    /// Split across several tenders.
    Mixed { lines: Vec<PaymentLine> },
}

/// One line of a mixed breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLine {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Cash handed over, when the cashier recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_cents: Option<i64>,
}

impl PaymentLine {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Payment Descriptor
// =============================================================================

/// Validated payment, normalized for persistence.
///
/// Single payments store their method inline and carry no lines; mixed
/// payments carry the full breakdown and no inline method.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDescriptor {
    pub kind: PaymentKind,
    pub method: Option<PaymentMethod>,
    pub lines: Vec<PaymentLine>,
}

// =============================================================================
// Composition
// =============================================================================

/// Validates payment input against the sale total and produces the
/// normalized descriptor.
pub fn compose(total: Money, input: &PaymentInput) -> Result<PaymentDescriptor, PaymentError> {
    match input {
        PaymentInput::Single { method } => Ok(PaymentDescriptor {
            kind: PaymentKind::Single,
            method: Some(*method),
            lines: Vec::new(),
        }),
        PaymentInput::Mixed { lines } => {
            if lines.is_empty() {
                return Err(PaymentError::MissingBreakdown);
            }

            let mut paid_cents: i64 = 0;
            for (index, line) in lines.iter().enumerate() {
                if line.amount_cents <= 0 {
                    return Err(PaymentError::NonPositiveAmount { index });
                }
                // Received amount only applies to cash and only when the
                // cashier recorded one.
                if line.method == PaymentMethod::Cash {
                    if let Some(received) = line.received_cents {
                        if received < line.amount_cents {
                            return Err(PaymentError::CashReceivedShort {
                                index,
                                received: Money::from_cents(received),
                                amount: line.amount(),
                            });
                        }
                    }
                }
                paid_cents += line.amount_cents;
            }

            if (paid_cents - total.cents()).abs() > PAYMENT_TOLERANCE_CENTS {
                return Err(PaymentError::SumMismatch {
                    total,
                    paid: Money::from_cents(paid_cents),
                });
            }

            Ok(PaymentDescriptor {
                kind: PaymentKind::Mixed,
                method: None,
                lines: lines.clone(),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
