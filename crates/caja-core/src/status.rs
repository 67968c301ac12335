//! # Sale Status Rules
//!
//! All status decisions in one place: where a sale starts, which manual
//! moves are legal, and how the returns reconciliation recomputes status
//! from the accumulated refund total.
//!
//! Manual moves are deliberately permissive. Kitchens and couriers skip
//! states in the real world (straight from preparation to delivered, back
//! from dispatched to ready), so the guard only protects the two states the
//! engine owns:
//!
//! - `parcialmente_devuelta` is derived from return totals, never assigned.
//! - `cancelada` is only assignable while the order hasn't left the store.

use crate::error::TransitionError;
use crate::money::Money;
use crate::types::{OperatingMode, SaleStatus};
use crate::PAYMENT_TOLERANCE_CENTS;

// =============================================================================
// Creation
// =============================================================================

/// Status a newly created sale starts in.
///
/// Sell-from-stock tenants exchange goods and money at the counter in one
/// step, so the sale is born settled. Prepare-on-demand tenants enter the
/// kitchen pipeline instead.
pub fn initial_status(mode: OperatingMode) -> SaleStatus {
    match mode {
        OperatingMode::SellFromStock => SaleStatus::EntregadoYCobrado,
        OperatingMode::PrepareOnDemand => SaleStatus::EnPreparacion,
    }
}

// =============================================================================
// Manual Transitions
// =============================================================================

/// Validates a manual status assignment requested by an operator.
pub fn validate_manual_transition(
    current: SaleStatus,
    target: SaleStatus,
) -> Result<(), TransitionError> {
    if target == SaleStatus::ParcialmenteDevuelta {
        return Err(TransitionError::NotManuallyAssignable { target });
    }

    if target == SaleStatus::Cancelada
        && !matches!(
            current,
            SaleStatus::EnPreparacion | SaleStatus::ListoParaEnvio
        )
    {
        return Err(TransitionError::CancelNotAllowed { current });
    }

    Ok(())
}

// =============================================================================
// Return-Driven Transitions
// =============================================================================

/// Status of a sale after its returned total changed.
///
/// A sale refunded in full (within the same cent tolerance payments are
/// accepted with) is cancelled; anything in between is partially returned.
pub fn status_after_return(total: Money, returned: Money) -> SaleStatus {
    if returned.cents() + PAYMENT_TOLERANCE_CENTS >= total.cents() {
        SaleStatus::Cancelada
    } else {
        SaleStatus::ParcialmenteDevuelta
    }
}

/// Status of a sale after a return was rejected and its refund backed out.
///
/// Undoes what [`status_after_return`] did: any remaining refund keeps the
/// sale partially returned; a sale standing cancelled with nothing left
/// returned reverts to settled. Any other status is left unchanged.
pub fn status_after_rejection(current: SaleStatus, remaining_returned: Money) -> SaleStatus {
    if remaining_returned.cents() > 0 {
        SaleStatus::ParcialmenteDevuelta
    } else if current == SaleStatus::Cancelada {
        SaleStatus::EntregadoYCobrado
    } else {
        current
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_by_mode() {
        assert_eq!(
            initial_status(OperatingMode::SellFromStock),
            SaleStatus::EntregadoYCobrado
        );
        assert_eq!(
            initial_status(OperatingMode::PrepareOnDemand),
            SaleStatus::EnPreparacion
        );
    }

    #[test]
    fn test_partially_returned_never_manual() {
        for current in [
            SaleStatus::EnPreparacion,
            SaleStatus::ListoParaEnvio,
            SaleStatus::Enviado,
            SaleStatus::EntregadoYCobrado,
            SaleStatus::ParcialmenteDevuelta,
            SaleStatus::Cancelada,
        ] {
            let result =
                validate_manual_transition(current, SaleStatus::ParcialmenteDevuelta);
            assert!(matches!(
                result,
                Err(TransitionError::NotManuallyAssignable { .. })
            ));
        }
    }

    #[test]
    fn test_cancel_only_before_dispatch() {
        assert!(
            validate_manual_transition(SaleStatus::EnPreparacion, SaleStatus::Cancelada).is_ok()
        );
        assert!(
            validate_manual_transition(SaleStatus::ListoParaEnvio, SaleStatus::Cancelada).is_ok()
        );

        for current in [
            SaleStatus::Enviado,
            SaleStatus::EntregadoYCobrado,
            SaleStatus::ParcialmenteDevuelta,
            SaleStatus::Cancelada,
        ] {
            let result = validate_manual_transition(current, SaleStatus::Cancelada);
            assert!(
                matches!(result, Err(TransitionError::CancelNotAllowed { .. })),
                "cancel from {} should be rejected",
                current
            );
        }
    }

    #[test]
    fn test_forward_moves_are_free() {
        // Operators can move the order through (and back through) the
        // pipeline without restriction.
        assert!(
            validate_manual_transition(SaleStatus::EnPreparacion, SaleStatus::EntregadoYCobrado)
                .is_ok()
        );
        assert!(
            validate_manual_transition(SaleStatus::Enviado, SaleStatus::ListoParaEnvio).is_ok()
        );
        assert!(
            validate_manual_transition(SaleStatus::Cancelada, SaleStatus::EnPreparacion).is_ok()
        );
    }

    #[test]
    fn test_status_after_return_thresholds() {
        let total = Money::from_cents(10_000);

        assert_eq!(
            status_after_return(total, Money::from_cents(4_000)),
            SaleStatus::ParcialmenteDevuelta
        );
        assert_eq!(
            status_after_return(total, Money::from_cents(10_000)),
            SaleStatus::Cancelada
        );
        // Within one cent of the total counts as fully returned.
        assert_eq!(
            status_after_return(total, Money::from_cents(9_999)),
            SaleStatus::Cancelada
        );
        assert_eq!(
            status_after_return(total, Money::from_cents(9_998)),
            SaleStatus::ParcialmenteDevuelta
        );
    }

    #[test]
    fn test_status_after_rejection() {
        // Refund fully backed out of a return-cancelled sale: settled again.
        assert_eq!(
            status_after_rejection(SaleStatus::Cancelada, Money::zero()),
            SaleStatus::EntregadoYCobrado
        );
        // Some refund remains: partially returned regardless of current.
        assert_eq!(
            status_after_rejection(SaleStatus::Cancelada, Money::from_cents(2_000)),
            SaleStatus::ParcialmenteDevuelta
        );
        assert_eq!(
            status_after_rejection(SaleStatus::ParcialmenteDevuelta, Money::from_cents(500)),
            SaleStatus::ParcialmenteDevuelta
        );
        // Nothing remains but the sale is not standing cancelled: unchanged.
        assert_eq!(
            status_after_rejection(SaleStatus::ParcialmenteDevuelta, Money::zero()),
            SaleStatus::ParcialmenteDevuelta
        );
        assert_eq!(
            status_after_rejection(SaleStatus::Enviado, Money::zero()),
            SaleStatus::Enviado
        );
    }
}
