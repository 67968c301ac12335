//! # caja-engine: Order Lifecycle & Returns Reconciliation
//!
//! Orchestration layer of Caja POS: turns caller requests into validated,
//! folio-numbered sales and returns, using the pure rules from `caja-core`
//! and the repositories from `caja-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   ★ caja-engine (THIS CRATE) ★                          │
//! │                                                                         │
//! │   ┌──────────────┐   ┌────────────────────┐   ┌─────────────────────┐  │
//! │   │  SaleLedger  │   │ ReturnsReconciler  │   │ InventoryReconciler │  │
//! │   │  create_sale │   │ create_return      │   │ conditional stock   │  │
//! │   │  status ops  │   │ decide_return      │   │ deltas + auditing   │  │
//! │   └──────┬───────┘   └─────────┬──────────┘   └──────────┬──────────┘  │
//! │          │                     │                         │             │
//! ├──────────┼─────────────────────┼─────────────────────────┼─────────────┤
//! │          ▼                     ▼                         ▼             │
//! │   caja-core (money, payments, status machine, validation)              │
//! │   caja-db   (repositories, folios, guarded updates, migrations)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! Anything that rewrites shared sale state (return processing, rejections,
//! manual status changes) runs as load → validate → compare-and-swap on the
//! sale version, retried up to [`CAS_MAX_RETRIES`] times. Validation always
//! reruns against the freshly loaded sale, so a refund admitted after a
//! retry still respects the balance some concurrent return just consumed.
//!
//! ## Example
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//! use caja_engine::{ReturnsReconciler, SaleLedger};
//!
//! let db = Database::new(DbConfig::new("./caja.db")).await?;
//! let ledger = SaleLedger::new(db.clone());
//! let returns = ReturnsReconciler::new(db);
//!
//! let detail = ledger.create_sale(request).await?;
//! let processed = returns.create_return(return_request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod inventory;
pub mod ledger;
pub mod requests;
pub mod returns;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{EngineError, EngineResult, ErrorKind};
pub use inventory::InventoryReconciler;
pub use ledger::SaleLedger;
pub use requests::{
    CreateReturnRequest, CreateSaleRequest, ProcessedReturn, RefundInput, RefundLineInput,
    ReturnDecision, ReturnDetail, ReturnItemInput, SaleDetail, SaleItemInput,
};
pub use returns::ReturnsReconciler;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Upper bound on retries for operations that serialize on the sale version.
///
/// Every attempt reloads the sale and revalidates before writing; once the
/// bound is hit the operation surfaces a conflict error instead of looping.
pub const CAS_MAX_RETRIES: usize = 5;
