//! # caja-db: Database Layer for Caja POS
//!
//! This crate provides database access for the order lifecycle and returns
//! engine. It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Data Flow                               │
//! │                                                                         │
//! │  caja-engine (SaleLedger / ReturnsReconciler)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (sale, folio, │    │  (embedded)  │  │   │
//! │  │   │               │    │  returns ...) │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ guarded CAS   │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │ updates &     │    │              │  │   │
//! │  │   │ Management    │    │ transactions  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                       SQLite Database (WAL)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (tenant, product, folio,
//!   sale, returns)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/caja.db");
//! let db = Database::new(config).await?;
//!
//! let folio = db.folios().next_folio("tenant-1", FolioKind::Sale).await?;
//! let sale = db.sales().get_by_id("tenant-1", "sale-id").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::folio::FolioRepository;
pub use repository::product::ProductRepository;
pub use repository::returns::{ReturnRepository, SaleTotalsUpdate};
pub use repository::sale::SaleRepository;
pub use repository::tenant::TenantRepository;
