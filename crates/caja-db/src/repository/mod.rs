//! # Repository Module
//!
//! Database repository implementations for Caja POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Engine operation (create_return)                                      │
//! │       │                                                                 │
//! │       │  db.sales().get_by_id(tenant_id, sale_id)                      │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── get_by_id(&self, tenant_id, id)                                   │
//! │  ├── insert_sale(&self, sale, items, payments)                         │
//! │  └── update_status_guarded(&self, ...)                                 │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every method takes the tenant scope explicitly: there is no way to    │
//! │  read or write a row without naming its tenant.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`tenant::TenantRepository`] - Tenant records and operating-mode lookup
//! - [`product::ProductRepository`] - Catalog rows, atomic stock deltas,
//!   discrepancy audit
//! - [`folio::FolioRepository`] - Atomic per-tenant document counters
//! - [`sale::SaleRepository`] - Sale aggregates and guarded status updates
//! - [`returns::ReturnRepository`] - Return aggregates and the transactional
//!   return-plus-sale-totals writes

pub mod folio;
pub mod product;
pub mod returns;
pub mod sale;
pub mod tenant;
