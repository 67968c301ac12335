//! # Folio Repository
//!
//! Atomic per-tenant document counters.
//!
//! ## Why a Single Upsert
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Folio Assignment Strategy                            │
//! │                                                                         │
//! │  ❌ WRONG: SELECT next_value, then UPDATE                              │
//! │     Two concurrent sales read the same value and both get folio 7.     │
//! │                                                                         │
//! │  ✅ CORRECT: One INSERT ... ON CONFLICT DO UPDATE ... RETURNING        │
//! │     The counter bump and the read happen in one statement; SQLite      │
//! │     serializes writers, so every caller draws a distinct number.       │
//! │                                                                         │
//! │  First call seeds the row (counter starts at 1); later calls bump it.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Counters are independent per `(tenant, kind)`: sales and returns each
//! number from 1 in their own series. The contract is unique + monotonic; a
//! drawn number whose document never commits stays burned.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use caja_core::FolioKind;

/// Repository for folio counter operations.
#[derive(Debug, Clone)]
pub struct FolioRepository {
    pool: SqlitePool,
}

impl FolioRepository {
    /// Creates a new FolioRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FolioRepository { pool }
    }

    /// Draws the next folio for a tenant's document series.
    ///
    /// Strictly monotonic and unique per `(tenant, kind)` under concurrent
    /// callers. The first folio of a fresh series is 1.
    pub async fn next_folio(&self, tenant_id: &str, kind: FolioKind) -> DbResult<i64> {
        // `next_value` holds the value the NEXT call will take, so the row is
        // seeded at 2 and the seed call returns 1.
        let folio: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO folios (tenant_id, kind, next_value)
            VALUES (?1, ?2, 2)
            ON CONFLICT(tenant_id, kind)
            DO UPDATE SET next_value = next_value + 1
            RETURNING next_value - 1
            "#,
        )
        .bind(tenant_id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        debug!(tenant_id = %tenant_id, kind = ?kind, folio = %folio, "Assigned folio");

        Ok(folio)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
