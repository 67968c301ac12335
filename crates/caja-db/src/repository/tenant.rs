//! # Tenant Repository
//!
//! Tenant records and the operating-mode lookup the engine consults before
//! every stock decision.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use caja_core::{OperatingMode, Tenant};

/// Repository for tenant database operations.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    /// Creates a new TenantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Inserts a tenant.
    pub async fn insert(&self, tenant: &Tenant) -> DbResult<()> {
        debug!(id = %tenant.id, mode = ?tenant.mode, "Inserting tenant");

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, mode, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(tenant.mode)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a tenant by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, name, mode, created_at
            FROM tenants
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    /// Looks up a tenant's operating mode.
    ///
    /// Returns `None` when the tenant does not exist; the engine turns that
    /// into its tenant-not-found contract error.
    pub async fn operating_mode(&self, id: &str) -> DbResult<Option<OperatingMode>> {
        let mode = sqlx::query_scalar::<_, OperatingMode>(
            r#"
            SELECT mode
            FROM tenants
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(mode)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
