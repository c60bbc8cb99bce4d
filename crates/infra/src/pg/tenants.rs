use async_trait::async_trait;
use sqlx::PgPool;

use saas_catalog::{CatalogError, Tenant, TenantCatalog, TenantStatus};
use saas_core::TenantId;

/// `tenants(tenant_id pk, name, plan, status, created_at)` (§6).
#[derive(Clone)]
pub struct PgTenantCatalog {
    pool: PgPool,
}

impl PgTenantCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantCatalog for PgTenantCatalog {
    async fn create(&self, tenant: Tenant) -> Result<(), CatalogError> {
        let result = sqlx::query(
            "INSERT INTO tenants (tenant_id, name, plan, status, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (tenant_id) DO NOTHING",
        )
        .bind(tenant.tenant_id.as_uuid())
        .bind(&tenant.name)
        .bind(&tenant.plan)
        .bind(status_str(tenant.status))
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::Conflict(format!("tenant {} already exists", tenant.tenant_id)));
        }
        Ok(())
    }

    async fn get(&self, tenant_id: TenantId) -> Result<Option<Tenant>, CatalogError> {
        sqlx::query_as::<_, TenantRow>(
            "SELECT tenant_id, name, plan, status, created_at FROM tenants WHERE tenant_id = $1",
        )
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .map(TenantRow::into_tenant)
        .transpose()
    }

    /// `pending -> active`, idempotent: activating an already-active tenant
    /// leaves the row unchanged (§8, "Monotone activation").
    async fn activate(&self, tenant_id: TenantId) -> Result<(), CatalogError> {
        let result = sqlx::query(
            "UPDATE tenants SET status = 'active' WHERE tenant_id = $1",
        )
        .bind(tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }

    async fn set_plan(&self, tenant_id: TenantId, plan: String) -> Result<(), CatalogError> {
        let result = sqlx::query("UPDATE tenants SET plan = $1 WHERE tenant_id = $2")
            .bind(&plan)
            .bind(tenant_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TenantRow {
    tenant_id: uuid::Uuid,
    name: String,
    plan: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TenantRow {
    fn into_tenant(self) -> Result<Tenant, CatalogError> {
        Ok(Tenant {
            tenant_id: TenantId::from_uuid(self.tenant_id),
            name: self.name,
            plan: self.plan,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
        })
    }
}

fn status_str(status: TenantStatus) -> &'static str {
    match status {
        TenantStatus::Pending => "pending",
        TenantStatus::Active => "active",
    }
}

fn parse_status(raw: &str) -> Result<TenantStatus, CatalogError> {
    match raw {
        "pending" => Ok(TenantStatus::Pending),
        "active" => Ok(TenantStatus::Active),
        other => Err(CatalogError::Storage(format!("unrecognized tenant status '{other}'"))),
    }
}

fn storage_err(err: sqlx::Error) -> CatalogError {
    CatalogError::Storage(err.to_string())
}
