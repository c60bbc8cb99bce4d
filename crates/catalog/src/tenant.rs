//! Tenant catalog: customer accounts, the unit of isolation and quota.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use saas_core::TenantId;

use crate::plan::CatalogError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Pending,
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub plan: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// A tenant is always created `pending`; only the provisioning worker
    /// transitions it to `active`.
    pub fn new(tenant_id: TenantId, name: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            plan: plan.into(),
            status: TenantStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait TenantCatalog: Send + Sync {
    async fn create(&self, tenant: Tenant) -> Result<(), CatalogError>;
    async fn get(&self, tenant_id: TenantId) -> Result<Option<Tenant>, CatalogError>;
    /// Transitions `status` to `active`. Idempotent: activating an
    /// already-active tenant is a no-op (monotone activation, §8).
    async fn activate(&self, tenant_id: TenantId) -> Result<(), CatalogError>;
    async fn set_plan(&self, tenant_id: TenantId, plan: String) -> Result<(), CatalogError>;
}
