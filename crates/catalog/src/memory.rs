//! In-memory catalogs: used by tests and by the dev composition root.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use saas_core::TenantId;

use crate::plan::{CatalogError, Plan, PlanCatalog};
use crate::tenant::{Tenant, TenantCatalog, TenantStatus};

#[derive(Default)]
pub struct InMemoryPlanCatalog {
    plans: RwLock<HashMap<String, Plan>>,
}

impl InMemoryPlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed_plans() -> Self {
        let catalog = Self::new();
        for plan in crate::plan::seed_plans() {
            catalog.plans.write().expect("plan catalog poisoned").insert(plan.plan_id.clone(), plan);
        }
        catalog
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn get(&self, plan_id: &str) -> Result<Option<Plan>, CatalogError> {
        Ok(self.plans.read().expect("plan catalog poisoned").get(plan_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Plan>, CatalogError> {
        let mut plans: Vec<Plan> = self.plans.read().expect("plan catalog poisoned").values().cloned().collect();
        plans.sort_by(|a, b| a.plan_id.cmp(&b.plan_id));
        Ok(plans)
    }

    async fn put(&self, plan: Plan) -> Result<(), CatalogError> {
        self.plans.write().expect("plan catalog poisoned").insert(plan.plan_id.clone(), plan);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTenantCatalog {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantCatalog for InMemoryTenantCatalog {
    async fn create(&self, tenant: Tenant) -> Result<(), CatalogError> {
        let mut tenants = self.tenants.write().expect("tenant catalog poisoned");
        if tenants.contains_key(&tenant.tenant_id) {
            return Err(CatalogError::Conflict(format!("tenant {} already exists", tenant.tenant_id)));
        }
        tenants.insert(tenant.tenant_id, tenant);
        Ok(())
    }

    async fn get(&self, tenant_id: TenantId) -> Result<Option<Tenant>, CatalogError> {
        Ok(self.tenants.read().expect("tenant catalog poisoned").get(&tenant_id).cloned())
    }

    async fn activate(&self, tenant_id: TenantId) -> Result<(), CatalogError> {
        let mut tenants = self.tenants.write().expect("tenant catalog poisoned");
        match tenants.get_mut(&tenant_id) {
            Some(tenant) => {
                tenant.status = TenantStatus::Active;
                Ok(())
            }
            None => Err(CatalogError::NotFound),
        }
    }

    async fn set_plan(&self, tenant_id: TenantId, plan: String) -> Result<(), CatalogError> {
        let mut tenants = self.tenants.write().expect("tenant catalog poisoned");
        match tenants.get_mut(&tenant_id) {
            Some(tenant) => {
                tenant.plan = plan;
                Ok(())
            }
            None => Err(CatalogError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activation_is_idempotent() {
        let catalog = InMemoryTenantCatalog::new();
        let tenant_id = TenantId::new();
        catalog.create(Tenant::new(tenant_id, "Acme", "starter")).await.unwrap();
        catalog.activate(tenant_id).await.unwrap();
        catalog.activate(tenant_id).await.unwrap();
        let tenant = catalog.get(tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.status, TenantStatus::Active);
    }

    #[tokio::test]
    async fn seed_plans_are_active() {
        let catalog = InMemoryPlanCatalog::with_seed_plans();
        let plans = catalog.list().await.unwrap();
        assert_eq!(plans.len(), 3);
        assert!(plans.iter().all(|p| p.active));
    }
}
