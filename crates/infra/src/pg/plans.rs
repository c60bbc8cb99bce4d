use async_trait::async_trait;
use sqlx::PgPool;

use saas_catalog::{CatalogError, Plan, PlanCatalog};

/// `plans(plan_id pk, display_name, monthly_messages, monthly_token_cap,
/// max_agents, active, created_at)` (§6).
#[derive(Clone)]
pub struct PgPlanCatalog {
    pool: PgPool,
}

impl PgPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seeds `starter`/`growth`/`enterprise` at startup if they're absent
    /// (§3). Existing rows are left untouched.
    pub async fn ensure_seed_plans(&self) -> Result<(), CatalogError> {
        for plan in saas_catalog::seed_plans() {
            if self.get(&plan.plan_id).await?.is_none() {
                self.put(plan).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlanCatalog for PgPlanCatalog {
    async fn get(&self, plan_id: &str) -> Result<Option<Plan>, CatalogError> {
        sqlx::query_as::<_, PlanRow>(
            "SELECT plan_id, display_name, monthly_messages, monthly_token_cap, max_agents, active, created_at
             FROM plans WHERE plan_id = $1",
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(PlanRow::into_plan))
        .map_err(storage_err)
    }

    async fn list(&self) -> Result<Vec<Plan>, CatalogError> {
        sqlx::query_as::<_, PlanRow>(
            "SELECT plan_id, display_name, monthly_messages, monthly_token_cap, max_agents, active, created_at
             FROM plans ORDER BY plan_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(PlanRow::into_plan).collect())
        .map_err(storage_err)
    }

    async fn put(&self, plan: Plan) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO plans (plan_id, display_name, monthly_messages, monthly_token_cap, max_agents, active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (plan_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                monthly_messages = EXCLUDED.monthly_messages,
                monthly_token_cap = EXCLUDED.monthly_token_cap,
                max_agents = EXCLUDED.max_agents,
                active = EXCLUDED.active",
        )
        .bind(&plan.plan_id)
        .bind(&plan.display_name)
        .bind(plan.monthly_messages as i64)
        .bind(plan.monthly_token_cap as i64)
        .bind(plan.max_agents as i32)
        .bind(plan.active)
        .bind(plan.created_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(storage_err)
    }
}

#[derive(sqlx::FromRow)]
struct PlanRow {
    plan_id: String,
    display_name: String,
    monthly_messages: i64,
    monthly_token_cap: i64,
    max_agents: i32,
    active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl PlanRow {
    fn into_plan(self) -> Plan {
        Plan {
            plan_id: self.plan_id,
            display_name: self.display_name,
            monthly_messages: self.monthly_messages as u64,
            monthly_token_cap: self.monthly_token_cap as u64,
            max_agents: self.max_agents as u32,
            active: self.active,
            created_at: self.created_at,
        }
    }
}

fn storage_err(err: sqlx::Error) -> CatalogError {
    CatalogError::Storage(err.to_string())
}
