//! Plan catalog: named bundles of monthly limits attached to tenants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A billing plan. `plan_id` is a string key (not a UUID) so operators can
/// name plans (`starter`, `growth`, `enterprise`) directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub display_name: String,
    pub monthly_messages: u64,
    pub monthly_token_cap: u64,
    pub max_agents: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(
        plan_id: impl Into<String>,
        display_name: impl Into<String>,
        monthly_messages: u64,
        monthly_token_cap: u64,
        max_agents: u32,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            display_name: display_name.into(),
            monthly_messages,
            monthly_token_cap,
            max_agents,
            active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Storage(String),
}

/// Plan storage contract. A plan is never deleted while referenced by a
/// tenant; this crate only exposes `put` (upsert) and read operations, never
/// a delete, so that invariant cannot be violated through this trait.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn get(&self, plan_id: &str) -> Result<Option<Plan>, CatalogError>;
    async fn list(&self) -> Result<Vec<Plan>, CatalogError>;
    async fn put(&self, plan: Plan) -> Result<(), CatalogError>;
}

/// The three plans that must exist at startup (§3).
pub fn seed_plans() -> Vec<Plan> {
    vec![
        Plan::new("starter", "Starter", 1_000, 2_000_000, 3),
        Plan::new("growth", "Growth", 10_000, 20_000_000, 10),
        Plan::new("enterprise", "Enterprise", 100_000, 200_000_000, 100),
    ]
}
