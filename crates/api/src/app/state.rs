//! Process-wide application state: the polymorphic storage collaborators
//! (§9 design notes) composed from `Settings`, shared across every handler
//! behind `Arc`.

use std::sync::Arc;

use sqlx::PgPool;

use saas_auth::{AdminAuthService, Hs256JwtValidator, JwksJwtValidator, TenantAuthenticator};
use saas_catalog::{InMemoryPlanCatalog, InMemoryTenantCatalog, PlanCatalog, TenantCatalog};
use saas_infra::gateway::{AgentGateway, EchoAgentGateway};
use saas_infra::pg::{PgPlanCatalog, PgProvisioningQueue, PgTenantCatalog, PgUsageMeter};
use saas_infra::{QueueBackend, RateLimitBackend, Settings};
use saas_provisioning::{LoggingNotifier, NotifyingQueue, ProvisioningQueue};
use saas_ratelimit::{InProcessRateLimiter, RateLimiter};
use saas_usage::{InMemoryUsageMeter, UsageMeter};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub plans: Arc<dyn PlanCatalog>,
    pub tenants: Arc<dyn TenantCatalog>,
    pub queue: Arc<dyn ProvisioningQueue>,
    pub usage: Arc<dyn UsageMeter>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub tenant_auth: Arc<TenantAuthenticator>,
    pub admin_auth: Arc<AdminAuthService>,
    pub gateway: Arc<dyn AgentGateway>,
}

impl AppState {
    /// Builds the full collaborator graph from `Settings` (§9: "prefer a
    /// single immutable configuration value constructed at startup"). A
    /// present, non-empty `database_url` selects the Postgres-backed
    /// collaborators; an empty one falls back to the in-memory
    /// implementations, which is how the dev/test composition root and the
    /// integration tests run without a database.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);

        let (plans, tenants, queue, usage): (
            Arc<dyn PlanCatalog>,
            Arc<dyn TenantCatalog>,
            Arc<dyn ProvisioningQueue>,
            Arc<dyn UsageMeter>,
        ) = if settings.database_url.is_empty() {
            let plans = InMemoryPlanCatalog::with_seed_plans();
            (
                Arc::new(plans),
                Arc::new(InMemoryTenantCatalog::new()),
                Arc::new(saas_provisioning::InMemoryProvisioningQueue::new()),
                Arc::new(InMemoryUsageMeter::new()),
            )
        } else {
            let pool = PgPool::connect(&settings.database_url).await?;
            let plan_catalog = PgPlanCatalog::new(pool.clone());
            plan_catalog.ensure_seed_plans().await?;
            (
                Arc::new(plan_catalog),
                Arc::new(PgTenantCatalog::new(pool.clone())),
                Arc::new(PgProvisioningQueue::new(pool.clone())),
                Arc::new(PgUsageMeter::new(pool)),
            )
        };

        // The advisory transport wrapper sits in front of the durable
        // queue; a `LoggingNotifier` stands in for the Azure-specific
        // Storage Queue / Service Bus transports, which are out of scope
        // (§1, §4.1). `queue_backend` only changes which transport would be
        // composed here in a deployment that wires a real bus.
        let queue: Arc<dyn ProvisioningQueue> = match settings.queue_backend {
            QueueBackend::Database => queue,
            QueueBackend::StorageQueue | QueueBackend::ServiceBus => {
                Arc::new(NotifyingQueue::new(queue, LoggingNotifier))
            }
        };

        let rate_limiter: Arc<dyn RateLimiter> = match settings.rate_limit_backend {
            RateLimitBackend::Memory => Arc::new(InProcessRateLimiter::new(settings.default_rate_limit_rpm)),
            #[cfg(feature = "redis")]
            RateLimitBackend::Redis => Arc::new(saas_infra::DistributedRateLimiter::new(
                &settings.rate_limit_redis_url,
                settings.rate_limit_redis_key_prefix.clone(),
                settings.default_rate_limit_rpm,
                settings.rate_limit_fail_open,
            )?),
            #[cfg(not(feature = "redis"))]
            RateLimitBackend::Redis => Arc::new(InProcessRateLimiter::new(settings.default_rate_limit_rpm)),
        };

        let jwks_validator = if !settings.jwt_jwks_url.is_empty() {
            Some(JwksJwtValidator::new(
                settings.jwt_jwks_url.clone(),
                settings.jwt_issuer.clone(),
                settings.jwt_audience.clone(),
                settings.jwt_jwks_cache_ttl_seconds,
            ))
        } else {
            None
        };
        let shared_secret_validator = if !settings.jwt_shared_secret.is_empty() {
            Some(Hs256JwtValidator::new(settings.jwt_shared_secret.clone().into_bytes()))
        } else {
            None
        };

        let tenant_auth = Arc::new(TenantAuthenticator::new(
            settings.tenant_api_keys.clone(),
            shared_secret_validator,
            jwks_validator,
            settings.is_production(),
        ));

        let admin_jwks = if !settings.jwt_jwks_url.is_empty() {
            Some(JwksJwtValidator::new(
                settings.jwt_jwks_url.clone(),
                settings.jwt_issuer.clone(),
                settings.jwt_audience.clone(),
                settings.jwt_jwks_cache_ttl_seconds,
            ))
        } else {
            None
        };
        let admin_shared_secret = if !settings.jwt_shared_secret.is_empty() {
            Some(Hs256JwtValidator::new(settings.jwt_shared_secret.clone().into_bytes()))
        } else {
            None
        };
        let admin_auth = Arc::new(AdminAuthService::new(admin_jwks, admin_shared_secret));

        Ok(Self {
            settings,
            plans,
            tenants,
            queue,
            usage,
            rate_limiter,
            tenant_auth,
            admin_auth,
            gateway: Arc::new(EchoAgentGateway),
        })
    }
}
