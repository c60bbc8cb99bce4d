//! Process-wide `Settings`: a single immutable value built once at startup
//! from environment variables, enumerating exactly the options in spec §6.
//! Grounded on `saas_platform/config.py`'s `Settings` dataclass and
//! `get_settings()` loader in the original implementation, translated to
//! `std::env::var` reads with typed defaults.

use std::collections::HashMap;

use saas_core::TenantId;

/// `database | storage_queue | service_bus` — which `ProvisioningQueue`
/// transport backs the durable job queue (§4.1, §6). Only `database` has a
/// concrete implementation in this workspace; the others are modeled as an
/// advisory `QueueNotifier` composed in front of the same durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Database,
    StorageQueue,
    ServiceBus,
}

/// `memory | redis` — which `RateLimiter` backs the admission pipeline's
/// rate-limit stage (§4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: String,
    pub database_url: String,

    pub queue_backend: QueueBackend,
    pub provisioning_worker_poll_seconds: u64,
    pub provisioning_job_max_attempts: u32,
    pub provisioning_retry_base_seconds: i64,

    pub azure_use_managed_identity: bool,
    pub allow_api_key_fallback: bool,

    pub tenant_api_keys: HashMap<TenantId, String>,

    pub rate_limit_backend: RateLimitBackend,
    pub rate_limit_redis_url: String,
    pub rate_limit_redis_key_prefix: String,
    pub rate_limit_fail_open: bool,
    pub default_rate_limit_rpm: u32,

    pub jwt_jwks_url: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_jwks_cache_ttl_seconds: i64,
    pub jwt_shared_secret: String,
    pub jwt_algorithm: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Eager startup rejection (§4.8, §7, §9): a misconfiguration that would
    /// otherwise only surface on the first request.
    #[error("refusing to start in production: {0}")]
    UnsafeForProduction(&'static str),
}

impl Settings {
    pub fn is_production(&self) -> bool {
        matches!(self.app_env.trim().to_lowercase().as_str(), "prod" | "production")
    }

    /// Loads settings from the process environment and validates the
    /// production-safety invariants eagerly, per §4.8: production with no
    /// auth configured, or production with `ALLOW_API_KEY_FALLBACK=true`,
    /// fails fast here rather than on the first request.
    pub fn from_env() -> Result<Self, SettingsError> {
        let settings = Self {
            app_env: env_string("APP_ENV", "dev"),
            database_url: env_string("DATABASE_URL", ""),

            queue_backend: parse_queue_backend(&env_string("PROVISIONING_QUEUE_BACKEND", "database"))?,
            provisioning_worker_poll_seconds: env_u64("PROVISIONING_WORKER_POLL_SECONDS", 2)?,
            provisioning_job_max_attempts: env_u32("PROVISIONING_JOB_MAX_ATTEMPTS", 3)?,
            provisioning_retry_base_seconds: env_i64("PROVISIONING_RETRY_BASE_SECONDS", 5)?,

            azure_use_managed_identity: env_bool("AZURE_USE_MANAGED_IDENTITY", true),
            allow_api_key_fallback: env_bool("ALLOW_API_KEY_FALLBACK", false),

            tenant_api_keys: parse_tenant_api_keys(&env_string("TENANT_API_KEYS_JSON", ""))?,

            rate_limit_backend: parse_rate_limit_backend(&env_string("RATE_LIMIT_BACKEND", "memory"))?,
            rate_limit_redis_url: env_string("RATE_LIMIT_REDIS_URL", ""),
            rate_limit_redis_key_prefix: env_string("RATE_LIMIT_REDIS_KEY_PREFIX", "saas:ratelimit"),
            rate_limit_fail_open: env_bool("FAIL_OPEN", true),
            default_rate_limit_rpm: env_u32("DEFAULT_RATE_LIMIT_RPM", 60)?,

            jwt_jwks_url: env_string("JWT_JWKS_URL", ""),
            jwt_issuer: env_string("JWT_ISSUER", ""),
            jwt_audience: env_string("JWT_AUDIENCE", ""),
            jwt_jwks_cache_ttl_seconds: env_i64("JWT_JWKS_CACHE_TTL_SECONDS", 300)?,
            jwt_shared_secret: env_string("JWT_SHARED_SECRET", ""),
            jwt_algorithm: env_string("JWT_ALGORITHM", "HS256"),
        };

        settings.validate_for_startup()?;
        Ok(settings)
    }

    fn auth_configured(&self) -> bool {
        !self.tenant_api_keys.is_empty()
            || !self.jwt_shared_secret.is_empty()
            || (!self.jwt_jwks_url.is_empty() && !self.jwt_issuer.is_empty() && !self.jwt_audience.is_empty())
    }

    fn validate_for_startup(&self) -> Result<(), SettingsError> {
        if self.is_production() {
            if !self.auth_configured() {
                return Err(SettingsError::UnsafeForProduction(
                    "no tenant authentication configured (static keys, JWKS, or shared secret)",
                ));
            }
            if self.allow_api_key_fallback {
                return Err(SettingsError::UnsafeForProduction(
                    "ALLOW_API_KEY_FALLBACK must be false in production",
                ));
            }
        }
        Ok(())
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"),
        Err(_) => default,
    }
}

fn env_u32(key: &str, default: u32) -> Result<u32, SettingsError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| SettingsError::Invalid { field: leak(key), reason: raw }),
        Err(_) => Ok(default),
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, SettingsError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| SettingsError::Invalid { field: leak(key), reason: raw }),
        Err(_) => Ok(default),
    }
}

fn env_i64(key: &str, default: i64) -> Result<i64, SettingsError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| SettingsError::Invalid { field: leak(key), reason: raw }),
        Err(_) => Ok(default),
    }
}

fn leak(key: &str) -> &'static str {
    Box::leak(key.to_string().into_boxed_str())
}

fn parse_queue_backend(raw: &str) -> Result<QueueBackend, SettingsError> {
    match raw {
        "database" => Ok(QueueBackend::Database),
        "storage_queue" => Ok(QueueBackend::StorageQueue),
        "service_bus" => Ok(QueueBackend::ServiceBus),
        other => Err(SettingsError::Invalid {
            field: "PROVISIONING_QUEUE_BACKEND",
            reason: other.to_string(),
        }),
    }
}

fn parse_rate_limit_backend(raw: &str) -> Result<RateLimitBackend, SettingsError> {
    match raw {
        "memory" => Ok(RateLimitBackend::Memory),
        "redis" => Ok(RateLimitBackend::Redis),
        other => Err(SettingsError::Invalid {
            field: "RATE_LIMIT_BACKEND",
            reason: other.to_string(),
        }),
    }
}

/// Accepts a JSON object mapping tenant UUID -> API key (§6).
fn parse_tenant_api_keys(raw: &str) -> Result<HashMap<TenantId, String>, SettingsError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(HashMap::new());
    }

    let parsed: serde_json::Value = serde_json::from_str(text).map_err(|e| SettingsError::Invalid {
        field: "TENANT_API_KEYS_JSON",
        reason: e.to_string(),
    })?;

    let object = parsed.as_object().ok_or_else(|| SettingsError::Invalid {
        field: "TENANT_API_KEYS_JSON",
        reason: "must be a JSON object".to_string(),
    })?;

    let mut out = HashMap::new();
    for (key, value) in object {
        let tenant_id: TenantId = key.parse().map_err(|_| SettingsError::Invalid {
            field: "TENANT_API_KEYS_JSON",
            reason: format!("'{key}' is not a valid tenant id"),
        })?;
        if let Some(value) = value.as_str() {
            if !value.is_empty() {
                out.insert(tenant_id, value.to_string());
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tenant_api_keys_json() {
        let tenant_id = TenantId::new();
        let raw = format!(r#"{{"{tenant_id}": "secret"}}"#);
        let parsed = parse_tenant_api_keys(&raw).unwrap();
        assert_eq!(parsed.get(&tenant_id).map(String::as_str), Some("secret"));
    }

    #[test]
    fn empty_string_yields_empty_map() {
        assert!(parse_tenant_api_keys("").unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_queue_backend() {
        assert!(parse_queue_backend("carrier-pigeon").is_err());
    }
}
