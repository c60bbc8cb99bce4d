//! Infrastructure layer: DB, Redis, config, external services.

pub mod config;
pub mod gateway;
pub mod pg;

#[cfg(feature = "redis")]
pub mod ratelimit_redis;

pub use config::{QueueBackend, RateLimitBackend, Settings, SettingsError};
pub use gateway::{AgentGateway, EchoAgentGateway, GatewayError, HttpAgentGateway};

#[cfg(feature = "redis")]
pub use ratelimit_redis::DistributedRateLimiter;


