//! Usage event: an append-only per-request billing record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use saas_core::{RequestId, TenantId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub request_id: RequestId,
    pub tenant_id: TenantId,
    pub agent_id: String,
    pub model: String,
    pub latency_ms: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_estimate: f64,
    pub created_at: DateTime<Utc>,
}

/// Coarse token estimator used both to size the quota check and to record
/// `tokens_in`/`tokens_out`: one token per four bytes, at least one token
/// (§4.3). Deliberately independent of any provider's tokenizer.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64 / 4).max(1)
}
