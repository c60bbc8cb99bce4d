//! Agent gateway: the opaque boundary between the admission pipeline and
//! whatever actually runs an agent turn. Concrete agent execution (model
//! routing, tool calling, vendor SDKs) is a non-goal (§1); this module only
//! defines the seam and two illustrative implementations.

use async_trait::async_trait;
use std::time::Duration;

use saas_core::TenantId;

#[derive(Debug, Clone)]
pub struct AgentRunRequest {
    pub tenant_id: TenantId,
    pub agent_id: String,
    pub model: String,
    pub input: String,
}

#[derive(Debug, Clone)]
pub struct AgentRunResponse {
    pub output: String,
    pub latency_ms: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("agent gateway timed out")]
    Timeout,

    #[error("agent gateway call failed: {0}")]
    Upstream(String),
}

/// The seam the admission pipeline calls after quota admits a request and
/// before usage is recorded (§4.3).
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn execute(&self, request: AgentRunRequest) -> Result<AgentRunResponse, GatewayError>;
}

/// Dev/test gateway: echoes the input back with a token estimate. Grounded
/// on the need for §8's scenarios to exercise the full pipeline without a
/// real model backend.
#[derive(Debug, Default, Clone)]
pub struct EchoAgentGateway;

#[async_trait]
impl AgentGateway for EchoAgentGateway {
    async fn execute(&self, request: AgentRunRequest) -> Result<AgentRunResponse, GatewayError> {
        let tokens_in = saas_usage::estimate_tokens(&request.input);
        let output = format!("echo: {}", request.input);
        let tokens_out = saas_usage::estimate_tokens(&output);
        Ok(AgentRunResponse {
            output,
            latency_ms: 1,
            tokens_in,
            tokens_out,
        })
    }
}

/// Thin HTTP-backed gateway: POSTs the run request to a configured endpoint
/// and expects a JSON body shaped like [`AgentRunResponse`]. Grounded on the
/// concept of `original_source/.../adapters/foundry.py` — an opaque HTTP
/// call behind a timeout — adapted to a generic interface rather than a
/// concrete Azure AI Foundry client, since that vendor SDK is out of scope.
#[derive(Clone)]
pub struct HttpAgentGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAgentGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client configuration is valid"),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(serde::Serialize)]
struct WireRequest<'a> {
    tenant_id: String,
    agent_id: &'a str,
    model: &'a str,
    input: &'a str,
}

#[derive(serde::Deserialize)]
struct WireResponse {
    output: String,
    latency_ms: u64,
    tokens_in: u64,
    tokens_out: u64,
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    async fn execute(&self, request: AgentRunRequest) -> Result<AgentRunResponse, GatewayError> {
        let body = WireRequest {
            tenant_id: request.tenant_id.to_string(),
            agent_id: &request.agent_id,
            model: &request.model,
            input: &request.input,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Upstream(e.to_string())
                }
            })?;

        let wire: WireResponse = response
            .error_for_status()
            .map_err(|e| GatewayError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        Ok(AgentRunResponse {
            output: wire.output,
            latency_ms: wire.latency_ms,
            tokens_in: wire.tokens_in,
            tokens_out: wire.tokens_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_gateway_estimates_tokens_from_input_and_output() {
        let gateway = EchoAgentGateway;
        let response = gateway
            .execute(AgentRunRequest {
                tenant_id: TenantId::new(),
                agent_id: "agent-1".to_string(),
                model: "provider-default".to_string(),
                input: "hello".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.output, "echo: hello");
        assert!(response.tokens_in >= 1);
        assert!(response.tokens_out >= 1);
    }
}
