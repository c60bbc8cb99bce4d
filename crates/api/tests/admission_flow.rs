//! Black-box HTTP tests over the admission pipeline (§8, scenarios 1-4, 7),
//! grounded on the `TestServer::spawn` pattern: bind an ephemeral port, serve
//! the real router on its own task, and drive it with `reqwest`.

use std::collections::HashMap;

use saas_core::TenantId;
use saas_infra::{QueueBackend, RateLimitBackend, Settings};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(settings: Settings) -> Self {
        let state = saas_api::app::state::AppState::build(settings).await.expect("state builds");
        let app = saas_api::app::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server exited");
        });

        Self { base_url: format!("http://{addr}"), handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn base_settings() -> Settings {
    Settings {
        app_env: "dev".to_string(),
        database_url: String::new(),
        queue_backend: QueueBackend::Database,
        provisioning_worker_poll_seconds: 1,
        provisioning_job_max_attempts: 3,
        provisioning_retry_base_seconds: 1,
        azure_use_managed_identity: false,
        allow_api_key_fallback: false,
        tenant_api_keys: HashMap::new(),
        rate_limit_backend: RateLimitBackend::Memory,
        rate_limit_redis_url: String::new(),
        rate_limit_redis_key_prefix: "saas:ratelimit".to_string(),
        rate_limit_fail_open: true,
        default_rate_limit_rpm: 60,
        jwt_jwks_url: String::new(),
        jwt_issuer: String::new(),
        jwt_audience: String::new(),
        jwt_jwks_cache_ttl_seconds: 300,
        jwt_shared_secret: String::new(),
        jwt_algorithm: "HS256".to_string(),
    }
}

async fn create_tenant(client: &reqwest::Client, server: &TestServer, plan: &str) -> serde_json::Value {
    client
        .post(server.url("/v1/tenants"))
        .json(&serde_json::json!({ "name": "Acme", "plan": plan }))
        .send()
        .await
        .expect("create tenant request")
        .json()
        .await
        .expect("create tenant body")
}

async fn run_next(client: &reqwest::Client, server: &TestServer) -> bool {
    client
        .post(server.url("/v1/provisioning/jobs/run-next"))
        .send()
        .await
        .expect("run-next request")
        .json::<serde_json::Value>()
        .await
        .expect("run-next body")["processed"]
        .as_bool()
        .unwrap()
}

#[tokio::test]
async fn happy_path_create_then_activate() {
    let server = TestServer::spawn(base_settings()).await;
    let client = reqwest::Client::new();

    let created = create_tenant(&client, &server, "starter").await;
    assert_eq!(created["status"], "pending");

    let tenant_id = created["tenant_id"].as_str().unwrap();
    let get_response = client.get(server.url(&format!("/v1/tenants/{tenant_id}"))).send().await.unwrap();
    assert_eq!(get_response.status(), 200);
    let body: serde_json::Value = get_response.json().await.unwrap();
    assert_eq!(body["status"], "pending");

    // Scenario 7 (abridged): the bootstrap job exists exactly once.
    assert!(run_next(&client, &server).await);
    assert!(!run_next(&client, &server).await);

    let body: serde_json::Value = client
        .get(server.url(&format!("/v1/tenants/{tenant_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn unauthorized_run_without_any_matching_credential() {
    let tenant_id = TenantId::new();
    let mut keys = HashMap::new();
    keys.insert(tenant_id, "k".to_string());
    let mut settings = base_settings();
    settings.tenant_api_keys = keys;

    let server = TestServer::spawn(settings).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url(&format!("/v1/tenants/{tenant_id}/runs")))
        .header("x-tenant-id", tenant_id.to_string())
        .header("x-customer-user-id", "user-1")
        .header("x-api-key", "")
        .json(&serde_json::json!({ "agent_id": "a1", "user_id": "user-1", "message": "hi" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn rate_limit_trips_after_the_configured_budget() {
    let mut settings = base_settings();
    settings.default_rate_limit_rpm = 2;
    let server = TestServer::spawn(settings).await;
    let client = reqwest::Client::new();

    let created = create_tenant(&client, &server, "starter").await;
    let tenant_id = created["tenant_id"].as_str().unwrap().to_string();
    assert!(run_next(&client, &server).await);

    let send_run = |message: &str| {
        let client = client.clone();
        let url = server.url(&format!("/v1/tenants/{tenant_id}/runs"));
        let tenant_id = tenant_id.clone();
        let message = message.to_string();
        async move {
            client
                .post(url)
                .header("x-tenant-id", &tenant_id)
                .header("x-customer-user-id", "user-1")
                .json(&serde_json::json!({ "agent_id": "a1", "user_id": "user-1", "message": message }))
                .send()
                .await
                .unwrap()
        }
    };

    assert_eq!(send_run("hi").await.status(), 200);
    assert_eq!(send_run("hi").await.status(), 200);
    let third = send_run("hi").await;
    assert_eq!(third.status(), 429);
    let body: serde_json::Value = third.json().await.unwrap();
    assert_eq!(body["detail"], "rate limit");
}

fn mint_admin_token(secret: &str) -> String {
    let claims = serde_json::json!({
        "sub": "operator-1",
        "roles": ["platform-admin"],
        "tenant_ids": ["*"],
        "exp": (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn monthly_quota_trips_after_plan_message_cap() {
    let mut settings = base_settings();
    settings.jwt_shared_secret = "test-admin-secret".to_string();
    let server = TestServer::spawn(settings).await;
    let client = reqwest::Client::new();
    let admin_token = mint_admin_token("test-admin-secret");

    let create_plan_response = client
        .post(server.url("/v1/admin/plans"))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({
            "plan_id": "tiny",
            "display_name": "Tiny",
            "monthly_messages": 1,
            "monthly_token_cap": 1_000_000,
            "max_agents": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(create_plan_response.status(), 201);

    let created = create_tenant(&client, &server, "tiny").await;
    let tenant_id = created["tenant_id"].as_str().unwrap().to_string();
    assert!(run_next(&client, &server).await);

    let run = |message: &str| {
        let client = client.clone();
        let url = server.url(&format!("/v1/tenants/{tenant_id}/runs"));
        let tenant_id = tenant_id.clone();
        let message = message.to_string();
        async move {
            client
                .post(url)
                .header("x-tenant-id", &tenant_id)
                .header("x-customer-user-id", "user-1")
                .json(&serde_json::json!({ "agent_id": "a1", "user_id": "user-1", "message": message }))
                .send()
                .await
                .unwrap()
        }
    };

    assert_eq!(run("hi").await.status(), 200);
    let second = run("hi").await;
    assert_eq!(second.status(), 429);
    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["detail"], "quota");
}
