//! End-to-end test support for idgate
//!
//! Builds settings that point a gateway at a wiremock server standing in
//! for both the auth and the API hosts, with two tenants:
//! - `Production` (`env-prod`, aliases `prod`, `live`), the default
//! - `Development` (`env-dev`, alias `dev`)

use idgate_config_env::MapSource;
use idgate_egress::RetryPolicy;
use idgate_gateway::Gateway;
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const PROD_ID: &str = "env-prod";
pub const DEV_ID: &str = "env-dev";

/// Settings for both tenants, with base URLs pointing at `server`
pub fn settings(server: &MockServer) -> MapSource {
    MapSource::new()
        .with("IDGATE_REGION", "north_america")
        .with("IDGATE_ORG_ID", "org-1")
        .with("IDGATE_DEFAULT_ENV", "Production")
        .with("IDGATE_MAX_RETRIES", "3")
        .with("IDGATE_REQUEST_TIMEOUT", "5")
        .with("IDGATE_API_BASE_URL", server.uri())
        .with("IDGATE_AUTH_BASE_URL", server.uri())
        .with("IDGATE_ENV_1_NAME", "Production")
        .with("IDGATE_ENV_1_ID", PROD_ID)
        .with("IDGATE_ENV_1_CLIENT_ID", "prod-client")
        .with("IDGATE_ENV_1_CLIENT_SECRET", "prod-secret")
        .with("IDGATE_ENV_1_ALIAS", "prod,live")
        .with("IDGATE_ENV_2_NAME", "Development")
        .with("IDGATE_ENV_2_ID", DEV_ID)
        .with("IDGATE_ENV_2_CLIENT_ID", "dev-client")
        .with("IDGATE_ENV_2_CLIENT_SECRET", "dev-secret")
        .with("IDGATE_ENV_2_ALIAS", "dev")
}

/// Gateway over [`settings`], with the configured retry policy
pub fn gateway(server: &MockServer) -> Gateway {
    Gateway::from_source(&settings(server)).expect("valid test settings")
}

/// Gateway over [`settings`] with millisecond backoff
pub fn fast_gateway(server: &MockServer) -> Gateway {
    gateway(server).with_retry_policy(RetryPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        jitter: 0.0,
        min_delay: Duration::from_millis(1),
        ..Default::default()
    })
}

/// Mount a token endpoint for `tenant_id` that must be hit `expected` times
pub async fn mount_token(server: &MockServer, tenant_id: &str, expected: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/as/token", tenant_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": format!("token-{}", tenant_id),
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": ""
        })))
        .expect(expected)
        .mount(server)
        .await;
}

/// `/v1/environments/{tenant_id}/{endpoint}`
pub fn tenant_path(tenant_id: &str, endpoint: &str) -> String {
    format!("/v1/environments/{}/{}", tenant_id, endpoint)
}
