//! Loading a gateway from settings files and the process environment

use idgate_config_env::{FileSource, Region};
use idgate_gateway::{CallSpec, Gateway};
use idgate_integration_tests::{PROD_ID, mount_token, tenant_path};
use serde_json::json;
use std::io::Write;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const ENV_KEYS: &[&str] = &[
    "IDGATE_REGION",
    "IDGATE_ORG_ID",
    "IDGATE_DEFAULT_ENV",
    "IDGATE_API_BASE_URL",
    "IDGATE_AUTH_BASE_URL",
    "IDGATE_ENV_1_NAME",
    "IDGATE_ENV_1_ID",
    "IDGATE_ENV_1_CLIENT_ID",
    "IDGATE_ENV_1_CLIENT_SECRET",
    "IDGATE_ENV_1_ALIAS",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe {
            std::env::remove_var(key);
        }
    }
}

#[tokio::test]
async fn test_gateway_from_yaml_file() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, PROD_ID, 1).await;
    Mock::given(method("GET"))
        .and(path(tenant_path(PROD_ID, "users/u1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "IDGATE_REGION: asia_pacific
IDGATE_ORG_ID: org-1
IDGATE_DEFAULT_ENV: prod
IDGATE_MAX_RETRIES: 0
IDGATE_API_BASE_URL: {uri}
IDGATE_AUTH_BASE_URL: {uri}
IDGATE_ENV_1_NAME: Production
IDGATE_ENV_1_ID: {id}
IDGATE_ENV_1_CLIENT_ID: c1
IDGATE_ENV_1_CLIENT_SECRET: s1
IDGATE_ENV_1_ALIAS: [prod, live]",
        uri = mock_server.uri(),
        id = PROD_ID
    )
    .unwrap();

    let source = FileSource::load(file.path()).unwrap();
    let gateway = Gateway::from_source(&source).unwrap();

    let global = gateway.registry().global();
    assert_eq!(global.region, Region::AsiaPacific);
    assert_eq!(global.max_retries, 0);
    assert_eq!(global.default_tenant_name, "Production");

    let result = gateway
        .get(CallSpec::new("users/u1").tenant("LIVE").single())
        .await
        .unwrap();
    assert_eq!(result.item.unwrap()["id"], "u1");
}

#[tokio::test]
#[serial_test::serial]
async fn test_gateway_from_process_env() {
    let mock_server = MockServer::start().await;
    clear_env();
    unsafe {
        std::env::set_var("IDGATE_REGION", "europe");
        std::env::set_var("IDGATE_ORG_ID", "org-1");
        std::env::set_var("IDGATE_DEFAULT_ENV", "Production");
        std::env::set_var("IDGATE_API_BASE_URL", mock_server.uri());
        std::env::set_var("IDGATE_AUTH_BASE_URL", mock_server.uri());
        std::env::set_var("IDGATE_ENV_1_NAME", "Production");
        std::env::set_var("IDGATE_ENV_1_ID", PROD_ID);
        std::env::set_var("IDGATE_ENV_1_CLIENT_ID", "c1");
        std::env::set_var("IDGATE_ENV_1_CLIENT_SECRET", "s1");
    }

    let gateway = Gateway::from_env();
    clear_env();

    let gateway = gateway.unwrap();
    let tenants = gateway.list_tenants();
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0].id, PROD_ID);
    assert!(tenants[0].is_default);
}

#[test]
#[serial_test::serial]
fn test_from_env_reports_every_missing_setting() {
    clear_env();
    let err = Gateway::from_env().unwrap_err().to_string();
    assert!(err.contains("IDGATE_REGION"));
    assert!(err.contains("IDGATE_ORG_ID"));
    assert!(err.contains("IDGATE_DEFAULT_ENV"));
}
