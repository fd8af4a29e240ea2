//! Organization-level calls against a mock remote

use idgate_core::Error;
use idgate_gateway::CallSpec;
use idgate_integration_tests::{PROD_ID, fast_gateway, mount_token};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

#[tokio::test]
async fn test_org_call_uses_default_tenant_credentials() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, PROD_ID, 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/environments"))
        .and(header("authorization", "Bearer token-env-prod"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"environments": [{"id": "env-prod"}, {"id": "env-dev"}]},
            "count": 2
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = fast_gateway(&mock_server);
    let result = gateway
        .call_organization_level(CallSpec::new("environments").paginated(None))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.items().len(), 2);
    assert_eq!(result.pagination.unwrap().count, 2);
    assert!(result.tenant.is_none());
}

#[tokio::test]
async fn test_org_call_single_resource() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, PROD_ID, 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/organizations/org-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "org-1", "name": "Acme"})))
        .mount(&mock_server)
        .await;

    let gateway = fast_gateway(&mock_server);
    let result = gateway
        .call_organization_level(CallSpec::new("organizations/org-1"))
        .await
        .unwrap();
    assert_eq!(result.item.unwrap()["name"], "Acme");
}

#[tokio::test]
async fn test_org_call_is_single_shot_and_reports_http_code() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, PROD_ID, 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/environments"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = fast_gateway(&mock_server);
    let result = gateway
        .call_organization_level(CallSpec::new("environments"))
        .await
        .unwrap();

    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.code.as_deref(), Some("HTTP_503"));
    assert_eq!(error.message.as_deref(), Some("maintenance"));
}

#[tokio::test]
async fn test_org_call_transport_failure_is_an_error() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, PROD_ID, 1).await;

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let settings = idgate_integration_tests::settings(&mock_server)
        .with("IDGATE_API_BASE_URL", format!("http://127.0.0.1:{}", port));
    let gateway = idgate_gateway::Gateway::from_source(&settings).unwrap();

    let err = gateway
        .call_organization_level(CallSpec::new("environments"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn test_org_call_page_size_rules() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, PROD_ID, 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/environments"))
        .and(query_param("limit", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_embedded": {"environments": []}})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/organizations/org-1"))
        .and(wiremock::matchers::query_param_is_missing("limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "org-1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = fast_gateway(&mock_server);

    // A caller limit survives when no page size is given
    let list = gateway
        .call_organization_level(CallSpec::new("environments").param("limit", 7).paginated(None))
        .await
        .unwrap();
    assert!(list.items().is_empty());

    // Single resource by default: no limit added
    let single = gateway
        .call_organization_level(CallSpec::new("organizations/org-1"))
        .await
        .unwrap();
    assert_eq!(single.item.unwrap()["id"], "org-1");
}
