//! Router-level tests that run fully offline. Endpoints backed by AWS calls
//! are not exercised here; these cover the local behaviors: mock data,
//! request validation, auth, the 404 fallback, and the automation health
//! probe against a mock HTTP server.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::config::{Credentials, SharedCredentialsProvider};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloudops::config::Config;
use cloudops::{api, AppState};

fn test_config() -> Config {
    Config {
        port: 0,
        home_region: "ap-south-1".into(),
        approval_table: "approval_requests".into(),
        approved_table: "requests_approved".into(),
        ses_from_email: None,
        default_approver_email: "l2@example.com".into(),
        frontend_origin: "http://localhost:3000".into(),
        document_bucket: "cloudops-documents".into(),
        template_bucket: None,
        automation_api_url: None,
        ecs_execution_role_arn: None,
        data_file: "data/dashboard.json".into(),
    }
}

fn app(config: Config) -> axum::Router {
    let sdk = SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(config.home_region.clone()))
        .build();
    let state = Arc::new(AppState::from_parts(config, sdk));
    api::router().with_state(state)
}

/// Like [`app`], but with all AWS traffic routed to a stub endpoint.
fn app_with_endpoint(config: Config, endpoint: &str) -> axum::Router {
    let sdk = SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(config.home_region.clone()))
        .endpoint_url(endpoint)
        .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
            "akid", "secret", None, None, "static",
        )))
        .build();
    let state = Arc::new(AppState::from_parts(config, sdk));
    api::router().with_state(state)
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn mock_data_is_served_verbatim() {
    let resp = app(test_config()).oneshot(get("/api/data")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let rows = body.as_array().expect("dataset is an array");
    assert!(!rows.is_empty());
    assert!(rows[0].get("Category").is_some());
}

#[tokio::test]
async fn download_url_requires_a_key() {
    let resp = app(test_config())
        .oneshot(get("/api/download-url"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Missing S3 object key");
}

#[tokio::test]
async fn empty_key_is_rejected_too() {
    let resp = app(test_config())
        .oneshot(get("/api/download-url?key="))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_accepts_known_credentials() {
    let resp = app(test_config())
        .oneshot(post_json(
            "/auth/login",
            json!({ "email": "admin@rapyder.com", "password": "admin123" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let resp = app(test_config())
        .oneshot(post_json(
            "/auth/login",
            json!({ "email": "admin@rapyder.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn login_rejects_missing_fields() {
    let resp = app(test_config())
        .oneshot(post_json("/auth/login", json!({ "email": "admin@rapyder.com" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_always_succeeds() {
    let resp = app(test_config())
        .oneshot(post_json("/auth/logout", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Logged out");
}

#[tokio::test]
async fn unknown_routes_return_json_404() {
    let resp = app(test_config())
        .oneshot(get("/no/such/route"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn create_bucket_validates_the_name() {
    let resp = app(test_config())
        .oneshot(post_json(
            "/create-s3",
            json!({ "bucket_name": "Bad_Name", "region": "us-east-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Invalid bucket name");
}

#[tokio::test]
async fn create_bucket_requires_name_and_region() {
    let resp = app(test_config())
        .oneshot(post_json("/create-s3", json!({ "bucket_name": "ok-name" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "bucket_name and region are required");
}

#[tokio::test]
async fn create_vpc_requires_name_and_cidr() {
    let resp = app(test_config())
        .oneshot(post_json("/create-vpc", json!({ "name": "demo" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "VPC name and CIDR block are required");
}

#[tokio::test]
async fn create_stack_requires_all_fields() {
    let resp = app(test_config())
        .oneshot(post_json(
            "/stacks/create-stack",
            json!({ "stackName": "demo-stack" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Missing required fields");
}

#[tokio::test]
async fn upload_url_requires_a_file_name() {
    let resp = app(test_config())
        .oneshot(post_json("/stacks/upload-url", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Missing fileName");
}

const DESCRIBE_INSTANCES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>59dbff89-35bd-4eac-99ed-be587aaa1111</requestId>
    <reservationSet>
        <item>
            <reservationId>r-0f5dbe1234567890a</reservationId>
            <instancesSet>
                <item>
                    <instanceId>i-0abc123</instanceId>
                    <instanceState><code>16</code><name>running</name></instanceState>
                    <privateIpAddress>10.0.1.25</privateIpAddress>
                </item>
            </instancesSet>
        </item>
    </reservationSet>
</DescribeInstancesResponse>"#;

const EMPTY_RESERVATIONS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>59dbff89-35bd-4eac-99ed-be587aaa2222</requestId>
    <reservationSet/>
</DescribeInstancesResponse>"#;

#[tokio::test]
async fn private_ip_lookup_returns_the_address() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("Action=DescribeInstances"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(DESCRIBE_INSTANCES_XML, "text/xml;charset=UTF-8"),
        )
        .mount(&server)
        .await;

    let resp = app_with_endpoint(test_config(), &server.uri())
        .oneshot(get("/instance/ap-south-1/i-0abc123/private-ip"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["private_ip"], "10.0.1.25");
}

#[tokio::test]
async fn private_ip_lookup_404s_when_the_instance_is_missing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("Action=DescribeInstances"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(EMPTY_RESERVATIONS_XML, "text/xml;charset=UTF-8"),
        )
        .mount(&server)
        .await;

    let resp = app_with_endpoint(test_config(), &server.uri())
        .oneshot(get("/instance/ap-south-1/i-0abc123/private-ip"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Instance not found");
}

#[tokio::test]
async fn automation_health_reports_upstream_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.automation_api_url = Some(server.uri());

    let resp = app(config)
        .oneshot(get("/automation/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ansible_api_status"], "healthy");
    assert_eq!(body["ansible_api_response"]["status"], "ok");
}

#[tokio::test]
async fn automation_health_without_configuration_is_unhealthy() {
    let resp = app(test_config())
        .oneshot(get("/automation/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert_eq!(body["ansible_api_status"], "unhealthy");
}

#[tokio::test]
async fn automation_health_maps_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.automation_api_url = Some(server.uri());

    let resp = app(config)
        .oneshot(get("/automation/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ansible_api_status"], "unhealthy");
}
