//! Approval workflow tests against a stubbed DynamoDB endpoint, exercised
//! end to end through the router: at most one pending request per
//! (instance_id, region), approve copies the record into the approved table
//! before deleting it from the pending table, and reject flips the pending
//! record in place.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::config::{Credentials, SharedCredentialsProvider};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloudops::config::Config;
use cloudops::errors::DUPLICATE_PENDING_MESSAGE;
use cloudops::{api, AppState};

const PENDING_TABLE: &str = "approval_requests";
const APPROVED_TABLE: &str = "requests_approved";
const REQUEST_ID: &str = "11111111-1111-1111-1111-111111111111";

fn app(endpoint: &str) -> axum::Router {
    let config = Config {
        port: 0,
        home_region: "ap-south-1".into(),
        approval_table: PENDING_TABLE.into(),
        approved_table: APPROVED_TABLE.into(),
        ses_from_email: None,
        default_approver_email: "l2@example.com".into(),
        frontend_origin: "http://localhost:3000".into(),
        document_bucket: "cloudops-documents".into(),
        template_bucket: None,
        automation_api_url: None,
        ecs_execution_role_arn: None,
        data_file: "data/dashboard.json".into(),
    };
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

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn dynamo_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/x-amz-json-1.0")
}

/// A stored pending record, in DynamoDB attribute-value form.
fn pending_item() -> Value {
    json!({
        "request_id": { "S": REQUEST_ID },
        "action": { "S": "stop" },
        "instance_id": { "S": "i-0abc123" },
        "region": { "S": "ap-south-1" },
        "requested_by": { "S": "user@rapyder.com" },
        "status": { "S": "pending" },
        "details": { "M": { "ticketId": { "S": "INC-42" } } },
        "timestamp": { "S": "2026-08-20T10:00:00Z" }
    })
}

fn submit_payload() -> Value {
    json!({
        "action": "stop",
        "instance_id": "i-0abc123",
        "region": "ap-south-1",
        "requested_by": "user@rapyder.com"
    })
}

#[tokio::test]
async fn duplicate_pending_request_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.Scan"))
        .respond_with(dynamo_json(
            json!({ "Items": [pending_item()], "Count": 1, "ScannedCount": 1 }),
        ))
        .mount(&server)
        .await;

    let resp = app(&server.uri())
        .oneshot(post_json("/approval/request", submit_payload()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], json!(true));
    assert_eq!(body["message"], DUPLICATE_PENDING_MESSAGE);
}

#[tokio::test]
async fn submit_writes_a_pending_record_and_returns_its_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.Scan"))
        .respond_with(dynamo_json(
            json!({ "Items": [], "Count": 0, "ScannedCount": 0 }),
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.PutItem"))
        .and(body_partial_json(json!({
            "TableName": PENDING_TABLE,
            "Item": { "status": { "S": "pending" } }
        })))
        .respond_with(dynamo_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let resp = app(&server.uri())
        .oneshot(post_json("/approval/request", submit_payload()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Request submitted");
    // A freshly minted UUID, not the caller's input.
    assert_eq!(body["request_id"].as_str().unwrap().len(), 36);
}

#[tokio::test]
async fn approve_copies_into_the_approved_table_then_deletes_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.GetItem"))
        .and(body_partial_json(json!({
            "TableName": PENDING_TABLE,
            "Key": { "request_id": { "S": REQUEST_ID } }
        })))
        .respond_with(dynamo_json(json!({ "Item": pending_item() })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.PutItem"))
        .and(body_partial_json(json!({
            "TableName": APPROVED_TABLE,
            "Item": { "status": { "S": "approved" } }
        })))
        .respond_with(dynamo_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.DeleteItem"))
        .and(body_partial_json(json!({
            "TableName": PENDING_TABLE,
            "Key": { "request_id": { "S": REQUEST_ID } }
        })))
        .respond_with(dynamo_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let resp = app(&server.uri())
        .oneshot(post_json(
            &format!("/approval/approve/{REQUEST_ID}"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Request approved!");
}

#[tokio::test]
async fn approving_an_unknown_request_is_a_404() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.GetItem"))
        .respond_with(dynamo_json(json!({})))
        .mount(&server)
        .await;

    let resp = app(&server.uri())
        .oneshot(post_json(
            &format!("/approval/approve/{REQUEST_ID}"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Request not found or already processed.");
}

#[tokio::test]
async fn reject_flips_the_pending_record_in_place() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.UpdateItem"))
        .and(body_partial_json(json!({
            "TableName": PENDING_TABLE,
            "Key": { "request_id": { "S": REQUEST_ID } },
            "ConditionExpression": "attribute_exists(request_id)",
            "ExpressionAttributeValues": { ":s": { "S": "rejected" } }
        })))
        .respond_with(dynamo_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let resp = app(&server.uri())
        .oneshot(post_json(
            &format!("/approval/reject/{REQUEST_ID}"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Request rejected");
}

#[tokio::test]
async fn rejecting_an_unknown_request_is_a_404() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "DynamoDB_20120810.UpdateItem"))
        .respond_with(ResponseTemplate::new(400).set_body_raw(
            json!({
                "__type": "com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException",
                "message": "The conditional request failed"
            })
            .to_string(),
            "application/x-amz-json-1.0",
        ))
        .mount(&server)
        .await;

    let resp = app(&server.uri())
        .oneshot(post_json(
            &format!("/approval/reject/{REQUEST_ID}"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Request not found or already processed.");
}
