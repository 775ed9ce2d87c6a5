use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::AppState;

pub mod approvals;
pub mod auth;
pub mod billing;
pub mod buckets;
pub mod compliance;
pub mod ecs;
pub mod instances;
pub mod monitoring;
pub mod network;
pub mod stacks;

/// Full HTTP surface of the dashboard API.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(instances::health))
        .route("/automation/health", get(instances::automation_health))
        .route("/regions", get(instances::list_regions))
        .route("/instances/:region", get(instances::list_instances))
        .route(
            "/instances/:region/installation-ready",
            get(instances::installation_ready),
        )
        .route(
            "/instance/:region/:instance_id",
            get(instances::instance_details),
        )
        .route(
            "/instance/:region/:instance_id/private-ip",
            get(instances::instance_private_ip),
        )
        .route(
            "/instance/:region/:instance_id/start",
            post(instances::start_instance),
        )
        .route(
            "/instance/:region/:instance_id/stop",
            post(instances::stop_instance),
        )
        .route(
            "/instance/:region/:instance_id/terminate",
            post(instances::terminate_instance),
        )
        .route(
            "/instance/:region/:instance_id/resize",
            post(instances::resize_instance),
        )
        .route(
            "/instance/:region/:instance_id/installation-info",
            get(instances::installation_info),
        )
        .route("/create-ec2", post(instances::create_instance))
        .route("/vpcs/:region", get(network::list_vpcs))
        .route("/subnets/:region/:vpc_id", get(network::list_subnets))
        .route(
            "/security-groups/:region/:vpc_id",
            get(network::list_security_groups),
        )
        .route("/key-pairs/:region", get(network::list_key_pairs))
        .route("/iam-profiles", get(network::list_instance_profiles))
        .route("/create-vpc", post(network::create_vpc))
        .route("/s3/buckets/:region", get(buckets::list_buckets))
        .route("/create-s3", post(buckets::create_bucket))
        .route("/alarms/:region", get(monitoring::list_alarms))
        .route(
            "/metrics/:region/:instance_id",
            get(monitoring::instance_metrics),
        )
        .route("/security/ec2", get(compliance::ec2_checks))
        .route("/security/s3", get(compliance::s3_checks))
        .route("/security/foundation", get(compliance::foundation_checks))
        .route("/security/pci", get(compliance::pci_checks))
        .route("/api/data", get(billing::dashboard_data))
        .route("/api/billing", get(billing::billing_data))
        .route("/api/anomaly-summary", get(billing::anomaly_summary))
        .route("/api/download-url", get(billing::download_url))
        .route("/stacks/create-stack", post(stacks::create_stack))
        .route("/stacks/templates", get(stacks::list_templates))
        .route("/stacks/upload-url", post(stacks::upload_url))
        .route("/approval/request", post(approvals::submit_request))
        .route("/approval/pending", get(approvals::list_pending))
        .route(
            "/approval/approve/:request_id",
            post(approvals::approve_request),
        )
        .route(
            "/approval/reject/:request_id",
            post(approvals::reject_request),
        )
        .route("/approval/approved", get(approvals::list_approved))
        .route(
            "/approval/approved/:request_id",
            delete(approvals::remove_approved),
        )
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/create-ecs", post(ecs::create_service))
        // The ECS wizard reuses the network lookups under its own paths.
        .route("/ecs/vpcs/:region", get(network::list_vpcs))
        .route("/ecs/subnets/:region/:vpc_id", get(network::list_subnets))
        .fallback(not_found)
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

/// Render an SDK timestamp as RFC 3339, dropping values outside chrono's range.
pub(crate) fn rfc3339(ts: &aws_smithy_types::DateTime) -> Option<String> {
    chrono::DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
        .map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smithy_timestamps_render_as_rfc3339() {
        let ts = aws_smithy_types::DateTime::from_secs(1_700_000_000);
        let rendered = rfc3339(&ts).unwrap();
        assert!(rendered.starts_with("2023-11-14T"));
    }
}
