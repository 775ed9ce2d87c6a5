use std::sync::Arc;
use std::time::Duration;

use aws_sdk_ec2::types::{
    AttributeValue as Ec2AttributeValue, Filter, IamInstanceProfileSpecification, Instance,
    InstanceStateName, InstanceType, ResourceType, Tag, TagSpecification,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::rfc3339;
use crate::errors::ApiError;
use crate::AppState;

fn name_tag(instance: &Instance) -> Option<&str> {
    instance
        .tags()
        .iter()
        .find(|t| t.key() == Some("Name"))
        .and_then(|t| t.value())
}

fn tags_json(instance: &Instance) -> Value {
    Value::Array(
        instance
            .tags()
            .iter()
            .map(|t| json!({ "Key": t.key(), "Value": t.value() }))
            .collect(),
    )
}

fn volume_ids(instance: &Instance) -> Vec<&str> {
    instance
        .block_device_mappings()
        .iter()
        .filter_map(|m| m.ebs().and_then(|e| e.volume_id()))
        .collect()
}

/// The summary shape shared by the list and detail endpoints.
fn summarize(instance: &Instance) -> Value {
    json!({
        "id": instance.instance_id(),
        "name": name_tag(instance),
        "type": instance.instance_type().map(|t| t.as_str()),
        "state": instance.state().and_then(|s| s.name()).map(|n| n.as_str()),
        "az": instance.placement().and_then(|p| p.availability_zone()),
        "volumes": volume_ids(instance),
        "tags": tags_json(instance),
        "role": instance.iam_instance_profile().and_then(|p| p.arn()).unwrap_or("None"),
        "cpu": Value::Null,
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (connected, message) = match state.aws.ec2("us-east-1").describe_regions().send().await {
        Ok(resp) => (
            true,
            format!("Connected - {} regions available", resp.regions().len()),
        ),
        Err(err) => (false, format!("AWS connection failed: {err}")),
    };
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "Cloud Operations API",
        "version": env!("CARGO_PKG_VERSION"),
        "aws_connectivity": { "connected": connected, "message": message },
    }))
}

/// Probe the automation (Ansible) API's own health endpoint.
pub async fn automation_health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<Value>) {
    let timestamp = Utc::now().to_rfc3339();
    let Some(base) = &state.config.automation_api_url else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "ansible_api_status": "unhealthy",
                "error": "AUTOMATION_API_URL is not configured",
                "timestamp": timestamp,
            })),
        );
    };

    let url = format!("{}/health", base.trim_end_matches('/'));
    match state
        .http
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            let body = resp.json::<Value>().await.unwrap_or(Value::Null);
            (
                StatusCode::OK,
                Json(json!({
                    "ansible_api_status": "healthy",
                    "ansible_api_response": body,
                    "timestamp": timestamp,
                })),
            )
        }
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "ansible_api_status": "unhealthy",
                "ansible_api_response": Value::Null,
                "timestamp": timestamp,
            })),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "ansible_api_status": "unhealthy",
                "error": err.to_string(),
                "timestamp": timestamp,
            })),
        ),
    }
}

pub async fn list_regions(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2("us-east-1")
        .describe_regions()
        .send()
        .await
        .map_err(ApiError::aws)?;
    let mut regions: Vec<&str> = resp
        .regions()
        .iter()
        .filter_map(|r| r.region_name())
        .collect();
    regions.sort_unstable();
    let count = regions.len();
    Ok(Json(json!({ "regions": regions, "count": count })))
}

pub async fn list_instances(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_instances()
        .send()
        .await
        .map_err(ApiError::aws)?;

    let mut output = Vec::new();
    for reservation in resp.reservations() {
        for instance in reservation.instances() {
            output.push(summarize(instance));
        }
    }
    Ok(Json(Value::Array(output)))
}

pub async fn instance_details(
    State(state): State<Arc<AppState>>,
    Path((region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_instances()
        .instance_ids(&instance_id)
        .send()
        .await
        .map_err(ApiError::aws)?;

    let instance = resp
        .reservations()
        .first()
        .and_then(|r| r.instances().first())
        .ok_or_else(|| ApiError::NotFound("Instance not found".into()))?;

    let mut details = summarize(instance);
    let extra = json!({
        "public_ip": instance.public_ip_address(),
        "private_ip": instance.private_ip_address(),
        "launch_time": instance.launch_time().and_then(rfc3339),
        "vpc_id": instance.vpc_id(),
        "subnet_id": instance.subnet_id(),
        "security_groups": instance
            .security_groups()
            .iter()
            .filter_map(|g| g.group_name())
            .collect::<Vec<_>>(),
        "key_name": instance.key_name(),
        "architecture": instance.architecture().map(|a| a.as_str()),
        "platform": instance.platform().map_or("linux", |p| p.as_str()),
        "monitoring": instance
            .monitoring()
            .and_then(|m| m.state())
            .map_or("disabled", |s| s.as_str()),
    });
    if let (Value::Object(base), Value::Object(more)) = (&mut details, extra) {
        base.extend(more);
    }
    Ok(Json(details))
}

/// Thin lookup used by the automation wizard to pick an SSH target.
pub async fn instance_private_ip(
    State(state): State<Arc<AppState>>,
    Path((region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_instances()
        .instance_ids(&instance_id)
        .send()
        .await
        .map_err(ApiError::aws)?;

    let instance = resp
        .reservations()
        .first()
        .and_then(|r| r.instances().first())
        .ok_or_else(|| ApiError::NotFound("Instance not found".into()))?;
    let private_ip = instance
        .private_ip_address()
        .ok_or_else(|| ApiError::NotFound("Private IP not found".into()))?;

    Ok(Json(json!({ "private_ip": private_ip })))
}

pub async fn start_instance(
    State(state): State<Arc<AppState>>,
    Path((region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .aws
        .ec2(&region)
        .start_instances()
        .instance_ids(&instance_id)
        .send()
        .await
        .map_err(ApiError::aws)?;
    Ok(Json(
        json!({ "status": "success", "message": format!("Started {instance_id}") }),
    ))
}

pub async fn stop_instance(
    State(state): State<Arc<AppState>>,
    Path((region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .aws
        .ec2(&region)
        .stop_instances()
        .instance_ids(&instance_id)
        .send()
        .await
        .map_err(ApiError::aws)?;
    Ok(Json(
        json!({ "status": "success", "message": format!("Stopped {instance_id}") }),
    ))
}

pub async fn terminate_instance(
    State(state): State<Arc<AppState>>,
    Path((region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .aws
        .ec2(&region)
        .terminate_instances()
        .instance_ids(&instance_id)
        .send()
        .await
        .map_err(ApiError::aws)?;
    Ok(Json(
        json!({ "status": "success", "message": format!("Terminated {instance_id}") }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub instance_type: String,
}

/// Stop, wait for the stopped state, change the type, start again.
pub async fn resize_instance(
    State(state): State<Arc<AppState>>,
    Path((region, instance_id)): Path<(String, String)>,
    Json(payload): Json<ResizeRequest>,
) -> Result<Json<Value>, ApiError> {
    let ec2 = state.aws.ec2(&region);

    ec2.stop_instances()
        .instance_ids(&instance_id)
        .send()
        .await
        .map_err(ApiError::aws)?;
    wait_until_stopped(&ec2, &instance_id).await?;

    ec2.modify_instance_attribute()
        .instance_id(&instance_id)
        .instance_type(
            Ec2AttributeValue::builder()
                .value(&payload.instance_type)
                .build(),
        )
        .send()
        .await
        .map_err(ApiError::aws)?;

    ec2.start_instances()
        .instance_ids(&instance_id)
        .send()
        .await
        .map_err(ApiError::aws)?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Resized {} to {}", instance_id, payload.instance_type),
    })))
}

async fn wait_until_stopped(
    ec2: &aws_sdk_ec2::Client,
    instance_id: &str,
) -> Result<(), ApiError> {
    // Instance type changes are rejected unless the instance is fully stopped.
    for _ in 0..60 {
        let resp = ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(ApiError::aws)?;
        let stopped = resp
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .all(|i| i.state().and_then(|s| s.name()) == Some(&InstanceStateName::Stopped));
        if stopped {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    Err(ApiError::Internal(anyhow::anyhow!(
        "timed out waiting for {instance_id} to stop"
    )))
}

pub async fn installation_info(
    State(state): State<Arc<AppState>>,
    Path((region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_instances()
        .instance_ids(&instance_id)
        .send()
        .await
        .map_err(ApiError::aws)?;

    let instance = resp
        .reservations()
        .first()
        .and_then(|r| r.instances().first())
        .ok_or_else(|| ApiError::NotFound("Instance not found".into()))?;

    let state_name = instance
        .state()
        .and_then(|s| s.name())
        .map(|n| n.as_str())
        .unwrap_or("unknown");
    let private_ip = instance.private_ip_address();
    let key_name = instance.key_name();
    let platform = instance.platform().map_or("linux", |p| p.as_str());
    let running = state_name == "running";

    Ok(Json(json!({
        "instance_id": instance_id,
        "name": name_tag(instance),
        "private_ip": private_ip,
        "public_ip": instance.public_ip_address(),
        "state": state_name,
        "key_name": key_name,
        "platform": platform,
        "ready_for_installation": running && private_ip.is_some(),
        "installation_checks": {
            "instance_running": running,
            "private_ip_available": private_ip.is_some(),
            "ssh_key_assigned": key_name.is_some(),
            "linux_platform": platform != "windows",
        },
        "recommended_target_ip": private_ip,
        "notes": {
            "ssh_access": "Ensure SSH access is configured for the target IP",
            "security_groups": "Verify security groups allow SSH (port 22)",
            "ansible_requirements": "Target must have Python installed",
        },
    })))
}

pub async fn installation_ready(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_instances()
        .filters(
            Filter::builder()
                .name("instance-state-name")
                .values("running")
                .build(),
        )
        .send()
        .await
        .map_err(ApiError::aws)?;

    let mut ready = Vec::new();
    for reservation in resp.reservations() {
        for instance in reservation.instances() {
            let Some(private_ip) = instance.private_ip_address() else {
                continue;
            };
            if instance.platform().map_or("linux", |p| p.as_str()) == "windows" {
                continue;
            }
            ready.push(json!({
                "id": instance.instance_id(),
                "name": name_tag(instance),
                "private_ip": private_ip,
                "public_ip": instance.public_ip_address(),
                "key_name": instance.key_name(),
                "type": instance.instance_type().map(|t| t.as_str()),
                "az": instance.placement().and_then(|p| p.availability_zone()),
            }));
        }
    }

    let count = ready.len();
    Ok(Json(json!({
        "ready_instances": ready,
        "count": count,
        "region": region,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateInstanceRequest {
    pub region: String,
    pub ami: String,
    pub instance_type: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub key_name: String,
    pub iam_instance_profile: Option<String>,
    pub name: String,
}

pub async fn create_instance(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateInstanceRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut req = state
        .aws
        .ec2(&payload.region)
        .run_instances()
        .image_id(&payload.ami)
        .instance_type(InstanceType::from(payload.instance_type.as_str()))
        .subnet_id(&payload.subnet_id)
        .security_group_ids(&payload.security_group_id)
        .key_name(&payload.key_name)
        .min_count(1)
        .max_count(1)
        .tag_specifications(
            TagSpecification::builder()
                .resource_type(ResourceType::Instance)
                .tags(Tag::builder().key("Name").value(&payload.name).build())
                .build(),
        );
    if let Some(profile) = &payload.iam_instance_profile {
        req = req.iam_instance_profile(
            IamInstanceProfileSpecification::builder().name(profile).build(),
        );
    }

    let resp = req.send().await.map_err(ApiError::aws)?;
    let instance = resp.instances().first();
    Ok(Json(json!({
        "status": "success",
        "instance_id": instance.and_then(|i| i.instance_id()),
        "public_ip": instance.and_then(|i| i.public_ip_address()).unwrap_or("N/A"),
    })))
}
