use std::sync::Arc;

use aws_sdk_ec2::types::{Filter, Tag};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::AppState;

pub async fn list_vpcs(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_vpcs()
        .send()
        .await
        .map_err(ApiError::aws)?;
    let vpcs: Vec<Value> = resp
        .vpcs()
        .iter()
        .map(|vpc| json!({ "id": vpc.vpc_id(), "cidr": vpc.cidr_block() }))
        .collect();
    Ok(Json(Value::Array(vpcs)))
}

pub async fn list_subnets(
    State(state): State<Arc<AppState>>,
    Path((region, vpc_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_subnets()
        .filters(Filter::builder().name("vpc-id").values(&vpc_id).build())
        .send()
        .await
        .map_err(ApiError::aws)?;
    let subnets: Vec<Value> = resp
        .subnets()
        .iter()
        .map(|subnet| {
            json!({
                "id": subnet.subnet_id(),
                "az": subnet.availability_zone(),
                "cidr": subnet.cidr_block(),
            })
        })
        .collect();
    Ok(Json(Value::Array(subnets)))
}

pub async fn list_security_groups(
    State(state): State<Arc<AppState>>,
    Path((region, vpc_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_security_groups()
        .filters(Filter::builder().name("vpc-id").values(&vpc_id).build())
        .send()
        .await
        .map_err(ApiError::aws)?;
    let groups: Vec<Value> = resp
        .security_groups()
        .iter()
        .map(|sg| json!({ "id": sg.group_id(), "name": sg.group_name() }))
        .collect();
    Ok(Json(Value::Array(groups)))
}

pub async fn list_key_pairs(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .ec2(&region)
        .describe_key_pairs()
        .send()
        .await
        .map_err(ApiError::aws)?;
    let keys: Vec<Value> = resp
        .key_pairs()
        .iter()
        .map(|kp| json!({ "name": kp.key_name() }))
        .collect();
    Ok(Json(Value::Array(keys)))
}

pub async fn list_instance_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .iam()
        .list_instance_profiles()
        .send()
        .await
        .map_err(ApiError::aws)?;
    let profiles: Vec<Value> = resp
        .instance_profiles()
        .iter()
        .map(|p| json!({ "name": p.instance_profile_name() }))
        .collect();
    Ok(Json(Value::Array(profiles)))
}

#[derive(Debug, Deserialize)]
pub struct CreateVpcRequest {
    pub name: Option<String>,
    pub cidr_block: Option<String>,
    pub subnet_cidr: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Create a VPC with a Name tag and, when a subnet CIDR is given, one subnet
/// in the region's first availability zone.
pub async fn create_vpc(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateVpcRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(name), Some(cidr_block)) = (&payload.name, &payload.cidr_block) else {
        return Err(ApiError::BadRequest(
            "VPC name and CIDR block are required".into(),
        ));
    };

    let ec2 = state.aws.ec2(&payload.region);
    let vpc_resp = ec2
        .create_vpc()
        .cidr_block(cidr_block)
        .send()
        .await
        .map_err(ApiError::aws)?;
    let vpc_id = vpc_resp
        .vpc()
        .and_then(|v| v.vpc_id())
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("CreateVpc returned no VPC id")))?
        .to_string();

    ec2.create_tags()
        .resources(&vpc_id)
        .tags(Tag::builder().key("Name").value(name).build())
        .send()
        .await
        .map_err(ApiError::aws)?;

    let mut subnet_id = None;
    if let Some(subnet_cidr) = &payload.subnet_cidr {
        let zones = ec2
            .describe_availability_zones()
            .send()
            .await
            .map_err(ApiError::aws)?;
        let az = zones
            .availability_zones()
            .first()
            .and_then(|z| z.zone_name())
            .ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!("no availability zones found for region"))
            })?
            .to_string();

        let subnet_resp = ec2
            .create_subnet()
            .vpc_id(&vpc_id)
            .cidr_block(subnet_cidr)
            .availability_zone(az)
            .send()
            .await
            .map_err(ApiError::aws)?;
        let id = subnet_resp
            .subnet()
            .and_then(|s| s.subnet_id())
            .ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!("CreateSubnet returned no subnet id"))
            })?
            .to_string();

        ec2.create_tags()
            .resources(&id)
            .tags(Tag::builder().key("Name").value(format!("{name}-subnet")).build())
            .send()
            .await
            .map_err(ApiError::aws)?;
        subnet_id = Some(id);
    }

    Ok(Json(json!({
        "status": "success",
        "vpc_id": vpc_id,
        "subnet_id": subnet_id,
    })))
}
