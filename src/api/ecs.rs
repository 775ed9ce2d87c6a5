use std::sync::Arc;

use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, Compatibility, ContainerDefinition, LaunchType,
    NetworkConfiguration, NetworkMode, PortMapping, TransportProtocol,
};
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    pub region: String,
    pub cluster_name: String,
    pub launch_type: String,
    pub subnet_id: String,
    pub service_name: String,
    pub task_def_name: String,
    pub container_name: String,
}

/// Provision a one-task ECS service running the sample container: ensure the
/// cluster exists, register a task definition, create the service.
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateServiceRequest>,
) -> Result<Json<Value>, ApiError> {
    let ecs = state.aws.ecs(&payload.region);

    let clusters = ecs.list_clusters().send().await.map_err(ApiError::aws)?;
    if !clusters
        .cluster_arns()
        .iter()
        .any(|arn| arn.contains(&payload.cluster_name))
    {
        ecs.create_cluster()
            .cluster_name(&payload.cluster_name)
            .send()
            .await
            .map_err(ApiError::aws)?;
    }

    let mut task_def = ecs
        .register_task_definition()
        .family(&payload.task_def_name)
        .requires_compatibilities(Compatibility::from(payload.launch_type.as_str()))
        .cpu("256")
        .memory("512")
        .network_mode(NetworkMode::Awsvpc)
        .container_definitions(
            ContainerDefinition::builder()
                .name(&payload.container_name)
                .image("amazon/amazon-ecs-sample")
                .port_mappings(
                    PortMapping::builder()
                        .container_port(80)
                        .host_port(80)
                        .protocol(TransportProtocol::Tcp)
                        .build(),
                )
                .essential(true)
                .build(),
        );
    if let Some(role_arn) = &state.config.ecs_execution_role_arn {
        task_def = task_def.execution_role_arn(role_arn);
    }
    let registered = task_def.send().await.map_err(ApiError::aws)?;

    let revision = registered
        .task_definition()
        .map(|td| td.revision())
        .unwrap_or(1);
    let task_definition = format!("{}:{}", payload.task_def_name, revision);

    ecs.create_service()
        .cluster(&payload.cluster_name)
        .service_name(&payload.service_name)
        .task_definition(&task_definition)
        .desired_count(1)
        .launch_type(LaunchType::from(payload.launch_type.as_str()))
        .network_configuration(
            NetworkConfiguration::builder()
                .awsvpc_configuration(
                    AwsVpcConfiguration::builder()
                        .subnets(&payload.subnet_id)
                        .assign_public_ip(AssignPublicIp::Enabled)
                        .build()?,
                )
                .build(),
        )
        .send()
        .await
        .map_err(ApiError::aws)?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("ECS service {} created", payload.service_name),
    })))
}
