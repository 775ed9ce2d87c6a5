use std::sync::Arc;
use std::time::Duration;

use aws_sdk_cloudformation::types::{Capability, Tag};
use aws_sdk_s3::presigning::PresigningConfig;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateStackRequest {
    #[serde(rename = "stackName")]
    pub stack_name: Option<String>,
    #[serde(rename = "templateURL")]
    pub template_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<StackTag>,
    pub permissions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StackTag {
    pub key: String,
    pub value: String,
}

pub async fn create_stack(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateStackRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(stack_name), Some(template_url), Some(permissions)) = (
        &payload.stack_name,
        &payload.template_url,
        &payload.permissions,
    ) else {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    };

    let mut req = state
        .aws
        .cloudformation(&state.config.home_region)
        .create_stack()
        .stack_name(stack_name)
        .template_url(template_url)
        .capabilities(Capability::from(permissions.as_str()));
    for tag in payload
        .tags
        .iter()
        .filter(|t| !t.key.is_empty() && !t.value.is_empty())
    {
        req = req.tags(Tag::builder().key(&tag.key).value(&tag.value).build()?);
    }

    let resp = req.send().await.map_err(ApiError::aws)?;
    Ok(Json(json!({ "stackId": resp.stack_id() })))
}

/// CloudFormation templates stored under templates/ in the template bucket.
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let bucket = state.config.template_bucket.as_deref().ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!("TEMPLATE_BUCKET is not configured"))
    })?;
    let region = &state.config.home_region;

    let resp = state
        .aws
        .s3(region)
        .list_objects_v2()
        .bucket(bucket)
        .prefix("templates/")
        .send()
        .await
        .map_err(ApiError::aws)?;

    let templates: Vec<Value> = resp
        .contents()
        .iter()
        .filter_map(|obj| obj.key())
        .filter(|key| key.ends_with(".yaml") || key.ends_with(".json"))
        .map(|key| {
            json!({
                "name": key.trim_start_matches("templates/"),
                "url": format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
            })
        })
        .collect();

    Ok(Json(json!({ "templates": templates })))
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlRequest {
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
}

/// 60-second presigned PUT URL for uploading a template.
pub async fn upload_url(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UploadUrlRequest>,
) -> Result<Json<Value>, ApiError> {
    let file_name = payload
        .file_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing fileName".into()))?;
    let bucket = state.config.template_bucket.as_deref().ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!("TEMPLATE_BUCKET is not configured"))
    })?;
    let region = &state.config.home_region;
    let key = format!("templates/{file_name}");

    let presigning = PresigningConfig::expires_in(Duration::from_secs(60))
        .map_err(anyhow::Error::new)?;
    let presigned = state
        .aws
        .s3(region)
        .put_object()
        .bucket(bucket)
        .key(&key)
        .content_type("application/octet-stream")
        .presigned(presigning)
        .await
        .map_err(ApiError::aws)?;

    Ok(Json(json!({
        "uploadURL": presigned.uri().to_string(),
        "fileUrl": format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
    })))
}
