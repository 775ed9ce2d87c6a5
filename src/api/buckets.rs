use std::sync::Arc;

use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration,
    PublicAccessBlockConfiguration, Tag, Tagging, VersioningConfiguration,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::AppState;

static BUCKET_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9.-]{3,63}$").unwrap_or_else(|_| unreachable!("static pattern"))
});

pub fn is_valid_bucket_name(name: &str) -> bool {
    BUCKET_NAME.is_match(name)
}

pub async fn list_buckets(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .s3(&region)
        .list_buckets()
        .send()
        .await
        .map_err(ApiError::aws)?;
    let names: Vec<&str> = resp.buckets().iter().filter_map(|b| b.name()).collect();
    Ok(Json(json!(names)))
}

#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    #[serde(default = "default_true")]
    pub block_public_access: bool,
    #[serde(default)]
    pub versioning: bool,
    #[serde(default)]
    pub tags: Vec<BucketTag>,
}

#[derive(Debug, Deserialize)]
pub struct BucketTag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

fn default_true() -> bool {
    true
}

pub async fn create_bucket(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBucketRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (Some(bucket_name), Some(region)) = (&payload.bucket_name, &payload.region) else {
        return Err(ApiError::BadRequest(
            "bucket_name and region are required".into(),
        ));
    };
    if !is_valid_bucket_name(bucket_name) {
        return Err(ApiError::BadRequest("Invalid bucket name".into()));
    }

    let s3 = state.aws.s3(region);
    let mut req = s3.create_bucket().bucket(bucket_name);
    // us-east-1 is the default location and must not be sent as a constraint.
    if region != "us-east-1" {
        req = req.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region.as_str()))
                .build(),
        );
    }
    req.send().await.map_err(ApiError::aws)?;

    if payload.block_public_access {
        s3.put_public_access_block()
            .bucket(bucket_name)
            .public_access_block_configuration(
                PublicAccessBlockConfiguration::builder()
                    .block_public_acls(true)
                    .ignore_public_acls(true)
                    .block_public_policy(true)
                    .restrict_public_buckets(true)
                    .build(),
            )
            .send()
            .await
            .map_err(ApiError::aws)?;
    }

    if payload.versioning {
        s3.put_bucket_versioning()
            .bucket(bucket_name)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .map_err(ApiError::aws)?;
    }

    if !payload.tags.is_empty() {
        let mut tag_set = Tagging::builder();
        for tag in &payload.tags {
            tag_set = tag_set.tag_set(Tag::builder().key(&tag.key).value(&tag.value).build()?);
        }
        s3.put_bucket_tagging()
            .bucket(bucket_name)
            .tagging(tag_set.build()?)
            .send()
            .await
            .map_err(ApiError::aws)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": format!("S3 bucket {bucket_name} created successfully"),
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::is_valid_bucket_name;

    #[test]
    fn accepts_typical_names() {
        assert!(is_valid_bucket_name("my-bucket"));
        assert!(is_valid_bucket_name("logs.2024"));
        assert!(is_valid_bucket_name("abc"));
    }

    #[test]
    fn rejects_length_violations() {
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name(&"a".repeat(64)));
        assert!(is_valid_bucket_name(&"a".repeat(63)));
    }

    #[test]
    fn rejects_uppercase_and_other_characters() {
        assert!(!is_valid_bucket_name("MyBucket"));
        assert!(!is_valid_bucket_name("my_bucket"));
        assert!(!is_valid_bucket_name("my bucket"));
    }
}
