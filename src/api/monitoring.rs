use std::sync::Arc;

use aws_sdk_cloudwatch::types::{Dimension, StateValue, Statistic};
use axum::extract::{Path, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::api::rfc3339;
use crate::errors::ApiError;
use crate::AppState;

/// Alarms currently in the ALARM state.
pub async fn list_alarms(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let resp = state
        .aws
        .cloudwatch(&region)
        .describe_alarms()
        .state_value(StateValue::Alarm)
        .send()
        .await
        .map_err(ApiError::aws)?;

    let alarms: Vec<Value> = resp
        .metric_alarms()
        .iter()
        .map(|alarm| {
            json!({
                "name": alarm.alarm_name().unwrap_or(""),
                "metric": alarm.metric_name().unwrap_or(""),
                "dimensions": alarm
                    .dimensions()
                    .iter()
                    .map(|d| json!({ "Name": d.name(), "Value": d.value() }))
                    .collect::<Vec<_>>(),
                "region": region,
                "state": alarm.state_value().map_or("", |s| s.as_str()),
                "reason": alarm.state_reason().unwrap_or(""),
                "lastUpdated": alarm
                    .state_updated_timestamp()
                    .and_then(rfc3339)
                    .unwrap_or_default(),
            })
        })
        .collect();
    Ok(Json(Value::Array(alarms)))
}

/// Last hour of CPUUtilization averages at 5-minute resolution, sorted by
/// timestamp so the frontend can chart them directly.
pub async fn instance_metrics(
    State(state): State<Arc<AppState>>,
    Path((region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let start = now - Duration::hours(1);

    let resp = state
        .aws
        .cloudwatch(&region)
        .get_metric_statistics()
        .namespace("AWS/EC2")
        .metric_name("CPUUtilization")
        .dimensions(
            Dimension::builder()
                .name("InstanceId")
                .value(&instance_id)
                .build()?,
        )
        .start_time(aws_smithy_types::DateTime::from_secs(start.timestamp()))
        .end_time(aws_smithy_types::DateTime::from_secs(now.timestamp()))
        .period(300)
        .statistics(Statistic::Average)
        .send()
        .await
        .map_err(ApiError::aws)?;

    let mut points: Vec<(String, f64)> = resp
        .datapoints()
        .iter()
        .filter_map(|p| {
            let ts = p.timestamp().and_then(rfc3339)?;
            Some((ts, p.average()?))
        })
        .collect();
    points.sort_by(|a, b| a.0.cmp(&b.0));

    let series: Vec<Value> = points
        .into_iter()
        .map(|(x, y)| json!({ "x": x, "y": y }))
        .collect();
    Ok(Json(json!({ "CPUUtilization": series })))
}
