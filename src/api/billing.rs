use std::sync::Arc;
use std::time::Duration;

use aws_sdk_costexplorer::types::{
    AnomalyDateInterval, DateInterval, Granularity, GroupDefinition, GroupDefinitionType,
    MetricValue,
};
use aws_sdk_s3::presigning::PresigningConfig;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{Datelike, Months, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::errors::ApiError;
use crate::AppState;

/// Mock dataset loaded at startup and served unchanged.
pub async fn dashboard_data(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.dashboard_data.clone())
}

#[derive(Debug, Deserialize)]
pub struct BillingQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

fn fmt(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn metrics_json(metrics: &std::collections::HashMap<String, MetricValue>) -> Value {
    Value::Object(
        metrics
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    json!({ "Amount": v.amount(), "Unit": v.unit() }),
                )
            })
            .collect::<Map<String, Value>>(),
    )
}

/// Daily UnblendedCost grouped by service, in the Cost Explorer response
/// shape the dashboard's billing page consumes.
pub async fn billing_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BillingQuery>,
) -> Result<Json<Value>, ApiError> {
    let today = Utc::now().date_naive();
    let month_start = today.with_day(1).unwrap_or(today);
    let start = query.start.clone().unwrap_or_else(|| fmt(month_start));
    let end = query.end.clone().unwrap_or_else(|| fmt(today));

    let resp = state
        .aws
        .cost_explorer()
        .get_cost_and_usage()
        .time_period(DateInterval::builder().start(start).end(end).build()?)
        .granularity(Granularity::Daily)
        .metrics("UnblendedCost")
        .group_by(
            GroupDefinition::builder()
                .r#type(GroupDefinitionType::Dimension)
                .key("SERVICE")
                .build(),
        )
        .send()
        .await
        .map_err(ApiError::aws)?;

    let results: Vec<Value> = resp
        .results_by_time()
        .iter()
        .map(|r| {
            json!({
                "TimePeriod": r.time_period().map(|p| json!({
                    "Start": p.start(),
                    "End": p.end(),
                })),
                "Total": r.total().map(metrics_json),
                "Groups": r
                    .groups()
                    .iter()
                    .map(|g| json!({
                        "Keys": g.keys(),
                        "Metrics": g.metrics().map(metrics_json),
                    }))
                    .collect::<Vec<_>>(),
                "Estimated": r.estimated(),
            })
        })
        .collect();

    Ok(Json(json!({ "ResultsByTime": results })))
}

async fn period_total(
    ce: &aws_sdk_costexplorer::Client,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, ApiError> {
    let resp = ce
        .get_cost_and_usage()
        .time_period(
            DateInterval::builder()
                .start(fmt(start))
                .end(fmt(end))
                .build()?,
        )
        .granularity(Granularity::Monthly)
        .metrics("UnblendedCost")
        .send()
        .await
        .map_err(ApiError::aws)?;

    Ok(resp
        .results_by_time()
        .first()
        .and_then(|r| r.total())
        .and_then(|t| t.get("UnblendedCost"))
        .and_then(|m| m.amount())
        .and_then(|a| a.parse().ok())
        .unwrap_or(0.0))
}

/// Month-to-date spend, last month's spend, the month-over-month change, and
/// the Cost Anomaly Detection summary for the current month.
pub async fn anomaly_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let ce = state.aws.cost_explorer();

    let today = Utc::now().date_naive();
    let month_start = today.with_day(1).unwrap_or(today);
    let mtd_total = period_total(&ce, month_start, today).await?;

    let last_month_start = month_start
        .checked_sub_months(Months::new(1))
        .unwrap_or(month_start);
    let last_month_end = month_start.pred_opt().unwrap_or(month_start);
    let last_total = period_total(&ce, last_month_start, last_month_end).await?;

    let change = if last_total > 0.0 {
        (mtd_total - last_total) / last_total * 100.0
    } else {
        0.0
    };

    let anomalies = ce
        .get_anomalies()
        .date_interval(
            AnomalyDateInterval::builder()
                .start_date(fmt(month_start))
                .end_date(fmt(today))
                .build()?,
        )
        .max_results(100)
        .send()
        .await
        .map_err(ApiError::aws)?;

    let count = anomalies.anomalies().len();
    let impact: f64 = anomalies
        .anomalies()
        .iter()
        .filter_map(|a| a.impact())
        .map(|i| i.total_impact())
        .sum();

    Ok(Json(json!({
        "anomaly_count": count,
        "impact": impact,
        "total_spend": mtd_total,
        "change_percentage": change,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub key: Option<String>,
}

/// 30-second presigned GET URL for an object in the document bucket.
pub async fn download_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<Value>, ApiError> {
    let key = query
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing S3 object key".into()))?;

    let presigning = PresigningConfig::expires_in(Duration::from_secs(30))
        .map_err(anyhow::Error::new)?;
    let presigned = state
        .aws
        .s3(&state.config.home_region)
        .get_object()
        .bucket(&state.config.document_bucket)
        .key(&key)
        .presigned(presigning)
        .await
        .map_err(ApiError::aws)?;

    Ok(Json(json!({ "url": presigned.uri().to_string() })))
}
