//! CloudOps dashboard API — library crate.
//!
//! The binary in `main.rs` and the integration tests in `tests/` both build
//! their state through [`AppState`].

pub mod api;
pub mod aws;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod notification;
pub mod store;

use aws_config::SdkConfig;
use serde_json::json;

/// Shared application state passed to handlers.
pub struct AppState {
    pub aws: aws::AwsClients,
    pub approvals: store::ApprovalStore,
    pub mailer: notification::EmailNotifier,
    pub http: reqwest::Client,
    pub dashboard_data: serde_json::Value,
    pub config: config::Config,
}

impl AppState {
    /// Resolve AWS credentials from the environment and assemble the state.
    pub async fn connect(config: config::Config) -> Self {
        let aws = aws::AwsClients::connect(&config.home_region).await;
        Self::assemble(config, aws)
    }

    /// Assemble state from an already-built SDK config. Tests use this with a
    /// hand-built config so no credential resolution happens.
    pub fn from_parts(config: config::Config, sdk: SdkConfig) -> Self {
        Self::assemble(config, aws::AwsClients::new(sdk))
    }

    fn assemble(config: config::Config, aws: aws::AwsClients) -> Self {
        let approvals = store::ApprovalStore::new(
            aws.dynamodb(),
            config.approval_table.clone(),
            config.approved_table.clone(),
        );
        let mailer = notification::EmailNotifier::new(
            aws.ses(),
            config.ses_from_email.clone(),
            config.frontend_origin.clone(),
        );
        let dashboard_data = load_dashboard_data(&config.data_file);
        Self {
            aws,
            approvals,
            mailer,
            http: reqwest::Client::new(),
            dashboard_data,
            config,
        }
    }
}

/// Read the mock dashboard dataset once at startup. A missing or malformed
/// file logs a warning and serves an empty object instead of failing boot.
pub fn load_dashboard_data(path: &str) -> serde_json::Value {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("mock data file {path} is not valid JSON: {err}");
                json!({})
            }
        },
        Err(err) => {
            tracing::warn!("mock data file {path} unavailable: {err}");
            json!({})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::load_dashboard_data;

    #[test]
    fn missing_data_file_serves_empty_object() {
        let value = load_dashboard_data("/nonexistent/data.json");
        assert_eq!(value, serde_json::json!({}));
    }
}
