use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Home region for account-scoped clients (DynamoDB, SES, Cost Explorer).
    pub home_region: String,
    /// Pending approval requests table.
    pub approval_table: String,
    /// Approved requests land here after an approve decision.
    pub approved_table: String,
    /// Sender address for approval emails. None disables notification.
    pub ses_from_email: Option<String>,
    /// Fallback reviewer address when the submission carries none.
    pub default_approver_email: String,
    /// Dashboard origin, used for CORS and the links embedded in emails.
    pub frontend_origin: String,
    /// Bucket holding documents served via /api/download-url.
    pub document_bucket: String,
    /// Bucket holding CloudFormation templates under templates/.
    pub template_bucket: Option<String>,
    /// Base URL of the automation (Ansible) API, probed by /automation/health.
    pub automation_api_url: Option<String>,
    /// Execution role attached to ECS task definitions created via /create-ecs.
    pub ecs_execution_role_arn: Option<String>,
    /// JSON file served verbatim by /api/data.
    pub data_file: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("CLOUDOPS_PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .unwrap_or(5000),
        home_region: std::env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "ap-south-1".into()),
        approval_table: std::env::var("DYNAMODB_APPROVAL_TABLE")
            .unwrap_or_else(|_| "approval_requests".into()),
        approved_table: std::env::var("DYNAMODB_APPROVED_TABLE")
            .unwrap_or_else(|_| "requests_approved".into()),
        ses_from_email: std::env::var("SES_FROM_EMAIL").ok(),
        default_approver_email: std::env::var("APPROVER_EMAIL")
            .unwrap_or_else(|_| "l2-approvals@example.com".into()),
        frontend_origin: std::env::var("FRONTEND_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".into()),
        document_bucket: std::env::var("DOCUMENT_BUCKET")
            .unwrap_or_else(|_| "cloudops-documents".into()),
        template_bucket: std::env::var("TEMPLATE_BUCKET").ok(),
        automation_api_url: std::env::var("AUTOMATION_API_URL").ok(),
        ecs_execution_role_arn: std::env::var("ECS_EXECUTION_ROLE_ARN").ok(),
        data_file: std::env::var("DASHBOARD_DATA_FILE")
            .unwrap_or_else(|_| "data/dashboard.json".into()),
    })
}
