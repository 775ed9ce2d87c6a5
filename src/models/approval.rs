use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an approval request.
///
/// Stored lowercase in DynamoDB; the duplicate-pending guard and the
/// pending/approved listings key off the serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

/// A request for an L2 engineer to sign off on a destructive instance action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: String,
    /// Action awaiting approval, e.g. "terminate" or "resize".
    pub action: String,
    pub instance_id: String,
    pub region: String,
    pub requested_by: String,
    pub status: ApprovalStatus,
    /// Free-form context supplied by the requester (target instance type, …).
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        action: String,
        instance_id: String,
        region: String,
        requested_by: String,
        details: serde_json::Value,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            action,
            instance_id,
            region,
            requested_by,
            status: ApprovalStatus::Pending,
            details,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ApprovalStatus::Pending).unwrap(),
            json!("pending")
        );
        assert_eq!(
            serde_json::to_value(ApprovalStatus::Rejected).unwrap(),
            json!("rejected")
        );
        let parsed: ApprovalStatus = serde_json::from_value(json!("approved")).unwrap();
        assert_eq!(parsed, ApprovalStatus::Approved);
    }

    #[test]
    fn new_request_starts_pending_with_a_uuid() {
        let req = ApprovalRequest::new(
            "terminate".into(),
            "i-0abc123".into(),
            "ap-south-1".into(),
            "ops@example.com".into(),
            json!({}),
        );
        assert_eq!(req.status, ApprovalStatus::Pending);
        assert!(Uuid::parse_str(&req.request_id).is_ok());
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = ApprovalRequest::new(
            "resize".into(),
            "i-0abc123".into(),
            "us-east-1".into(),
            "ops@example.com".into(),
            json!({"new_instance_type": "t3.large"}),
        );
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["status"], json!("pending"));
        assert_eq!(value["details"]["new_instance_type"], json!("t3.large"));
        let back: ApprovalRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back.request_id, req.request_id);
        assert_eq!(back.timestamp, req.timestamp);
    }
}
