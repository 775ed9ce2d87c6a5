use anyhow::Context;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client;

use crate::models::approval::ApprovalRequest;

/// Emails the reviewer when an approval request is submitted.
///
/// Notification is best effort: when no sender address is configured the
/// notifier logs and does nothing, and callers treat a send failure as
/// non-fatal since the request record already exists.
pub struct EmailNotifier {
    client: Client,
    from_address: Option<String>,
    frontend_origin: String,
}

impl EmailNotifier {
    pub fn new(client: Client, from_address: Option<String>, frontend_origin: String) -> Self {
        Self {
            client,
            from_address,
            frontend_origin,
        }
    }

    pub async fn send_approval_request(
        &self,
        to_email: &str,
        request: &ApprovalRequest,
    ) -> anyhow::Result<()> {
        let Some(from) = &self.from_address else {
            tracing::debug!(
                request_id = %request.request_id,
                "SES_FROM_EMAIL not set, skipping approval email"
            );
            return Ok(());
        };

        let subject = format!("Approval Request Submitted: {}", request.request_id);
        let body_text = self.render_body(request);

        let content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(Content::builder().data(subject).build()?)
                    .body(
                        Body::builder()
                            .text(Content::builder().data(body_text).build()?)
                            .build(),
                    )
                    .build()?,
            )
            .build();

        self.client
            .send_email()
            .from_email_address(from)
            .destination(Destination::builder().to_addresses(to_email).build())
            .content(content)
            .send()
            .await
            .with_context(|| format!("sending approval email to {to_email}"))?;

        tracing::info!(request_id = %request.request_id, to = to_email, "approval email sent");
        Ok(())
    }

    fn render_body(&self, request: &ApprovalRequest) -> String {
        let field = |key: &str| {
            request
                .details
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string()
        };
        format!(
            "Ticket ID: {ticket}\n\n\
             Request ID: {id}\n\
             Priority: {priority}\n\
             Reason: {reason}\n\n\
             To approve this request, click the link below:\n\
             {origin}/approval/approve/{id}\n\n\
             To reject this request, click the link below:\n\
             {origin}/approval/reject/{id}\n",
            ticket = field("ticketId"),
            id = request.request_id,
            priority = field("priority"),
            reason = field("reason"),
            origin = self.frontend_origin,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::{BehaviorVersion, Region, SdkConfig};
    use serde_json::json;

    fn notifier(from: Option<String>) -> EmailNotifier {
        let sdk = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("ap-south-1"))
            .build();
        EmailNotifier::new(
            Client::new(&sdk),
            from,
            "http://localhost:3000".to_string(),
        )
    }

    fn sample_request() -> ApprovalRequest {
        ApprovalRequest::new(
            "terminate".into(),
            "i-0abc123".into(),
            "ap-south-1".into(),
            "ops@example.com".into(),
            json!({"ticketId": "INC-42", "priority": "high", "reason": "cost cleanup"}),
        )
    }

    #[test]
    fn body_carries_decision_links_and_details() {
        let n = notifier(Some("noreply@example.com".into()));
        let request = sample_request();
        let body = n.render_body(&request);

        assert!(body.contains("Ticket ID: INC-42"));
        assert!(body.contains("Priority: high"));
        assert!(body.contains(&format!(
            "http://localhost:3000/approval/approve/{}",
            request.request_id
        )));
        assert!(body.contains(&format!(
            "http://localhost:3000/approval/reject/{}",
            request.request_id
        )));
    }

    #[test]
    fn missing_detail_fields_render_as_dashes() {
        let n = notifier(Some("noreply@example.com".into()));
        let mut request = sample_request();
        request.details = json!({});
        let body = n.render_body(&request);
        assert!(body.contains("Ticket ID: -"));
        assert!(body.contains("Reason: -"));
    }

    #[tokio::test]
    async fn unconfigured_sender_is_a_no_op() {
        let n = notifier(None);
        n.send_approval_request("l2@example.com", &sample_request())
            .await
            .unwrap();
    }
}
