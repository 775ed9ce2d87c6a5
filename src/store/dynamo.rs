use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, from_items, to_item};

use crate::errors::ApiError;
use crate::models::approval::{ApprovalRequest, ApprovalStatus};

/// DynamoDB-backed approval workflow.
///
/// Pending requests live in one table keyed by `request_id`; approving a
/// request copies it into the approved table and then deletes the pending
/// record, so a crash between the two writes leaves the request visible in
/// both tables rather than lost.
#[derive(Clone)]
pub struct ApprovalStore {
    client: Client,
    pending_table: String,
    approved_table: String,
}

impl ApprovalStore {
    pub fn new(client: Client, pending_table: String, approved_table: String) -> Self {
        Self {
            client,
            pending_table,
            approved_table,
        }
    }

    /// True if a pending request already exists for this instance in this
    /// region. The tables carry no secondary index, so this is a scan.
    pub async fn has_pending(&self, instance_id: &str, region: &str) -> Result<bool, ApiError> {
        let resp = self
            .client
            .scan()
            .table_name(&self.pending_table)
            .filter_expression("instance_id = :iid AND #r = :region AND #s = :pending")
            .expression_attribute_names("#r", "region")
            .expression_attribute_names("#s", "status")
            .expression_attribute_values(":iid", AttributeValue::S(instance_id.to_string()))
            .expression_attribute_values(":region", AttributeValue::S(region.to_string()))
            .expression_attribute_values(
                ":pending",
                AttributeValue::S(ApprovalStatus::Pending.as_str().to_string()),
            )
            .send()
            .await
            .map_err(ApiError::aws)?;

        Ok(!resp.items().is_empty())
    }

    pub async fn insert(&self, request: &ApprovalRequest) -> Result<(), ApiError> {
        let item = to_item(request)?;
        self.client
            .put_item()
            .table_name(&self.pending_table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(ApiError::aws)?;
        Ok(())
    }

    pub async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, ApiError> {
        let resp = self
            .client
            .scan()
            .table_name(&self.pending_table)
            .filter_expression("#s = :s")
            .expression_attribute_names("#s", "status")
            .expression_attribute_values(
                ":s",
                AttributeValue::S(ApprovalStatus::Pending.as_str().to_string()),
            )
            .send()
            .await
            .map_err(ApiError::aws)?;

        Ok(from_items(resp.items().to_vec())?)
    }

    pub async fn get(&self, request_id: &str) -> Result<Option<ApprovalRequest>, ApiError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.pending_table)
            .key("request_id", AttributeValue::S(request_id.to_string()))
            .send()
            .await
            .map_err(ApiError::aws)?;

        match resp.item {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    /// Move a pending request into the approved table. Returns false when the
    /// request is unknown or was already decided.
    pub async fn approve(&self, request_id: &str) -> Result<bool, ApiError> {
        let Some(mut request) = self.get(request_id).await? else {
            return Ok(false);
        };
        request.status = ApprovalStatus::Approved;

        let item = to_item(&request)?;
        self.client
            .put_item()
            .table_name(&self.approved_table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(ApiError::aws)?;

        self.client
            .delete_item()
            .table_name(&self.pending_table)
            .key("request_id", AttributeValue::S(request_id.to_string()))
            .send()
            .await
            .map_err(ApiError::aws)?;

        Ok(true)
    }

    /// Flip a pending request to rejected in place. Returns false when no such
    /// request exists, so a reject can never materialize a ghost record.
    pub async fn reject(&self, request_id: &str) -> Result<bool, ApiError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.pending_table)
            .key("request_id", AttributeValue::S(request_id.to_string()))
            .update_expression("SET #s = :s")
            .condition_expression("attribute_exists(request_id)")
            .expression_attribute_names("#s", "status")
            .expression_attribute_values(
                ":s",
                AttributeValue::S(ApprovalStatus::Rejected.as_str().to_string()),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                use aws_smithy_types::error::metadata::ProvideErrorMetadata;
                if err.code() == Some("ConditionalCheckFailedException") {
                    Ok(false)
                } else {
                    Err(ApiError::aws(err))
                }
            }
        }
    }

    pub async fn list_approved(&self) -> Result<Vec<ApprovalRequest>, ApiError> {
        let resp = self
            .client
            .scan()
            .table_name(&self.approved_table)
            .send()
            .await
            .map_err(ApiError::aws)?;

        Ok(from_items(resp.items().to_vec())?)
    }

    pub async fn remove_approved(&self, request_id: &str) -> Result<(), ApiError> {
        self.client
            .delete_item()
            .table_name(&self.approved_table)
            .key("request_id", AttributeValue::S(request_id.to_string()))
            .send()
            .await
            .map_err(ApiError::aws)?;
        Ok(())
    }
}
