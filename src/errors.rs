use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use aws_smithy_types::error::operation::BuildError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Matched verbatim by the dashboard frontend; keep the text (and the emoji)
/// stable.
pub const DUPLICATE_PENDING_MESSAGE: &str = "🚦 Approval already requested! Please wait for L2 \
     engineer to approve or reject your previous request before submitting again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    /// A pending approval already exists for the same (instance_id, region).
    #[error("approval already requested")]
    DuplicatePending,

    /// Failure reported by an AWS service call. The HTTP status is inferred
    /// from the service error code, falling back to the message text.
    #[error("{message}")]
    Aws {
        code: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Wrap an SDK failure, keeping the service error code when present.
    pub fn aws<E>(err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        let code = err.code().map(str::to_owned);
        let message = err
            .message()
            .map(str::to_owned)
            .unwrap_or_else(|| err.to_string());
        ApiError::Aws { code, message }
    }
}

impl From<BuildError> for ApiError {
    fn from(source: BuildError) -> Self {
        ApiError::Internal(anyhow::Error::new(source))
    }
}

impl From<serde_dynamo::Error> for ApiError {
    fn from(source: serde_dynamo::Error) -> Self {
        ApiError::Internal(anyhow::Error::new(source))
    }
}

/// Status inference for AWS failures: the original surface keyed off
/// substrings of the exception text, so the code and message are both probed.
fn aws_status(code: Option<&str>, message: &str) -> StatusCode {
    let probe = |needle: &str| {
        code.is_some_and(|c| c.contains(needle)) || message.contains(needle)
    };

    if probe("RequestExpired") || probe("ExpiredToken") {
        StatusCode::UNAUTHORIZED
    } else if probe("NotFound") || probe("NoSuchEntity") || probe("NoSuchBucket") {
        StatusCode::NOT_FOUND
    } else if probe("AccessDenied")
        || probe("UnauthorizedOperation")
        || probe("InvalidClientTokenId")
        || probe("AuthFailure")
    {
        StatusCode::FORBIDDEN
    } else if probe("Validation")
        || probe("InvalidParameter")
        || probe("MissingParameter")
        || probe("InvalidBucketName")
        || probe("AlreadyExists")
        || probe("AlreadyOwnedByYou")
    {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid credentials" }),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::DuplicatePending => (
                StatusCode::BAD_REQUEST,
                json!({ "error": true, "message": DUPLICATE_PENDING_MESSAGE }),
            ),
            ApiError::Aws { code, message } => {
                let status = aws_status(code.as_deref(), &message);
                if status == StatusCode::UNAUTHORIZED {
                    (
                        status,
                        json!({
                            "error": "AWS session has expired",
                            "message": "Please refresh your AWS credentials and try again"
                        }),
                    )
                } else {
                    if status == StatusCode::INTERNAL_SERVER_ERROR {
                        tracing::error!(code = ?code, "AWS call failed: {}", message);
                    }
                    (status, json!({ "error": message }))
                }
            }
            ApiError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": err.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_session_maps_to_401() {
        assert_eq!(
            aws_status(Some("RequestExpired"), "request has expired"),
            StatusCode::UNAUTHORIZED
        );
        // Substring match on the message alone, no structured code.
        assert_eq!(
            aws_status(None, "RequestExpired: please refresh"),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn missing_instance_maps_to_404() {
        assert_eq!(
            aws_status(
                Some("InvalidInstanceID.NotFound"),
                "The instance ID 'i-0abc' does not exist"
            ),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn denied_operations_map_to_403() {
        assert_eq!(
            aws_status(Some("UnauthorizedOperation"), "not authorized"),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            aws_status(Some("AccessDenied"), "denied"),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn unknown_codes_map_to_500() {
        assert_eq!(
            aws_status(Some("Throttling"), "rate exceeded"),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(aws_status(None, "dispatch failure"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn duplicate_pending_is_a_400_with_message_shape() {
        let resp = ApiError::DuplicatePending.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
