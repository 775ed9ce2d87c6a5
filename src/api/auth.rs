use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::models::user;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(Json(payload): Json<LoginRequest>) -> Result<Json<Value>, ApiError> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::InvalidCredentials);
    };
    match user::check_credentials(&email, &password) {
        Some(account) => Ok(Json(json!({
            "message": "Login successful",
            "email": email,
            "role": account.role,
        }))),
        None => Err(ApiError::InvalidCredentials),
    }
}

pub async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logged out" }))
}
