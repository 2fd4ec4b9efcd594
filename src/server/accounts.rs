use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::extract::{JsonBody, SessionAuth};
use super::AppState;
use crate::error::AppResult;
use crate::identity::{LoginOutcome, LoginRequest, RegisterRequest};

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    state.accounts.register(&req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "User registered successfully!" }))))
}

/// Bad credentials are a 200 with `success: false`, not an error status.
pub async fn login(State(state): State<AppState>, JsonBody(req): JsonBody<LoginRequest>) -> AppResult<Json<Value>> {
    let body = match state.accounts.login(&req).await? {
        LoginOutcome::Success { token, name } => {
            json!({ "success": true, "message": "Login successful!", "token": token, "name": name })
        }
        LoginOutcome::UnknownUser => json!({ "success": false, "message": "User not found" }),
        LoginOutcome::BadPassword => json!({ "success": false, "message": "Invalid credentials" }),
    };
    Ok(Json(body))
}

pub async fn get_api_key(State(state): State<AppState>, SessionAuth(principal): SessionAuth) -> AppResult<Json<Value>> {
    let key = state.accounts.get_api_key(&principal).await?;
    Ok(Json(json!({ "apiKey": key })))
}

pub async fn generate_api_key(
    State(state): State<AppState>,
    SessionAuth(principal): SessionAuth,
) -> AppResult<Json<Value>> {
    let key = state.accounts.generate_api_key(&principal).await?;
    Ok(Json(json!({ "apiKey": key })))
}
