//! Request extractors that reject with [`AppError`] so every failure keeps the same
//! JSON shape.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use super::AppState;
use crate::error::AppError;
use crate::identity::{bearer_token, Principal};
use crate::storage::Account;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Caller identified by `Authorization: Bearer <session token>`.
#[derive(Debug, Clone)]
pub struct SessionAuth(pub Principal);

impl FromRequestParts<AppState> for SessionAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;
        let claims = state.accounts.sessions().verify(token)?;
        Ok(SessionAuth(claims.principal()))
    }
}

/// Caller identified by the `x-api-key` header.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth(pub Account);

impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = parts.headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        Ok(ApiKeyAuth(state.keys.resolve(key).await?))
    }
}

/// `Json<T>` whose rejection is a 400 [`AppError`].
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(JsonBody(v)),
            Err(rej) => Err(AppError::user("invalid_body".to_string(), rej.body_text())),
        }
    }
}
