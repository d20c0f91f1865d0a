//! Authentication middleware.
//!
//! The UI calls the agent with the same bearer token it uses against the
//! hosted API. The token is not validated here; it is remembered so queued
//! actions are delivered on behalf of the signed-in user.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Caller identity extracted from the request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The bearer token, if the caller sent one
    pub token: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ").trim().to_string();
                if token.is_empty() {
                    return Err(AppError::Unauthorized);
                }

                state.tokens.set(token.clone());
                Ok(AuthUser { token: Some(token) })
            }
            Some(_) => Err(AppError::Unauthorized),
            // Anonymous callers rely on the service token for delivery
            None => Ok(AuthUser { token: None }),
        }
    }
}
