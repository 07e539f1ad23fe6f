use axum::{
    Json,
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode, header},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::i18n::{self, MessageKey};
use crate::services::AuthError;
use crate::services::LoginResult;
use crate::services::validation::validate_email;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/1.0/auth
/// Authenticate with email and password, returns a session token on success.
pub async fn login(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LoginResult>, ApiError> {
    let locale = requested_locale(&headers);
    let path = uri.path().to_string();

    let authentication_failure = || ApiError::Authentication {
        path: path.clone(),
        message: state
            .localizer()
            .message(&locale, MessageKey::AuthenticationFailure),
    };

    // An unreadable body, malformed email or empty password all read
    // exactly like wrong credentials, so probing the login endpoint yields
    // one shape.
    let payload: LoginRequest =
        serde_json::from_slice(&body).map_err(|_| authentication_failure())?;

    if validate_email(&payload.email).is_some() || payload.password.is_empty() {
        return Err(authentication_failure());
    }

    let result = state
        .auth_service()
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| match err {
            AuthError::InactiveAccount => ApiError::Forbidden {
                path: path.clone(),
                message: state
                    .localizer()
                    .message(&locale, MessageKey::InactiveAccount),
            },
            AuthError::Internal(message) => ApiError::Internal {
                path: path.clone(),
                message,
            },
            AuthError::InvalidCredentials | AuthError::Forbidden => ApiError::Authentication {
                path: path.clone(),
                message: state
                    .localizer()
                    .message(&locale, MessageKey::AuthenticationFailure),
            },
        })?;

    Ok(Json(result))
}

/// POST /api/1.0/logout
/// Revoke the bearer token, if any. Always 200, token valid or not.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = extract_bearer(&headers) {
        state.auth_service().logout(&token).await;
    }
    StatusCode::OK
}

/// Extract a bearer token from the Authorization header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

pub fn requested_locale(headers: &HeaderMap) -> String {
    i18n::requested_locale(
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok()),
    )
}
