use axum::{
    Json,
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, header},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::auth::{extract_bearer, requested_locale};
use super::{ApiError, AppState};
use crate::i18n::MessageKey;
use crate::services::{
    AuthError, Credentials, ProfileUpdate, Registration, UserError, UserView, Violation,
};

#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Base64-encoded replacement profile image.
    pub image: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// PUT /api/1.0/users/{id}
/// Update a user's own profile. Requires a bearer token or HTTP Basic
/// credentials belonging to that same, active user.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UserView>, ApiError> {
    let locale = requested_locale(&headers);
    let path = uri.path().to_string();

    let credentials = extract_credentials(&headers);

    let user = state
        .auth_service()
        .authorize(credentials, id)
        .await
        .map_err(|err| match err {
            AuthError::Internal(message) => ApiError::Internal {
                path: path.clone(),
                message,
            },
            // Everything else is one opaque refusal.
            _ => ApiError::Forbidden {
                path: path.clone(),
                message: state
                    .localizer()
                    .message(&locale, MessageKey::UnauthorizedUserUpdate),
            },
        })?;

    let body: UpdateUserRequest = parse_body(&state, &locale, &path, &body)?;
    let update = ProfileUpdate {
        username: body.username,
        email: body.email,
        image: body.image,
    };

    let view = state
        .user_service()
        .update_profile(&user, update)
        .await
        .map_err(|err| user_failure(&state, &locale, &path, err))?;

    Ok(Json(view))
}

/// POST /api/1.0/users
/// Register a new account. Field violations are accumulated and returned
/// together.
pub async fn register(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UserView>, ApiError> {
    let locale = requested_locale(&headers);
    let path = uri.path().to_string();

    let payload: RegisterRequest = parse_body(&state, &locale, &path, &body)?;

    let registration = Registration {
        username: payload.username,
        email: payload.email,
        password: payload.password,
    };

    let view = state
        .user_service()
        .register(registration)
        .await
        .map_err(|err| user_failure(&state, &locale, &path, err))?;

    Ok(Json(view))
}

/// Parse an optional JSON body. An empty body means "no fields"; a body that
/// is present but unreadable is a plain validation failure.
fn parse_body<T: DeserializeOwned + Default>(
    state: &AppState,
    locale: &str,
    path: &str,
    body: &Bytes,
) -> Result<T, ApiError> {
    if body.is_empty() {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|_| ApiError::Validation {
        path: path.to_string(),
        message: state
            .localizer()
            .message(locale, MessageKey::ValidationFailure),
        errors: BTreeMap::new(),
    })
}

fn user_failure(state: &AppState, locale: &str, path: &str, err: UserError) -> ApiError {
    match err {
        UserError::Validation(violations) => ApiError::Validation {
            path: path.to_string(),
            message: state
                .localizer()
                .message(locale, MessageKey::ValidationFailure),
            errors: localize_violations(state, locale, &violations),
        },
        UserError::Internal(message) => ApiError::Internal {
            path: path.to_string(),
            message,
        },
    }
}

fn localize_violations(
    state: &AppState,
    locale: &str,
    violations: &[Violation],
) -> BTreeMap<String, String> {
    violations
        .iter()
        .map(|violation| {
            (
                violation.field.to_string(),
                state.localizer().message(locale, violation.message),
            )
        })
        .collect()
}

/// Extract request credentials: bearer token first, HTTP Basic second.
/// Anything malformed reads as no credentials at all.
fn extract_credentials(headers: &HeaderMap) -> Option<Credentials> {
    if let Some(token) = extract_bearer(headers) {
        return Some(Credentials::Token(token));
    }

    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(encoded) = auth_str.strip_prefix("Basic ")
        && let Ok(decoded) = BASE64.decode(encoded.trim())
        && let Ok(pair) = String::from_utf8(decoded)
        && let Some((email, password)) = pair.split_once(':')
    {
        return Some(Credentials::Password {
            email: email.to_string(),
            password: password.to_string(),
        });
    }

    None
}
