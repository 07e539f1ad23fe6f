use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Client-visible failure for one request.
///
/// Authentication and forbidden bodies stay opaque (a message, nothing
/// else); validation carries the accumulated per-field violations. Every
/// variant keeps the request path for the response body.
#[derive(Debug)]
pub enum ApiError {
    /// 401 — bad or missing login credentials.
    Authentication { path: String, message: String },

    /// 403 — authenticated but not allowed to act on this resource. One
    /// shape for every cause, by design.
    Forbidden { path: String, message: String },

    /// 400 — field-level violations, field name mapped to a localized
    /// message.
    Validation {
        path: String,
        message: String,
        errors: BTreeMap<String, String>,
    },

    /// 500 — unexpected repository/storage failure. The detail is logged,
    /// never sent.
    Internal { path: String, message: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    path: String,
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_errors: Option<BTreeMap<String, String>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Authentication { message, .. } => write!(f, "Authentication: {}", message),
            ApiError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
            ApiError::Validation { errors, .. } => {
                write!(f, "Validation failure ({} fields)", errors.len())
            }
            ApiError::Internal { message, .. } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, path, message, validation_errors) = match self {
            ApiError::Authentication { path, message } => {
                (StatusCode::UNAUTHORIZED, path, message, None)
            }
            ApiError::Forbidden { path, message } => (StatusCode::FORBIDDEN, path, message, None),
            ApiError::Validation {
                path,
                message,
                errors,
            } => (StatusCode::BAD_REQUEST, path, message, Some(errors)),
            ApiError::Internal { path, message } => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    path,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            message,
            path,
            timestamp: chrono::Utc::now().timestamp_millis(),
            validation_errors,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_carries_field_errors() {
        let mut errors = BTreeMap::new();
        errors.insert("username".to_string(), "too short".to_string());

        let response = ApiError::Validation {
            path: "/api/1.0/users/1".to_string(),
            message: "Validation failure".to_string(),
            errors,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_detail_is_not_sent_to_the_client() {
        let response = ApiError::Internal {
            path: "/api/1.0/users/1".to_string(),
            message: "db on fire".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
