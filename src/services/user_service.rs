//! Domain service for user registration and profile updates.

use serde::Serialize;
use thiserror::Error;

use crate::db::User;
use crate::services::validation::Violation;

/// Errors specific to user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// One or more field-level violations, accumulated rather than
    /// fail-fast. Image failures surface here too, on the `image` field.
    #[error("Validation failure")]
    Validation(Vec<Violation>),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Registration input. Fields arrive optional so their absence can be
/// reported as an accumulated violation instead of a parse error.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A profile update request. Absent fields are left untouched; an absent
/// image keeps the existing stored file.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Base64-encoded replacement image payload.
    pub image: Option<String>,
}

/// The public view of a user: exactly these four fields, regardless of what
/// the repository row carries.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub image: Option<String>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            image: user.image,
        }
    }
}

/// Domain service trait for user registration and profile updates.
#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Creates an active account after accumulating field validation.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Validation`] carrying every violation found.
    async fn register(&self, registration: Registration) -> Result<UserView, UserError>;

    /// Applies a profile update for an already-authorized user.
    ///
    /// All-or-nothing: if any field or the image payload fails validation,
    /// nothing is persisted. A replaced image file is deleted only after
    /// the new reference is committed.
    async fn update_profile(
        &self,
        user: &User,
        update: ProfileUpdate,
    ) -> Result<UserView, UserError>;
}
