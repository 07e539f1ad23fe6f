//! Domain service for credential verification, token issuance and
//! ownership authorization.

use serde::Serialize;
use thiserror::Error;

use crate::db::User;

/// Errors specific to authentication and authorization.
///
/// The variants are deliberately coarse: `InvalidCredentials` covers unknown
/// email and wrong password alike, and `Forbidden` covers missing token, bad
/// token, wrong user and inactive account without distinction. Collapsing
/// these denies callers an enumeration oracle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Incorrect credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    InactiveAccount,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Proof of identity accompanying a request.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`
    Token(String),
    /// HTTP Basic email/password pair
    Password { email: String, password: String },
}

/// Login result: the session token plus the public user fields.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub id: i32,
    pub username: String,
    pub token: String,
    pub image: Option<String>,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials, issues a session token and returns it with the
    /// user's public fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for unknown email or wrong
    /// password (indistinguishably), and [`AuthError::InactiveAccount`] when
    /// the credentials are right but the account is inactive.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Revokes a session token. Unknown tokens are ignored.
    async fn logout(&self, token: &str);

    /// Decides whether `credentials` may act on the user `target_user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] for every refusal: absent
    /// credentials, unresolvable token, unverifiable password, nonexistent
    /// target, ownership mismatch, or inactive account.
    async fn authorize(
        &self,
        credentials: Option<Credentials>,
        target_user_id: i32,
    ) -> Result<User, AuthError>;
}
