//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{Store, User};
use crate::services::auth_service::{AuthError, AuthService, Credentials, LoginResult};
use crate::services::token::TokenStore;

pub struct SeaOrmAuthService {
    store: Store,
    tokens: Arc<TokenStore>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, tokens: Arc<TokenStore>) -> Self {
        Self { store, tokens }
    }

    /// Resolve credentials to the user they identify, or `None`.
    ///
    /// Every failure mode (unresolvable token, unknown email, wrong
    /// password, vanished user row) comes back as `None` so `authorize`
    /// collapses them uniformly.
    async fn identify(&self, credentials: Credentials) -> Result<Option<User>, AuthError> {
        match credentials {
            Credentials::Token(token) => {
                let Some(user_id) = self.tokens.resolve(&token).await else {
                    return Ok(None);
                };
                Ok(self.store.find_user_by_id(user_id).await?)
            }
            Credentials::Password { email, password } => {
                Ok(self.store.verify_credentials(&email, &password).await?)
            }
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        let user = self
            .store
            .verify_credentials(email, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Verification succeeds for inactive accounts; rejecting them here
        // keeps "wrong credentials" and "inactive" distinguishable at the
        // login boundary while neither leaks account existence.
        if user.inactive {
            return Err(AuthError::InactiveAccount);
        }

        let token = self.tokens.issue(user.id).await;

        tracing::info!(user_id = user.id, "User logged in");

        Ok(LoginResult {
            id: user.id,
            username: user.username,
            token,
            image: user.image,
        })
    }

    async fn logout(&self, token: &str) {
        self.tokens.revoke(token).await;
    }

    async fn authorize(
        &self,
        credentials: Option<Credentials>,
        target_user_id: i32,
    ) -> Result<User, AuthError> {
        let Some(credentials) = credentials else {
            return Err(AuthError::Forbidden);
        };

        let user = self
            .identify(credentials)
            .await?
            .ok_or(AuthError::Forbidden)?;

        if user.id != target_user_id {
            return Err(AuthError::Forbidden);
        }

        if user.inactive {
            return Err(AuthError::Forbidden);
        }

        Ok(user)
    }
}
