//! `SeaORM` implementation of the `UserService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::SecurityConfig;
use crate::db::{NewUser, ProfileChanges, Store, User};
use crate::i18n::MessageKey;
use crate::services::image::{ImageError, ImageStore};
use crate::services::user_service::{
    ProfileUpdate, Registration, UserError, UserService, UserView,
};
use crate::services::validation::{
    Violation, validate_email, validate_password, validate_username,
};

pub struct SeaOrmUserService {
    store: Store,
    images: Arc<ImageStore>,
    security: SecurityConfig,

    /// Serializes the commit-then-discard section so racing updates to the
    /// same user keep last-writer-wins and never delete the file the live
    /// record points at.
    commit_lock: Mutex<()>,
}

impl SeaOrmUserService {
    #[must_use]
    pub fn new(store: Store, images: Arc<ImageStore>, security: SecurityConfig) -> Self {
        Self {
            store,
            images,
            security,
            commit_lock: Mutex::new(()),
        }
    }

    async fn registration_violations(
        &self,
        registration: &Registration,
    ) -> Result<Vec<Violation>, UserError> {
        let mut violations = Vec::new();

        match registration.username.as_deref() {
            None => violations.push(Violation::new("username", MessageKey::UsernameRequired)),
            Some(username) => {
                if let Some(violation) = validate_username(username) {
                    violations.push(violation);
                } else if self.store.find_user_by_username(username).await?.is_some() {
                    violations.push(Violation::new("username", MessageKey::UsernameTaken));
                }
            }
        }

        match registration.email.as_deref() {
            None => violations.push(Violation::new("email", MessageKey::EmailRequired)),
            Some(email) => {
                if let Some(violation) = validate_email(email) {
                    violations.push(violation);
                } else if self.store.find_user_by_email(email).await?.is_some() {
                    violations.push(Violation::new("email", MessageKey::EmailInUse));
                }
            }
        }

        match registration.password.as_deref() {
            None => violations.push(Violation::new("password", MessageKey::PasswordRequired)),
            Some(password) => violations.extend(validate_password(password)),
        }

        Ok(violations)
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(&self, registration: Registration) -> Result<UserView, UserError> {
        let violations = self.registration_violations(&registration).await?;
        if !violations.is_empty() {
            return Err(UserError::Validation(violations));
        }

        let new_user = NewUser {
            username: registration.username.unwrap_or_default(),
            email: registration.email.unwrap_or_default(),
            password: registration.password.unwrap_or_default(),
            inactive: false,
        };

        let user = self
            .store
            .create_user(new_user, Some(&self.security))
            .await?;

        tracing::info!(user_id = user.id, "User registered");

        Ok(UserView::from(user))
    }

    async fn update_profile(
        &self,
        user: &User,
        update: ProfileUpdate,
    ) -> Result<UserView, UserError> {
        let mut violations = Vec::new();
        if let Some(username) = update.username.as_deref() {
            violations.extend(validate_username(username));
        }
        if let Some(email) = update.email.as_deref() {
            violations.extend(validate_email(email));
        }
        if !violations.is_empty() {
            return Err(UserError::Validation(violations));
        }

        // The new file is written before anything is committed; an image
        // failure aborts the whole update with nothing persisted.
        let new_image = match update.image.as_deref() {
            Some(payload) => Some(self.images.store(payload).await.map_err(image_failure)?),
            None => None,
        };

        let changes = ProfileChanges {
            username: update.username,
            email: update.email,
            image: new_image,
        };

        // Commit the new reference, then discard the displaced file, in that
        // order. The lock keeps the pair atomic relative to other updates of
        // the same store.
        let _guard = self.commit_lock.lock().await;

        let (updated, displaced) = self.store.update_user_profile(user.id, changes).await?;

        if let Some(old) = displaced {
            if updated.image.as_deref() != Some(old.as_str()) {
                self.images.discard(&old).await;
            }
        }

        Ok(UserView::from(updated))
    }
}

fn image_failure(err: ImageError) -> UserError {
    match err {
        ImageError::PayloadTooLarge => {
            UserError::Validation(vec![Violation::new("image", MessageKey::ProfileImageSize)])
        }
        // An undecodable payload cannot be any allow-listed type, so it
        // reads as an unsupported file too.
        ImageError::UnsupportedType | ImageError::InvalidPayload => {
            UserError::Validation(vec![Violation::new(
                "image",
                MessageKey::UnsupportedImageFile,
            )])
        }
        ImageError::Io(e) => UserError::Internal(format!("Image storage failed: {e}")),
    }
}
