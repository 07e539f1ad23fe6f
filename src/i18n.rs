//! Localization boundary.
//!
//! The core never formats user-facing prose; it selects a [`MessageKey`] and
//! the HTTP layer asks a [`Localizer`] to render it for the locale requested
//! via `Accept-Language`. The built-in catalog is English; unknown locales
//! fall back to it.

/// Failure-kind keys the core can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    AuthenticationFailure,
    InactiveAccount,
    UnauthorizedUserUpdate,
    ValidationFailure,
    InternalFailure,
    UsernameRequired,
    UsernameSize,
    UsernameTaken,
    EmailRequired,
    EmailInvalid,
    EmailInUse,
    PasswordRequired,
    PasswordSize,
    PasswordPattern,
    ProfileImageSize,
    UnsupportedImageFile,
}

/// Renders a message key for a requested locale.
pub trait Localizer: Send + Sync {
    fn message(&self, locale: &str, key: MessageKey) -> String;
}

/// Built-in English catalog. Ignores the locale argument entirely, which
/// doubles as the fallback behavior for locales without a catalog.
pub struct EnglishCatalog;

impl Localizer for EnglishCatalog {
    fn message(&self, _locale: &str, key: MessageKey) -> String {
        english(key).to_string()
    }
}

const fn english(key: MessageKey) -> &'static str {
    match key {
        MessageKey::AuthenticationFailure => "Incorrect credentials",
        MessageKey::InactiveAccount => "Account is inactive",
        MessageKey::UnauthorizedUserUpdate => "You are not authorized to update user",
        MessageKey::ValidationFailure => "Validation failure",
        MessageKey::InternalFailure => "An internal error occurred",
        MessageKey::UsernameRequired => "Username is required",
        MessageKey::UsernameSize => "Must have min 4 and max 32 characters",
        MessageKey::UsernameTaken => "Username is already taken",
        MessageKey::EmailRequired => "E-mail is required",
        MessageKey::EmailInvalid => "E-mail is not valid",
        MessageKey::EmailInUse => "E-mail already in use",
        MessageKey::PasswordRequired => "Password is required",
        MessageKey::PasswordSize => "Password must have at least 6 characters",
        MessageKey::PasswordPattern => {
            "Password must have at least 1 uppercase, 1 lowercase letter and 1 number"
        }
        MessageKey::ProfileImageSize => "Your profile image cannot be bigger than 2MB",
        MessageKey::UnsupportedImageFile => "Only JPEG or PNG files are allowed",
    }
}

/// First language tag of an `Accept-Language` header, lowercased, quality
/// weights stripped. Absent or unreadable headers come back as "en".
#[must_use]
pub fn requested_locale(header: Option<&str>) -> String {
    header
        .and_then(|value| value.split(',').next())
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .unwrap_or_else(|| "en".to_string())
}
