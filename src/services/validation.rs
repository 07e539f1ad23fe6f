use crate::i18n::MessageKey;

/// A single field-level validation failure. Violations accumulate across
/// fields rather than short-circuiting on the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: MessageKey,
}

impl Violation {
    #[must_use]
    pub const fn new(field: &'static str, message: MessageKey) -> Self {
        Self { field, message }
    }
}

pub fn validate_username(username: &str) -> Option<Violation> {
    let length = username.chars().count();
    if !(4..=32).contains(&length) {
        return Some(Violation::new("username", MessageKey::UsernameSize));
    }
    None
}

pub fn validate_email(email: &str) -> Option<Violation> {
    if !is_plausible_email(email) {
        return Some(Violation::new("email", MessageKey::EmailInvalid));
    }
    None
}

pub fn validate_password(password: &str) -> Option<Violation> {
    if password.chars().count() < 6 {
        return Some(Violation::new("password", MessageKey::PasswordSize));
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Some(Violation::new("password", MessageKey::PasswordPattern));
    }

    None
}

/// Shape check only: one `@`, non-empty local part, domain with a dot and no
/// whitespace. Deliverability is not this layer's problem.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.split('.').all(|label| !label.is_empty())
}
