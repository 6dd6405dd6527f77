//! Field predicates for the sign-up screens.

use crate::domain::error::ValidationError;

pub const DEFAULT_EMAIL_SUFFIX: &str = "@sewanee.edu";
pub const MIN_PASSWORD_LEN: usize = 8;

/// Case-sensitive suffix match. General email syntax is not checked.
pub fn validate_email_domain(email: &str, suffix: &str) -> Result<(), ValidationError> {
    if email.ends_with(suffix) {
        Ok(())
    } else {
        Err(ValidationError::WrongDomain {
            institution: institution_name(suffix),
        })
    }
}

/// `@sewanee.edu` reads as "Sewanee". Falls back to the raw suffix.
pub fn institution_name(suffix: &str) -> String {
    let label = suffix
        .trim_start_matches('@')
        .split('.')
        .next()
        .unwrap_or_default();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => suffix.to_string(),
    }
}

/// Reports the first failing rule in order: length, lowercase, uppercase, digit.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let checklist = PasswordChecklist::evaluate(password);
    if !checklist.min_length {
        return Err(ValidationError::TooShort);
    }
    if !checklist.lowercase {
        return Err(ValidationError::MissingLowercase);
    }
    if !checklist.uppercase {
        return Err(ValidationError::MissingUppercase);
    }
    if !checklist.digit {
        return Err(ValidationError::MissingDigit);
    }
    Ok(())
}

pub fn validate_password_match(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password == confirm {
        Ok(())
    } else {
        Err(ValidationError::Mismatch)
    }
}

pub fn validate_full_name(full_name: &str) -> Result<(), ValidationError> {
    if full_name.trim().is_empty() {
        Err(ValidationError::EmptyName)
    } else {
        Ok(())
    }
}

/// Per-rule flags for the live requirement list on the password screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PasswordChecklist {
    pub min_length: bool,
    pub lowercase: bool,
    pub uppercase: bool,
    pub digit: bool,
}

impl PasswordChecklist {
    pub fn evaluate(password: &str) -> Self {
        Self {
            min_length: password.chars().count() >= MIN_PASSWORD_LEN,
            lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
            uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
            digit: password.chars().any(|c| c.is_ascii_digit()),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.min_length && self.lowercase && self.uppercase && self.digit
    }
}

/// Rule set the wizard is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    email_suffix: String,
}

impl ValidationRules {
    pub fn new(email_suffix: impl Into<String>) -> Self {
        Self {
            email_suffix: email_suffix.into(),
        }
    }

    pub fn check_basic_info(&self, full_name: &str, email: &str) -> Result<(), ValidationError> {
        validate_full_name(full_name)?;
        validate_email_domain(email, &self.email_suffix)
    }

    pub fn check_password(&self, password: &str, confirm: &str) -> Result<(), ValidationError> {
        validate_password(password)?;
        validate_password_match(password, confirm)
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::new(DEFAULT_EMAIL_SUFFIX)
    }
}
