use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref UPPER_RE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref LOWER_RE: Regex = Regex::new(r"[a-z]").unwrap();
    static ref DIGIT_OR_SYMBOL_RE: Regex = Regex::new(r"[\d\W]").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Digit or symbol, an uppercase and a lowercase letter, at least six chars.
pub(crate) fn is_strong_password(password: &str) -> bool {
    DIGIT_OR_SYMBOL_RE.is_match(password)
        && UPPER_RE.is_match(password)
        && LOWER_RE.is_match(password)
}

pub(crate) fn check_email(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || !is_valid_email(email) {
        return Err(AppError::validation("email must be an email"));
    }
    Ok(())
}

pub(crate) fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "Password minimal length should be 6 symbols",
        ));
    }
    if !is_strong_password(password) {
        return Err(AppError::validation("Password is too weak"));
    }
    Ok(())
}

pub(crate) fn check_token(token: &str) -> Result<(), AppError> {
    uuid::Uuid::parse_str(token)
        .map(|_| ())
        .map_err(|_| AppError::validation("token must be a UUID"))
}
