//! Field checks shared by the services

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{ServiceError, ServiceResult};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("valid url pattern"));

/// Required text, trimmed, at most `max` characters when given
pub fn require_text(field: &str, value: &str, max: Option<usize>) -> ServiceResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("Please add a {}", field)));
    }
    max_len(field, trimmed, max)
}

/// Optional text within `max` characters
pub fn max_len(field: &str, value: &str, max: Option<usize>) -> ServiceResult<()> {
    match max {
        Some(max) if value.chars().count() > max => Err(ServiceError::validation(format!(
            "{} can not be more than {} characters",
            capitalize(field),
            max
        ))),
        _ => Ok(()),
    }
}

pub fn require_email(value: &str) -> ServiceResult<()> {
    if EMAIL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ServiceError::validation("Please add a valid email"))
    }
}

pub fn require_url(value: &str) -> ServiceResult<()> {
    if URL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "Please use a valid URL with HTTP or HTTPS",
        ))
    }
}

pub fn require_password(value: &str) -> ServiceResult<()> {
    if value.is_empty() {
        return Err(ServiceError::validation("Please add a password"));
    }
    if value.chars().count() < super::password::MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "Password must be at least {} characters",
            super::password::MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
