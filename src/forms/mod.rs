//! Form definitions backing the HTML routes and the JSON API.

use std::fmt::Display;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use validator::ValidationErrors;

use crate::domain::types::TypeConstraintError;
use crate::domain::user::PasswordStrengthError;

pub mod auth;
pub mod campaigns;
pub mod contacts;
pub mod email_configs;
pub mod lists;
pub mod templates;

#[derive(Debug, Error)]
/// Errors that can occur when processing form data.
pub enum FormError {
    #[error("validation errors: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("invalid name")]
    InvalidName,

    #[error("invalid phone number")]
    InvalidPhoneNumber,

    #[error("invalid url")]
    InvalidUrl,

    #[error("invalid domain name")]
    InvalidDomain,

    #[error("invalid color")]
    InvalidColor,

    #[error("invalid id")]
    InvalidId,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("{0}")]
    WeakPassword(#[from] PasswordStrengthError),

    #[error("invalid CSV file: {0}")]
    Csv(String),
}

impl From<TypeConstraintError> for FormError {
    fn from(err: TypeConstraintError) -> Self {
        match err {
            TypeConstraintError::NonPositiveId => FormError::InvalidId,
            TypeConstraintError::InvalidEmail => FormError::InvalidEmail,
            TypeConstraintError::EmptyString => FormError::InvalidName,
            TypeConstraintError::InvalidPhone => FormError::InvalidPhoneNumber,
            TypeConstraintError::InvalidUrl => FormError::InvalidUrl,
            TypeConstraintError::InvalidDomain => FormError::InvalidDomain,
            TypeConstraintError::InvalidColor => FormError::InvalidColor,
            TypeConstraintError::InvalidValue(value) => FormError::InvalidValue(value),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

/// Checkbox value: HTML sends `on`, JSON sends a boolean.
pub(crate) fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = Option::<RawFlag>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawFlag::Bool(value)) => value,
        Some(RawFlag::Text(text)) => matches!(
            text.trim().to_lowercase().as_str(),
            "on" | "true" | "1" | "yes"
        ),
        None => false,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Text(String),
}

/// Optional number where an empty select or input means "none".
pub(crate) fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64> + std::str::FromStr,
    <T as TryFrom<i64>>::Error: Display,
    <T as std::str::FromStr>::Err: Display,
{
    match Option::<RawNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawNumber::Int(value)) => T::try_from(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(RawNumber::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse().map(Some).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// Trims and sanitizes free text, turning blanks into `None`.
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| ammonia::clean(v.trim()).trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trims a value without sanitizing it, turning blanks into `None`.
pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses `datetime-local` inputs and plain SQL timestamps.
pub(crate) fn parse_datetime(value: &str) -> Result<NaiveDateTime, FormError> {
    let value = value.trim();
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| FormError::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "checkbox")]
        flag: bool,
        #[serde(default, deserialize_with = "optional_number")]
        list_id: Option<i32>,
    }

    #[test]
    fn html_checkbox_and_empty_select() {
        let parsed: Sample = serde_html_form::from_str("flag=on&list_id=").unwrap();
        assert!(parsed.flag);
        assert_eq!(parsed.list_id, None);

        let parsed: Sample = serde_html_form::from_str("list_id=7").unwrap();
        assert!(!parsed.flag);
        assert_eq!(parsed.list_id, Some(7));
    }

    #[test]
    fn json_booleans_and_numbers() {
        let parsed: Sample = serde_json::from_str(r#"{"flag": true, "list_id": 3}"#).unwrap();
        assert!(parsed.flag);
        assert_eq!(parsed.list_id, Some(3));
    }

    #[test]
    fn datetime_inputs_accept_browser_format() {
        let parsed = parse_datetime("2025-06-01T09:30").unwrap();
        assert_eq!(parsed.to_string(), "2025-06-01 09:30:00");
        assert!(parse_datetime("tomorrow").is_err());
    }

    #[test]
    fn clean_text_strips_markup_and_blanks() {
        assert_eq!(clean_text(Some("  <script>x</script>ok ".into())), Some("ok".into()));
        assert_eq!(clean_text(Some("   ".into())), None);
    }
}
