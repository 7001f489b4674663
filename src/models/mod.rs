//! Diesel row types and their conversions into domain values.

use serde::de::DeserializeOwned;

use crate::domain::types::TypeConstraintError;

pub mod analytics;
pub mod campaign;
pub mod contact;
pub mod contact_list;
pub mod email_config;
pub mod event;
pub mod import;
pub mod queue;
pub mod template;
pub mod user;

#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod zmq;

/// Decodes a JSON text column.
pub(crate) fn parse_json<T: DeserializeOwned>(
    raw: &str,
    column: &str,
) -> Result<T, TypeConstraintError> {
    serde_json::from_str(raw)
        .map_err(|e| TypeConstraintError::InvalidValue(format!("{column}: {e}")))
}

/// Encodes a value for a JSON text column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
