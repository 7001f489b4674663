//! Page and API payloads assembled by services for templates and JSON responses.

pub mod analytics;
pub mod auth;
pub mod campaigns;
pub mod contacts;
