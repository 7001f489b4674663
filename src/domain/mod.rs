//! Domain aggregates of the email marketing platform.

pub mod analytics;
pub mod auth;
pub mod campaign;
pub mod contact;
pub mod contact_list;
pub mod email_config;
pub mod event;
pub mod import;
pub mod queue;
pub mod template;
pub mod types;
pub mod user;
