//! HTTP handlers. HTML pages render Tera templates and report failures as
//! flash messages; the JSON API lives in [`api`].

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, ResponseError, get};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages, Level};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tera::{Context, Tera};

use crate::domain::auth::AuthenticatedUser;
use crate::forms::FormError;
use crate::middleware::LOGIN_PATH;
use crate::models::config::ServerConfig;
use crate::services::ServiceError;

pub mod admin;
pub mod api;
pub mod auth;
pub mod campaigns;
pub mod contacts;
pub mod email_configs;
pub mod lists;
pub mod main;
pub mod templates;
pub mod tracking;

pub fn alert_level_to_str(level: &Level) -> &'static str {
    match level {
        Level::Error => "danger",
        Level::Warning => "warning",
        Level::Success => "success",
        _ => "info",
    }
}

/// Context shared by every page: alerts, the signed-in user and site details.
pub fn base_context(
    flash_messages: &IncomingFlashMessages,
    user: Option<&AuthenticatedUser>,
    current_page: &str,
    config: &ServerConfig,
) -> Context {
    let alerts = flash_messages
        .iter()
        .map(|f| (f.content(), alert_level_to_str(&f.level())))
        .collect::<Vec<_>>();
    let mut context = Context::new();
    context.insert("alerts", &alerts);
    context.insert("current_user", &user);
    context.insert("current_page", current_page);
    context.insert("platform_name", &config.platform_name);
    context.insert("base_url", &config.base_url);
    context
}

pub fn render_template(tera: &Tera, template: &str, context: &Context) -> HttpResponse {
    match tera.render(template, context) {
        Ok(body) => HttpResponse::Ok().content_type("text/html").body(body),
        Err(err) => {
            log::error!("Failed to render template '{template}': {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Parses an urlencoded body, including repeated keys such as `list_ids=1&list_ids=2`.
pub fn parse_form<T: DeserializeOwned>(body: &[u8]) -> Result<T, FormError> {
    serde_html_form::from_bytes(body).map_err(|err| FormError::InvalidValue(err.to_string()))
}

/// Message shown to the user for a failed operation.
pub fn user_message(err: &ServiceError) -> String {
    match err {
        ServiceError::Internal => "Something went wrong. Please try again.".to_string(),
        ServiceError::NotFound => "The requested item was not found.".to_string(),
        other => other.to_string(),
    }
}

/// Flashes the error and redirects; unauthorized callers go to the login page.
pub fn redirect_with_error(err: ServiceError, location: &str) -> HttpResponse {
    if matches!(err, ServiceError::Unauthorized) {
        return redirect(LOGIN_PATH);
    }
    FlashMessage::error(user_message(&err)).send();
    redirect(location)
}

/// Flashes `success` or the error, then redirects to `location`.
pub fn flash_outcome<T>(
    result: Result<T, ServiceError>,
    success: &str,
    location: &str,
) -> HttpResponse {
    match result {
        Ok(_) => {
            FlashMessage::success(success).send();
            redirect(location)
        }
        Err(err) => redirect_with_error(err, location),
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Form(_) | ServiceError::TypeConstraint(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) | ServiceError::InvalidState(_) => StatusCode::CONFLICT,
            ServiceError::LimitExceeded(_) => StatusCode::FORBIDDEN,
            ServiceError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: user_message(self),
        })
    }
}

/// Old admin URL kept for bookmarks.
#[get("/admin/")]
pub async fn admin_redirect() -> HttpResponse {
    redirect("/admin-panel/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_levels_map_to_css_classes() {
        assert_eq!(alert_level_to_str(&Level::Error), "danger");
        assert_eq!(alert_level_to_str(&Level::Warning), "warning");
        assert_eq!(alert_level_to_str(&Level::Success), "success");
        assert_eq!(alert_level_to_str(&Level::Info), "info");
        assert_eq!(alert_level_to_str(&Level::Debug), "info");
    }

    #[test]
    fn service_errors_map_to_status_codes() {
        assert_eq!(ServiceError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServiceError::LimitExceeded("limit".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(user_message(&ServiceError::Internal), "Something went wrong. Please try again.");
    }

    #[test]
    fn repeated_keys_become_lists() {
        #[derive(serde::Deserialize)]
        struct Ids {
            list_ids: Vec<i32>,
        }
        let ids: Ids = parse_form(b"list_ids=1&list_ids=3").unwrap();
        assert_eq!(ids.list_ids, vec![1, 3]);
    }
}
