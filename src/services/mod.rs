//! Business workflows shared by the HTML routes, the JSON API, the worker and
//! the admin CLI. Every function takes its repository as a generic `R` bounded
//! by the narrow reader/writer traits it needs.

use chrono::{NaiveDateTime, Utc};
use thiserror::Error;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::campaign::CampaignStateError;
use crate::domain::types::{TypeConstraintError, UserId};
use crate::forms::FormError;
use crate::models::config::ServerConfig;
use crate::models::zmq::WorkerMessage;
use crate::repository::errors::RepositoryError;
use crate::zmq::WorkerNotifier;

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod campaigns;
pub mod contacts;
pub mod delivery;
pub mod email_configs;
pub mod export;
pub mod import;
pub mod lists;
pub mod maintenance;
pub mod templates;
pub mod tracking;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Form(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    LimitExceeded(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("invalid value: {0}")]
    TypeConstraint(String),

    #[error("internal error")]
    Internal,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ServiceError::NotFound,
            RepositoryError::ConstraintViolation(message) => {
                log::warn!("Constraint violation: {message}");
                ServiceError::Conflict("A record with these values already exists".to_string())
            }
            RepositoryError::ValidationError(message) => ServiceError::TypeConstraint(message),
            other => {
                log::error!("Repository error: {other}");
                ServiceError::Internal
            }
        }
    }
}

impl From<TypeConstraintError> for ServiceError {
    fn from(err: TypeConstraintError) -> Self {
        ServiceError::TypeConstraint(err.to_string())
    }
}

impl From<FormError> for ServiceError {
    fn from(err: FormError) -> Self {
        ServiceError::Form(err.to_string())
    }
}

impl From<CampaignStateError> for ServiceError {
    fn from(err: CampaignStateError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

/// Current UTC time without offset, as stored in the database.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Tenant id of the signed-in user.
pub fn owner_id(user: &AuthenticatedUser) -> ServiceResult<UserId> {
    user.user_id().map_err(|_| ServiceError::Unauthorized)
}

pub fn ensure_super_admin(user: &AuthenticatedUser) -> ServiceResult<()> {
    if user.is_super_admin() {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized)
    }
}

/// Public site details used when composing links and platform mail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Site {
    pub base_url: String,
    pub platform_name: String,
}

impl Site {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl From<&ServerConfig> for Site {
    fn from(config: &ServerConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            platform_name: config.platform_name.clone(),
        }
    }
}

/// Pushes a message to the worker. The worker also polls, so a lost message
/// only delays delivery.
pub(crate) fn notify_worker<N>(notifier: &N, message: &WorkerMessage)
where
    N: WorkerNotifier + ?Sized,
{
    if let Err(err) = notifier.notify(message) {
        log::warn!("Failed to notify worker: {err}");
    }
}

#[cfg(all(test, feature = "test-mocks"))]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::auth::{ROLE_SUPER_ADMIN, ROLE_USER};

    pub(crate) fn client_user() -> AuthenticatedUser {
        AuthenticatedUser {
            sub: "1".to_string(),
            email: "marie@techstartup.cm".to_string(),
            name: "Marie Kouam".to_string(),
            roles: vec![ROLE_USER.to_string()],
            exp: 0,
        }
    }

    pub(crate) fn admin_user() -> AuthenticatedUser {
        AuthenticatedUser {
            sub: "99".to_string(),
            email: "admin@afrimailpro.com".to_string(),
            name: "Platform Admin".to_string(),
            roles: vec![ROLE_USER.to_string(), ROLE_SUPER_ADMIN.to_string()],
            exp: 0,
        }
    }

    pub(crate) fn site() -> Site {
        Site {
            base_url: "https://app.afrimailpro.com".to_string(),
            platform_name: "AfriMail Pro".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_map_to_user_facing_variants() {
        assert!(matches!(
            ServiceError::from(RepositoryError::NotFound),
            ServiceError::NotFound
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::ConstraintViolation("unique".into())),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::ConnectionError("down".into())),
            ServiceError::Internal
        ));
    }

    #[test]
    fn campaign_state_errors_keep_their_message() {
        let err = ServiceError::from(CampaignStateError::NoRecipients);
        assert_eq!(err.to_string(), "Campaign has no recipients");
    }

    #[test]
    fn site_urls_join_paths() {
        let site = Site {
            base_url: "http://localhost:8080/".into(),
            platform_name: "AfriMail Pro".into(),
        };
        assert_eq!(site.url("/track/open/x/"), "http://localhost:8080/track/open/x/");
    }
}
