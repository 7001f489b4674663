//! Session identity: the signed-in user travels as HS256 JWT claims, either in
//! the identity cookie (HTML pages) or in an `Authorization: Bearer` header
//! (JSON API).

use actix_identity::Identity;
use actix_web::dev::Payload;
use actix_web::error::{ErrorInternalServerError, ErrorUnauthorized};
use actix_web::http::header;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, web};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::user::User;
use crate::models::config::ServerConfig;

pub fn encode_token(
    claims: &AuthenticatedUser,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_token(
    token: &str,
    secret: &str,
) -> Result<AuthenticatedUser, jsonwebtoken::errors::Error> {
    decode::<AuthenticatedUser>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Claims for `user` expiring after the configured session lifetime.
pub fn claims_for(user: &User, session_hours: i64) -> AuthenticatedUser {
    let exp = Utc::now() + Duration::hours(session_hours.max(1));
    AuthenticatedUser::from_user(user, usize::try_from(exp.timestamp()).unwrap_or_default())
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

/// A signed-in session: the bearer token and the claims it carries.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: AuthenticatedUser,
}

/// Attaches a fresh session to the request.
pub fn sign_in(req: &HttpRequest, user: &User, config: &ServerConfig) -> Result<Session, Error> {
    let claims = claims_for(user, config.session_hours);
    let token = encode_token(&claims, &config.secret).map_err(|err| {
        log::error!("Failed to sign session token: {err}");
        ErrorInternalServerError("session error")
    })?;
    Identity::login(&req.extensions(), token.clone()).map_err(|err| {
        log::error!("Failed to attach identity: {err}");
        ErrorInternalServerError("session error")
    })?;
    Ok(Session {
        token,
        user: claims,
    })
}

/// Resolves the caller without failing; used by middleware and public pages.
pub fn current_user(req: &HttpRequest) -> Option<AuthenticatedUser> {
    let config = req.app_data::<web::Data<ServerConfig>>()?;
    let token = match bearer_token(req) {
        Some(token) => token,
        None => Identity::extract(req).into_inner().ok()?.id().ok()?,
    };
    decode_token(&token, &config.secret).ok()
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = std::future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        std::future::ready(current_user(req).ok_or_else(|| ErrorUnauthorized("unauthorized")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::UserRole;
    use crate::domain::user::tests::sample_user;

    #[test]
    fn tokens_carry_claims() {
        let claims = claims_for(&sample_user(UserRole::SuperAdmin), 2);
        let token = encode_token(&claims, "secret").unwrap();

        let decoded = decode_token(&token, "secret").unwrap();
        assert_eq!(decoded, claims);
        assert!(decoded.is_super_admin());
        assert!(decode_token(&token, "other").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut claims = claims_for(&sample_user(UserRole::Client), 1);
        claims.exp = 1;
        let token = encode_token(&claims, "secret").unwrap();
        assert!(decode_token(&token, "secret").is_err());
    }
}
