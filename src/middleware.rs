//! Actix middleware: login redirects for HTML pages and API usage accounting.

use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::time::Instant;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::{StatusCode, header};
use actix_web::middleware::Next;
use actix_web::{Error, HttpResponse, web};

use crate::domain::analytics::NewApiUsage;
use crate::domain::user::RequestMeta;
use crate::identity::current_user;
use crate::repository::{AnalyticsWriter, DieselRepository};

pub const LOGIN_PATH: &str = "/auth/login";

/// Turns `401 Unauthorized` responses into a redirect to the login page.
pub struct RedirectUnauthorized;

impl<S, B> Transform<S, ServiceRequest> for RedirectUnauthorized
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RedirectUnauthorizedMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RedirectUnauthorizedMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RedirectUnauthorizedMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RedirectUnauthorizedMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let res = service.call(req).await?;
            if res.status() != StatusCode::UNAUTHORIZED {
                return Ok(res.map_into_left_body());
            }
            let (req, _) = res.into_parts();
            let redirect = HttpResponse::SeeOther()
                .insert_header((header::LOCATION, LOGIN_PATH))
                .finish()
                .map_into_right_body();
            Ok(ServiceResponse::new(req, redirect))
        })
    }
}

/// Client address and agent as recorded in activity and usage logs.
pub fn request_meta(req: &actix_web::HttpRequest) -> RequestMeta {
    let forwarded = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());
    let ip_address =
        forwarded.or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()));
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    RequestMeta {
        ip_address,
        user_agent,
    }
}

/// Records one `ApiUsage` row per `/api` request. Failures are logged only.
pub async fn record_api_usage(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let started = Instant::now();
    let endpoint = req.path().to_string();
    let method = req.method().to_string();
    let meta = request_meta(req.request());
    let repo = req.app_data::<web::Data<DieselRepository>>().cloned();

    let res = next.call(req).await?;

    if let Some(repo) = repo {
        let usage = NewApiUsage {
            user_id: current_user(res.request()).and_then(|user| user.user_id().ok()),
            endpoint,
            method,
            status_code: i32::from(res.status().as_u16()),
            response_time_ms: i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX),
            ip_address: meta.ip_address,
        };
        if let Err(err) = repo.record_api_usage(&usage) {
            log::warn!("Failed to record API usage for {}: {err}", usage.endpoint);
        }
    }
    Ok(res)
}
