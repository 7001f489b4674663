//! Public endpoints hit from inside delivered emails.

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::IncomingFlashMessages;
use tera::Tera;

use crate::middleware::request_meta;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::contacts::UnsubscribeForm;
use crate::routes::{base_context, render_template, user_message};
use crate::services::tracking::TRACKING_PIXEL;
use crate::services::{self, now};

#[get("/track/open/{token}/")]
pub async fn track_open(
    req: HttpRequest,
    token: web::Path<String>,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    if let Err(err) =
        services::tracking::record_open(repo.get_ref(), &token, &request_meta(&req), now())
    {
        log::warn!("Ignoring open for token {token}: {err}");
    }
    HttpResponse::Ok()
        .content_type("image/gif")
        .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
        .body(TRACKING_PIXEL.to_vec())
}

#[get("/track/click/{token}/")]
pub async fn track_click(
    req: HttpRequest,
    token: web::Path<String>,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    match services::tracking::record_click(repo.get_ref(), &token, &request_meta(&req), now()) {
        Ok(url) => HttpResponse::Found()
            .insert_header((header::LOCATION, url))
            .finish(),
        Err(err) => {
            log::warn!("Rejected click for token {token}: {err}");
            HttpResponse::NotFound().body("Invalid tracking link")
        }
    }
}

fn unsubscribe_page(
    req: &HttpRequest,
    token: &str,
    reason: Option<String>,
    repo: &DieselRepository,
    flash_messages: &IncomingFlashMessages,
    config: &ServerConfig,
    tera: &Tera,
) -> HttpResponse {
    let mut context = base_context(flash_messages, None, "unsubscribe", config);
    match services::tracking::unsubscribe(repo, token, reason, &request_meta(req), now()) {
        Ok(contact) => {
            context.insert("email", contact.email.as_str());
            context.insert("token", token);
        }
        Err(err) => {
            log::warn!("Unsubscribe with token {token} failed: {err}");
            context.insert("error", &user_message(&err));
        }
    }
    render_template(tera, "tracking/unsubscribe.html", &context)
}

/// One-click unsubscribe; repeating it is harmless.
#[get("/unsubscribe/{token}/")]
pub async fn unsubscribe(
    req: HttpRequest,
    token: web::Path<String>,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    unsubscribe_page(&req, &token, None, &repo, &flash_messages, &config, &tera)
}

/// Form post from the unsubscribe page, optionally with a reason.
#[post("/unsubscribe/{token}/")]
pub async fn unsubscribe_with_reason(
    req: HttpRequest,
    token: web::Path<String>,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
    web::Form(form): web::Form<UnsubscribeForm>,
) -> impl Responder {
    unsubscribe_page(&req, &token, form.reason, &repo, &flash_messages, &config, &tera)
}
