use actix_web::{HttpResponse, Responder, get, web};
use actix_web_flash_messages::IncomingFlashMessages;
use serde_json::json;
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::dto::analytics::AnalyticsQuery;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{base_context, redirect_with_error, render_template};
use crate::services::{self, now};

#[get("/")]
pub async fn dashboard(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let dashboard = match services::analytics::dashboard(repo.get_ref(), &user, now()) {
        Ok(dashboard) => dashboard,
        Err(err) => {
            log::error!("Failed to load dashboard for {}: {err}", user.email);
            return HttpResponse::InternalServerError().finish();
        }
    };
    let mut context = base_context(&flash_messages, Some(&user), "dashboard", &config);
    context.insert("dashboard", &dashboard);
    render_template(&tera, "main/dashboard.html", &context)
}

#[get("/analytics")]
pub async fn analytics(
    user: AuthenticatedUser,
    query: web::Query<AnalyticsQuery>,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let overview =
        match services::analytics::analytics_overview(repo.get_ref(), &user, query.days, now()) {
            Ok(overview) => overview,
            Err(err) => return redirect_with_error(err, "/"),
        };
    let mut context = base_context(&flash_messages, Some(&user), "analytics", &config);
    context.insert("overview", &overview);
    render_template(&tera, "main/analytics.html", &context)
}

/// Progressive web app manifest.
#[get("/manifest.json")]
pub async fn manifest(config: web::Data<ServerConfig>) -> impl Responder {
    HttpResponse::Ok()
        .content_type("application/manifest+json")
        .json(json!({
            "name": config.platform_name,
            "short_name": "AfriMail",
            "description": "Email marketing platform for African businesses",
            "start_url": "/",
            "display": "standalone",
            "background_color": "#ffffff",
            "theme_color": "#1E40AF",
            "icons": [
                {"src": "/assets/icons/icon-192.png", "sizes": "192x192", "type": "image/png"},
                {"src": "/assets/icons/icon-512.png", "sizes": "512x512", "type": "image/png"}
            ]
        }))
}
