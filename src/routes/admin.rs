//! Super-admin panel.

use actix_web::{HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::dto::analytics::UsersQuery;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{base_context, redirect, redirect_with_error, render_template};
use crate::services::{self, ServiceError, now};

const USERS_PATH: &str = "/admin-panel/users";

fn admin_error(err: ServiceError) -> HttpResponse {
    match err {
        ServiceError::Unauthorized => {
            FlashMessage::error("You do not have access to the admin panel.").send();
            redirect("/")
        }
        other => redirect_with_error(other, "/"),
    }
}

#[get("/admin-panel/")]
pub async fn admin_index(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let stats = match services::admin::system_statistics(repo.get_ref(), &user, now()) {
        Ok(stats) => stats,
        Err(err) => return admin_error(err),
    };
    let mut context = base_context(&flash_messages, Some(&user), "admin", &config);
    context.insert("stats", &stats);
    render_template(&tera, "admin/index.html", &context)
}

#[get("/admin-panel/users")]
pub async fn admin_users(
    user: AuthenticatedUser,
    query: web::Query<UsersQuery>,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let page = match services::admin::list_users(repo.get_ref(), &user, query.into_inner()) {
        Ok(page) => page,
        Err(err) => return admin_error(err),
    };
    let mut context = base_context(&flash_messages, Some(&user), "admin-users", &config);
    context.insert("page", &page);
    render_template(&tera, "admin/users.html", &context)
}

fn toggle_user(
    repo: &DieselRepository,
    user: &AuthenticatedUser,
    target_id: i32,
    active: bool,
) -> HttpResponse {
    match services::admin::set_user_active(repo, user, target_id, active) {
        Ok(()) => {
            let verb = if active { "activated" } else { "deactivated" };
            FlashMessage::success(format!("User {verb}.")).send();
            redirect(USERS_PATH)
        }
        Err(ServiceError::Unauthorized) => admin_error(ServiceError::Unauthorized),
        Err(err) => redirect_with_error(err, USERS_PATH),
    }
}

#[post("/admin-panel/users/{id:\\d+}/activate")]
pub async fn activate_user(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    toggle_user(&repo, &user, id.into_inner(), true)
}

#[post("/admin-panel/users/{id:\\d+}/deactivate")]
pub async fn deactivate_user(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    toggle_user(&repo, &user, id.into_inner(), false)
}

#[get("/admin-panel/system-stats")]
pub async fn system_stats(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let stats = match services::admin::system_statistics(repo.get_ref(), &user, now()) {
        Ok(stats) => stats,
        Err(err) => return admin_error(err),
    };
    let mut context = base_context(&flash_messages, Some(&user), "admin-stats", &config);
    context.insert("stats", &stats);
    render_template(&tera, "admin/system_stats.html", &context)
}

#[get("/admin-panel/email-logs")]
pub async fn email_logs(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let logs = match services::admin::email_logs(repo.get_ref(), &user) {
        Ok(logs) => logs,
        Err(err) => return admin_error(err),
    };
    let mut context = base_context(&flash_messages, Some(&user), "admin-logs", &config);
    context.insert("logs", &logs);
    render_template(&tera, "admin/email_logs.html", &context)
}
