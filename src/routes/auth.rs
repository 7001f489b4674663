use actix_identity::Identity;
use actix_web::{HttpRequest, HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::forms::auth::{
    ChangePasswordForm, EmailOnlyForm, LoginForm, ProfileForm, RegisterForm, ResetPasswordForm,
};
use crate::identity::{current_user, sign_in};
use crate::middleware::{LOGIN_PATH, request_meta};
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    base_context, flash_outcome, redirect, redirect_with_error, render_template,
};
use crate::services::{self, Site};
use crate::zmq::ZmqSender;

const PROFILE_PATH: &str = "/auth/profile";

fn public_page(
    req: &HttpRequest,
    flash_messages: &IncomingFlashMessages,
    tera: &Tera,
    config: &ServerConfig,
    template: &str,
    page: &str,
) -> HttpResponse {
    let context = base_context(flash_messages, current_user(req).as_ref(), page, config);
    render_template(tera, template, &context)
}

#[get("/auth/login")]
pub async fn show_login(
    req: HttpRequest,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    if current_user(&req).is_some() {
        return redirect("/");
    }
    public_page(&req, &flash_messages, &tera, &config, "auth/login.html", "login")
}

#[post("/auth/login")]
pub async fn login(
    req: HttpRequest,
    repo: web::Data<DieselRepository>,
    config: web::Data<ServerConfig>,
    web::Form(form): web::Form<LoginForm>,
) -> impl Responder {
    let user = match services::auth::login(repo.get_ref(), form, &request_meta(&req)) {
        Ok(user) => user,
        Err(err) => return redirect_with_error(err, LOGIN_PATH),
    };
    match sign_in(&req, &user, &config) {
        Ok(_) => {
            FlashMessage::success(format!("Welcome back, {}!", user.short_name())).send();
            redirect("/")
        }
        Err(_) => HttpResponse::InternalServerError().finish(),
    }
}

#[post("/auth/logout")]
pub async fn logout(
    req: HttpRequest,
    identity: Identity,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    if let Err(err) = services::auth::logout(repo.get_ref(), &user, &request_meta(&req)) {
        log::warn!("Failed to record logout of {}: {err}", user.email);
    }
    identity.logout();
    FlashMessage::info("You have been logged out.").send();
    redirect(LOGIN_PATH)
}

#[get("/auth/register")]
pub async fn show_register(
    req: HttpRequest,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    public_page(&req, &flash_messages, &tera, &config, "auth/register.html", "register")
}

#[post("/auth/register")]
pub async fn register(
    req: HttpRequest,
    repo: web::Data<DieselRepository>,
    notifier: web::Data<ZmqSender>,
    config: web::Data<ServerConfig>,
    web::Form(form): web::Form<RegisterForm>,
) -> impl Responder {
    let site = Site::from(config.get_ref());
    match services::auth::register(
        repo.get_ref(),
        notifier.get_ref(),
        &site,
        form,
        &request_meta(&req),
    ) {
        Ok(_) => {
            FlashMessage::success(
                "Registration successful. Please check your email to verify your account.",
            )
            .send();
            redirect(LOGIN_PATH)
        }
        Err(err) => redirect_with_error(err, "/auth/register"),
    }
}

#[get("/auth/verify-email/{token}/")]
pub async fn verify_email(
    token: web::Path<String>,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    flash_outcome(
        services::auth::verify_email(repo.get_ref(), &token),
        "Your email has been verified. You can now log in.",
        LOGIN_PATH,
    )
}

#[get("/auth/resend-verification")]
pub async fn show_resend_verification(
    req: HttpRequest,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    public_page(
        &req,
        &flash_messages,
        &tera,
        &config,
        "auth/resend_verification.html",
        "resend-verification",
    )
}

#[post("/auth/resend-verification")]
pub async fn resend_verification(
    repo: web::Data<DieselRepository>,
    notifier: web::Data<ZmqSender>,
    config: web::Data<ServerConfig>,
    web::Form(form): web::Form<EmailOnlyForm>,
) -> impl Responder {
    let site = Site::from(config.get_ref());
    match services::auth::resend_verification(repo.get_ref(), notifier.get_ref(), &site, &form.email)
    {
        Ok(()) => {
            FlashMessage::info(
                "If an unverified account exists for this email, a new link has been sent.",
            )
            .send();
            redirect(LOGIN_PATH)
        }
        Err(err) => redirect_with_error(err, "/auth/resend-verification"),
    }
}

#[get("/auth/password-reset")]
pub async fn show_password_reset(
    req: HttpRequest,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    public_page(
        &req,
        &flash_messages,
        &tera,
        &config,
        "auth/password_reset.html",
        "password-reset",
    )
}

#[post("/auth/password-reset")]
pub async fn password_reset(
    req: HttpRequest,
    repo: web::Data<DieselRepository>,
    notifier: web::Data<ZmqSender>,
    config: web::Data<ServerConfig>,
    web::Form(form): web::Form<EmailOnlyForm>,
) -> impl Responder {
    let site = Site::from(config.get_ref());
    if let Err(err) = services::auth::request_password_reset(
        repo.get_ref(),
        notifier.get_ref(),
        &site,
        &form.email,
        &request_meta(&req),
    ) {
        log::error!("Password reset request failed: {err}");
    }
    FlashMessage::info("If an account exists for this email, a reset link has been sent.").send();
    redirect(LOGIN_PATH)
}

#[get("/auth/password-reset/{token}/")]
pub async fn show_password_reset_confirm(
    req: HttpRequest,
    token: web::Path<String>,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    if let Err(err) = services::auth::check_reset_token(repo.get_ref(), &token) {
        return redirect_with_error(err, "/auth/password-reset");
    }
    let mut context = base_context(
        &flash_messages,
        current_user(&req).as_ref(),
        "password-reset",
        &config,
    );
    context.insert("token", token.as_str());
    render_template(&tera, "auth/password_reset_confirm.html", &context)
}

#[post("/auth/password-reset/{token}/")]
pub async fn password_reset_confirm(
    token: web::Path<String>,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<ResetPasswordForm>,
) -> impl Responder {
    match services::auth::reset_password(repo.get_ref(), &token, form) {
        Ok(()) => {
            FlashMessage::success("Your password has been reset. You can now log in.").send();
            redirect(LOGIN_PATH)
        }
        Err(err) => redirect_with_error(err, &format!("/auth/password-reset/{token}/")),
    }
}

#[get("/auth/profile")]
pub async fn show_profile(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let data = match services::auth::load_profile(repo.get_ref(), &user) {
        Ok(data) => data,
        Err(err) => return redirect_with_error(err, "/"),
    };
    let mut context = base_context(&flash_messages, Some(&user), "profile", &config);
    context.insert("profile", &data);
    render_template(&tera, "auth/profile.html", &context)
}

#[post("/auth/profile")]
pub async fn update_profile(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<ProfileForm>,
) -> impl Responder {
    flash_outcome(
        services::auth::update_profile(repo.get_ref(), &user, form, &request_meta(&req)),
        "Profile updated.",
        PROFILE_PATH,
    )
}

#[post("/auth/change-password")]
pub async fn change_password(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<ChangePasswordForm>,
) -> impl Responder {
    flash_outcome(
        services::auth::change_password(repo.get_ref(), &user, form, &request_meta(&req)),
        "Your password has been changed.",
        PROFILE_PATH,
    )
}
