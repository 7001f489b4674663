use actix_web::{HttpRequest, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use tera::Tera;

use crate::dns::DohVerifier;
use crate::domain::auth::AuthenticatedUser;
use crate::forms::email_configs::EmailConfigForm;
use crate::mailer::SmtpMailer;
use crate::middleware::request_meta;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    base_context, flash_outcome, parse_form, redirect, redirect_with_error, render_template,
};
use crate::services::{self, ServiceError, Site};

const CONFIGS_PATH: &str = "/email-configs";

#[derive(Debug, Default, Deserialize)]
pub struct TestEmailForm {
    #[serde(default)]
    pub recipient: Option<String>,
}

#[get("/email-configs")]
pub async fn email_configs(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let configs = match services::email_configs::list_email_configs(repo.get_ref(), &user) {
        Ok(configs) => configs,
        Err(err) => return redirect_with_error(err, "/"),
    };
    let mut context = base_context(&flash_messages, Some(&user), "email-configs", &config);
    context.insert("configs", &configs);
    context.insert("presets", &services::email_configs::provider_presets());
    render_template(&tera, "email_configs/index.html", &context)
}

#[post("/email-configs/add")]
pub async fn add_email_config(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let result = parse_form::<EmailConfigForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| {
            services::email_configs::create_email_config(
                repo.get_ref(),
                &user,
                form,
                &request_meta(&req),
            )
        });
    match result {
        Ok(created) => {
            FlashMessage::success(format!(
                "Configuration for {} added. Publish the DNS records, then verify the domain.",
                created.domain_name
            ))
            .send();
            redirect(&format!("/email-configs/{}", created.id))
        }
        Err(err) => redirect_with_error(err, CONFIGS_PATH),
    }
}

#[get("/email-configs/{id:\\d+}")]
pub async fn show_email_config(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let detail =
        match services::email_configs::get_email_config(repo.get_ref(), &user, id.into_inner()) {
            Ok(detail) => detail,
            Err(err) => return redirect_with_error(err, CONFIGS_PATH),
        };
    let mut context = base_context(&flash_messages, Some(&user), "email-configs", &config);
    context.insert("detail", &detail);
    context.insert("presets", &services::email_configs::provider_presets());
    render_template(&tera, "email_configs/detail.html", &context)
}

#[post("/email-configs/{id:\\d+}/edit")]
pub async fn edit_email_config(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let id = id.into_inner();
    let result = parse_form::<EmailConfigForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| {
            services::email_configs::update_email_config(repo.get_ref(), &user, id, form)
        });
    flash_outcome(result, "Configuration updated.", &format!("/email-configs/{id}"))
}

#[post("/email-configs/{id:\\d+}/delete")]
pub async fn delete_email_config(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    flash_outcome(
        services::email_configs::delete_email_config(repo.get_ref(), &user, id.into_inner()),
        "Configuration deleted.",
        CONFIGS_PATH,
    )
}

/// DNS lookups block, so verification runs on the blocking pool.
#[post("/email-configs/{id:\\d+}/verify")]
pub async fn verify_email_config(
    req: HttpRequest,
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    config: web::Data<ServerConfig>,
) -> impl Responder {
    let id = id.into_inner();
    let location = format!("/email-configs/{id}");
    let meta = request_meta(&req);
    let resolver_url = config.dns_resolver_url.clone();
    let repo = repo.clone();

    let result = web::block(move || {
        let verifier = DohVerifier::new(resolver_url).map_err(|err| {
            log::error!("Failed to build DNS client: {err}");
            ServiceError::Internal
        })?;
        services::email_configs::verify_domain(repo.get_ref(), &verifier, &user, id, &meta)
    })
    .await;

    match result {
        Ok(Ok(verified)) if verified.is_verified() => {
            FlashMessage::success(format!("Domain {} verified.", verified.domain_name)).send();
            redirect(&location)
        }
        Ok(Ok(_)) => {
            FlashMessage::warning(
                "Verification record not found yet. DNS changes can take a while to propagate.",
            )
            .send();
            redirect(&location)
        }
        Ok(Err(err)) => redirect_with_error(err, &location),
        Err(err) => {
            log::error!("Verification task failed: {err}");
            redirect_with_error(ServiceError::Internal, &location)
        }
    }
}

#[post("/email-configs/{id:\\d+}/test")]
pub async fn test_email_config(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    mailer: web::Data<SmtpMailer>,
    config: web::Data<ServerConfig>,
    web::Form(form): web::Form<TestEmailForm>,
) -> impl Responder {
    let id = id.into_inner();
    let location = format!("/email-configs/{id}");
    let site = Site::from(config.get_ref());
    let repo = repo.clone();
    let mailer = mailer.clone();

    let result = web::block(move || {
        services::email_configs::send_test_email(
            repo.get_ref(),
            mailer.get_ref(),
            &site,
            &user,
            id,
            form.recipient,
        )
    })
    .await;

    match result {
        Ok(outcome) => flash_outcome(outcome, "Test email sent.", &location),
        Err(err) => {
            log::error!("Test email task failed: {err}");
            redirect_with_error(ServiceError::Internal, &location)
        }
    }
}
