use actix_web::{Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::template::TemplateType;
use crate::forms::templates::TemplateForm;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    base_context, flash_outcome, parse_form, redirect, redirect_with_error, render_template,
};
use crate::services::{self, ServiceError};

const TEMPLATES_PATH: &str = "/templates";

#[get("/templates")]
pub async fn templates(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let templates = match services::templates::list_templates(repo.get_ref(), &user) {
        Ok(templates) => templates,
        Err(err) => return redirect_with_error(err, "/"),
    };
    let mut context = base_context(&flash_messages, Some(&user), "templates", &config);
    context.insert("templates", &templates);
    context.insert("template_types", &TemplateType::ALL);
    render_template(&tera, "templates/index.html", &context)
}

#[post("/templates/add")]
pub async fn add_template(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let result = parse_form::<TemplateForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| services::templates::create_template(repo.get_ref(), &user, form));
    match result {
        Ok(template) => {
            FlashMessage::success(format!("Template {} created.", template.name)).send();
            redirect(&format!("/templates/{}", template.id))
        }
        Err(err) => redirect_with_error(err, TEMPLATES_PATH),
    }
}

#[get("/templates/{id:\\d+}")]
pub async fn show_template(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let template = match services::templates::get_template(repo.get_ref(), &user, id.into_inner())
    {
        Ok(template) => template,
        Err(err) => return redirect_with_error(err, TEMPLATES_PATH),
    };
    let mut context = base_context(&flash_messages, Some(&user), "templates", &config);
    context.insert("template", &template);
    context.insert("template_types", &TemplateType::ALL);
    render_template(&tera, "templates/detail.html", &context)
}

#[post("/templates/{id:\\d+}/edit")]
pub async fn edit_template(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let id = id.into_inner();
    let result = parse_form::<TemplateForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| services::templates::update_template(repo.get_ref(), &user, id, form));
    flash_outcome(result, "Template updated.", &format!("/templates/{id}"))
}

#[post("/templates/{id:\\d+}/delete")]
pub async fn delete_template(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    flash_outcome(
        services::templates::delete_template(repo.get_ref(), &user, id.into_inner()),
        "Template deleted.",
        TEMPLATES_PATH,
    )
}
