use actix_web::{Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::forms::lists::{ContactListForm, TagForm};
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    base_context, flash_outcome, parse_form, redirect, redirect_with_error, render_template,
};
use crate::services::{self, ServiceError};

const LISTS_PATH: &str = "/lists";
const TAGS_PATH: &str = "/tags";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

#[get("/lists")]
pub async fn lists(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let data = match services::lists::list_lists(repo.get_ref(), &user) {
        Ok(data) => data,
        Err(err) => return redirect_with_error(err, "/"),
    };
    let mut context = base_context(&flash_messages, Some(&user), "lists", &config);
    context.insert("page", &data);
    render_template(&tera, "lists/index.html", &context)
}

#[post("/lists/add")]
pub async fn add_list(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let result = parse_form::<ContactListForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| services::lists::create_list(repo.get_ref(), &user, form));
    match result {
        Ok(list) => {
            FlashMessage::success(format!("List {} created.", list.name)).send();
            redirect(&format!("/lists/{}", list.id))
        }
        Err(err) => redirect_with_error(err, LISTS_PATH),
    }
}

#[get("/lists/{id:\\d+}")]
pub async fn show_list(
    id: web::Path<i32>,
    query: web::Query<PageQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let page = query.page.unwrap_or(1).max(1);
    let detail = match services::lists::get_list(repo.get_ref(), &user, id.into_inner(), page) {
        Ok(detail) => detail,
        Err(err) => return redirect_with_error(err, LISTS_PATH),
    };
    let mut context = base_context(&flash_messages, Some(&user), "lists", &config);
    context.insert("detail", &detail);
    render_template(&tera, "lists/detail.html", &context)
}

#[post("/lists/{id:\\d+}/edit")]
pub async fn edit_list(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let id = id.into_inner();
    let result = parse_form::<ContactListForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| services::lists::update_list(repo.get_ref(), &user, id, form));
    flash_outcome(result, "List updated.", &format!("/lists/{id}"))
}

#[post("/lists/{id:\\d+}/delete")]
pub async fn delete_list(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    flash_outcome(
        services::lists::delete_list(repo.get_ref(), &user, id.into_inner()),
        "List deleted.",
        LISTS_PATH,
    )
}

#[get("/tags")]
pub async fn tags(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let data = match services::lists::list_lists(repo.get_ref(), &user) {
        Ok(data) => data,
        Err(err) => return redirect_with_error(err, "/"),
    };
    let mut context = base_context(&flash_messages, Some(&user), "tags", &config);
    context.insert("tags", &data.tags);
    render_template(&tera, "lists/tags.html", &context)
}

#[post("/tags/add")]
pub async fn add_tag(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let result = parse_form::<TagForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| services::lists::create_tag(repo.get_ref(), &user, form));
    flash_outcome(result, "Tag created.", TAGS_PATH)
}

#[post("/tags/{id:\\d+}/delete")]
pub async fn delete_tag(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    flash_outcome(
        services::lists::delete_tag(repo.get_ref(), &user, id.into_inner()),
        "Tag deleted.",
        TAGS_PATH,
    )
}
