use actix_multipart::form::MultipartForm;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::contact::ContactSource;
use crate::dto::contacts::{ContactStatisticsPage, ContactsQuery};
use crate::forms::contacts::{BulkActionForm, ContactForm, ImportContactsForm};
use crate::middleware::request_meta;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    base_context, flash_outcome, parse_form, redirect, redirect_with_error, render_template,
};
use crate::services::{self, ServiceError, ServiceResult};

const CONTACTS_PATH: &str = "/contacts";

#[derive(Debug, Default, Deserialize)]
pub struct UnsubscribeForm {
    #[serde(default)]
    pub reason: Option<String>,
}

#[get("/contacts")]
pub async fn contacts(
    user: AuthenticatedUser,
    query: web::Query<ContactsQuery>,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let data = match services::contacts::list_contacts(repo.get_ref(), &user, query.into_inner()) {
        Ok(data) => data,
        Err(err) => return redirect_with_error(err, "/"),
    };
    let mut context = base_context(&flash_messages, Some(&user), "contacts", &config);
    context.insert("page", &data);
    render_template(&tera, "contacts/index.html", &context)
}

#[post("/contacts/add")]
pub async fn add_contact(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let result = parse_form::<ContactForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| {
            services::contacts::create_contact(
                repo.get_ref(),
                &user,
                form,
                ContactSource::Manual,
                &request_meta(&req),
            )
        });
    match result {
        Ok(contact) => {
            FlashMessage::success(format!("Contact {} added.", contact.email)).send();
            redirect(&format!("/contacts/{}", contact.id))
        }
        Err(err) => redirect_with_error(err, CONTACTS_PATH),
    }
}

#[get("/contacts/{id:\\d+}")]
pub async fn show_contact(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let detail = match services::contacts::get_contact(repo.get_ref(), &user, id.into_inner()) {
        Ok(detail) => detail,
        Err(err) => return redirect_with_error(err, CONTACTS_PATH),
    };
    let lists = match services::lists::list_lists(repo.get_ref(), &user) {
        Ok(lists) => lists,
        Err(err) => return redirect_with_error(err, CONTACTS_PATH),
    };
    let mut context = base_context(&flash_messages, Some(&user), "contacts", &config);
    context.insert("detail", &detail);
    context.insert("lists", &lists.lists);
    render_template(&tera, "contacts/detail.html", &context)
}

#[post("/contacts/{id:\\d+}/edit")]
pub async fn edit_contact(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let id = id.into_inner();
    let result = parse_form::<ContactForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| services::contacts::update_contact(repo.get_ref(), &user, id, form));
    flash_outcome(result, "Contact updated.", &format!("/contacts/{id}"))
}

#[post("/contacts/{id:\\d+}/delete")]
pub async fn delete_contact(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    flash_outcome(
        services::contacts::delete_contact(repo.get_ref(), &user, id.into_inner()),
        "Contact deleted.",
        CONTACTS_PATH,
    )
}

#[post("/contacts/{id:\\d+}/unsubscribe")]
pub async fn unsubscribe_contact(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<UnsubscribeForm>,
) -> impl Responder {
    let id = id.into_inner();
    flash_outcome(
        services::contacts::unsubscribe_contact(repo.get_ref(), &user, id, form.reason),
        "Contact unsubscribed.",
        &format!("/contacts/{id}"),
    )
}

#[post("/contacts/{id:\\d+}/resubscribe")]
pub async fn resubscribe_contact(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let id = id.into_inner();
    flash_outcome(
        services::contacts::resubscribe_contact(repo.get_ref(), &user, id),
        "Contact resubscribed.",
        &format!("/contacts/{id}"),
    )
}

#[post("/contacts/bulk")]
pub async fn bulk_action(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let result = parse_form::<BulkActionForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| services::contacts::bulk_action(repo.get_ref(), &user, form));
    match result {
        Ok(count) => {
            FlashMessage::success(format!("{count} contacts updated.")).send();
            redirect(CONTACTS_PATH)
        }
        Err(err) => redirect_with_error(err, CONTACTS_PATH),
    }
}

#[get("/contacts/import")]
pub async fn show_import(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let imports = match services::import::recent_imports(repo.get_ref(), &user) {
        Ok(imports) => imports,
        Err(err) => return redirect_with_error(err, CONTACTS_PATH),
    };
    let lists = match services::lists::list_lists(repo.get_ref(), &user) {
        Ok(lists) => lists,
        Err(err) => return redirect_with_error(err, CONTACTS_PATH),
    };
    let mut context = base_context(&flash_messages, Some(&user), "contacts", &config);
    context.insert("imports", &imports);
    context.insert("lists", &lists.lists);
    render_template(&tera, "contacts/import.html", &context)
}

#[post("/contacts/import")]
pub async fn import_contacts(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    MultipartForm(form): MultipartForm<ImportContactsForm>,
) -> impl Responder {
    let result = form
        .into_upload()
        .map_err(ServiceError::from)
        .and_then(|upload| {
            services::import::import_contacts(repo.get_ref(), &user, upload, &request_meta(&req))
        });
    match result {
        Ok(import) => {
            FlashMessage::success(format!(
                "Import finished: {} imported, {} failed, {} duplicates skipped.",
                import.successful_imports, import.failed_imports, import.duplicate_skipped
            ))
            .send();
            redirect("/contacts/import")
        }
        Err(err) => redirect_with_error(err, "/contacts/import"),
    }
}

#[get("/contacts/export")]
pub async fn export_contacts(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    match services::export::export_contacts(repo.get_ref(), &user) {
        Ok(csv) => HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header((
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"contacts.csv\"",
            ))
            .body(csv),
        Err(err) => redirect_with_error(err, CONTACTS_PATH),
    }
}

fn statistics_page(
    repo: &DieselRepository,
    user: &AuthenticatedUser,
) -> ServiceResult<ContactStatisticsPage> {
    Ok(ContactStatisticsPage {
        statistics: services::contacts::contact_statistics(repo, user)?,
        recent_imports: services::import::recent_imports(repo, user)?,
    })
}

#[get("/contacts/statistics")]
pub async fn contact_statistics(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let page = match statistics_page(repo.get_ref(), &user) {
        Ok(page) => page,
        Err(err) => return redirect_with_error(err, CONTACTS_PATH),
    };
    let mut context = base_context(&flash_messages, Some(&user), "contacts", &config);
    context.insert("statistics", &page);
    render_template(&tera, "contacts/statistics.html", &context)
}
