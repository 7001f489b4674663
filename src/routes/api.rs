//! JSON API mounted under `/api`. Handlers return `ServiceError` directly; its
//! `ResponseError` impl turns it into a status code and `{"error": ...}` body.

use actix_identity::Identity;
use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use serde::Serialize;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::contact::ContactSource;
use crate::dto::analytics::AnalyticsQuery;
use crate::dto::campaigns::CampaignsQuery;
use crate::dto::contacts::ApiContactsQuery;
use crate::forms::auth::LoginForm;
use crate::forms::campaigns::CampaignForm;
use crate::forms::contacts::{BulkImportRequest, ContactForm};
use crate::identity::sign_in;
use crate::middleware::request_meta;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::services::tracking::DeliveryReportRequest;
use crate::services::{self, ServiceError, Site, now};
use crate::zmq::ZmqSender;

type ApiResult = Result<HttpResponse, ServiceError>;

#[derive(Serialize)]
struct Success {
    success: bool,
}

#[post("/auth/login")]
pub async fn api_login(
    req: HttpRequest,
    repo: web::Data<DieselRepository>,
    config: web::Data<ServerConfig>,
    web::Json(form): web::Json<LoginForm>,
) -> ApiResult {
    let user = services::auth::login(repo.get_ref(), form, &request_meta(&req))?;
    let session = sign_in(&req, &user, &config).map_err(|_| ServiceError::Internal)?;
    Ok(HttpResponse::Ok().json(session))
}

#[post("/auth/logout")]
pub async fn api_logout(
    req: HttpRequest,
    identity: Option<Identity>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    services::auth::logout(repo.get_ref(), &user, &request_meta(&req))?;
    if let Some(identity) = identity {
        identity.logout();
    }
    Ok(HttpResponse::Ok().json(Success { success: true }))
}

#[get("/auth/user")]
pub async fn api_current_user(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    let profile = services::auth::load_profile(repo.get_ref(), &user)?;
    Ok(HttpResponse::Ok().json(profile))
}

#[get("/contacts")]
pub async fn api_contacts(
    user: AuthenticatedUser,
    query: web::Query<ApiContactsQuery>,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    let page = services::contacts::search_contacts_api(repo.get_ref(), &user, query.into_inner())?;
    Ok(HttpResponse::Ok().json(page))
}

#[post("/contacts")]
pub async fn api_create_contact(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Json(form): web::Json<ContactForm>,
) -> ApiResult {
    let contact = services::contacts::create_contact(
        repo.get_ref(),
        &user,
        form,
        ContactSource::Api,
        &request_meta(&req),
    )?;
    Ok(HttpResponse::Created().json(contact))
}

#[get("/contacts/{id:\\d+}")]
pub async fn api_contact(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    let detail = services::contacts::get_contact(repo.get_ref(), &user, id.into_inner())?;
    Ok(HttpResponse::Ok().json(detail))
}

#[put("/contacts/{id:\\d+}")]
pub async fn api_update_contact(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Json(form): web::Json<ContactForm>,
) -> ApiResult {
    let contact =
        services::contacts::update_contact(repo.get_ref(), &user, id.into_inner(), form)?;
    Ok(HttpResponse::Ok().json(contact))
}

#[delete("/contacts/{id:\\d+}")]
pub async fn api_delete_contact(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    services::contacts::delete_contact(repo.get_ref(), &user, id.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/contacts/bulk-import")]
pub async fn api_bulk_import(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Json(request): web::Json<BulkImportRequest>,
) -> ApiResult {
    let import =
        services::import::bulk_import(repo.get_ref(), &user, request, &request_meta(&req))?;
    Ok(HttpResponse::Ok().json(import))
}

#[get("/campaigns")]
pub async fn api_campaigns(
    user: AuthenticatedUser,
    query: web::Query<CampaignsQuery>,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    let page = services::campaigns::list_campaigns(repo.get_ref(), &user, query.into_inner())?;
    Ok(HttpResponse::Ok().json(page))
}

#[post("/campaigns")]
pub async fn api_create_campaign(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Json(form): web::Json<CampaignForm>,
) -> ApiResult {
    let campaign =
        services::campaigns::create_campaign(repo.get_ref(), &user, form, &request_meta(&req))?;
    Ok(HttpResponse::Created().json(campaign))
}

#[get("/campaigns/{id:\\d+}")]
pub async fn api_campaign(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    let detail = services::campaigns::get_campaign(repo.get_ref(), &user, id.into_inner())?;
    Ok(HttpResponse::Ok().json(detail))
}

#[post("/campaigns/{id:\\d+}/send")]
pub async fn api_send_campaign(
    req: HttpRequest,
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    notifier: web::Data<ZmqSender>,
    config: web::Data<ServerConfig>,
) -> ApiResult {
    let campaign = services::campaigns::send_campaign(
        repo.get_ref(),
        notifier.get_ref(),
        &Site::from(config.get_ref()),
        &user,
        id.into_inner(),
        &request_meta(&req),
    )?;
    Ok(HttpResponse::Ok().json(campaign))
}

#[get("/campaigns/{id:\\d+}/analytics")]
pub async fn api_campaign_analytics(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    let page = services::campaigns::campaign_analytics(repo.get_ref(), &user, id.into_inner())?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/analytics/overview")]
pub async fn api_analytics_overview(
    user: AuthenticatedUser,
    query: web::Query<AnalyticsQuery>,
    repo: web::Data<DieselRepository>,
) -> ApiResult {
    let overview =
        services::analytics::analytics_overview(repo.get_ref(), &user, query.days, now())?;
    Ok(HttpResponse::Ok().json(overview))
}

/// Delivery, bounce and complaint reports forwarded by the sender's mail provider.
#[post("/tracking/events")]
pub async fn api_delivery_report(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Json(report): web::Json<DeliveryReportRequest>,
) -> ApiResult {
    services::tracking::record_delivery_report(repo.get_ref(), &user, report, now())?;
    Ok(HttpResponse::Accepted().json(Success { success: true }))
}
