use actix_web::{HttpRequest, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::campaign::{CampaignPriority, CampaignStatus, CampaignType};
use crate::dto::campaigns::CampaignsQuery;
use crate::forms::campaigns::CampaignForm;
use crate::middleware::request_meta;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    base_context, flash_outcome, parse_form, redirect, redirect_with_error, render_template,
};
use crate::services::{self, ServiceError, Site};
use crate::zmq::ZmqSender;

const CAMPAIGNS_PATH: &str = "/campaigns";

fn campaign_path(id: i32) -> String {
    format!("/campaigns/{id}")
}

#[derive(Debug, Deserialize)]
pub struct ApplyTemplateForm {
    pub template_id: i32,
}

#[get("/campaigns")]
pub async fn campaigns(
    user: AuthenticatedUser,
    query: web::Query<CampaignsQuery>,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let data =
        match services::campaigns::list_campaigns(repo.get_ref(), &user, query.into_inner()) {
            Ok(data) => data,
            Err(err) => return redirect_with_error(err, "/"),
        };
    let summary = match services::campaigns::campaign_summary(repo.get_ref(), &user) {
        Ok(summary) => summary,
        Err(err) => return redirect_with_error(err, "/"),
    };
    let mut context = base_context(&flash_messages, Some(&user), "campaigns", &config);
    context.insert("page", &data);
    context.insert("summary", &summary);
    context.insert("statuses", &CampaignStatus::ALL);
    render_template(&tera, "campaigns/index.html", &context)
}

#[get("/campaigns/new")]
pub async fn new_campaign(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let form_data = match services::campaigns::campaign_form_data(repo.get_ref(), &user) {
        Ok(data) => data,
        Err(err) => return redirect_with_error(err, CAMPAIGNS_PATH),
    };
    let mut context = base_context(&flash_messages, Some(&user), "campaigns", &config);
    context.insert("form", &form_data);
    context.insert("campaign_types", &CampaignType::ALL);
    context.insert("priorities", &CampaignPriority::ALL);
    render_template(&tera, "campaigns/new.html", &context)
}

#[post("/campaigns/add")]
pub async fn add_campaign(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let result = parse_form::<CampaignForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| {
            services::campaigns::create_campaign(repo.get_ref(), &user, form, &request_meta(&req))
        });
    match result {
        Ok(campaign) => {
            FlashMessage::success(format!("Campaign {} created.", campaign.name)).send();
            redirect(&campaign_path(campaign.id.get()))
        }
        Err(err) => redirect_with_error(err, "/campaigns/new"),
    }
}

#[get("/campaigns/{id:\\d+}")]
pub async fn show_campaign(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let detail = match services::campaigns::get_campaign(repo.get_ref(), &user, id.into_inner()) {
        Ok(detail) => detail,
        Err(err) => return redirect_with_error(err, CAMPAIGNS_PATH),
    };
    let mut context = base_context(&flash_messages, Some(&user), "campaigns", &config);
    if detail.campaign.status == CampaignStatus::Draft {
        match services::campaigns::campaign_form_data(repo.get_ref(), &user) {
            Ok(form_data) => context.insert("form", &form_data),
            Err(err) => return redirect_with_error(err, CAMPAIGNS_PATH),
        }
    }
    context.insert("detail", &detail);
    context.insert("campaign_types", &CampaignType::ALL);
    context.insert("priorities", &CampaignPriority::ALL);
    render_template(&tera, "campaigns/detail.html", &context)
}

#[post("/campaigns/{id:\\d+}/edit")]
pub async fn edit_campaign(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let id = id.into_inner();
    let result = parse_form::<CampaignForm>(&body)
        .map_err(ServiceError::from)
        .and_then(|form| services::campaigns::update_campaign(repo.get_ref(), &user, id, form));
    flash_outcome(result, "Campaign updated.", &campaign_path(id))
}

#[post("/campaigns/{id:\\d+}/delete")]
pub async fn delete_campaign(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let id = id.into_inner();
    match services::campaigns::delete_campaign(repo.get_ref(), &user, id) {
        Ok(()) => {
            FlashMessage::success("Campaign deleted.").send();
            redirect(CAMPAIGNS_PATH)
        }
        Err(err) => redirect_with_error(err, &campaign_path(id)),
    }
}

#[post("/campaigns/{id:\\d+}/apply-template")]
pub async fn apply_template(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<ApplyTemplateForm>,
) -> impl Responder {
    let id = id.into_inner();
    flash_outcome(
        services::campaigns::apply_template(repo.get_ref(), &user, id, form.template_id),
        "Template applied.",
        &campaign_path(id),
    )
}

#[post("/campaigns/{id:\\d+}/send")]
pub async fn send_campaign(
    req: HttpRequest,
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    notifier: web::Data<ZmqSender>,
    config: web::Data<ServerConfig>,
) -> impl Responder {
    let id = id.into_inner();
    let site = Site::from(config.get_ref());
    match services::campaigns::send_campaign(
        repo.get_ref(),
        notifier.get_ref(),
        &site,
        &user,
        id,
        &request_meta(&req),
    ) {
        Ok(campaign) => {
            let message = match (campaign.status, campaign.scheduled_at) {
                (CampaignStatus::Scheduled, Some(at)) => {
                    format!("Campaign scheduled for {}.", at.format("%Y-%m-%d %H:%M UTC"))
                }
                _ => format!(
                    "Campaign is being sent to {} recipients.",
                    campaign.recipient_count
                ),
            };
            FlashMessage::success(message).send();
            redirect(&campaign_path(id))
        }
        Err(err) => redirect_with_error(err, &campaign_path(id)),
    }
}

#[post("/campaigns/{id:\\d+}/pause")]
pub async fn pause_campaign(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let id = id.into_inner();
    flash_outcome(
        services::campaigns::pause_campaign(repo.get_ref(), &user, id),
        "Campaign paused.",
        &campaign_path(id),
    )
}

#[post("/campaigns/{id:\\d+}/resume")]
pub async fn resume_campaign(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    notifier: web::Data<ZmqSender>,
) -> impl Responder {
    let id = id.into_inner();
    flash_outcome(
        services::campaigns::resume_campaign(repo.get_ref(), notifier.get_ref(), &user, id),
        "Campaign resumed.",
        &campaign_path(id),
    )
}

#[post("/campaigns/{id:\\d+}/cancel")]
pub async fn cancel_campaign(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let id = id.into_inner();
    flash_outcome(
        services::campaigns::cancel_campaign(repo.get_ref(), &user, id),
        "Campaign cancelled.",
        &campaign_path(id),
    )
}

#[post("/campaigns/{id:\\d+}/duplicate")]
pub async fn duplicate_campaign(
    req: HttpRequest,
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let id = id.into_inner();
    match services::campaigns::duplicate_campaign(repo.get_ref(), &user, id, &request_meta(&req)) {
        Ok(copy) => {
            FlashMessage::success(format!("Created {}.", copy.name)).send();
            redirect(&campaign_path(copy.id.get()))
        }
        Err(err) => redirect_with_error(err, &campaign_path(id)),
    }
}

#[get("/campaigns/{id:\\d+}/preview")]
pub async fn preview_campaign(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let id = id.into_inner();
    let site = Site::from(config.get_ref());
    let preview = match services::campaigns::preview_campaign(repo.get_ref(), &site, &user, id) {
        Ok(preview) => preview,
        Err(err) => return redirect_with_error(err, &campaign_path(id)),
    };
    let mut context = base_context(&flash_messages, Some(&user), "campaigns", &config);
    context.insert("campaign_id", &id);
    context.insert("preview", &preview);
    render_template(&tera, "campaigns/preview.html", &context)
}

#[get("/campaigns/{id:\\d+}/analytics")]
pub async fn campaign_analytics(
    id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let id = id.into_inner();
    let page = match services::campaigns::campaign_analytics(repo.get_ref(), &user, id) {
        Ok(page) => page,
        Err(err) => return redirect_with_error(err, &campaign_path(id)),
    };
    let mut context = base_context(&flash_messages, Some(&user), "campaigns", &config);
    context.insert("analytics", &page);
    render_template(&tera, "campaigns/analytics.html", &context)
}
