//! AfriMail Pro: multi-tenant email marketing for African businesses.
//!
//! The `data` feature exposes only the persistence layer (`domain`, `models`,
//! `schema`); `server` adds services, HTTP routes, the delivery worker and the
//! admin CLI.

#[cfg(feature = "data")]
pub mod domain;
#[cfg(feature = "data")]
pub mod models;
#[cfg(feature = "data")]
pub mod schema;

#[cfg(feature = "server")]
pub mod db;
#[cfg(feature = "server")]
pub mod dns;
#[cfg(feature = "server")]
pub mod dto;
#[cfg(feature = "server")]
pub mod forms;
#[cfg(feature = "server")]
pub mod identity;
#[cfg(feature = "server")]
pub mod mailer;
#[cfg(feature = "server")]
pub mod middleware;
#[cfg(feature = "server")]
pub mod pagination;
#[cfg(feature = "server")]
pub mod repository;
#[cfg(feature = "server")]
pub mod routes;
#[cfg(feature = "server")]
pub mod services;
#[cfg(feature = "server")]
pub mod zmq;

#[cfg(feature = "server")]
pub use server::run;

#[cfg(feature = "server")]
mod server {
    use actix_cors::Cors;
    use actix_files::Files;
    use actix_identity::IdentityMiddleware;
    use actix_session::{SessionMiddleware, storage::CookieSessionStore};
    use actix_web::cookie::Key;
    use actix_web::middleware::{Compress, Logger, from_fn};
    use actix_web::{App, HttpServer, web};
    use actix_web_flash_messages::{FlashMessagesFramework, storage::CookieMessageStore};
    use tera::Tera;

    use crate::db::{establish_connection_pool, run_migrations};
    use crate::mailer::SmtpMailer;
    use crate::middleware::{RedirectUnauthorized, record_api_usage};
    use crate::models::config::ServerConfig;
    use crate::repository::DieselRepository;
    use crate::routes::admin::{
        activate_user, admin_index, admin_users, deactivate_user, email_logs, system_stats,
    };
    use crate::routes::admin_redirect;
    use crate::routes::api::{
        api_analytics_overview, api_bulk_import, api_campaign, api_campaign_analytics,
        api_campaigns, api_contact, api_contacts, api_create_campaign, api_create_contact,
        api_current_user, api_delete_contact, api_delivery_report, api_login, api_logout,
        api_send_campaign, api_update_contact,
    };
    use crate::routes::auth::{
        change_password, login, logout, password_reset, password_reset_confirm, register,
        resend_verification, show_login, show_password_reset, show_password_reset_confirm,
        show_profile, show_register, show_resend_verification, update_profile, verify_email,
    };
    use crate::routes::campaigns::{
        add_campaign, apply_template, campaign_analytics, campaigns, cancel_campaign,
        delete_campaign, duplicate_campaign, edit_campaign, new_campaign, pause_campaign,
        preview_campaign, resume_campaign, send_campaign, show_campaign,
    };
    use crate::routes::contacts::{
        add_contact, bulk_action, contact_statistics, contacts, delete_contact, edit_contact,
        export_contacts, import_contacts, resubscribe_contact, show_contact, show_import,
        unsubscribe_contact,
    };
    use crate::routes::email_configs::{
        add_email_config, delete_email_config, edit_email_config, email_configs,
        show_email_config, test_email_config, verify_email_config,
    };
    use crate::routes::lists::{
        add_list, add_tag, delete_list, delete_tag, edit_list, lists, show_list, tags,
    };
    use crate::routes::main::{analytics, dashboard, manifest};
    use crate::routes::templates::{
        add_template, delete_template, edit_template, show_template, templates,
    };
    use crate::routes::tracking::{track_click, track_open, unsubscribe, unsubscribe_with_reason};
    use crate::zmq::ZmqSender;

    /// Builds and runs the Actix-Web HTTP server using the provided configuration.
    pub async fn run(server_config: ServerConfig) -> std::io::Result<()> {
        // PUSH socket towards the delivery worker.
        let zmq_sender = ZmqSender::connect(&server_config.zmq_worker)
            .map_err(|e| std::io::Error::other(format!("Failed to start ZMQ sender: {e}")))?;
        let zmq_sender = web::Data::new(zmq_sender);
        let mailer = web::Data::new(SmtpMailer::new());

        let pool = establish_connection_pool(&server_config.database_url).map_err(|e| {
            std::io::Error::other(format!("Failed to establish database connection: {e}"))
        })?;
        run_migrations(&pool)
            .map_err(|e| std::io::Error::other(format!("Failed to run migrations: {e}")))?;

        let repo = DieselRepository::new(pool);

        // Keys and stores for identity, sessions, and flash messages.
        if server_config.secret.len() < 64 {
            return Err(std::io::Error::other("secret must be at least 64 bytes long"));
        }
        let secret_key = Key::from(server_config.secret.as_bytes());

        let message_store = CookieMessageStore::builder(secret_key.clone()).build();
        let message_framework = FlashMessagesFramework::builder(message_store).build();

        let tera = Tera::new(&server_config.templates_dir)
            .map_err(|e| std::io::Error::other(format!("Template parsing error(s): {e}")))?;

        let bind_address = (server_config.address.clone(), server_config.port);
        log::info!(
            "Starting {} on {}:{}",
            server_config.platform_name,
            bind_address.0,
            bind_address.1
        );

        HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .wrap(message_framework.clone())
                .wrap(IdentityMiddleware::default())
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                        .cookie_secure(false) // set to true in prod
                        .cookie_domain(Some(server_config.domain.clone()))
                        .build(),
                )
                .wrap(Compress::default())
                .wrap(Logger::default())
                .service(Files::new("/assets", "./assets"))
                .service(manifest)
                .service(track_open)
                .service(track_click)
                .service(unsubscribe)
                .service(unsubscribe_with_reason)
                .service(show_login)
                .service(login)
                .service(show_register)
                .service(register)
                .service(verify_email)
                .service(show_resend_verification)
                .service(resend_verification)
                .service(show_password_reset)
                .service(password_reset)
                .service(show_password_reset_confirm)
                .service(password_reset_confirm)
                .service(
                    web::scope("/api")
                        .wrap(from_fn(record_api_usage))
                        .service(api_login)
                        .service(api_logout)
                        .service(api_current_user)
                        .service(api_bulk_import)
                        .service(api_contacts)
                        .service(api_create_contact)
                        .service(api_contact)
                        .service(api_update_contact)
                        .service(api_delete_contact)
                        .service(api_campaigns)
                        .service(api_create_campaign)
                        .service(api_campaign)
                        .service(api_send_campaign)
                        .service(api_campaign_analytics)
                        .service(api_analytics_overview)
                        .service(api_delivery_report),
                )
                .service(
                    web::scope("")
                        .wrap(RedirectUnauthorized)
                        .service(dashboard)
                        .service(analytics)
                        .service(logout)
                        .service(show_profile)
                        .service(update_profile)
                        .service(change_password)
                        .service(contacts)
                        .service(add_contact)
                        .service(bulk_action)
                        .service(show_import)
                        .service(import_contacts)
                        .service(export_contacts)
                        .service(contact_statistics)
                        .service(show_contact)
                        .service(edit_contact)
                        .service(delete_contact)
                        .service(unsubscribe_contact)
                        .service(resubscribe_contact)
                        .service(lists)
                        .service(add_list)
                        .service(show_list)
                        .service(edit_list)
                        .service(delete_list)
                        .service(tags)
                        .service(add_tag)
                        .service(delete_tag)
                        .service(email_configs)
                        .service(add_email_config)
                        .service(show_email_config)
                        .service(edit_email_config)
                        .service(delete_email_config)
                        .service(verify_email_config)
                        .service(test_email_config)
                        .service(templates)
                        .service(add_template)
                        .service(show_template)
                        .service(edit_template)
                        .service(delete_template)
                        .service(campaigns)
                        .service(new_campaign)
                        .service(add_campaign)
                        .service(show_campaign)
                        .service(edit_campaign)
                        .service(delete_campaign)
                        .service(apply_template)
                        .service(send_campaign)
                        .service(pause_campaign)
                        .service(resume_campaign)
                        .service(cancel_campaign)
                        .service(duplicate_campaign)
                        .service(preview_campaign)
                        .service(campaign_analytics)
                        .service(admin_redirect)
                        .service(admin_index)
                        .service(admin_users)
                        .service(activate_user)
                        .service(deactivate_user)
                        .service(system_stats)
                        .service(email_logs),
                )
                .app_data(web::Data::new(tera.clone()))
                .app_data(web::Data::new(repo.clone()))
                .app_data(web::Data::new(server_config.clone()))
                .app_data(zmq_sender.clone())
                .app_data(mailer.clone())
        })
        .bind(bind_address)?
        .run()
        .await
    }
}
