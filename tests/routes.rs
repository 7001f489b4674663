use actix_identity::IdentityMiddleware;
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::Key;
use actix_web::http::{StatusCode, header};
use actix_web::middleware::from_fn;
use actix_web::test as actix_test;
use actix_web::{App, web};
use actix_web_flash_messages::Level;
use serde_json::{Value, json};

use afrimail::domain::types::EmailAddress;
use afrimail::domain::user::{NewUser, UserRole};
use afrimail::middleware::record_api_usage;
use afrimail::models::config::ServerConfig;
use afrimail::repository::{DieselRepository, UserWriter};
use afrimail::routes::alert_level_to_str;
use afrimail::routes::api::{api_current_user, api_login};
use afrimail::routes::main::manifest;
use afrimail::routes::tracking::{track_click, track_open};
use afrimail::services::auth::hash_password;

mod common;

const PASSWORD: &str = "Str0ngPassw0rd!";

fn config() -> ServerConfig {
    ServerConfig::load().expect("config/default.yaml")
}

fn create_user(repo: &DieselRepository, email: &str, verified: bool) {
    repo.create_user(&NewUser {
        email: EmailAddress::new(email).unwrap(),
        password_hash: hash_password(PASSWORD).unwrap(),
        first_name: "Awa".into(),
        last_name: "Diallo".into(),
        phone: None,
        company: "Sahel Foods".into(),
        company_website: None,
        industry: None,
        company_size: None,
        country: "SN".into(),
        city: Some("Dakar".into()),
        role: UserRole::Client,
        is_active: true,
        is_email_verified: verified,
        email_verification_token: None,
        email_verification_sent_at: None,
    })
    .unwrap();
}

#[test]
fn test_alert_level_to_str_mappings() {
    assert_eq!(alert_level_to_str(&Level::Error), "danger");
    assert_eq!(alert_level_to_str(&Level::Warning), "warning");
    assert_eq!(alert_level_to_str(&Level::Success), "success");
    assert_eq!(alert_level_to_str(&Level::Info), "info");
    assert_eq!(alert_level_to_str(&Level::Debug), "info");
}

#[actix_web::test]
async fn manifest_names_the_platform() {
    let config = config();
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(config.clone()))
            .service(manifest),
    )
    .await;

    let req = actix_test::TestRequest::get().uri("/manifest.json").to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["name"], json!(config.platform_name));
    assert_eq!(body["start_url"], "/");
}

#[actix_web::test]
async fn open_pixel_is_served_for_unknown_tokens() {
    let test_db = common::TestDb::new("test_open_pixel.db");
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(DieselRepository::new(test_db.pool())))
            .service(track_open),
    )
    .await;

    let req = actix_test::TestRequest::get().uri("/track/open/garbage/").to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/gif");
    let body = actix_test::read_body(resp).await;
    assert!(body.starts_with(b"GIF89a"));
}

#[actix_web::test]
async fn click_with_bad_token_is_not_found() {
    let test_db = common::TestDb::new("test_bad_click.db");
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(DieselRepository::new(test_db.pool())))
            .service(track_click),
    )
    .await;

    let req = actix_test::TestRequest::get().uri("/track/click/garbage/").to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn api_login_issues_a_bearer_token() {
    let test_db = common::TestDb::new("test_api_login.db");
    let repo = DieselRepository::new(test_db.pool());
    create_user(&repo, "awa@sahelfoods.sn", true);

    let app = actix_test::init_service(
        App::new()
            .wrap(IdentityMiddleware::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                Key::generate(),
            ))
            .app_data(web::Data::new(repo))
            .app_data(web::Data::new(config()))
            .service(
                web::scope("/api")
                    .wrap(from_fn(record_api_usage))
                    .service(api_login)
                    .service(api_current_user),
            ),
    )
    .await;

    let req = actix_test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "awa@sahelfoods.sn", "password": "wrong"}))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = actix_test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "AWA@sahelfoods.sn", "password": PASSWORD}))
        .to_request();
    let session: Value = actix_test::call_and_read_body_json(&app, req).await;
    let token = session["token"].as_str().unwrap().to_string();
    assert_eq!(session["user"]["email"], "awa@sahelfoods.sn");

    let req = actix_test::TestRequest::get()
        .uri("/api/auth/user")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .to_request();
    let profile: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["user"]["company"], "Sahel Foods");

    let req = actix_test::TestRequest::get().uri("/api/auth/user").to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn unverified_accounts_cannot_log_in() {
    let test_db = common::TestDb::new("test_unverified_login.db");
    let repo = DieselRepository::new(test_db.pool());
    create_user(&repo, "new@sahelfoods.sn", false);

    let app = actix_test::init_service(
        App::new()
            .wrap(IdentityMiddleware::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                Key::generate(),
            ))
            .app_data(web::Data::new(repo))
            .app_data(web::Data::new(config()))
            .service(web::scope("/api").service(api_login)),
    )
    .await;

    let req = actix_test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "new@sahelfoods.sn", "password": PASSWORD}))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
