use std::sync::Arc;

use actix_web::{http::header, test, web, App, HttpResponse};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use ember_auth::auth::{AccessClaims, AccessGuard, AuthService, Identity, TokenCodec};
use ember_auth::configuration::AuthSettings;
use ember_auth::middleware::JwtMiddleware;
use ember_auth::store::{InMemoryRefreshTokenStore, InMemoryUserStore};

fn test_codec() -> Arc<TokenCodec> {
    let settings = AuthSettings::new(
        "middleware-access-secret-at-least-32-bytes",
        "middleware-refresh-secret-at-least-32-bytes",
    );
    Arc::new(TokenCodec::from_settings(&settings).expect("Failed to build codec"))
}

fn identity() -> Identity {
    Identity::new(Uuid::new_v4(), "alice".to_string(), None)
}

async fn whoami(claims: web::ReqData<AccessClaims>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "user_id": claims.user_id,
        "username": claims.username,
    }))
}

macro_rules! protected_app {
    ($codec:expr) => {
        test::init_service(
            App::new()
                .wrap(JwtMiddleware::new(AccessGuard::new($codec)))
                .route("/me", web::get().to(whoami)),
        )
        .await
    };
}

#[actix_web::test]
async fn valid_access_token_reaches_handler() {
    let codec = test_codec();
    let identity = identity();
    let token = codec.issue_access(&identity, Utc::now()).unwrap();
    let app = protected_app!(codec);

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["username"], "alice");
    assert_eq!(body["user_id"], identity.user_id.to_string());
}

#[actix_web::test]
async fn missing_header_returns_401() {
    let app = protected_app!(test_codec());

    let req = test::TestRequest::get().uri("/me").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "MISSING_TOKEN");
}

#[actix_web::test]
async fn non_bearer_scheme_returns_401() {
    let app = protected_app!(test_codec());

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((header::AUTHORIZATION, "Basic YWxpY2U6c2VjcmV0"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "MALFORMED_HEADER");
}

#[actix_web::test]
async fn refresh_token_is_not_accepted_as_access_token() {
    let codec = test_codec();
    let token = codec.issue_refresh(&identity(), Utc::now()).unwrap();
    let app = protected_app!(codec);

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_OR_EXPIRED_TOKEN");
}

#[actix_web::test]
async fn expired_access_token_returns_401() {
    let codec = test_codec();
    let issued_at = Utc::now() - chrono::Duration::minutes(16);
    let token = codec.issue_access(&identity(), issued_at).unwrap();
    let app = protected_app!(codec);

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn token_from_login_passes_service_guard() {
    let mut settings = AuthSettings::new(
        "middleware-access-secret-at-least-32-bytes",
        "middleware-refresh-secret-at-least-32-bytes",
    );
    settings.password_cost = 4;
    let service = AuthService::new(
        &settings,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(InMemoryRefreshTokenStore::new()),
    )
    .expect("Failed to build auth service");
    service.register("alice", None, "SecurePass123").await.unwrap();
    let pair = service.login("alice", "SecurePass123").await.unwrap();

    let app = test::init_service(
        App::new()
            .wrap(JwtMiddleware::new(service.guard()))
            .route("/me", web::get().to(whoami)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", pair.access_token)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["username"], "alice");

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", pair.refresh_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}
