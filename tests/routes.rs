use actix_web::test;
use restforge::app::{self, AppState};
use restforge::auth::RevocationStore;
use restforge::config::{Env, Middleware, Settings};
use restforge::routes::ApiRouter;
use restforge::users;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;

const ORIGIN: &str = "https://app.example.com";

fn settings_with(extra: &[(&str, &str)]) -> Settings {
    let mut pairs = vec![
        ("SECRET_KEY", "routes-test-secret"),
        ("ALLOWED_HOSTS", "localhost,api.example.com"),
        ("CORS_ORIGIN_WHITELIST", ORIGIN),
    ];
    pairs.extend_from_slice(extra);
    Settings::from_source(&Env::from_pairs(pairs)).expect("test settings should resolve")
}

fn settings() -> Settings {
    settings_with(&[])
}

// None of the requests below reach the database; the pool never connects.
fn state(settings: Settings) -> AppState {
    let mut router = ApiRouter::new();
    users::register(&mut router);
    let pool = PgPoolOptions::new()
        .connect_lazy_with(settings.database.connect_options().expect("postgres url"));
    AppState::new(pool, settings, &router, RevocationStore::memory())
        .expect("route table should build")
}

macro_rules! test_app {
    () => {
        test_app!(settings())
    };
    ($settings:expr) => {{
        let state = state($settings);
        let app = test::init_service(app::app(&state)).await;
        (app, state.issuer.clone())
    }};
}

#[actix_rt::test]
async fn test_schema_document_lists_mounted_paths() {
    let (app, _) = test_app!();

    let req = test::TestRequest::get().uri("/schema/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let doc: Value = test::read_body_json(resp).await;
    assert_eq!(doc["openapi"], "3.0.3");
    for path in ["/", "/users/", "/users/{id}/", "/auth/login/", "/auth/oauth/token/"] {
        assert!(doc["paths"].get(path).is_some(), "missing {} in schema", path);
    }
    assert!(doc["paths"]["/users/"]["get"]["security"].is_array());
    assert!(doc["paths"]["/auth/login/"]["post"].get("security").is_none());
}

#[actix_rt::test]
async fn test_documentation_pages_point_at_schema() {
    let (app, _) = test_app!();

    for uri in ["/schema/swagger-ui/", "/schema/redoc/"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success(), "{} failed", uri);

        let body = test::read_body(resp).await;
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("\"/schema/\""), "{} does not reference the schema", uri);
    }
}

#[actix_rt::test]
async fn test_protected_collection_requires_token() {
    let (app, _) = test_app!();

    let req = test::TestRequest::get().uri("/users/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["status"], "401");
}

#[actix_rt::test]
async fn test_api_root_lists_collections() {
    let (app, issuer) = test_app!();
    let token = issuer.issue(1).expect("token").token;

    for scheme in ["Token", "Bearer"] {
        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("Authorization", format!("{} {}", scheme, token)))
            .insert_header(("Host", "api.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success(), "{} scheme rejected", scheme);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "users": "http://api.example.com/users/" }));
    }
}

#[actix_rt::test]
async fn test_oauth_token_rejects_unknown_grant() {
    let (app, _) = test_app!();

    let req = test::TestRequest::post()
        .uri("/auth/oauth/token/")
        .set_form([("grant_type", "implicit")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[actix_rt::test]
async fn test_convert_token_rejects_unconfigured_backend() {
    let (app, _) = test_app!();

    let req = test::TestRequest::post()
        .uri("/auth/oauth/convert-token/")
        .set_json(json!({
            "grant_type": "convert_token",
            "backend": "github",
            "token": "abc",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_request");
}

#[actix_rt::test]
async fn test_convert_token_for_configured_backend_is_unavailable() {
    let (app, _) = test_app!(settings_with(&[("SOCIAL_AUTH_BACKENDS", "github")]));

    let req = test::TestRequest::post()
        .uri("/auth/oauth/convert-token/")
        .set_form([
            ("grant_type", "convert_token"),
            ("backend", "github"),
            ("token", "abc"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 501);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "temporarily_unavailable");
}

#[actix_rt::test]
async fn test_revoked_token_is_inactive_and_rejected() {
    let (app, issuer) = test_app!();
    let caller = issuer.issue(1).expect("token").token;
    let revoked = issuer.issue(1).expect("token").token;

    let req = test::TestRequest::post()
        .uri("/auth/oauth/revoke_token/")
        .set_form([("token", revoked.as_str())])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // Unknown tokens are acknowledged the same way.
    let req = test::TestRequest::post()
        .uri("/auth/oauth/revoke_token/")
        .set_form([("token", "not-a-token")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/auth/oauth/introspect/")
        .insert_header(("Authorization", format!("Bearer {}", caller)))
        .set_form([("token", revoked.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "active": false }));

    let req = test::TestRequest::post()
        .uri("/auth/oauth/introspect/")
        .insert_header(("Authorization", format!("Bearer {}", caller)))
        .set_form([("token", caller.as_str())])
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["active"], true);

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header(("Authorization", format!("Bearer {}", revoked)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_rt::test]
async fn test_logout_revokes_the_request_token() {
    let (app, issuer) = test_app!();
    let token = issuer.issue(1).expect("token").token;
    let other = issuer.issue(1).expect("token").token;

    let req = test::TestRequest::post()
        .uri("/auth/token/logout/")
        .insert_header(("Authorization", format!("Token {}", token)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header(("Authorization", format!("Token {}", token)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header(("Authorization", format!("Token {}", other)))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());
}

#[actix_rt::test]
async fn test_invalidate_sessions_revokes_every_token_of_the_user() {
    let (app, issuer) = test_app!();
    let first = issuer.issue(1).expect("token").token;
    let second = issuer.issue(1).expect("token").token;
    let someone_else = issuer.issue(2).expect("token").token;

    let req = test::TestRequest::post()
        .uri("/auth/oauth/invalidate-sessions/")
        .insert_header(("Authorization", format!("Bearer {}", first)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    for (token, status) in [(&first, 401), (&second, 401), (&someone_else, 200)] {
        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), status);
    }
}

#[actix_rt::test]
async fn test_cors_preflight_for_whitelisted_origin() {
    let (app, _) = test_app!();

    let req = test::TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/auth/login/")
        .insert_header(("Origin", ORIGIN))
        .insert_header(("Access-Control-Request-Method", "POST"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("Access-Control-Allow-Origin").unwrap(),
        ORIGIN
    );

    let req = test::TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/auth/login/")
        .insert_header(("Origin", "https://evil.example.com"))
        .insert_header(("Access-Control-Request-Method", "POST"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("Access-Control-Allow-Origin").is_none());
}

#[actix_rt::test]
async fn test_missing_trailing_slash_is_appended() {
    let (app, _) = test_app!();

    let req = test::TestRequest::get().uri("/schema").to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let mut settings = settings();
    settings.append_slash = false;
    let (app, _) = test_app!(settings);
    let req = test::TestRequest::get().uri("/schema").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_rt::test]
async fn test_security_headers_on_responses() {
    let (app, _) = test_app!();

    let req = test::TestRequest::get().uri("/schema/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
    assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
    assert_eq!(headers.get("Referrer-Policy").unwrap(), "same-origin");

    let mut settings = settings();
    settings
        .middleware
        .retain(|middleware| *middleware != Middleware::Clickjacking);
    let (app, _) = test_app!(settings);
    let req = test::TestRequest::get().uri("/schema/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("X-Frame-Options").is_none());
    assert_eq!(resp.headers().get("X-Content-Type-Options").unwrap(), "nosniff");
}

#[actix_rt::test]
async fn test_rejected_host_passes_outer_middleware_only() {
    let (app, _) = test_app!();

    let req = test::TestRequest::get()
        .uri("/schema/")
        .insert_header(("Host", "evil.example.com"))
        .insert_header(("Origin", ORIGIN))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let headers = resp.headers();
    assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), ORIGIN);
    assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
    assert!(headers.get("X-Frame-Options").is_none());
}
