//!
//! # Application Assembly
//!
//! [`AppState`] holds everything handlers read through `web::Data`. [`app`] turns it into
//! an actix `App` with the route table mounted and the middleware chain wrapped around
//! it. The binary calls it once per worker; tests call it through `init_service`.
//!
//! A request passes the middleware in this order:
//!
//! 1. `Logger`
//! 2. CORS, when `Middleware::Cors` is enabled
//! 3. security headers (`nosniff`, `Referrer-Policy`), when `Middleware::Security` is enabled
//! 4. host validation, when `Middleware::Security` is enabled
//! 5. trailing-slash normalisation, when `Middleware::Common` is enabled and `APPEND_SLASH` is set
//! 6. `X-Frame-Options: DENY`, when `Middleware::Clickjacking` is enabled
//!
//! A request rejected for its `Host` therefore still carries CORS and security headers,
//! but not the clickjacking header.

use actix_cors::Cors;
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware::{Condition, Logger, NormalizePath, TrailingSlash},
    web, App, Error,
};
use sqlx::PgPool;

use crate::auth::{RevocationStore, TokenIssuer};
use crate::config::{Middleware, Settings};
use crate::error::RouteError;
use crate::routes::{self, ApiRoot, ApiRouter, RouteTable};
use crate::security::{self, HostValidation};

/// Shared application data, cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub pool: web::Data<PgPool>,
    pub settings: web::Data<Settings>,
    pub table: web::Data<RouteTable>,
    pub root: web::Data<ApiRoot>,
    pub issuer: web::Data<TokenIssuer>,
    pub revocations: web::Data<RevocationStore>,
}

impl AppState {
    /// Finalises `router` into the route table. Fails if the table does not build.
    pub fn new(
        pool: PgPool,
        settings: Settings,
        router: &ApiRouter,
        revocations: RevocationStore,
    ) -> Result<Self, RouteError> {
        let table = routes::build(router)?;
        let issuer = TokenIssuer::from_settings(&settings);
        Ok(Self {
            pool: web::Data::new(pool),
            settings: web::Data::new(settings),
            table: web::Data::new(table),
            root: web::Data::new(router.root()),
            issuer: web::Data::new(issuer),
            revocations: web::Data::new(revocations),
        })
    }
}

/// CORS policy for the whitelisted origins. `*` allows any origin.
pub fn cors(whitelist: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);
    for origin in whitelist {
        cors = if origin == "*" {
            cors.allow_any_origin()
        } else {
            cors.allowed_origin(origin)
        };
    }
    cors
}

pub fn app(
    state: &AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let settings = &state.settings;
    let default_permission = settings.rest_framework.default_permission();
    let routes = state.table.clone();
    let normalize = settings.append_slash && settings.uses_middleware(Middleware::Common);
    let secure = settings.uses_middleware(Middleware::Security);

    // Outermost middleware is wrapped last.
    App::new()
        .app_data(state.pool.clone())
        .app_data(state.settings.clone())
        .app_data(state.table.clone())
        .app_data(state.root.clone())
        .app_data(state.issuer.clone())
        .app_data(state.revocations.clone())
        .configure(move |cfg| routes.configure(cfg, default_permission))
        .wrap(Condition::new(
            settings.uses_middleware(Middleware::Clickjacking),
            security::clickjacking_headers(),
        ))
        .wrap(Condition::new(
            normalize,
            NormalizePath::new(TrailingSlash::Always),
        ))
        .wrap(Condition::new(
            secure,
            HostValidation::new(security::allowed_hosts(settings)),
        ))
        .wrap(Condition::new(secure, security::security_headers()))
        .wrap(Condition::new(
            settings.uses_middleware(Middleware::Cors),
            cors(&settings.cors_origin_whitelist),
        ))
        .wrap(Logger::default())
}
