//! Credential and token authentication endpoints, mounted under `/auth/`.

use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::auth::{
    authenticate, hash_password, AuthResponse, AuthenticatedUser, LoginRequest,
    RegisterRequest, RevocationStore, TokenIssuer, TokenResponse,
};
use crate::error::{AppError, RouteError};
use crate::models::User;
use crate::routes::table::{Handler, RouteEntry, RouteTable, RouteTableBuilder};

/// Registration, current user, login and logout.
pub fn credential_routes() -> Result<RouteTable, RouteError> {
    RouteTableBuilder::new()
        .route(
            RouteEntry::new("users/", vec![Handler::post(|| web::route().to(register))])
                .name("register")
                .allow_any(),
        )
        .route(
            RouteEntry::new("users/me/", vec![Handler::get(|| web::route().to(me))])
                .name("user-me")
                .requires_auth(),
        )
        .route(
            RouteEntry::new("login/", vec![Handler::post(|| web::route().to(login))])
                .name("login")
                .allow_any(),
        )
        .route(
            RouteEntry::new("logout/", vec![Handler::post(|| web::route().to(logout))])
                .name("logout")
                .requires_auth(),
        )
        .build()
}

/// Token issuance and disposal.
pub fn token_routes() -> Result<RouteTable, RouteError> {
    RouteTableBuilder::new()
        .route(
            RouteEntry::new(
                "token/login/",
                vec![Handler::post(|| web::route().to(token_login))],
            )
            .name("token-login")
            .allow_any(),
        )
        .route(
            RouteEntry::new(
                "token/logout/",
                vec![Handler::post(|| web::route().to(logout))],
            )
            .name("token-logout")
            .requires_auth(),
        )
        .build()
}

/// Creates a user account and returns it.
async fn register(
    pool: web::Data<PgPool>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    if User::exists(&pool, &body.username, &body.email).await? {
        return Err(AppError::BadRequest(
            "A user with that username or email already exists".into(),
        ));
    }

    let password_hash = hash_password(&body.password)?;
    let user = User::create(&pool, &body.username, &body.email, &password_hash).await?;
    log::info!("registered user {}", user.id);

    Ok(HttpResponse::Created().json(user))
}

async fn me(pool: web::Data<PgPool>, user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    let user = User::find_by_id(&pool, user.id()).await?;
    Ok(HttpResponse::Ok().json(user))
}

async fn login(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let user = authenticate(&pool, &body.login, &body.password).await?;
    let issued = issuer.issue(user.id)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        token: issued.token,
        user_id: user.id,
    }))
}

async fn token_login(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let user = authenticate(&pool, &body.login, &body.password).await?;
    let issued = issuer.issue(user.id)?;

    Ok(HttpResponse::Ok().json(TokenResponse {
        auth_token: issued.token,
    }))
}

/// Revokes the token the request was authenticated with.
async fn logout(
    revocations: web::Data<RevocationStore>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    revocations.revoke(&user.0).await?;
    log::info!("user {} logged out", user.id());
    Ok(HttpResponse::NoContent().finish())
}
