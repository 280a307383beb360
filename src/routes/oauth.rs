//!
//! # OAuth2 Endpoints
//!
//! Two tables, both mounted under `/auth/oauth/`:
//!
//! - `social` (namespace `social`): exchanging a third-party provider token for one of
//!   ours, revoking tokens, and invalidating a user's sessions.
//! - `oauth2` (namespace `oauth2`): the provider side, i.e. the password grant, token
//!   revocation (RFC 7009) and introspection (RFC 7662).
//!
//! Errors use the RFC 6749 body `{"error": ..., "error_description": ...}`. Requests
//! may be JSON or form encoded.

use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    web, Either, HttpResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::fmt;

use crate::auth::{authenticate, AuthenticatedUser, RevocationStore, TokenIssuer};
use crate::config::Settings;
use crate::error::{AppError, RouteError};
use crate::routes::table::{Handler, RouteEntry, RouteTable, RouteTableBuilder};

const DEFAULT_SCOPE: &str = "read write";

#[derive(Debug)]
pub struct OAuthError {
    status: StatusCode,
    error: &'static str,
    description: String,
}

impl OAuthError {
    fn new(status: StatusCode, error: &'static str, description: impl Into<String>) -> Self {
        Self {
            status,
            error,
            description: description.into(),
        }
    }

    fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", description)
    }

    fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_grant", description)
    }

    fn unsupported_grant_type(grant_type: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            format!("Grant type {:?} is not supported", grant_type),
        )
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.description)
    }
}

impl ResponseError for OAuthError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status)
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .json(json!({
                "error": self.error,
                "error_description": self.description,
            }))
    }
}

impl From<AppError> for OAuthError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Unauthorized(_) => OAuthError::invalid_grant("Invalid credentials given"),
            AppError::BadRequest(msg) | AppError::ValidationError(msg) => {
                OAuthError::invalid_request(msg)
            }
            other => {
                log::error!("{}", other);
                OAuthError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "The server encountered an unexpected condition",
                )
            }
        }
    }
}

/// Accepts the same fields as JSON or as a form body.
type Body<T> = Either<web::Json<T>, web::Form<T>>;

fn into_inner<T>(body: Body<T>) -> T {
    match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertTokenRequest {
    pub grant_type: String,
    pub backend: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub token: String,
    pub token_type_hint: Option<String>,
}

pub fn social_routes() -> Result<RouteTable, RouteError> {
    RouteTableBuilder::new()
        .namespace("social")
        .route(
            RouteEntry::new(
                "convert-token/",
                vec![Handler::post(|| web::route().to(convert_token))],
            )
            .name("convert-token")
            .allow_any(),
        )
        .route(
            RouteEntry::new(
                "revoke-token/",
                vec![Handler::post(|| web::route().to(revoke_token))],
            )
            .name("revoke-token")
            .allow_any(),
        )
        .route(
            RouteEntry::new(
                "invalidate-sessions/",
                vec![Handler::post(|| web::route().to(invalidate_sessions))],
            )
            .name("invalidate-sessions")
            .requires_auth(),
        )
        .build()
}

pub fn provider_routes() -> Result<RouteTable, RouteError> {
    RouteTableBuilder::new()
        .namespace("oauth2")
        .route(
            RouteEntry::new("token/", vec![Handler::post(|| web::route().to(token))])
                .name("token")
                .allow_any(),
        )
        .route(
            RouteEntry::new(
                "revoke_token/",
                vec![Handler::post(|| web::route().to(revoke_token))],
            )
            .name("revoke-token")
            .allow_any(),
        )
        .route(
            RouteEntry::new(
                "introspect/",
                vec![Handler::post(|| web::route().to(introspect))],
            )
            .name("introspect")
            .requires_auth(),
        )
        .build()
}

/// Resource-owner password grant.
async fn token(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    settings: web::Data<Settings>,
    body: Body<TokenRequest>,
) -> Result<HttpResponse, OAuthError> {
    let request = into_inner(body);
    if request.grant_type != "password" {
        return Err(OAuthError::unsupported_grant_type(&request.grant_type));
    }

    let (username, password) = match (&request.username, &request.password) {
        (Some(username), Some(password)) => (username, password),
        _ => {
            return Err(OAuthError::invalid_request(
                "Request is missing username or password",
            ))
        }
    };

    let user = authenticate(&pool, username, password).await?;
    let issued = issuer.issue_for(user.id, settings.oauth2_provider.access_token_expire_seconds)?;

    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(json!({
            "access_token": issued.token,
            "token_type": "Bearer",
            "expires_in": issued.expires_in,
            "scope": request.scope.as_deref().unwrap_or(DEFAULT_SCOPE),
        })))
}

/// Exchanges a provider token for a local one. Only providers listed in the social
/// auth settings are accepted.
///
/// No provider client ships with the crate, so a well-formed request for a configured
/// backend is answered `501 temporarily_unavailable`. Malformed requests and unknown
/// backends fail with `invalid_request` first.
async fn convert_token(
    settings: web::Data<Settings>,
    body: Body<ConvertTokenRequest>,
) -> Result<HttpResponse, OAuthError> {
    let request = into_inner(body);
    if request.grant_type != "convert_token" {
        return Err(OAuthError::unsupported_grant_type(&request.grant_type));
    }

    let backend = request
        .backend
        .as_deref()
        .filter(|backend| settings.social_auth.backends.iter().any(|b| b == backend))
        .ok_or_else(|| OAuthError::invalid_request("Invalid backend parameter"))?;
    if request.token.as_deref().map_or(true, str::is_empty) {
        return Err(OAuthError::invalid_request("Missing token parameter"));
    }

    Err(OAuthError::new(
        StatusCode::NOT_IMPLEMENTED,
        "temporarily_unavailable",
        format!("No provider client is configured for backend {:?}", backend),
    ))
}

/// Revokes the token in the body. Always 200 for tokens we did not issue or that
/// are already invalid, as RFC 7009 asks.
async fn revoke_token(
    issuer: web::Data<TokenIssuer>,
    revocations: web::Data<RevocationStore>,
    body: Body<TokenBody>,
) -> Result<HttpResponse, OAuthError> {
    let request = into_inner(body);
    if let Ok(claims) = issuer.verify(&request.token) {
        revocations.revoke(&claims).await?;
        log::debug!(
            "revocation hint was {}",
            request.token_type_hint.as_deref().unwrap_or("access_token")
        );
    }
    Ok(HttpResponse::Ok().finish())
}

async fn introspect(
    issuer: web::Data<TokenIssuer>,
    revocations: web::Data<RevocationStore>,
    _caller: AuthenticatedUser,
    body: Body<TokenBody>,
) -> Result<HttpResponse, OAuthError> {
    let request = into_inner(body);
    let claims = match issuer.verify(&request.token) {
        Ok(claims) if !revocations.is_revoked(&claims).await? => claims,
        _ => return Ok(HttpResponse::Ok().json(json!({ "active": false }))),
    };
    Ok(HttpResponse::Ok().json(json!({
        "active": true,
        "scope": DEFAULT_SCOPE,
        "token_type": "Bearer",
        "sub": claims.sub.to_string(),
        "exp": claims.exp,
        "iat": claims.iat,
        "jti": claims.jti,
    })))
}

/// Revokes every token the caller holds, including the one on this request.
async fn invalidate_sessions(
    revocations: web::Data<RevocationStore>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let cutoff = Utc::now().timestamp().max(user.0.iat as i64);
    revocations.revoke_all(user.id(), cutoff).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_namespaced_tables() {
        let social = social_routes().unwrap();
        let provider = provider_routes().unwrap();

        assert_eq!(social.namespace(), Some("social"));
        assert_eq!(provider.namespace(), Some("oauth2"));
        // Same local name, different tables.
        assert!(social.find("revoke-token").is_some());
        assert!(provider.find("oauth2:revoke-token").is_some());
    }

    #[actix_rt::test]
    async fn test_error_body() {
        let response = OAuthError::unsupported_grant_type("implicit").error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "unsupported_grant_type");
    }

    #[test]
    fn test_app_error_mapping() {
        let err: OAuthError = AppError::Unauthorized("nope".into()).into();
        assert_eq!(err.error, "invalid_grant");

        let err: OAuthError = AppError::DatabaseError("down".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
