use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Authentication, Settings};
use crate::error::AppError;

/// Claims carried by every access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: i32,
    pub exp: usize,
    pub iat: usize,
    /// Unique token id.
    pub jti: String,
}

/// A freshly signed token together with its lifetime.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

/// Signs and verifies HS256 access tokens with the configured secret key.
///
/// Built once at startup and shared as `web::Data<TokenIssuer>`; the auth middleware
/// looks it up from app data on every protected request.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
    schemes: Vec<&'static str>,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetime_secs: i64, authentication: &[Authentication]) -> Self {
        let mut schemes = Vec::new();
        for class in authentication {
            let scheme = match class {
                Authentication::Token => "Token",
                Authentication::OAuth2 | Authentication::Social => "Bearer",
                // Sessions use cookies, not the Authorization header.
                Authentication::Session => continue,
            };
            if !schemes.contains(&scheme) {
                schemes.push(scheme);
            }
        }

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
            schemes,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.secret_key.expose(),
            settings.access_token_lifetime,
            &settings.rest_framework.default_authentication_classes,
        )
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Whether an `Authorization` header scheme (`Bearer`, `Token`) is accepted.
    pub fn accepts(&self, scheme: &str) -> bool {
        self.schemes
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(scheme))
    }

    pub fn issue(&self, user_id: i32) -> Result<IssuedToken, AppError> {
        self.issue_for(user_id, self.lifetime_secs)
    }

    pub fn issue_for(&self, user_id: i32, lifetime_secs: i64) -> Result<IssuedToken, AppError> {
        if lifetime_secs <= 0 {
            return Err(AppError::InternalServerError(format!(
                "Token lifetime must be positive, got {}",
                lifetime_secs
            )));
        }
        let now = Utc::now();
        let expiration = Duration::try_seconds(lifetime_secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| AppError::InternalServerError("Token lifetime overflows".into()))?;

        let claims = Claims {
            sub: user_id,
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_in: lifetime_secs,
        })
    }

    /// Checks signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}
