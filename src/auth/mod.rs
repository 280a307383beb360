pub mod credentials;
pub mod extractors;
pub mod middleware;
pub mod revocation;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use credentials::{authenticate, hash_password, verify_password};
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use revocation::RevocationStore;
pub use token::{Claims, IssuedToken, TokenIssuer};

lazy_static! {
    // Alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Credentials for the login endpoints. `login` is an email address or a username.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    #[serde(alias = "email", alias = "username")]
    pub login: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Payload for creating a new account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// 3 to 32 characters: letters, digits, underscores or hyphens.
    #[validate(
        length(min = 3, max = 32),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Returned by the credential login endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i32,
}

/// Returned by the token login endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub auth_token: String,
}
