//!
//! # Error Handling
//!
//! Three error families live here:
//!
//! - `AppError`, returned by request handlers and middleware. It implements
//!   `actix_web::error::ResponseError` and renders a JSON:API error document
//!   (`{"errors": [{"status": "...", "detail": "..."}]}`).
//! - `ConfigError`, raised while resolving settings from the environment.
//! - `RouteError`, raised while assembling the route table or reversing a route name.
//!
//! The last two are startup errors: `main` logs them and exits before binding a socket.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all errors a request handler can produce.
///
/// Each variant maps onto one HTTP status code.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed or is missing (HTTP 401).
    Unauthorized(String),
    /// Malformed or invalid request (HTTP 400).
    BadRequest(String),
    /// Requested resource does not exist (HTTP 404).
    NotFound(String),
    /// Unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Error from a database operation (HTTP 500).
    DatabaseError(String),
    /// Input validation failed (HTTP 422).
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl AppError {
    fn detail(&self) -> &str {
        match self {
            AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg)
            | AppError::ValidationError(msg) => msg,
            // Never leak driver messages to clients.
            AppError::DatabaseError(_) => "A database error occurred",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }
        HttpResponse::build(status).json(json!({
            "errors": [{
                "status": status.as_u16().to_string(),
                "detail": self.detail(),
            }]
        }))
    }
}

/// `RowNotFound` becomes `NotFound`; every other driver error is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(format!("Invalid token: {}", error))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// A route name that fails to reverse at request time is a server bug, not a client error.
impl From<RouteError> for AppError {
    fn from(error: RouteError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// A missing or malformed setting. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key is absent and has no default.
    Missing { key: String },
    /// A key is present but cannot be coerced to the expected type.
    Invalid {
        key: String,
        value: String,
        expected: &'static str,
    },
    /// A database connection URL could not be parsed.
    InvalidDatabaseUrl { key: String, reason: String },
    /// The database URL parsed, but no pool can be opened for its engine.
    UnsupportedDatabase { scheme: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing { key } => {
                write!(f, "Set the {} environment variable", key)
            }
            ConfigError::Invalid {
                key,
                value,
                expected,
            } => write!(
                f,
                "Invalid value {:?} for {}: expected {}",
                value, key, expected
            ),
            ConfigError::InvalidDatabaseUrl { key, reason } => {
                write!(f, "Invalid database URL in {}: {}", key, reason)
            }
            ConfigError::UnsupportedDatabase { scheme } => {
                write!(f, "No connection pool available for database scheme {:?}", scheme)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A malformed route table. Duplicate names and colliding patterns are caught while the
/// table is built; `NoReverseMatch` is raised by lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Two entries in the same namespace share a name.
    DuplicateName { namespace: String, name: String },
    /// Two entries in the same table match exactly the same paths.
    PatternCollision { namespace: String, pattern: String },
    /// No entry carries the requested name, or the arguments don't fit its pattern.
    NoReverseMatch { name: String, reason: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteError::DuplicateName { namespace, name } => write!(
                f,
                "Route name {:?} is declared more than once in namespace {:?}",
                name, namespace
            ),
            RouteError::PatternCollision { namespace, pattern } => write!(
                f,
                "Route pattern {:?} is declared more than once in namespace {:?}",
                pattern, namespace
            ),
            RouteError::NoReverseMatch { name, reason } => {
                write!(f, "Reverse for {:?} not found: {}", name, reason)
            }
        }
    }
}

impl std::error::Error for RouteError {}
