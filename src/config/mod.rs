//!
//! # Settings
//!
//! `Settings` is the resolved configuration of the process. It is assembled once by
//! [`Settings::from_env`] from environment variables and static defaults, then shared
//! read-only (as `web::Data<Settings>`) for the lifetime of the process. Any missing
//! required key or malformed value aborts startup with a [`ConfigError`].

pub mod database;
pub mod env;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

pub use database::{DatabaseDescriptor, DatabaseEngine};
pub use env::{Env, FromEnvValue};

use crate::error::ConfigError;
use crate::routes::NAMESPACE;

pub const DEFAULT_DATABASE_URL: &str = "postgres://postgres:@postgres:5432/postgres";
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";
/// Upper bound for `ACCESS_TOKEN_LIFETIME`, ten years in seconds.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

const LOCAL_APPS: &[&str] = &["users", "utils", "v1"];
const THIRD_PARTY_APPS: &[&str] = &[
    "rest",
    "authtoken",
    "credentials",
    "oauth2_provider",
    "social_auth",
    "filters",
    "cors",
    "schema",
];
const FRAMEWORK_APPS: &[&str] = &[
    "auth",
    "contenttypes",
    "sessions",
    "sites",
    "messages",
    "staticfiles",
    "admin",
];

/// Signing secret. Never printed and never serialised.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: impl Into<String>) -> Self {
        SecretKey(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([redacted])")
    }
}

/// Middleware applied around every request, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Middleware {
    /// CORS headers for whitelisted origins.
    Cors,
    /// Allowed-host validation and hardening headers.
    Security,
    /// Trailing-slash normalisation.
    Common,
    /// `X-Frame-Options: DENY`.
    Clickjacking,
}

/// Order in which credentials are checked by login flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthBackend {
    OAuth2,
    Model,
}

/// Authentication schemes accepted on protected resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Authentication {
    Session,
    Token,
    OAuth2,
    Social,
}

/// Access policy attached to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AllowAny,
    IsAuthenticated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StaticSettings {
    pub root: PathBuf,
    pub url: String,
    pub dirs: Vec<PathBuf>,
    pub finders: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateSettings {
    pub backend: String,
    pub dirs: Vec<PathBuf>,
    pub app_dirs: bool,
    pub context_processors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuth2ProviderSettings {
    pub access_token_expire_seconds: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialAuthSettings {
    pub postgres_jsonfield: bool,
    /// Provider names accepted by `convert-token`.
    pub backends: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RestSettings {
    pub datetime_format: String,
    pub page_size: usize,
    pub max_page_size: usize,
    pub default_permission_classes: Vec<Permission>,
    pub default_authentication_classes: Vec<Authentication>,
}

impl RestSettings {
    /// Permission applied to routes that don't declare their own.
    pub fn default_permission(&self) -> Permission {
        if self
            .default_permission_classes
            .contains(&Permission::IsAuthenticated)
        {
            Permission::IsAuthenticated
        } else {
            Permission::AllowAny
        }
    }
}

/// The resolved configuration of the process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    pub root_dir: PathBuf,
    pub apps_dir: PathBuf,
    pub installed_apps: Vec<String>,
    pub middleware: Vec<Middleware>,
    #[serde(skip_serializing)]
    pub secret_key: SecretKey,
    pub debug: bool,
    pub use_tz: bool,
    pub site_id: u32,
    pub use_i18n: bool,
    pub use_l10n: bool,
    pub append_slash: bool,
    pub allowed_hosts: Vec<String>,
    pub cors_origin_whitelist: Vec<String>,
    pub root_urlconf: String,
    pub server: ServerSettings,
    pub database: DatabaseDescriptor,
    #[serde(rename = "STATIC")]
    pub static_files: StaticSettings,
    pub templates: Vec<TemplateSettings>,
    pub auth_user_model: String,
    pub login_url: String,
    pub logout_url: String,
    pub authentication_backends: Vec<AuthBackend>,
    pub access_token_lifetime: i64,
    pub oauth2_provider: OAuth2ProviderSettings,
    pub social_auth: SocialAuthSettings,
    pub rest_framework: RestSettings,
}

fn secret_key(env: &Env) -> Result<SecretKey, ConfigError> {
    let secret = env.require::<String>("SECRET_KEY")?;
    if secret.trim().is_empty() {
        return Err(ConfigError::Invalid {
            key: "SECRET_KEY".into(),
            value: secret,
            expected: "a non-empty secret",
        });
    }
    Ok(SecretKey::new(secret))
}

fn token_lifetime(env: &Env) -> Result<i64, ConfigError> {
    let lifetime: i64 = env.resolve("ACCESS_TOKEN_LIFETIME", Some(60 * 60 * 24))?;
    if !(1..=MAX_TOKEN_LIFETIME_SECS).contains(&lifetime) {
        return Err(ConfigError::Invalid {
            key: "ACCESS_TOKEN_LIFETIME".into(),
            value: lifetime.to_string(),
            expected: "a number of seconds between 1 and ten years",
        });
    }
    Ok(lifetime)
}

impl Settings {
    /// Resolves settings from the current process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&Env::from_process())
    }

    pub fn from_source(env: &Env) -> Result<Self, ConfigError> {
        let root_dir = PathBuf::from(env.string_or("ROOT_DIR", ".")?);
        let apps_dir = root_dir.join("api");

        let installed_apps = LOCAL_APPS
            .iter()
            .chain(THIRD_PARTY_APPS)
            .chain(FRAMEWORK_APPS)
            .map(|app| app.to_string())
            .collect();

        Ok(Self {
            installed_apps,
            middleware: vec![
                Middleware::Cors,
                Middleware::Security,
                Middleware::Common,
                Middleware::Clickjacking,
            ],
            secret_key: secret_key(env)?,
            debug: env.bool_or("DEBUG", false)?,
            use_tz: true,
            site_id: 1,
            use_i18n: true,
            use_l10n: true,
            append_slash: true,
            allowed_hosts: env.list_or("ALLOWED_HOSTS", &[])?,
            cors_origin_whitelist: env.list_or("CORS_ORIGIN_WHITELIST", &[])?,
            root_urlconf: NAMESPACE.to_string(),
            server: ServerSettings {
                host: env.string_or("SERVER_HOST", "127.0.0.1")?,
                port: env.resolve("SERVER_PORT", Some(8080))?,
            },
            database: env.db_or("DATABASE_URL", DEFAULT_DATABASE_URL)?,
            static_files: StaticSettings {
                root: root_dir.join("staticfiles"),
                url: "/static/".to_string(),
                dirs: vec![apps_dir.join("static")],
                finders: vec!["filesystem".to_string(), "app_directories".to_string()],
            },
            templates: vec![TemplateSettings {
                backend: "html".to_string(),
                dirs: vec![apps_dir.join("templates")],
                app_dirs: true,
                context_processors: ["debug", "request", "auth", "messages", "social_backends"]
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
            }],
            auth_user_model: "users.User".to_string(),
            login_url: format!("{}:login", NAMESPACE),
            logout_url: format!("{}:logout", NAMESPACE),
            authentication_backends: vec![AuthBackend::OAuth2, AuthBackend::Model],
            access_token_lifetime: token_lifetime(env)?,
            oauth2_provider: OAuth2ProviderSettings {
                access_token_expire_seconds: 36000,
            },
            social_auth: SocialAuthSettings {
                postgres_jsonfield: true,
                backends: env.list_or("SOCIAL_AUTH_BACKENDS", &[])?,
            },
            rest_framework: RestSettings {
                datetime_format: DATETIME_FORMAT.to_string(),
                page_size: env.resolve("PAGINATION_LIMIT", Some(10))?,
                max_page_size: 100,
                default_permission_classes: vec![Permission::IsAuthenticated],
                default_authentication_classes: vec![
                    Authentication::Session,
                    Authentication::Token,
                    Authentication::OAuth2,
                    Authentication::Social,
                ],
            },
            root_dir,
            apps_dir,
        })
    }

    pub fn is_installed(&self, app: &str) -> bool {
        self.installed_apps.iter().any(|installed| installed == app)
    }

    pub fn uses_middleware(&self, middleware: Middleware) -> bool {
        self.middleware.contains(&middleware)
    }

    /// Mapping form of the settings: setting name to value. Secrets are omitted.
    pub fn descriptor(&self) -> serde_json::Value {
        // Every field is a plain serialisable value; this cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
