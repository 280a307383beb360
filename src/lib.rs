#![doc = "The `restforge` library crate."]
#![doc = ""]
#![doc = "Settings resolution, the route table and its registry, token authentication,"]
#![doc = "the users collection and the error types shared by all of them. The binary"]
#![doc = "(`main.rs`) resolves settings, assembles the app with [`app::app`] and serves it."]

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod security;
pub mod users;

pub use crate::config::Settings;
pub use crate::error::{AppError, ConfigError, RouteError};
