use actix_web::HttpServer;
use sqlx::postgres::PgPoolOptions;
use std::{fmt, io};

use restforge::app::{self, AppState};
use restforge::auth::RevocationStore;
use restforge::config::Settings;
use restforge::routes::ApiRouter;
use restforge::users;

/// Startup errors are logged and turned into a non-zero exit.
fn fatal(kind: io::ErrorKind, err: impl fmt::Display) -> io::Error {
    log::error!("{}", err);
    io::Error::new(kind, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let settings =
        Settings::from_env().map_err(|e| fatal(io::ErrorKind::InvalidInput, e))?;
    log::debug!("settings: {}", settings.descriptor());

    let mut router = ApiRouter::new();
    if settings.is_installed(users::PREFIX) {
        users::register(&mut router);
    }

    let connect_options = settings
        .database
        .connect_options()
        .map_err(|e| fatal(io::ErrorKind::InvalidInput, e))?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(connect_options)
        .await
        .map_err(|e| fatal(io::ErrorKind::ConnectionRefused, e))?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| fatal(io::ErrorKind::Other, e))?;

    let address = (settings.server.host.clone(), settings.server.port);
    let url = settings.server.url();
    let revocations = RevocationStore::database(pool.clone());
    let state = AppState::new(pool, settings, &router, revocations)
        .map_err(|e| fatal(io::ErrorKind::InvalidInput, e))?;
    log::info!("mounted {} routes", state.table.len());
    log::info!("starting server at {}", url);

    HttpServer::new(move || app::app(&state))
        .bind(address)?
        .run()
        .await
}
