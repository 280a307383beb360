pub mod auth;
pub mod oauth;
pub mod router;
pub mod schema;
pub mod table;

pub use router::{ApiRoot, ApiRouter, API_ROOT_ROUTE};
pub use table::{Handler, RouteEntry, RouteTable, RouteTableBuilder, NAMESPACE_SEPARATOR};

use crate::error::RouteError;

/// Namespace of the assembled table. Settings refer to routes as `api:<name>`.
pub const NAMESPACE: &str = "api";

/// Collection root, credential and token auth, then both OAuth2 tables.
pub fn app_routes(router: &ApiRouter) -> Result<RouteTable, RouteError> {
    RouteTableBuilder::new()
        .include("", router.table()?)
        .include("auth/", auth::credential_routes()?)
        .include("auth/", auth::token_routes()?)
        .include("auth/oauth/", oauth::social_routes()?)
        .include("auth/oauth/", oauth::provider_routes()?)
        .build()
}

pub fn schema_routes() -> Result<RouteTable, RouteError> {
    schema::routes()
}

/// Finalises `router` and assembles the full table: application routes first, schema
/// routes last. Fails on the first duplicate name or colliding pattern.
pub fn build(router: &ApiRouter) -> Result<RouteTable, RouteError> {
    let table = RouteTableBuilder::new()
        .namespace(NAMESPACE)
        .include("", app_routes(router)?)
        .include("", schema_routes()?)
        .build()?;

    log::debug!("assembled {} routes in namespace {:?}", table.len(), NAMESPACE);
    Ok(table)
}
