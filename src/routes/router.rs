//!
//! # Collection Registry
//!
//! `ApiRouter` is the extension point for resource collections. Each contributing
//! module exposes a `register(&mut ApiRouter)` function; the bootstrap sequence creates
//! one router, passes it to every contributor and then finalises it exactly once with
//! [`ApiRouter::table`]. Nothing registers itself implicitly.
//!
//! A finalised router mounts the API root at `/` and, per collection, a list route
//! `{prefix}/` named `{basename}-list` and a detail route `{prefix}/{id}/` named
//! `{basename}-detail`.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{Map, Value};

use crate::error::{AppError, RouteError};
use crate::routes::table::{Handler, RouteEntry, RouteTable, RouteTableBuilder};

pub const API_ROOT_ROUTE: &str = "api-root";

#[derive(Debug, Clone)]
pub struct Collection {
    prefix: String,
    basename: String,
    list: Vec<Handler>,
    detail: Vec<Handler>,
}

impl Collection {
    pub fn list_name(&self) -> String {
        format!("{}-list", self.basename)
    }

    pub fn detail_name(&self) -> String {
        format!("{}-detail", self.basename)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiRouter {
    registry: Vec<Collection>,
}

impl ApiRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection. Either handler list may be empty, in which case that route
    /// is not mounted.
    pub fn register(
        &mut self,
        prefix: &str,
        basename: &str,
        list: Vec<Handler>,
        detail: Vec<Handler>,
    ) -> &mut Self {
        self.registry.push(Collection {
            prefix: prefix.trim_matches('/').to_string(),
            basename: basename.to_string(),
            list,
            detail,
        });
        self
    }

    /// Appends every collection registered on `other`, after this router's own.
    pub fn extend(&mut self, other: ApiRouter) -> &mut Self {
        self.registry.extend(other.registry);
        self
    }

    pub fn collections(&self) -> &[Collection] {
        &self.registry
    }

    /// The listing served by the API root.
    pub fn root(&self) -> ApiRoot {
        ApiRoot {
            collections: self
                .registry
                .iter()
                .filter(|collection| !collection.list.is_empty())
                .map(|collection| (collection.prefix.clone(), collection.list_name()))
                .collect(),
        }
    }

    /// Finalises the registry into a route table.
    pub fn table(&self) -> Result<RouteTable, RouteError> {
        let mut builder = RouteTableBuilder::new().route(
            RouteEntry::new("", vec![Handler::get(|| web::route().to(api_root))])
                .name(API_ROOT_ROUTE),
        );

        for collection in &self.registry {
            if !collection.list.is_empty() {
                builder = builder.route(
                    RouteEntry::new(format!("{}/", collection.prefix), collection.list.clone())
                        .name(collection.list_name()),
                );
            }
            if !collection.detail.is_empty() {
                builder = builder.route(
                    RouteEntry::new(
                        format!("{}/{{id}}/", collection.prefix),
                        collection.detail.clone(),
                    )
                    .name(collection.detail_name()),
                );
            }
        }

        builder.build()
    }
}

/// Collection prefixes and the route names of their list endpoints.
#[derive(Debug, Clone, Default)]
pub struct ApiRoot {
    collections: Vec<(String, String)>,
}

/// Lists the absolute URL of every registered collection.
async fn api_root(
    req: HttpRequest,
    root: web::Data<ApiRoot>,
    table: web::Data<RouteTable>,
) -> Result<HttpResponse, AppError> {
    let origin = {
        let info = req.connection_info();
        format!("{}://{}", info.scheme(), info.host())
    };

    let mut links = Map::new();
    for (prefix, name) in &root.collections {
        let path = table.reverse(name, &[])?;
        links.insert(prefix.clone(), Value::String(format!("{}{}", origin, path)));
    }
    Ok(HttpResponse::Ok().json(Value::Object(links)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn noop() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    fn handlers() -> Vec<Handler> {
        vec![Handler::get(|| web::route().to(noop))]
    }

    fn patterns(table: &RouteTable) -> Vec<(&str, Option<&str>)> {
        table
            .entries()
            .iter()
            .map(|entry| (entry.pattern(), entry.route_name()))
            .collect()
    }

    #[test]
    fn test_empty_router_mounts_only_the_root() {
        let table = ApiRouter::new().table().unwrap();
        assert_eq!(patterns(&table), vec![("", Some("api-root"))]);
    }

    #[test]
    fn test_registered_collections() {
        let mut router = ApiRouter::new();
        router
            .register("users", "user", handlers(), handlers())
            .register("/teams/", "team", handlers(), vec![]);

        let table = router.table().unwrap();
        assert_eq!(
            patterns(&table),
            vec![
                ("", Some("api-root")),
                ("users/", Some("user-list")),
                ("users/{id}/", Some("user-detail")),
                ("teams/", Some("team-list")),
            ]
        );
    }

    #[test]
    fn test_extend_appends_after_own_collections() {
        let mut router = ApiRouter::new();
        router.register("users", "user", handlers(), vec![]);
        let mut other = ApiRouter::new();
        other.register("teams", "team", handlers(), vec![]);
        router.extend(other);

        let prefixes: Vec<&str> = router
            .collections()
            .iter()
            .map(|c| c.prefix.as_str())
            .collect();
        assert_eq!(prefixes, vec!["users", "teams"]);
        assert_eq!(router.root().collections.len(), 2);
    }

    #[test]
    fn test_same_basename_twice_is_rejected() {
        let mut router = ApiRouter::new();
        router
            .register("users", "user", handlers(), vec![])
            .register("people", "user", handlers(), vec![]);

        assert!(matches!(
            router.table(),
            Err(RouteError::DuplicateName { .. })
        ));
    }
}
