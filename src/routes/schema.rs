//!
//! # API Schema
//!
//! `/schema/` serves an OpenAPI 3.0 document generated from the finalised route table.
//! The two documentation pages (Swagger UI and ReDoc) don't hard-code that path: they
//! reverse the `schema` route name, so moving the schema endpoint moves them along.

use actix_web::{http::header::ContentType, web, HttpResponse};
use serde_json::{json, Map, Value};

use crate::config::{Permission, Settings};
use crate::error::{AppError, RouteError};
use crate::routes::table::{Handler, RouteEntry, RouteTable, RouteTableBuilder};

pub const SCHEMA_ROUTE: &str = "schema";

const SWAGGER_UI_PAGE: &str = r##"<!DOCTYPE html>
<html>
  <head>
    <title>__TITLE__</title>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      window.ui = SwaggerUIBundle({
        url: __SCHEMA_URL__,
        dom_id: "#swagger-ui",
        deepLinking: true,
        persistAuthorization: true,
      });
    </script>
  </body>
</html>
"##;

const REDOC_PAGE: &str = r##"<!DOCTYPE html>
<html>
  <head>
    <title>__TITLE__</title>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1">
  </head>
  <body>
    <div id="redoc-container"></div>
    <script src="https://cdn.jsdelivr.net/npm/redoc@2/bundles/redoc.standalone.js"></script>
    <script>
      Redoc.init(__SCHEMA_URL__, {}, document.getElementById("redoc-container"));
    </script>
  </body>
</html>
"##;

pub fn routes() -> Result<RouteTable, RouteError> {
    RouteTableBuilder::new()
        .route(
            RouteEntry::new("schema/", vec![Handler::get(|| web::route().to(openapi))])
                .name(SCHEMA_ROUTE)
                .allow_any(),
        )
        .route(
            RouteEntry::new(
                "schema/swagger-ui/",
                vec![Handler::get(|| web::route().to(swagger_ui))],
            )
            .name("schema-swagger-ui")
            .allow_any(),
        )
        .route(
            RouteEntry::new("schema/redoc/", vec![Handler::get(|| web::route().to(redoc))])
                .name("schema-redoc")
                .allow_any(),
        )
        .build()
}

fn title() -> String {
    format!("{} API", env!("CARGO_PKG_NAME"))
}

fn operation_id(table: &RouteTable, entry: &RouteEntry, method: &str) -> String {
    let base = match entry.route_name() {
        Some(name) => table.qualified(name),
        None => entry
            .pattern()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.trim_matches(|c| c == '{' || c == '}'))
            .collect::<Vec<_>>()
            .join("_"),
    };
    if entry.handlers().len() > 1 || base.is_empty() {
        format!("{}_{}", base, method)
    } else {
        base
    }
}

/// Builds the OpenAPI document for `table`. Operations on routes that require
/// authentication are marked with both token security schemes.
pub fn document(table: &RouteTable, default_permission: Permission) -> Value {
    let mut paths = Map::new();

    for entry in table.entries() {
        let parameters: Vec<Value> = entry
            .parameters()
            .into_iter()
            .map(|name| {
                json!({
                    "name": name,
                    "in": "path",
                    "required": true,
                    "schema": { "type": "string" },
                })
            })
            .collect();
        let secured = entry.permission(default_permission) == Permission::IsAuthenticated;
        let tag = entry
            .pattern()
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("root");

        let mut item = Map::new();
        for handler in entry.handlers() {
            let method = handler.method().as_str().to_ascii_lowercase();
            let mut responses = Map::new();
            responses.insert("200".into(), json!({ "description": "Successful response" }));
            if secured {
                responses.insert(
                    "401".into(),
                    json!({ "description": "Authentication credentials were not provided" }),
                );
            }

            let mut operation = json!({
                "operationId": operation_id(table, entry, &method),
                "tags": [tag],
                "responses": responses,
            });
            if !parameters.is_empty() {
                operation["parameters"] = Value::Array(parameters.clone());
            }
            if secured {
                operation["security"] = json!([{ "tokenAuth": [] }, { "bearerAuth": [] }]);
            }
            item.insert(method, operation);
        }
        paths.insert(entry.path(), Value::Object(item));
    }

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": title(),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": paths,
        "components": {
            "securitySchemes": {
                "tokenAuth": {
                    "type": "apiKey",
                    "in": "header",
                    "name": "Authorization",
                    "description": "Token-based authentication with required prefix \"Token\"",
                },
                "bearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT",
                },
            },
        },
    })
}

async fn openapi(table: web::Data<RouteTable>, settings: web::Data<Settings>) -> HttpResponse {
    HttpResponse::Ok().json(document(
        &table,
        settings.rest_framework.default_permission(),
    ))
}

fn render(page: &str, table: &RouteTable) -> Result<HttpResponse, AppError> {
    let schema_url = table.reverse(SCHEMA_ROUTE, &[])?;
    // JSON-encode so the URL lands in the script as a string literal.
    let schema_url = serde_json::to_string(&schema_url)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let body = page
        .replace("__TITLE__", &title())
        .replace("__SCHEMA_URL__", &schema_url);
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(body))
}

async fn swagger_ui(table: web::Data<RouteTable>) -> Result<HttpResponse, AppError> {
    render(SWAGGER_UI_PAGE, &table)
}

async fn redoc(table: web::Data<RouteTable>) -> Result<HttpResponse, AppError> {
    render(REDOC_PAGE, &table)
}
