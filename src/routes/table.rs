//!
//! # Route Tables
//!
//! A `RouteTable` is an ordered list of `RouteEntry` values: a path pattern, the
//! handlers bound to it and an optional name. Matching is first-match-wins in declared
//! order, so the order entries are added in is the order they are mounted in.
//!
//! Tables are assembled with `RouteTableBuilder`. A built table can be included into a
//! parent under a path prefix. When the included table has a namespace, its route names
//! are qualified with it (`oauth2:token`), which keeps identically named routes from
//! different tables apart. Duplicate names and colliding patterns are rejected by
//! `build`, before anything is mounted.

use actix_web::{http::Method, web, Route};
use std::collections::HashSet;

use crate::auth::AuthMiddleware;
use crate::config::Permission;
use crate::error::RouteError;

/// Separator between namespace segments in a qualified route name.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Builds the actix `Route` for one handler. A plain function pointer so tables stay
/// `Send + Sync` and can be cloned into every worker.
pub type RouteFactory = fn() -> Route;

/// One HTTP method bound to a handler.
#[derive(Clone)]
pub struct Handler {
    method: Method,
    factory: RouteFactory,
}

impl Handler {
    pub fn new(method: Method, factory: RouteFactory) -> Self {
        Self { method, factory }
    }

    pub fn get(factory: RouteFactory) -> Self {
        Self::new(Method::GET, factory)
    }

    pub fn post(factory: RouteFactory) -> Self {
        Self::new(Method::POST, factory)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    fn route(&self) -> Route {
        (self.factory)().method(self.method.clone())
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler({})", self.method)
    }
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pattern: String,
    handlers: Vec<Handler>,
    name: Option<String>,
    permission: Option<Permission>,
}

impl RouteEntry {
    /// `pattern` is relative to the table, without a leading slash (`"token/login/"`);
    /// `""` is the table root. Segments like `{id}` are path parameters.
    pub fn new(pattern: impl Into<String>, handlers: Vec<Handler>) -> Self {
        Self {
            pattern: pattern.into(),
            handlers,
            name: None,
            permission: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the route public regardless of the default permission.
    pub fn allow_any(mut self) -> Self {
        self.permission = Some(Permission::AllowAny);
        self
    }

    pub fn requires_auth(mut self) -> Self {
        self.permission = Some(Permission::IsAuthenticated);
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Absolute path pattern as mounted: `"/" + pattern`.
    pub fn path(&self) -> String {
        format!("/{}", self.pattern)
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Effective permission, falling back to `default` when the entry declares none.
    pub fn permission(&self, default: Permission) -> Permission {
        self.permission.unwrap_or(default)
    }

    /// Names of the `{param}` segments, in order.
    pub fn parameters(&self) -> Vec<&str> {
        self.pattern
            .split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
            .collect()
    }

    fn is_parameter(segment: &str) -> bool {
        segment.starts_with('{') && segment.ends_with('}')
    }

    /// Whether every path `later` matches is claimed by `self` first.
    /// A parameter segment matches any non-empty segment, so `users/{id}/` shadows
    /// `users/me/` and `users/{pk}/` when it is declared first.
    fn shadows(&self, later: &RouteEntry) -> bool {
        let earlier: Vec<&str> = self.pattern.split('/').collect();
        let later: Vec<&str> = later.pattern.split('/').collect();
        earlier.len() == later.len()
            && earlier.iter().zip(&later).all(|(a, b)| {
                if Self::is_parameter(a) {
                    !b.is_empty()
                } else {
                    a == b
                }
            })
    }
}

/// An ordered, validated list of routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    namespace: Option<String>,
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Qualifies `name` with this table's namespace, if it has one.
    pub fn qualified(&self, name: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, name),
            None => name.to_string(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&RouteEntry> {
        let local = self.strip_namespace(name);
        self.entries
            .iter()
            .find(|entry| entry.route_name() == Some(local))
    }

    /// Returns the path of the route called `name`, with `args` substituted positionally
    /// into its parameters. `name` may be qualified with this table's namespace
    /// (`api:schema`) or relative to it (`schema`).
    pub fn reverse(&self, name: &str, args: &[&str]) -> Result<String, RouteError> {
        let entry = self.find(name).ok_or_else(|| RouteError::NoReverseMatch {
            name: name.to_string(),
            reason: "no route with that name".to_string(),
        })?;

        let expected = entry.parameters().len();
        if expected != args.len() {
            return Err(RouteError::NoReverseMatch {
                name: name.to_string(),
                reason: format!("expected {} argument(s), got {}", expected, args.len()),
            });
        }

        let mut args = args.iter();
        let segments: Vec<String> = entry
            .pattern
            .split('/')
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') {
                    args.next().map(|arg| arg.to_string()).unwrap_or_default()
                } else {
                    segment.to_string()
                }
            })
            .collect();
        Ok(format!("/{}", segments.join("/")))
    }

    /// Mounts every entry, in order, as a named actix resource. Entries whose effective
    /// permission is `IsAuthenticated` are wrapped with the token middleware.
    pub fn configure(&self, cfg: &mut web::ServiceConfig, default_permission: Permission) {
        for entry in &self.entries {
            let mut resource = web::resource(entry.path());
            if let Some(name) = entry.route_name() {
                resource = resource.name(&self.qualified(name));
            }
            for handler in &entry.handlers {
                resource = resource.route(handler.route());
            }
            match entry.permission(default_permission) {
                Permission::AllowAny => cfg.service(resource),
                Permission::IsAuthenticated => cfg.service(resource.wrap(AuthMiddleware)),
            };
        }
    }

    fn strip_namespace<'a>(&self, name: &'a str) -> &'a str {
        match &self.namespace {
            Some(namespace) => name
                .strip_prefix(namespace.as_str())
                .and_then(|rest| rest.strip_prefix(NAMESPACE_SEPARATOR))
                .unwrap_or(name),
            None => name,
        }
    }
}

/// Accumulates entries and sub-tables; `build` validates and freezes the result.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    namespace: Option<String>,
    entries: Vec<RouteEntry>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn route(mut self, entry: RouteEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn routes(mut self, entries: impl IntoIterator<Item = RouteEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Appends every entry of `table` under `prefix` (e.g. `"auth/oauth/"`), qualifying
    /// names with the table's namespace.
    pub fn include(mut self, prefix: &str, table: RouteTable) -> Self {
        let namespace = table.namespace.clone();
        self.entries.extend(table.entries.into_iter().map(|mut entry| {
            entry.pattern = format!("{}{}", prefix, entry.pattern);
            if let (Some(namespace), Some(name)) = (&namespace, &entry.name) {
                entry.name = Some(format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, name));
            }
            entry
        }));
        self
    }

    pub fn build(self) -> Result<RouteTable, RouteError> {
        let namespace_label = self.namespace.clone().unwrap_or_default();
        let mut names = HashSet::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(name) = &entry.name {
                if !names.insert(name.as_str()) {
                    return Err(RouteError::DuplicateName {
                        namespace: namespace_label,
                        name: name.clone(),
                    });
                }
            }
            if self.entries[..index].iter().any(|earlier| earlier.shadows(entry)) {
                return Err(RouteError::PatternCollision {
                    namespace: namespace_label,
                    pattern: entry.pattern.clone(),
                });
            }
        }

        Ok(RouteTable {
            namespace: self.namespace,
            entries: self.entries,
        })
    }
}
