//! Request hardening: allowed-host validation and response security headers.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    middleware::DefaultHeaders,
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::AppError;

/// Hosts served in debug mode when no hosts are configured.
const DEBUG_HOSTS: &[&str] = &[".localhost", "127.0.0.1", "[::1]"];

/// Hosts this process answers for.
///
/// An entry starting with `.` matches that domain and every subdomain; `*` matches
/// any host. Matching is case-insensitive and ignores the port.
pub fn allowed_hosts(settings: &Settings) -> Vec<String> {
    if settings.debug && settings.allowed_hosts.is_empty() {
        DEBUG_HOSTS.iter().map(|host| host.to_string()).collect()
    } else {
        settings.allowed_hosts.clone()
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [::1]:8080
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

pub fn is_host_allowed(host: &str, allowed: &[String]) -> bool {
    let host = strip_port(host).trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return false;
    }
    allowed.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if pattern == "*" {
            true
        } else if let Some(domain) = pattern.strip_prefix('.') {
            host == domain || host.ends_with(&pattern)
        } else {
            host == pattern
        }
    })
}

/// Hardening headers added to every response.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "same-origin"))
}

pub fn clickjacking_headers() -> DefaultHeaders {
    DefaultHeaders::new().add(("X-Frame-Options", "DENY"))
}

/// Answers 400 to requests whose `Host` is not allowed.
#[derive(Clone)]
pub struct HostValidation {
    allowed: Arc<Vec<String>>,
}

impl HostValidation {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: Arc::new(allowed),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HostValidation
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = HostValidationService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HostValidationService {
            service,
            allowed: Arc::clone(&self.allowed),
        }))
    }
}

pub struct HostValidationService<S> {
    service: S,
    allowed: Arc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for HostValidationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let host = req.connection_info().host().to_string();
        if is_host_allowed(&host, &self.allowed) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        log::warn!("rejected request for disallowed host {:?}", host);
        let err = AppError::BadRequest(format!("Invalid Host header: {:?}", host));
        let response = req.error_response(err).map_into_right_body();
        Box::pin(async move { Ok(response) })
    }
}
