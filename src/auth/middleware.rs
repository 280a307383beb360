use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::auth::revocation::RevocationStore;
use crate::auth::token::TokenIssuer;
use crate::error::AppError;

/// Answers 401 to requests without a valid, unrevoked access token and stores the
/// token's `Claims` in the request extensions. Wrapped around every route whose
/// permission is `IsAuthenticated`.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

/// Splits `"<scheme> <credentials>"`.
fn split_credentials(value: &str) -> Option<(String, String)> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some((scheme.to_string(), token.to_string()))
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let issuer = req.app_data::<web::Data<TokenIssuer>>().cloned();
        let revocations = req.app_data::<web::Data<RevocationStore>>().cloned();
        let (issuer, revocations) = match (issuer, revocations) {
            (Some(issuer), Some(revocations)) => (issuer, revocations),
            _ => {
                let err = AppError::InternalServerError(
                    "Token authentication is not configured".into(),
                );
                let response = req.error_response(err).map_into_right_body();
                return Box::pin(async move { Ok(response) });
            }
        };

        let credentials = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(split_credentials);

        let verified = match credentials {
            Some((scheme, token)) if issuer.accepts(&scheme) => issuer.verify(&token),
            Some((scheme, _)) => Err(AppError::Unauthorized(format!(
                "Unsupported authorization scheme {:?}",
                scheme
            ))),
            None => Err(AppError::Unauthorized(
                "Authentication credentials were not provided".into(),
            )),
        };

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let claims = match verified {
                Ok(claims) => revocations.ensure_active(claims).await,
                Err(err) => Err(err),
            };
            match claims {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(err) => {
                    log::debug!("rejected request to {}: {}", req.path(), err);
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}
