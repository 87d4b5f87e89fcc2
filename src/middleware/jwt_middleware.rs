/// JWT Authentication Middleware
///
/// Runs the access guard on the `Authorization` header and injects the
/// verified `AccessClaims` into request extensions for route handlers.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::AccessGuard;
use crate::error::{AppError, AuthError};

/// JWT middleware for protecting routes
///
/// Handlers behind it can take `web::ReqData<AccessClaims>`.
pub struct JwtMiddleware {
    guard: AccessGuard,
}

impl JwtMiddleware {
    pub fn new(guard: AccessGuard) -> Self {
        Self { guard }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            guard: self.guard.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    guard: AccessGuard,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        // A header that is not visible ASCII cannot be a bearer token
        let auth_header = match req.headers().get(header::AUTHORIZATION) {
            None => Ok(None),
            Some(value) => value.to_str().map(Some).map_err(|_| AuthError::MalformedHeader),
        };
        let outcome = auth_header.and_then(|h| self.guard.authenticate_request(h));

        match outcome {
            Ok(claims) => {
                tracing::debug!(
                    user_id = %claims.user_id,
                    username = %claims.username,
                    "JWT validated successfully"
                );
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move {
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %req.path(), "Request rejected by access guard");
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": e.to_string(),
                    "code": AppError::from(e).kind(),
                }));
                Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) })
            }
        }
    }
}
