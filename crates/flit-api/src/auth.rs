//! Caller identity middleware (spec §4.10, §6.5): the core trusts an
//! upstream authenticator to have already validated the caller and
//! handed it a user id. Grounded on the reference architecture's
//! `JwtAuthMiddleware`/`UserId` `Transform`/`Service`/`FromRequest`
//! scaffold, stripped of JWT cryptography and Redis-backed caching —
//! here the bearer token value itself is the caller id (spec §4:
//! "a test/dev seam, not a security mechanism").

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use uuid::Uuid;

/// Caller id populated by [`BearerAuth`] into request extensions, pulled
/// out by handlers via the `FromRequest` impl below.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

pub struct BearerAuth;

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = BearerAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerAuthService {
            service: Rc::new(service),
        }))
    }
}

pub struct BearerAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .ok_or_else(|| actix_web::error::ErrorUnauthorized("missing bearer token"))?;

            let caller_id = Uuid::parse_str(token)
                .map_err(|_| actix_web::error::ErrorUnauthorized("malformed caller id"))?;

            req.extensions_mut().insert(CallerId(caller_id));
            service.call(req).await
        })
    }
}

impl actix_web::FromRequest for CallerId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<CallerId>() {
            Some(caller) => ready(Ok(*caller)),
            None => ready(Err(actix_web::error::ErrorUnauthorized("caller not authenticated"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    async fn echo_caller(caller: CallerId) -> HttpResponse {
        HttpResponse::Ok().body(caller.0.to_string())
    }

    #[actix_web::test]
    async fn valid_bearer_token_populates_caller_id() {
        let app = test::init_service(
            App::new()
                .wrap(BearerAuth)
                .route("/t", web::get().to(echo_caller)),
        )
        .await;

        let id = Uuid::new_v4();
        let req = test::TestRequest::get()
            .insert_header(("Authorization", format!("Bearer {id}")))
            .uri("/t")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        assert_eq!(body, id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn missing_authorization_header_is_rejected() {
        let app = test::init_service(
            App::new()
                .wrap(BearerAuth)
                .route("/t", web::get().to(echo_caller)),
        )
        .await;

        let req = test::TestRequest::get().uri("/t").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn non_uuid_bearer_token_is_rejected() {
        let app = test::init_service(
            App::new()
                .wrap(BearerAuth)
                .route("/t", web::get().to(echo_caller)),
        )
        .await;

        let req = test::TestRequest::get()
            .insert_header(("Authorization", "Bearer not-a-uuid"))
            .uri("/t")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }
}
