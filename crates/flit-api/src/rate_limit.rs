//! Per-IP rate limiting (spec §9 open question #3: "left as per-route
//! `governor` configuration in `flit-api`"). Grounded on the reference
//! architecture's `RateLimitMiddleware`, but keyed per client IP instead
//! of a single global bucket, since a shared bucket would let one
//! abusive client starve every other caller on the same route.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorTooManyRequests,
    Error,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

#[derive(Clone)]
pub struct PerIpRateLimit {
    limiter: Arc<KeyedLimiter>,
}

impl PerIpRateLimit {
    /// `burst` is the bucket capacity; `per_second` is the refill rate.
    pub fn new(per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second.max(1)).unwrap())
            .allow_burst(NonZeroU32::new(burst.max(1)).unwrap());
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for PerIpRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = PerIpRateLimitService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PerIpRateLimitService {
            service,
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct PerIpRateLimitService<S> {
    service: S,
    limiter: Arc<KeyedLimiter>,
}

impl<S, B> Service<ServiceRequest> for PerIpRateLimitService<S>
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
        let ip = client_ip(&req);
        if self.limiter.check_key(&ip).is_err() {
            warn!(%ip, "rate limit exceeded");
            return Box::pin(async move { Err(ErrorTooManyRequests("rate limit exceeded").into()) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}

fn client_ip(req: &ServiceRequest) -> IpAddr {
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
        .or_else(|| req.peer_addr().map(|addr| addr.ip()))
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[::core::prelude::v1::test]
    fn client_ip_prefers_forwarded_for_header() {
        let req = test::TestRequest::get()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .to_srv_request();
        assert_eq!(client_ip(&req), IpAddr::from([203, 0, 113, 7]));
    }

    #[::core::prelude::v1::test]
    fn client_ip_falls_back_to_loopback_without_peer_or_header() {
        let req = test::TestRequest::get().to_srv_request();
        assert_eq!(client_ip(&req), IpAddr::from([127, 0, 0, 1]));
    }

    #[actix_web::test]
    async fn burst_exceeded_returns_429() {
        let app = test::init_service(
            App::new()
                .wrap(PerIpRateLimit::new(1, 2))
                .route("/t", web::get().to(ok)),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::get()
                .insert_header(("X-Forwarded-For", "198.51.100.1"))
                .uri("/t")
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert!(resp.status().is_success());
        }

        let req = test::TestRequest::get()
            .insert_header(("X-Forwarded-For", "198.51.100.1"))
            .uri("/t")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 429);
    }

    #[actix_web::test]
    async fn distinct_ips_have_independent_buckets() {
        let app = test::init_service(
            App::new()
                .wrap(PerIpRateLimit::new(1, 1))
                .route("/t", web::get().to(ok)),
        )
        .await;

        let req_a = test::TestRequest::get()
            .insert_header(("X-Forwarded-For", "198.51.100.2"))
            .uri("/t")
            .to_request();
        assert!(test::call_service(&app, req_a).await.status().is_success());

        let req_b = test::TestRequest::get()
            .insert_header(("X-Forwarded-For", "198.51.100.3"))
            .uri("/t")
            .to_request();
        assert!(test::call_service(&app, req_b).await.status().is_success());
    }
}
