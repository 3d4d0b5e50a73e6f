//! HTTP timing middleware
//!
//! 按 (method, 路由模板, 状态码) 记录请求数与耗时。标签用 actix 匹配到的路由模板，
//! `/content/{content_ref}/engagement` 不会因内容不同而产生新的时间序列。

use actix_service::{Service, Transform};
use actix_web::{
    Error,
    dev::{ServiceRequest, ServiceResponse},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics_core::MetricsRecorder;

/// 未匹配任何路由的请求
const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Clone)]
pub struct TimingMiddleware {
    metrics: Arc<dyn MetricsRecorder>,
}

impl TimingMiddleware {
    pub fn new(metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self { metrics }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TimingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TimingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TimingService {
            service: Rc::new(service),
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct TimingService<S> {
    service: Rc<S>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<S, B> Service<ServiceRequest> for TimingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let metrics = self.metrics.clone();
        let method = method_label(req.method());
        let started = Instant::now();

        Box::pin(async move {
            let result = srv.call(req).await;
            let elapsed = started.elapsed().as_secs_f64();

            match &result {
                Ok(response) => {
                    let route = response
                        .request()
                        .match_pattern()
                        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
                    let status = response.status().as_u16().to_string();
                    metrics.observe_http_request(method, &route, &status, elapsed);
                }
                Err(_) => metrics.observe_http_request(method, UNMATCHED_ROUTE, "500", elapsed),
            }

            result
        })
    }
}

fn method_label(method: &actix_web::http::Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, test, web};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Vec<(String, String, String)>>);

    impl MetricsRecorder for Captured {
        fn observe_http_request(&self, method: &str, route: &str, status: &str, _secs: f64) {
            self.0
                .lock()
                .unwrap()
                .push((method.to_string(), route.to_string(), status.to_string()));
        }
    }

    #[actix_web::test]
    async fn test_records_route_template_not_raw_path() {
        let captured = Arc::new(Captured::default());
        let app = test::init_service(
            App::new()
                .wrap(TimingMiddleware::new(captured.clone()))
                .route(
                    "/content/{content_ref}/engagement",
                    web::post().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        for content_ref in ["post-1", "post-2"] {
            let req = test::TestRequest::post()
                .uri(&format!("/content/{}/engagement", content_ref))
                .to_request();
            test::call_service(&app, req).await;
        }
        let req = test::TestRequest::get().uri("/nowhere").to_request();
        test::call_service(&app, req).await;

        let seen = captured.0.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[0],
            (
                "POST".to_string(),
                "/content/{content_ref}/engagement".to_string(),
                "200".to_string()
            )
        );
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[2].1, UNMATCHED_ROUTE);
        assert_eq!(seen[2].2, "404");
    }
}
