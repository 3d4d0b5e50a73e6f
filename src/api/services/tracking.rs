//! 采集端点：浏览、搜索、搜索点击、互动计数

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use super::response::{api_result, error_response};
use crate::analytics::{IngestOutcome, IngestionService, SearchHit};
use crate::errors::Result;
use crate::services::ContentService;
use crate::utils::ProxyPolicy;

/// 请求体签名头
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Clone, Deserialize)]
pub struct TrackSearchRequest {
    pub query: String,
    #[serde(default)]
    pub result_count: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchClickRequest {
    pub content_ref: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Like,
    Comment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngagementRequest {
    pub kind: EngagementKind,
    #[serde(default = "default_delta")]
    pub delta: i64,
}

fn default_delta() -> i64 {
    1
}

/// 缺失 User-Agent 时为空串（空串照常参与哈希）
fn user_agent(req: &HttpRequest) -> String {
    req.headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub struct TrackingService;

impl TrackingService {
    pub async fn track_view(
        req: HttpRequest,
        body: web::Bytes,
        ingestion: web::Data<Arc<IngestionService>>,
        proxies: web::Data<ProxyPolicy>,
    ) -> HttpResponse {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok());
        let visitor_ip = proxies.visitor_ip(&req);
        let ua = user_agent(&req);

        match ingestion
            .ingest_signed_view(&body, signature, &visitor_ip, &ua)
            .await
        {
            Ok(IngestOutcome::Accepted { event_id }) => {
                trace!("View tracked: event {}", event_id);
                HttpResponse::Created().json(json!({ "status": "tracked" }))
            }
            Ok(IngestOutcome::Duplicate) => {
                HttpResponse::Ok().json(json!({ "status": "already_counted" }))
            }
            Err(e) => error_response(&e),
        }
    }

    pub async fn track_search(
        req: HttpRequest,
        payload: web::Json<TrackSearchRequest>,
        ingestion: web::Data<Arc<IngestionService>>,
        proxies: web::Data<ProxyPolicy>,
    ) -> HttpResponse {
        let payload = payload.into_inner();
        let hit = SearchHit {
            query: payload.query,
            result_count: payload.result_count,
            visitor_ip: proxies.visitor_ip(&req),
            user_agent: user_agent(&req),
        };

        match ingestion.ingest_search(hit).await {
            Ok(id) => HttpResponse::Created().json(json!({ "status": "tracked", "id": id })),
            Err(e) => error_response(&e),
        }
    }

    pub async fn search_click(
        path: web::Path<i64>,
        payload: web::Json<SearchClickRequest>,
        ingestion: web::Data<Arc<IngestionService>>,
    ) -> HttpResponse {
        let search_id = path.into_inner();
        let result = ingestion
            .record_search_click(search_id, &payload.content_ref)
            .await
            .map(|updated| json!({ "updated": updated }));
        api_result(result)
    }

    /// 宿主系统上报点赞/评论增量，返回更新后的计数
    pub async fn engagement(
        path: web::Path<String>,
        payload: web::Json<EngagementRequest>,
        content: web::Data<Arc<ContentService>>,
        ingestion: web::Data<Arc<IngestionService>>,
    ) -> HttpResponse {
        let content_ref = path.into_inner();
        api_result(apply_engagement(&content_ref, &payload, &content, &ingestion).await)
    }
}

async fn apply_engagement(
    content_ref: &str,
    payload: &EngagementRequest,
    content: &ContentService,
    ingestion: &IngestionService,
) -> Result<crate::analytics::Engagement> {
    let item = content.find(content_ref).await?;
    let counters = ingestion.counters();

    match payload.kind {
        EngagementKind::Like => counters.record_like(item.id, payload.delta).await?,
        EngagementKind::Comment => counters.record_comment(item.id, payload.delta).await?,
    }

    counters.engagement(item.id).await?.ok_or_else(|| {
        crate::errors::ViewPulseError::not_found(format!("内容不存在: {}", content_ref))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_request_defaults() {
        let req: EngagementRequest = serde_json::from_str(r#"{"kind":"like"}"#).unwrap();
        assert_eq!(req.kind, EngagementKind::Like);
        assert_eq!(req.delta, 1);

        let req: EngagementRequest =
            serde_json::from_str(r#"{"kind":"comment","delta":-1}"#).unwrap();
        assert_eq!(req.kind, EngagementKind::Comment);
        assert_eq!(req.delta, -1);

        assert!(serde_json::from_str::<EngagementRequest>(r#"{"kind":"share"}"#).is_err());
    }
}
