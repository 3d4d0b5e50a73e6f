//! 事件采集与去重
//!
//! 浏览事件流程：签名校验 → 内容解析 → 身份哈希 → 票据 set_if_absent →
//! 写入事件 → 计数器 → 来源 upsert。只有票据决定是否计数，从不先读后写。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, trace, warn};

use super::counters::CounterEngine;
use super::identity::VisitorIdentity;
use super::sink::{ContentDirectory, EventSink};
use crate::cache::TicketStore;
use crate::config::AnalyticsConfig;
use crate::errors::{Result, ViewPulseError};
use crate::metrics_core::{MetricsRecorder, NoopMetrics, outcome};
use crate::storage::{NewSearchEvent, NewViewEvent, ReferrerHit};

type HmacSha256 = Hmac<Sha256>;

/// 搜索词最大长度（字符）
pub const MAX_QUERY_LEN: usize = 200;
/// 来源 URL 最大长度，超出时不写入来源汇总
pub const MAX_REFERRER_LEN: usize = 500;

/// 采集配置
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub secret: Option<String>,
    pub dedup_ttl: Duration,
    pub timeout: Duration,
}

impl From<&AnalyticsConfig> for IngestionSettings {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            secret: config
                .ingestion_secret
                .clone()
                .filter(|secret| !secret.is_empty()),
            dedup_ttl: Duration::from_secs(config.dedup_ttl_secs),
            timeout: Duration::from_millis(config.ingest_timeout_ms),
        }
    }
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self::from(&AnalyticsConfig::default())
    }
}

/// track-view 请求体
#[derive(Debug, Clone, Deserialize)]
pub struct TrackViewRequest {
    pub content_ref: String,
    #[serde(default)]
    pub referrer: Option<String>,
}

/// 一次浏览
#[derive(Debug, Clone, Default)]
pub struct ViewHit {
    pub content_ref: String,
    pub referrer: Option<String>,
    pub visitor_ip: String,
    pub user_agent: String,
}

/// 一次搜索
#[derive(Debug, Clone, Default)]
pub struct SearchHit {
    pub query: String,
    pub result_count: i32,
    pub visitor_ip: String,
    pub user_agent: String,
}

/// 采集结果。拒绝以错误返回（Validation / NotFound / Authentication）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted { event_id: i64 },
    Duplicate,
}

/// 计算请求体签名：hex(HMAC-SHA256(secret, body))
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ViewPulseError::authentication(format!("invalid HMAC key: {}", e)))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// 从绝对 http(s) URL 取出 host[:port]；其他形式返回 None
pub fn referrer_domain(referrer: &str) -> Option<String> {
    let parsed = url::Url::parse(referrer).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// 已拿到、但对应事件尚未落库的票据
#[derive(Default)]
struct HeldTicket(Mutex<Option<String>>);

impl HeldTicket {
    fn hold(&self, key: &str) {
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = Some(key.to_string());
    }

    fn take(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).take()
    }
}

pub struct IngestionService {
    directory: Arc<dyn ContentDirectory>,
    events: Arc<dyn EventSink>,
    tickets: Arc<dyn TicketStore>,
    counters: CounterEngine,
    settings: IngestionSettings,
    metrics: Arc<dyn MetricsRecorder>,
}

fn outcome_label(result: &Result<impl Sized>) -> &'static str {
    match result {
        Ok(_) => outcome::ACCEPTED,
        Err(e) if e.is_rejection() => outcome::REJECTED,
        Err(_) => outcome::FAILED,
    }
}

impl IngestionService {
    pub fn new(
        directory: Arc<dyn ContentDirectory>,
        events: Arc<dyn EventSink>,
        tickets: Arc<dyn TicketStore>,
        counters: CounterEngine,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            directory,
            events,
            tickets,
            counters,
            settings,
            metrics: NoopMetrics::arc(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn counters(&self) -> &CounterEngine {
        &self.counters
    }

    pub fn ticket_backend(&self) -> &'static str {
        self.tickets.backend_name()
    }

    pub fn requires_signature(&self) -> bool {
        self.settings.secret.is_some()
    }

    /// 校验请求体签名（常量时间比较）。未配置密钥时直接通过
    pub fn verify_signature(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let Some(secret) = self.settings.secret.as_deref() else {
            return Ok(());
        };

        let provided = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ViewPulseError::authentication("missing request signature"))?
            .to_ascii_lowercase();

        let expected = sign_body(secret, body)?;
        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            Ok(())
        } else {
            Err(ViewPulseError::authentication("request signature mismatch"))
        }
    }

    /// HTTP 入口：先校验签名再解析请求体
    pub async fn ingest_signed_view(
        &self,
        body: &[u8],
        signature: Option<&str>,
        visitor_ip: &str,
        user_agent: &str,
    ) -> Result<IngestOutcome> {
        let request = match self.decode_signed(body, signature) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.inc_view(outcome::REJECTED);
                return Err(e);
            }
        };

        self.ingest_view(ViewHit {
            content_ref: request.content_ref,
            referrer: request.referrer,
            visitor_ip: visitor_ip.to_string(),
            user_agent: user_agent.to_string(),
        })
        .await
    }

    fn decode_signed(&self, body: &[u8], signature: Option<&str>) -> Result<TrackViewRequest> {
        self.verify_signature(body, signature)?;
        serde_json::from_slice(body)
            .map_err(|e| ViewPulseError::validation(format!("invalid request body: {}", e)))
    }

    /// 采集一次浏览（调用方已完成签名校验）
    ///
    /// 超时发生在拿到票据之后、事件写入之前时，票据会被归还。
    pub async fn ingest_view(&self, hit: ViewHit) -> Result<IngestOutcome> {
        let result = self.ingest_view_with_deadline(hit).await;
        let label = match &result {
            Ok(IngestOutcome::Duplicate) => outcome::DUPLICATE,
            other => outcome_label(other),
        };
        self.metrics.inc_view(label);
        result
    }

    async fn ingest_view_with_deadline(&self, hit: ViewHit) -> Result<IngestOutcome> {
        let held = HeldTicket::default();
        match tokio::time::timeout(self.settings.timeout, self.ingest_view_inner(hit, &held)).await
        {
            Ok(result) => result,
            Err(_) => {
                if let Some(key) = held.take() {
                    self.release_ticket(&key, "timeout").await;
                }
                Err(ViewPulseError::transient_storage(format!(
                    "view ingestion timed out after {} ms",
                    self.settings.timeout.as_millis()
                )))
            }
        }
    }

    async fn release_ticket(&self, key: &str, cause: &str) {
        if let Err(e) = self.tickets.release(key).await {
            warn!("Failed to release ticket after {}: {}", cause, e);
        }
    }

    async fn ingest_view_inner(&self, hit: ViewHit, held: &HeldTicket) -> Result<IngestOutcome> {
        let content_ref = hit.content_ref.trim();
        if content_ref.is_empty() {
            return Err(ViewPulseError::validation("content_ref is required"));
        }

        let content = self
            .directory
            .resolve_published(content_ref)
            .await?
            .ok_or_else(|| {
                ViewPulseError::not_found(format!("content '{}' not found", content_ref))
            })?;

        let identity = VisitorIdentity::from_raw(&hit.visitor_ip, &hit.user_agent);
        let ticket_key = identity.ticket_key(content.id);

        let fresh = self
            .tickets
            .set_if_absent(&ticket_key, self.settings.dedup_ttl)
            .await
            .map_err(|e| {
                ViewPulseError::transient_storage(format!("ticket store unavailable: {}", e))
            })?;
        if !fresh {
            debug!("Duplicate view of '{}' within dedup window", content_ref);
            return Ok(IngestOutcome::Duplicate);
        }
        held.hold(&ticket_key);

        let referrer = hit
            .referrer
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let domain = referrer.as_deref().and_then(referrer_domain);
        let now = Utc::now();

        let event = NewViewEvent {
            content_id: content.id,
            visitor_id_hash: identity.visitor_id_hash,
            agent_hash: identity.agent_hash,
            occurred_at: now,
            referrer: referrer.clone(),
            referrer_domain: domain.clone(),
        };

        let appended = self.events.append_view(event).await;
        held.take();
        let event_id = match appended {
            Ok(id) => id,
            Err(e) => {
                // 事件没有写入，归还票据让客户端可以重试
                self.release_ticket(&ticket_key, "append failure").await;
                return Err(match e {
                    ViewPulseError::TransientStorage(_) => e,
                    other => ViewPulseError::transient_storage(other.message().to_string()),
                });
            }
        };

        // 计数器失败只记录日志：宁可少计，不可多计
        if let Err(e) = self.counters.record_view(content.id).await {
            self.metrics.inc_counter_failure("views");
            warn!(
                "View event {} stored but counter update failed for content {}: {}",
                event_id, content.id, e
            );
        }

        if let (Some(url), Some(domain)) = (referrer, domain) {
            if url.chars().count() > MAX_REFERRER_LEN {
                debug!("Referrer too long, skipping referrer rollup");
            } else if let Err(e) = self
                .events
                .upsert_referrer(ReferrerHit {
                    content_id: content.id,
                    referrer_url: url,
                    referrer_domain: domain,
                    seen_at: now,
                })
                .await
            {
                warn!("Referrer upsert failed for content {}: {}", content.id, e);
            }
        }

        trace!("View of '{}' accepted as event {}", content_ref, event_id);
        Ok(IngestOutcome::Accepted { event_id })
    }

    /// 采集一次搜索，返回事件 ID。搜索不去重，也不影响内容计数器
    pub async fn ingest_search(&self, hit: SearchHit) -> Result<i64> {
        let result = self.ingest_search_inner(hit).await;
        self.metrics.inc_search(outcome_label(&result));
        result
    }

    async fn ingest_search_inner(&self, hit: SearchHit) -> Result<i64> {
        let query = hit.query.trim();
        if query.is_empty() {
            return Err(ViewPulseError::validation("query is required"));
        }
        if query.chars().count() > MAX_QUERY_LEN {
            return Err(ViewPulseError::validation(format!(
                "query exceeds {} characters",
                MAX_QUERY_LEN
            )));
        }
        if hit.result_count < 0 {
            return Err(ViewPulseError::validation(
                "result_count must not be negative",
            ));
        }

        let identity = VisitorIdentity::from_raw(&hit.visitor_ip, &hit.user_agent);
        let event = NewSearchEvent {
            query_text: query.to_string(),
            result_count: hit.result_count,
            visitor_id_hash: identity.visitor_id_hash,
            occurred_at: Utc::now(),
        };

        let fut = self.events.append_search(event);
        tokio::time::timeout(self.settings.timeout, fut)
            .await
            .map_err(|_| ViewPulseError::transient_storage("search ingestion timed out"))?
    }

    /// 回填搜索点击，只在首次点击时生效
    pub async fn record_search_click(&self, search_event_id: i64, content_ref: &str) -> Result<bool> {
        let content_ref = content_ref.trim();
        if content_ref.is_empty() {
            return Err(ViewPulseError::validation("content_ref is required"));
        }

        let content = self
            .directory
            .resolve_published(content_ref)
            .await?
            .ok_or_else(|| {
                ViewPulseError::not_found(format!("content '{}' not found", content_ref))
            })?;

        let updated = self
            .events
            .backfill_search_click(search_event_id, content.id)
            .await?;
        if !updated {
            debug!(
                "Search event {} already has a click or does not exist",
                search_event_id
            );
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with_secret(secret: Option<&str>) -> IngestionService {
        struct NoContent;

        #[async_trait::async_trait]
        impl ContentDirectory for NoContent {
            async fn resolve_published(
                &self,
                _content_ref: &str,
            ) -> Result<Option<crate::storage::ContentItem>> {
                Ok(None)
            }
        }

        struct NoEvents;

        #[async_trait::async_trait]
        impl EventSink for NoEvents {
            async fn append_view(&self, _event: NewViewEvent) -> Result<i64> {
                Ok(1)
            }
            async fn append_search(&self, _event: NewSearchEvent) -> Result<i64> {
                Ok(1)
            }
            async fn upsert_referrer(&self, _hit: ReferrerHit) -> Result<()> {
                Ok(())
            }
            async fn backfill_search_click(&self, _id: i64, _content_id: i64) -> Result<bool> {
                Ok(false)
            }
        }

        struct NoCounters;

        #[async_trait::async_trait]
        impl crate::analytics::counters::EngagementStore for NoCounters {
            async fn apply_engagement_delta(
                &self,
                _content_id: i64,
                _delta: crate::analytics::counters::EngagementDelta,
            ) -> Result<()> {
                Ok(())
            }
            async fn engagement(
                &self,
                _content_id: i64,
            ) -> Result<Option<crate::analytics::counters::Engagement>> {
                Ok(None)
            }
            async fn recompute_trending_scores(&self) -> Result<u64> {
                Ok(0)
            }
        }

        let settings = IngestionSettings {
            secret: secret.map(str::to_string),
            ..Default::default()
        };
        IngestionService::new(
            Arc::new(NoContent),
            Arc::new(NoEvents),
            Arc::new(crate::cache::MokaTicketStore::new(16)),
            CounterEngine::new(Arc::new(NoCounters)),
            settings,
        )
    }

    #[test]
    fn test_referrer_domain() {
        assert_eq!(
            referrer_domain("https://news.example.com/a?b=c").as_deref(),
            Some("news.example.com")
        );
        assert_eq!(
            referrer_domain("http://localhost:3000/x").as_deref(),
            Some("localhost:3000")
        );
        assert_eq!(referrer_domain("HTTPS://Example.COM/").as_deref(), Some("example.com"));
        assert_eq!(referrer_domain("ftp://example.com/"), None);
        assert_eq!(referrer_domain("/relative/path"), None);
        assert_eq!(referrer_domain("not a url"), None);
    }

    #[test]
    fn test_sign_body_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign_body("Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_signature() {
        let service = service_with_secret(Some("topsecret"));
        let body = br#"{"content_ref":"post-1"}"#;
        let good = sign_body("topsecret", body).unwrap();

        assert!(service.verify_signature(body, Some(&good)).is_ok());
        assert!(
            service
                .verify_signature(body, Some(&good.to_uppercase()))
                .is_ok()
        );
        assert!(matches!(
            service.verify_signature(body, None),
            Err(ViewPulseError::Authentication(_))
        ));
        assert!(matches!(
            service.verify_signature(body, Some("deadbeef")),
            Err(ViewPulseError::Authentication(_))
        ));
        let tampered = br#"{"content_ref":"post-2"}"#;
        assert!(matches!(
            service.verify_signature(tampered, Some(&good)),
            Err(ViewPulseError::Authentication(_))
        ));
    }

    #[test]
    fn test_open_mode_skips_signature() {
        let service = service_with_secret(None);
        assert!(!service.requires_signature());
        assert!(service.verify_signature(b"anything", None).is_ok());
    }

    #[test]
    fn test_empty_secret_is_open_mode() {
        let config = AnalyticsConfig {
            ingestion_secret: Some(String::new()),
            ..Default::default()
        };
        assert!(IngestionSettings::from(&config).secret.is_none());
    }

    #[tokio::test]
    async fn test_rejects_empty_and_unknown_content() {
        let service = service_with_secret(None);
        let empty = service
            .ingest_view(ViewHit {
                content_ref: "   ".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(empty, Err(ViewPulseError::Validation(_))));

        let unknown = service
            .ingest_view(ViewHit {
                content_ref: "missing".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(unknown, Err(ViewPulseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_validation() {
        let service = service_with_secret(None);
        let blank = service
            .ingest_search(SearchHit {
                query: "  ".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(blank, Err(ViewPulseError::Validation(_))));

        let long = service
            .ingest_search(SearchHit {
                query: "x".repeat(MAX_QUERY_LEN + 1),
                ..Default::default()
            })
            .await;
        assert!(matches!(long, Err(ViewPulseError::Validation(_))));

        let ok = service
            .ingest_search(SearchHit {
                query: "  rust  ".to_string(),
                result_count: 3,
                ..Default::default()
            })
            .await;
        assert_eq!(ok.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let service = service_with_secret(None);
        let result = service
            .ingest_signed_view(b"{not json", None, "1.1.1.1", "ua")
            .await;
        assert!(matches!(result, Err(ViewPulseError::Validation(_))));
    }
}
