//! 查询端点
//!
//! 参数缺省值与查询门面一致；越界参数由门面返回 Validation（400）。

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;

use super::response::api_result;
use crate::errors::{Result, ViewPulseError};
use crate::services::{
    DEFAULT_HOT_LIMIT, DEFAULT_SEARCH_LIMIT, DEFAULT_TRENDING_LIMIT, DEFAULT_WINDOW_DAYS,
    QueryFacade,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowQuery {
    pub window_days: Option<u32>,
    pub limit: Option<u64>,
}

pub struct QueryService;

impl QueryService {
    pub async fn trending(
        query: web::Query<WindowQuery>,
        facade: web::Data<Arc<QueryFacade>>,
    ) -> HttpResponse {
        api_result(
            facade
                .trending(
                    query.window_days.unwrap_or(DEFAULT_WINDOW_DAYS),
                    query.limit.unwrap_or(DEFAULT_TRENDING_LIMIT),
                )
                .await,
        )
    }

    pub async fn hot(
        query: web::Query<WindowQuery>,
        facade: web::Data<Arc<QueryFacade>>,
    ) -> HttpResponse {
        api_result(
            facade
                .hot_by_score(query.limit.unwrap_or(DEFAULT_HOT_LIMIT))
                .await,
        )
    }

    pub async fn popular_searches(
        query: web::Query<WindowQuery>,
        facade: web::Data<Arc<QueryFacade>>,
    ) -> HttpResponse {
        api_result(
            facade
                .popular_searches(
                    query.window_days.unwrap_or(DEFAULT_WINDOW_DAYS),
                    query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
                )
                .await,
        )
    }

    pub async fn summary(
        query: web::Query<WindowQuery>,
        facade: web::Data<Arc<QueryFacade>>,
    ) -> HttpResponse {
        api_result(
            facade
                .summary(query.window_days.unwrap_or(DEFAULT_WINDOW_DAYS))
                .await,
        )
    }

    pub async fn trending_keywords(facade: web::Data<Arc<QueryFacade>>) -> HttpResponse {
        api_result(facade.trending_keywords().await)
    }

    pub async fn daily_metrics(
        path: web::Path<String>,
        facade: web::Data<Arc<QueryFacade>>,
    ) -> HttpResponse {
        let result = lookup_daily_metrics(&path, &facade).await;
        api_result(result)
    }
}

async fn lookup_daily_metrics(
    raw_date: &str,
    facade: &QueryFacade,
) -> Result<crate::storage::DailyMetrics> {
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")?;
    facade
        .daily_metrics(date)
        .await?
        .ok_or_else(|| ViewPulseError::not_found(format!("no daily metrics for {}", date)))
}
