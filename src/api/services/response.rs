//! 统一响应构建
//!
//! 错误统一序列化为 `{code, error, message}`，HTTP 状态码由错误类型决定。

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::errors::{Result, ViewPulseError};

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'static str,
    pub error: &'static str,
    pub message: &'a str,
}

/// 错误到 HTTP 状态码的映射
pub fn status_for(err: &ViewPulseError) -> StatusCode {
    match err {
        ViewPulseError::Validation(_) | ViewPulseError::DateParse(_) => StatusCode::BAD_REQUEST,
        ViewPulseError::Authentication(_) => StatusCode::FORBIDDEN,
        ViewPulseError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(err: &ViewPulseError) -> HttpResponse {
    let status = status_for(err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }

    HttpResponse::build(status).json(ErrorBody {
        code: err.code(),
        error: err.error_type(),
        message: err.message(),
    })
}

/// 成功时 200 + JSON，失败时按错误类型映射
pub fn api_result<T: Serialize>(result: Result<T>) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(data),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ViewPulseError::validation("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ViewPulseError::DateParse("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ViewPulseError::authentication("x")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&ViewPulseError::not_found("x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ViewPulseError::TransientStorage("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&ViewPulseError::Aggregation("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
