use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use meme_commons_core::SchedulerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            ApiError::Scheduler(SchedulerError::TaskNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("任务 {id} 不存在"),
                "TASK_NOT_FOUND",
            ),
            ApiError::Scheduler(SchedulerError::InvalidTaskParams(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("任务参数无效: {msg}"),
                "INVALID_TASK_PARAMS",
            ),
            ApiError::Scheduler(SchedulerError::ValidationError(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("数据验证失败: {msg}"),
                "VALIDATION_ERROR",
            ),
            ApiError::Scheduler(SchedulerError::SchedulerNotRunning) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "调度器未运行".to_string(),
                "SCHEDULER_NOT_RUNNING",
            ),
            ApiError::Scheduler(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.user_message().to_string(),
                "INTERNAL_ERROR",
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("系统内部错误: {msg}"),
                "INTERNAL_ERROR",
            ),
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
