use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use meme_commons_core::models::{TaskPriority, TaskStatus};
use meme_commons_core::SchedulerError;

use crate::{
    error::{ApiError, ApiResult},
    response::{accepted, success},
    routes::AppState,
};

/// 爬取任务请求
#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    #[serde(default = "default_platform")]
    pub platform: String,
    pub keywords: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub priority: TaskPriority,
}

/// 分析任务请求
#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub priority: TaskPriority,
}

/// 完整流程任务请求
#[derive(Debug, Deserialize)]
pub struct PipelineRequest {
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    pub keywords: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub priority: TaskPriority,
}

/// 任务列表查询参数
#[derive(Debug, Deserialize)]
pub struct TaskQueryParams {
    pub status: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_platform() -> String {
    "weibo".to_string()
}

fn default_source() -> String {
    "recent".to_string()
}

fn default_platforms() -> Vec<String> {
    vec!["weibo".to_string(), "douyin".to_string()]
}

fn default_limit() -> usize {
    20
}

fn default_list_limit() -> usize {
    20
}

/// 提交爬取任务
pub async fn start_crawl(
    State(state): State<AppState>,
    Json(request): Json<CrawlRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task_id = state.scheduler.submit_crawl(
        &request.platform,
        &request.keywords,
        request.limit,
        request.priority,
    )?;

    Ok(accepted(
        json!({"task_id": task_id}),
        "爬取任务已提交".to_string(),
    ))
}

/// 提交分析任务
pub async fn start_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task_id = state
        .scheduler
        .submit_analysis(&request.source, request.priority)?;

    Ok(accepted(
        json!({"task_id": task_id}),
        "分析任务已提交".to_string(),
    ))
}

/// 提交完整流程任务
pub async fn start_full_pipeline(
    State(state): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task_id = state.scheduler.submit_full_pipeline(
        &request.platforms,
        &request.keywords,
        request.limit,
        request.priority,
    )?;

    Ok(accepted(
        json!({"task_id": task_id}),
        "完整流程任务已提交".to_string(),
    ))
}

/// 任务列表，支持按状态过滤
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<TaskQueryParams>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            TaskStatus::parse(s).ok_or_else(|| ApiError::BadRequest(format!("未知的任务状态: {s}")))
        })
        .transpose()?;

    let tasks = state.scheduler.list_tasks(status, params.limit);
    Ok(success(json!({"total": tasks.len(), "tasks": tasks})))
}

/// 查询单个任务
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task = state
        .scheduler
        .get_task(&id)
        .ok_or_else(|| SchedulerError::task_not_found(&id))?;

    Ok(success(task))
}

/// 取消任务
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    if !state.scheduler.cancel(&id) {
        return Err(SchedulerError::task_not_found(&id).into());
    }

    Ok(success(json!({"task_id": id, "cancelled": true})))
}
