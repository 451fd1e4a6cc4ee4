use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use meme_commons_scheduler::AutomationScheduler;

use crate::handlers::{
    automation::{
        cancel_task, get_task, list_tasks, start_analysis, start_crawl, start_full_pipeline,
    },
    health::health_check,
    system::get_automation_status,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<AutomationScheduler>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 自动化任务提交
        .route("/api/automation/crawl", post(start_crawl))
        .route("/api/automation/analysis", post(start_analysis))
        .route("/api/automation/full_pipeline", post(start_full_pipeline))
        // 任务查询与取消
        .route("/api/automation/tasks", get(list_tasks))
        .route("/api/automation/tasks/{id}", get(get_task))
        .route("/api/automation/tasks/{id}/cancel", post(cancel_task))
        // 系统状态
        .route("/api/automation/status", get(get_automation_status))
        .with_state(state)
}
