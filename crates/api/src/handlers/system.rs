use axum::extract::State;

use crate::{error::ApiResult, response::success, routes::AppState};

/// 调度器系统状态快照
pub async fn get_automation_status(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    Ok(success(state.scheduler.system_status()))
}
