use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 调度器累计统计
///
/// 所有计数由调度循环在回收任务时统一更新（单写者），
/// 因此对外快照是精确的。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub cancelled_tasks: u64,
    pub last_crawl_time: Option<DateTime<Utc>>,
    pub last_analysis_time: Option<DateTime<Utc>>,
    pub total_cards_created: u64,
}

/// 对外暴露的系统状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub is_running: bool,
    pub running_tasks: usize,
    pub pending_tasks: usize,
    pub total_completed: usize,
    #[serde(flatten)]
    pub stats: SchedulerStats,
}
