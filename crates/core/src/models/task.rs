use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 任务状态枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// 任务优先级，数值越大越先调度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low = 1,
    Normal = 2,
    High = 3,
    Urgent = 4,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

impl TaskPriority {
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

/// 任务类型，决定由哪个执行器处理
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Crawl,
    Analyze,
    FullPipeline,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Crawl => "crawl",
            TaskType::Analyze => "analyze",
            TaskType::FullPipeline => "full_pipeline",
        }
    }
}

/// 自动化任务记录
///
/// task_id 在提交时生成且不复用；created_at 固定不变；
/// started_at 在工作槽接手时设置一次；completed_at 在任务离开
/// running 状态时设置一次。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationTask {
    pub task_id: String,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub error_message: Option<String>,
    pub result: Option<serde_json::Value>,
    pub config: serde_json::Value,
}

impl AutomationTask {
    pub fn new(task_type: TaskType, priority: TaskPriority, config: serde_json::Value) -> Self {
        Self {
            task_id: format!("{}_{}", task_type.as_str(), Uuid::new_v4()),
            task_type,
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0.0,
            error_message: None,
            result: None,
            config,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, TaskStatus::Running)
    }

    /// 工作槽接手任务，记录开始时间
    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn mark_completed(&mut self, result: serde_json::Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.progress = 100.0;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error_message = Some(error_message.into());
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.status = TaskStatus::Cancelled;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// 任务处于 running 状态的时长（秒）
    pub fn running_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at.map(|started| (now - started).num_seconds())
    }
}
