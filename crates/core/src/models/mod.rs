pub mod content;
pub mod task;

pub use content::{AnalysisResult, CleanedPost, CrawlOutcome, Engagement, KnowledgeCard, RawPost};
pub use task::{AutomationTask, TaskPriority, TaskStatus, TaskType};
