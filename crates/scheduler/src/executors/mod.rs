mod analyze;
mod crawl;
mod pipeline;

use std::sync::{Arc, Mutex};

use tracing::error;

use meme_commons_core::config::SchedulerConfig;
use meme_commons_core::models::{AutomationTask, TaskType};
use meme_commons_core::ports::{AnalysisEngine, CardManager, Crawler, DataCleaner, PostRepository};
use meme_commons_core::SchedulerResult;

/// platform = "all" 时展开的平台集合
pub const KNOWN_PLATFORMS: [&str; 3] = ["weibo", "bilibili", "douyin"];

/// 任务执行器集合
///
/// 三种任务类型共享同一批协作者。执行器不向调用方返回结果，
/// 任务记录本身就是通道：progress / result / status / error_message
/// 均就地写入。
pub struct Executors {
    pub(crate) crawler: Arc<dyn Crawler>,
    pub(crate) cleaner: Arc<dyn DataCleaner>,
    pub(crate) analysis: Arc<dyn AnalysisEngine>,
    pub(crate) cards: Arc<dyn CardManager>,
    pub(crate) posts: Arc<dyn PostRepository>,
    pub(crate) config: SchedulerConfig,
}

impl Executors {
    pub fn new(
        crawler: Arc<dyn Crawler>,
        cleaner: Arc<dyn DataCleaner>,
        analysis: Arc<dyn AnalysisEngine>,
        cards: Arc<dyn CardManager>,
        posts: Arc<dyn PostRepository>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            crawler,
            cleaner,
            analysis,
            cards,
            posts,
            config,
        }
    }

    /// 运行任务对应的执行器。协作者失败不向上传播，
    /// 统一转化为任务的 failed 状态。
    pub async fn run(&self, task: Arc<Mutex<AutomationTask>>) {
        let (task_id, task_type) = {
            let guard = task.lock().expect("task lock poisoned");
            (guard.task_id.clone(), guard.task_type)
        };

        let outcome = match task_type {
            TaskType::Crawl => self.run_crawl(&task).await,
            TaskType::Analyze => self.run_analyze(&task).await,
            TaskType::FullPipeline => self.run_full_pipeline(&task).await,
        };

        match outcome {
            Ok(result) => {
                let mut guard = task.lock().expect("task lock poisoned");
                // 任务可能已被取消或超时处置，终态不再改写
                if !guard.is_finished() {
                    guard.mark_completed(result);
                }
            }
            Err(e) => {
                error!("任务执行失败: {}, 错误: {}", task_id, e);
                let mut guard = task.lock().expect("task lock poisoned");
                if !guard.is_finished() {
                    guard.mark_failed(e.to_string());
                }
            }
        }
    }

    pub(crate) fn set_progress(task: &Arc<Mutex<AutomationTask>>, progress: f64) {
        let mut guard = task.lock().expect("task lock poisoned");
        guard.progress = progress.clamp(0.0, 100.0);
    }

    pub(crate) fn add_progress(task: &Arc<Mutex<AutomationTask>>, delta: f64) {
        let mut guard = task.lock().expect("task lock poisoned");
        guard.progress = (guard.progress + delta).clamp(0.0, 100.0);
    }

    pub(crate) fn task_config<T: serde::de::DeserializeOwned>(
        task: &Arc<Mutex<AutomationTask>>,
    ) -> SchedulerResult<T> {
        let config = {
            let guard = task.lock().expect("task lock poisoned");
            guard.config.clone()
        };
        Ok(serde_json::from_value(config)?)
    }
}
