use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use meme_commons_core::models::AutomationTask;
use meme_commons_core::SchedulerResult;

use super::Executors;

#[derive(Debug, Deserialize)]
struct AnalyzeTaskConfig {
    #[serde(default = "default_source")]
    source: String,
}

fn default_source() -> String {
    "recent".to_string()
}

impl Executors {
    /// 分析任务执行器
    ///
    /// 拉取一批未处理帖子做清洗、批量分析和知识卡创建，
    /// 进度固定在 10/30/70/90/100 几个检查点推进。
    /// 没有待分析数据不是错误，直接带说明完成。
    pub(crate) async fn run_analyze(
        &self,
        task: &Arc<Mutex<AutomationTask>>,
    ) -> SchedulerResult<serde_json::Value> {
        Self::set_progress(task, 10.0);
        let config: AnalyzeTaskConfig = Self::task_config(task)?;

        let raw_posts = self
            .posts
            .fetch_unprocessed(self.config.analyze_batch_size)
            .await?;

        if raw_posts.is_empty() {
            info!("没有需要分析的数据，source: {}", config.source);
            return Ok(json!({"message": "没有需要分析的数据"}));
        }

        Self::set_progress(task, 30.0);

        let cleaned: Vec<_> = raw_posts
            .iter()
            .filter_map(|post| self.cleaner.clean(post))
            .collect();
        let analysis_results = self.analysis.batch_analyze(&cleaned).await?;
        Self::set_progress(task, 70.0);

        let created_card_ids = self
            .cards
            .batch_create_from_analysis(&analysis_results)
            .await?;
        Self::set_progress(task, 90.0);

        let processed_ids: Vec<String> = raw_posts.iter().map(|p| p.id.clone()).collect();
        self.posts.mark_processed(&processed_ids).await?;

        info!(
            "分析完成，分析 {} 条帖子，创建 {} 个知识卡",
            analysis_results.len(),
            created_card_ids.len()
        );

        Ok(json!({
            "analyzed_count": analysis_results.len(),
            "created_cards": created_card_ids.len(),
            "analysis_results": analysis_results,
            "created_card_ids": created_card_ids,
        }))
    }
}
