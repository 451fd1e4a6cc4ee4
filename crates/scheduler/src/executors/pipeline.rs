use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use meme_commons_core::models::{AutomationTask, CleanedPost, RawPost};
use meme_commons_core::SchedulerResult;

use super::Executors;

#[derive(Debug, Deserialize)]
struct PipelineTaskConfig {
    platforms: Vec<String>,
    keywords: Vec<String>,
    limit: usize,
}

impl Executors {
    /// 完整流程执行器：爬取 → 清洗 → 分析 → 知识卡生成
    ///
    /// 四个阶段分别占据 5→25 / 25→50 / 50→75 / 75→95 的进度区间。
    /// 中间阶段产出为空不算失败，下游照常在空输入上运行。
    pub(crate) async fn run_full_pipeline(
        &self,
        task: &Arc<Mutex<AutomationTask>>,
    ) -> SchedulerResult<serde_json::Value> {
        Self::set_progress(task, 5.0);
        let config: PipelineTaskConfig = Self::task_config(task)?;

        // 阶段1: 爬取数据
        info!("阶段1: 开始爬取数据");
        let mut all_crawl_results: Vec<RawPost> = Vec::new();
        let platform_count = config.platforms.len().max(1);
        let per_platform = config.limit / platform_count;

        for (i, platform) in config.platforms.iter().enumerate() {
            Self::set_progress(task, 5.0 + ((i + 1) as f64) * 20.0 / platform_count as f64);
            let outcome = self
                .crawler
                .crawl(platform, &config.keywords, per_platform)
                .await?;
            if outcome.success {
                all_crawl_results.extend(outcome.crawl_results);
            }
        }
        Self::set_progress(task, 25.0);

        // 阶段2: 数据清洗，按质量阈值过滤
        info!("阶段2: 开始数据清洗");
        let total = all_crawl_results.len().max(1);
        let mut cleaned_data: Vec<CleanedPost> = Vec::new();
        for (i, post) in all_crawl_results.iter().enumerate() {
            if i % 10 == 0 {
                Self::set_progress(task, 25.0 + ((i + 1) as f64) * 20.0 / total as f64);
            }
            if let Some(cleaned) = self.cleaner.clean(post) {
                if cleaned.quality_score >= self.config.quality_threshold {
                    cleaned_data.push(cleaned);
                }
            }
        }
        Self::set_progress(task, 50.0);

        // 阶段3: AI分析
        info!("阶段3: 开始AI分析");
        let analysis_results = if cleaned_data.is_empty() {
            Vec::new()
        } else {
            self.analysis.batch_analyze(&cleaned_data).await?
        };
        Self::set_progress(task, 75.0);

        // 阶段4: 生成知识卡
        info!("阶段4: 开始生成知识卡");
        let created_card_ids = self
            .cards
            .batch_create_from_analysis(&analysis_results)
            .await?;
        Self::set_progress(task, 95.0);

        info!(
            "完整流程完成，爬取: {}, 清洗: {}, 分析: {}, 创建知识卡: {}",
            all_crawl_results.len(),
            cleaned_data.len(),
            analysis_results.len(),
            created_card_ids.len()
        );

        // 只保留前5个分析结果样本，避免结果体积失控
        let sample: Vec<_> = analysis_results.iter().take(5).collect();

        Ok(json!({
            "total_crawled": all_crawl_results.len(),
            "total_cleaned": cleaned_data.len(),
            "total_analyzed": analysis_results.len(),
            "total_cards_created": created_card_ids.len(),
            "created_card_ids": created_card_ids,
            "analysis_results": sample,
        }))
    }
}
