use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use meme_commons_core::models::{AutomationTask, RawPost};
use meme_commons_core::SchedulerResult;

use super::{Executors, KNOWN_PLATFORMS};

#[derive(Debug, Deserialize)]
struct CrawlTaskConfig {
    platform: String,
    keywords: Vec<String>,
    limit: usize,
}

impl Executors {
    /// 爬取任务执行器
    ///
    /// platform = "all" 时依次遍历全部已知平台，每个平台分得
    /// limit / 平台数 的配额；单平台时一次调用占掉大部分进度。
    /// 协作者出错时中止整个任务，已记录的进度保持原样。
    pub(crate) async fn run_crawl(
        &self,
        task: &Arc<Mutex<AutomationTask>>,
    ) -> SchedulerResult<serde_json::Value> {
        Self::set_progress(task, 10.0);
        let config: CrawlTaskConfig = Self::task_config(task)?;

        let mut crawl_results: Vec<RawPost> = Vec::new();

        if config.platform.eq_ignore_ascii_case("all") {
            let per_platform = config.limit / KNOWN_PLATFORMS.len();
            for platform in KNOWN_PLATFORMS {
                let outcome = self
                    .crawler
                    .crawl(platform, &config.keywords, per_platform)
                    .await?;
                if outcome.success {
                    crawl_results.extend(outcome.crawl_results);
                }
                Self::add_progress(task, 20.0);
            }
        } else {
            let outcome = self
                .crawler
                .crawl(&config.platform, &config.keywords, config.limit)
                .await?;
            if outcome.success {
                crawl_results = outcome.crawl_results;
            }
            Self::add_progress(task, 70.0);
        }

        // 入库，供后续分析任务消费
        if !crawl_results.is_empty() {
            self.posts.store_posts(&crawl_results).await?;
        }

        info!("爬取完成，共抓取 {} 条数据", crawl_results.len());

        Ok(json!({
            "crawled_count": crawl_results.len(),
            "platform": config.platform,
            "keywords": config.keywords,
            "crawl_results": crawl_results,
        }))
    }
}
