use async_trait::async_trait;

use crate::error::SchedulerResult;
use crate::models::{AnalysisResult, CleanedPost, CrawlOutcome, RawPost};

/// 爬虫协作者接口
///
/// 无结果必须返回成功的空结果，只有硬故障（网络、认证）才返回错误。
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(
        &self,
        platform: &str,
        keywords: &[String],
        limit: usize,
    ) -> SchedulerResult<CrawlOutcome>;
}

/// 原始帖子存储接口
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// 存储一批原始帖子
    async fn store_posts(&self, posts: &[RawPost]) -> SchedulerResult<u64>;

    /// 拉取未处理的帖子，上限 limit 条
    async fn fetch_unprocessed(&self, limit: usize) -> SchedulerResult<Vec<RawPost>>;

    /// 将帖子标记为已处理
    async fn mark_processed(&self, ids: &[String]) -> SchedulerResult<()>;
}

/// 文本清洗接口，纯函数式：低质量帖子返回 None
pub trait DataCleaner: Send + Sync {
    fn clean(&self, post: &RawPost) -> Option<CleanedPost>;
}

/// 分析引擎接口（LLM 或启发式兜底）
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn batch_analyze(&self, posts: &[CleanedPost]) -> SchedulerResult<Vec<AnalysisResult>>;
}

/// 知识卡管理接口
#[async_trait]
pub trait CardManager: Send + Sync {
    /// 从分析结果批量创建（或更新）知识卡，返回涉及的卡片ID
    async fn batch_create_from_analysis(
        &self,
        results: &[AnalysisResult],
    ) -> SchedulerResult<Vec<String>>;
}
