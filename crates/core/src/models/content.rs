use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 爬虫抓取到的原始帖子
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub platform: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub timestamp: DateTime<Utc>,
}

/// 帖子的互动指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    /// 加权互动分
    pub score: f64,
}

/// 清洗后的帖子，quality_score 取值 0-10
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedPost {
    pub id: String,
    pub platform: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub engagement: Engagement,
    pub sentiment: String,
    pub keywords: Vec<String>,
    pub meme_type: Option<String>,
    pub quality_score: f64,
    pub processed_at: DateTime<Utc>,
}

/// 单条帖子的分析结果，知识卡创建的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub origin: String,
    pub meaning: String,
    pub examples: Vec<String>,
    pub tags: Vec<String>,
    pub trend_score: f64,
    pub source_post_ids: Vec<String>,
}

/// 知识卡：描述一个梗的结构化摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeCard {
    pub id: String,
    pub title: String,
    pub origin: String,
    pub meaning: String,
    pub examples: Vec<String>,
    pub tags: Vec<String>,
    pub trend_score: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// 一次爬取调用的结果。无结果不算失败，success 只在硬故障时为 false
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub success: bool,
    pub crawl_results: Vec<RawPost>,
}

impl CrawlOutcome {
    pub fn ok(crawl_results: Vec<RawPost>) -> Self {
        Self {
            success: true,
            crawl_results,
        }
    }
}
