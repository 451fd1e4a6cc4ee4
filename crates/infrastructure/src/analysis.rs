use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use meme_commons_core::config::LlmConfig;
use meme_commons_core::models::{AnalysisResult, CleanedPost};
use meme_commons_core::ports::AnalysisEngine;
use meme_commons_core::SchedulerResult;

const ANALYSIS_PROMPT: &str = "你是一个专业的梗文化分析专家。请分析以下梗相关的内容。\n\n\
内容类型：{meme_type}\n分析内容：\n{content}\n\n\
请以JSON格式返回分析结果，只输出JSON，格式如下：\n\
{\"origin\": \"梗的起源描述\", \"core_meaning\": \"核心含义描述\", \
\"usage_scenarios\": [\"场景1\", \"场景2\"], \"popularity_score\": 7, \
\"tags\": [\"标签1\", \"标签2\"]}";

/// LLM返回的结构化分析字段
#[derive(Debug, Deserialize)]
struct LlmAnalysis {
    origin: String,
    core_meaning: String,
    #[serde(default)]
    usage_scenarios: Vec<String>,
    #[serde(default)]
    popularity_score: f64,
    #[serde(default)]
    tags: Vec<String>,
}

/// 梗文化分析引擎
///
/// 配置了API密钥时走LLM，否则回退到启发式分析；
/// 单条LLM调用失败同样回退，不让一条帖子拖垮整批。
pub struct MemeAnalysisEngine {
    client: reqwest::Client,
    config: LlmConfig,
}

impl MemeAnalysisEngine {
    pub fn new(config: LlmConfig) -> SchedulerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, config })
    }

    fn llm_enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn analyze_with_llm(&self, post: &CleanedPost) -> SchedulerResult<AnalysisResult> {
        let meme_type = post.meme_type.as_deref().unwrap_or("general");
        let content: String = post.content.chars().take(1000).collect();
        let prompt = ANALYSIS_PROMPT
            .replace("{meme_type}", meme_type)
            .replace("{content}", &content);

        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.3,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: serde_json::Value = response.json().await?;
        let text = payload
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        let parsed: LlmAnalysis = serde_json::from_str(extract_json(text))?;

        Ok(AnalysisResult {
            title: card_title(post),
            origin: parsed.origin,
            meaning: parsed.core_meaning,
            examples: if parsed.usage_scenarios.is_empty() {
                vec![content.chars().take(100).collect()]
            } else {
                parsed.usage_scenarios
            },
            tags: if parsed.tags.is_empty() {
                default_tags(post)
            } else {
                parsed.tags
            },
            trend_score: parsed.popularity_score.clamp(0.0, 10.0),
            source_post_ids: vec![post.id.clone()],
        })
    }

    /// 启发式分析：不依赖外部服务的规则兜底
    fn analyze_heuristic(&self, post: &CleanedPost) -> AnalysisResult {
        let title = card_title(post);
        AnalysisResult {
            title: title.clone(),
            origin: format!("主要起源于{}平台", post.platform),
            meaning: format!(
                "'{title}'是一个流行的网络梗，具体含义需要结合使用场景理解。"
            ),
            examples: vec![post.content.chars().take(100).collect()],
            tags: default_tags(post),
            trend_score: trend_score(post),
            source_post_ids: vec![post.id.clone()],
        }
    }
}

#[async_trait]
impl AnalysisEngine for MemeAnalysisEngine {
    async fn batch_analyze(&self, posts: &[CleanedPost]) -> SchedulerResult<Vec<AnalysisResult>> {
        info!("开始批量分析 {} 条帖子", posts.len());
        let mut results = Vec::with_capacity(posts.len());

        for (i, post) in posts.iter().enumerate() {
            let result = if self.llm_enabled() {
                match self.analyze_with_llm(post).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("LLM分析帖子 {} 失败，使用启发式兜底: {}", post.id, e);
                        self.analyze_heuristic(post)
                    }
                }
            } else {
                self.analyze_heuristic(post)
            };
            results.push(result);

            if (i + 1) % 10 == 0 {
                debug!("已分析 {}/{} 条帖子", i + 1, posts.len());
            }
            // LLM限流延迟
            if self.llm_enabled() {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }

        info!("批量分析完成，产出 {} 条结果", results.len());
        Ok(results)
    }
}

/// 知识卡标题：首选关键词，其次标题截断
fn card_title(post: &CleanedPost) -> String {
    if let Some(keyword) = post.keywords.first() {
        return keyword.clone();
    }
    let title: String = post.title.chars().take(20).collect();
    if title.is_empty() {
        "未知梗".to_string()
    } else {
        title
    }
}

fn default_tags(post: &CleanedPost) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(meme_type) = &post.meme_type {
        if meme_type != "general" {
            tags.push(meme_type.clone());
        }
    }
    tags.extend(post.keywords.iter().take(5).cloned());
    tags.dedup();
    tags
}

/// 趋势分数，0-10
///
/// 加权维度：互动分0.4、质量分0.3、新鲜度0.2、平台加成0.1。
fn trend_score(post: &CleanedPost) -> f64 {
    let engagement = post.engagement.score;
    let quality = post.quality_score / 10.0;

    let hours_old = (Utc::now() - post.timestamp).num_hours();
    let recency = if hours_old <= 24 {
        1.0
    } else if hours_old <= 168 {
        0.5
    } else {
        0.1
    };

    let platform_bonus = if matches!(post.platform.as_str(), "weibo" | "bilibili" | "douyin") {
        1.0
    } else {
        0.0
    };

    let score = engagement * 0.4 + quality * 0.3 + recency * 0.2 + platform_bonus * 0.1;
    (score * 10.0).clamp(0.0, 10.0)
}

/// LLM偶尔会把JSON包在代码块或说明文字里，截取首尾花括号之间的部分
fn extract_json(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}
