use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use meme_commons_core::config::{CrawlerConfig, PlatformConfig};
use meme_commons_core::models::{CrawlOutcome, RawPost};
use meme_commons_core::ports::Crawler;
use meme_commons_core::{SchedulerError, SchedulerResult};

/// 多平台HTTP爬虫
///
/// 平台API不返回预期结构时算软失败，返回成功的空结果；
/// 只有网络层错误才向上传播。
pub struct HttpCrawler {
    client: reqwest::Client,
    config: CrawlerConfig,
}

impl HttpCrawler {
    pub fn new(config: CrawlerConfig) -> SchedulerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    fn platform_config(&self, platform: &str) -> SchedulerResult<&PlatformConfig> {
        self.config
            .platforms
            .get(platform)
            .ok_or_else(|| SchedulerError::Crawl(format!("不支持的平台: {platform}")))
    }

    /// 请求前的限速延迟，带随机抖动
    async fn throttle(&self, platform: &PlatformConfig) {
        let jitter: f64 = rand::rng().random_range(0.1..0.5);
        tokio::time::sleep(Duration::from_secs_f64(platform.delay_seconds + jitter)).await;
    }

    async fn fetch_json(&self, url: &str, platform: &PlatformConfig) -> SchedulerResult<Value> {
        self.throttle(platform).await;

        let mut request = self
            .client
            .get(url)
            .header("User-Agent", &platform.user_agent)
            .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8");
        if !platform.cookie.is_empty() {
            request = request.header("Cookie", &platform.cookie);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// 微博：移动端容器搜索接口
    async fn crawl_weibo(&self, keywords: &[String], limit: usize) -> SchedulerResult<Vec<RawPost>> {
        let platform = self.platform_config("weibo")?;
        let mut posts = Vec::new();

        for keyword in keywords.iter().take(3) {
            let url = format!(
                "https://m.weibo.cn/api/container/getIndex?containerid=100103type%3D1%26q%3D{}",
                urlencode(keyword)
            );
            let data = self.fetch_json(&url, platform).await?;

            let cards = data
                .pointer("/data/cards")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for card in cards {
                let Some(mblog) = card.get("mblog") else {
                    continue;
                };
                let id = json_str(mblog, "id");
                let text = strip_html(&json_str(mblog, "text"));
                if text.is_empty() {
                    continue;
                }
                posts.push(RawPost {
                    id: if id.is_empty() {
                        Uuid::new_v4().to_string()
                    } else {
                        format!("weibo_{id}")
                    },
                    platform: "weibo".to_string(),
                    url: format!("https://m.weibo.cn/detail/{id}"),
                    title: text.chars().take(50).collect(),
                    content: text,
                    author: mblog
                        .pointer("/user/screen_name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    likes: json_i64(mblog, "attitudes_count"),
                    comments: json_i64(mblog, "comments_count"),
                    shares: json_i64(mblog, "reposts_count"),
                    timestamp: Utc::now(),
                });
                if posts.len() >= limit {
                    return Ok(posts);
                }
            }
        }
        Ok(posts)
    }

    /// bilibili：热门视频列表接口
    async fn crawl_bilibili(&self, limit: usize) -> SchedulerResult<Vec<RawPost>> {
        let platform = self.platform_config("bilibili")?;
        let url = format!(
            "https://api.bilibili.com/x/web-interface/popular?ps={}",
            limit.min(50)
        );
        let data = self.fetch_json(&url, platform).await?;

        let videos = data
            .pointer("/data/list")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut posts = Vec::new();
        for video in videos.iter().take(limit) {
            let title = json_str(video, "title");
            let desc = json_str(video, "desc");
            let bvid = json_str(video, "bvid");
            if title.is_empty() {
                continue;
            }
            posts.push(RawPost {
                id: if bvid.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    format!("bilibili_{bvid}")
                },
                platform: "bilibili".to_string(),
                url: format!("https://www.bilibili.com/video/{bvid}"),
                title: title.clone(),
                content: if desc.is_empty() {
                    title
                } else {
                    format!("{title}\n{desc}")
                },
                author: video
                    .pointer("/owner/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                likes: video
                    .pointer("/stat/like")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                comments: video
                    .pointer("/stat/reply")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                shares: video
                    .pointer("/stat/share")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                timestamp: Utc::now(),
            });
        }
        Ok(posts)
    }
}

#[async_trait]
impl Crawler for HttpCrawler {
    async fn crawl(
        &self,
        platform: &str,
        keywords: &[String],
        limit: usize,
    ) -> SchedulerResult<CrawlOutcome> {
        let results = match platform {
            "weibo" => self.crawl_weibo(keywords, limit).await?,
            "bilibili" => self.crawl_bilibili(limit).await?,
            "douyin" => {
                // 抖音开放接口需要登录凭证，未配置时跳过
                let douyin = self.platform_config("douyin")?;
                if douyin.cookie.is_empty() {
                    warn!("douyin 平台未配置Cookie，跳过爬取");
                    Vec::new()
                } else {
                    warn!("douyin 平台爬取暂未实现，返回空结果");
                    Vec::new()
                }
            }
            other => {
                return Err(SchedulerError::Crawl(format!("不支持的平台: {other}")));
            }
        };

        info!("从 {} 爬取到 {} 条帖子", platform, results.len());
        Ok(CrawlOutcome::ok(results))
    }
}

fn json_str(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn json_i64(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// 去掉微博正文里的HTML标签
fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn urlencode(s: &str) -> String {
    let mut out = String::new();
    for byte in s.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
