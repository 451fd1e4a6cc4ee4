use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_address: String,
    pub cors_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8002".to_string(),
            cors_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 工作池并发槽位数
    pub worker_count: usize,
    /// 调度循环间隔（秒）
    pub poll_interval_seconds: u64,
    /// 循环出错后的退避间隔（秒）
    pub error_backoff_seconds: u64,
    /// 运行中任务的超时时间（秒），默认2小时
    pub task_timeout_seconds: i64,
    /// 已完成历史的保留上限
    pub history_limit: usize,
    /// 分析任务单批处理的帖子上限
    pub analyze_batch_size: usize,
    /// 完整流程中清洗阶段的质量阈值（0-10）
    pub quality_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            poll_interval_seconds: 5,
            error_backoff_seconds: 10,
            task_timeout_seconds: 7200,
            history_limit: 100,
            analyze_batch_size: 100,
            quality_threshold: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://meme_commons.db".to_string(),
            max_connections: 5,
        }
    }
}

/// 单个平台的爬虫参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub user_agent: String,
    pub delay_seconds: f64,
    #[serde(default)]
    pub cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub timeout_seconds: u64,
    pub max_items: usize,
    pub platforms: HashMap<String, PlatformConfig>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        let desktop_ua =
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string();
        let mut platforms = HashMap::new();
        platforms.insert(
            "weibo".to_string(),
            PlatformConfig {
                user_agent: desktop_ua.clone(),
                delay_seconds: 1.5,
                cookie: String::new(),
            },
        );
        platforms.insert(
            "bilibili".to_string(),
            PlatformConfig {
                user_agent: desktop_ua,
                delay_seconds: 1.5,
                cookie: String::new(),
            },
        );
        platforms.insert(
            "douyin".to_string(),
            PlatformConfig {
                user_agent: "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/90.0.4430.91 Mobile Safari/537.36"
                    .to_string(),
                delay_seconds: 3.0,
                cookie: String::new(),
            },
        );

        Self {
            timeout_seconds: 30,
            max_items: 100,
            platforms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "qwen-plus".to_string(),
            endpoint: "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
                .to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            scheduler: SchedulerConfig::default(),
            database: DatabaseConfig::default(),
            crawler: CrawlerConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置：配置文件可选，环境变量覆盖文件值
    pub fn load(config_path: Option<&str>) -> SchedulerResult<Self> {
        let mut config = match config_path {
            Some(path) if Path::new(path).exists() => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    SchedulerError::config_error(format!("读取配置文件失败 {path}: {e}"))
                })?;
                toml::from_str(&content).map_err(|e| {
                    SchedulerError::config_error(format!("解析配置文件失败 {path}: {e}"))
                })?
            }
            _ => AppConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(key) = std::env::var("DASHSCOPE_API_KEY") {
            self.llm.api_key = key;
        }
        if let Ok(model) = std::env::var("DASHSCOPE_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(addr) = std::env::var("MCP_BIND_ADDRESS") {
            self.api.bind_address = addr;
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.scheduler.worker_count == 0 {
            return Err(SchedulerError::config_error("worker_count 必须大于0"));
        }
        if self.scheduler.history_limit == 0 {
            return Err(SchedulerError::config_error("history_limit 必须大于0"));
        }
        if !(0.0..=10.0).contains(&self.scheduler.quality_threshold) {
            return Err(SchedulerError::config_error(
                "quality_threshold 必须在0-10之间",
            ));
        }
        if self.database.url.is_empty() {
            return Err(SchedulerError::config_error("数据库URL不能为空"));
        }
        Ok(())
    }
}
