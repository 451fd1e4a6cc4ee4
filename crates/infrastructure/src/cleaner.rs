use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;

use meme_commons_core::models::{CleanedPost, Engagement, RawPost};
use meme_commons_core::ports::DataCleaner;

/// 梗相关的停用词
const STOPWORDS: &[&str] = &[
    "的", "是", "了", "在", "有", "和", "就", "都", "而", "及", "与", "或", "一个", "这个",
    "那个", "什么", "怎么", "为什么", "如何", "多少", "很", "非常", "太", "真", "确实", "真的",
    "感觉", "觉得", "看起来", "说", "看", "听", "想", "知道", "了解", "明白", "理解", "吧",
    "呢", "啊", "哦", "额", "呃", "嗯", "诶",
];

/// 梗类型识别关键词
const MEME_TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("流行语", &["梗", "meme", "网络用语", "流行语", "口头禅", "网络梗"]),
    ("表情包", &["表情包", "表情", "emoji", "滑稽", "狗头", "保命"]),
    ("视频梗", &["视频", "片段", "剪辑", "鬼畜", "魔性"]),
    ("文字梗", &["段子", "笑话", "搞笑", "幽默", "沙雕", "有趣"]),
    ("二次元", &["二次元", "动漫", "番剧", "萌", "可爱"]),
    ("游戏", &["游戏", "电竞", "队友", "猪队友", "神操作"]),
    ("网络文化", &["网络文化", "网络流行", "当代青年", "精神小伙"]),
];

const POSITIVE_WORDS: &[&str] = &[
    "赞", "好", "棒", "优秀", "厉害", "666", "牛", "爱了", "太棒了",
];
const NEGATIVE_WORDS: &[&str] = &[
    "垃圾", "差", "烂", "不行", "讨厌", "恶心", "想吐", "受不了",
];

/// 梗文化数据清洗器
///
/// 文本规范化、关键词提取、情感倾向和质量评分都是纯函数计算，
/// 不依赖外部服务。
pub struct MemeDataCleaner;

impl MemeDataCleaner {
    pub fn new() -> Self {
        Self
    }

    /// 规范化正文：去掉URL、@用户名和话题标记，压缩空白和重复标点
    fn clean_content(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            // 跳过URL
            if c == 'h' {
                let rest: String = chars.clone().take(7).collect();
                if rest.starts_with("ttp://") || rest.starts_with("ttps://") {
                    while let Some(&next) = chars.peek() {
                        if next.is_whitespace() {
                            break;
                        }
                        chars.next();
                    }
                    continue;
                }
            }
            // 跳过@用户名
            if c == '@' {
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        chars.next();
                    } else {
                        break;
                    }
                }
                continue;
            }
            // 话题标记只去掉井号本身
            if c == '#' {
                continue;
            }
            out.push(c);
        }

        // 压缩空白
        let mut collapsed = String::with_capacity(out.len());
        let mut prev_space = false;
        for c in out.trim().chars() {
            if c.is_whitespace() {
                if !prev_space {
                    collapsed.push(' ');
                }
                prev_space = true;
            } else {
                prev_space = false;
                collapsed.push(c);
            }
        }

        // 重复的句末标点压成一个
        let mut result = String::with_capacity(collapsed.len());
        let mut prev: Option<char> = None;
        for c in collapsed.chars() {
            let repeatable = matches!(c, '!' | '?' | '.' | '。' | '！' | '？');
            if repeatable && prev == Some(c) {
                continue;
            }
            result.push(c);
            prev = Some(c);
        }

        result.trim().to_string()
    }

    fn clean_title(&self, title: &str) -> String {
        let title = title.trim();
        if title.chars().count() > 100 {
            let truncated: String = title.chars().take(97).collect();
            format!("{truncated}...")
        } else {
            title.to_string()
        }
    }

    fn clean_author(&self, author: &str) -> String {
        let author = author.trim();
        for prefix in ["用户", "网友", "博主", "UP主", "作者", "账号"] {
            if let Some(rest) = author.strip_prefix(prefix) {
                return rest.trim_start_matches([':', '：']).trim().to_string();
            }
        }
        author.to_string()
    }

    /// 情感倾向：正负情感词计数，比例落在 ±0.1 内算中性
    fn analyze_sentiment(&self, content: &str) -> String {
        let positive: i64 = POSITIVE_WORDS
            .iter()
            .map(|w| content.matches(w).count() as i64)
            .sum();
        let negative: i64 = NEGATIVE_WORDS
            .iter()
            .map(|w| content.matches(w).count() as i64)
            .sum();

        let total = positive + negative;
        if total == 0 {
            return "neutral".to_string();
        }
        let score = (positive - negative) as f64 / total as f64;
        if score > 0.1 {
            "positive".to_string()
        } else if score < -0.1 {
            "negative".to_string()
        } else {
            "neutral".to_string()
        }
    }

    /// 关键词提取：分词后按词频取前10
    ///
    /// 中文连续串额外生成两字滑窗词，作为没有完整分词器时的近似。
    fn extract_keywords(&self, content: &str) -> Vec<String> {
        let mut freq: HashMap<String, usize> = HashMap::new();

        for token in content.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let chars: Vec<char> = token.chars().collect();
            if chars.len() >= 2 && chars.len() <= 4 {
                let word = token.to_string();
                if !STOPWORDS.contains(&word.as_str()) {
                    *freq.entry(word).or_insert(0) += 1;
                }
            }
            if chars.len() > 2 && chars.iter().all(|c| is_cjk(*c)) {
                for window in chars.windows(2) {
                    let word: String = window.iter().collect();
                    if !STOPWORDS.contains(&word.as_str()) {
                        *freq.entry(word).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut sorted: Vec<(String, usize)> = freq.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted.into_iter().take(10).map(|(w, _)| w).collect()
    }

    /// 梗类型识别：取类型关键词命中数最高的类别，全部未命中归为 general
    fn identify_meme_type(&self, content: &str) -> Option<String> {
        if content.is_empty() {
            return None;
        }
        let lower = content.to_lowercase();

        let mut best: Option<(&str, usize)> = None;
        for (meme_type, keywords) in MEME_TYPE_KEYWORDS {
            let score: usize = keywords.iter().map(|k| lower.matches(k).count()).sum();
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((meme_type, score));
            }
        }

        Some(best.map_or_else(|| "general".to_string(), |(t, _)| t.to_string()))
    }

    /// 内容质量评分，0-10
    ///
    /// 维度：正文长度、互动量、时间新鲜度、平台、标题完整性。
    fn quality_score(&self, post: &RawPost) -> f64 {
        let mut score: f64 = 0.0;

        let content_length = post.content.chars().count();
        if (10..=500).contains(&content_length) {
            score += 3.0;
        } else if content_length > 0 {
            score += 1.0;
        }

        let total_engagement = post.likes + post.comments + post.shares;
        if total_engagement > 100 {
            score += 3.0;
        } else if total_engagement > 10 {
            score += 2.0;
        } else if total_engagement > 0 {
            score += 1.0;
        }

        let hours_old = (Utc::now() - post.timestamp).num_hours();
        if hours_old <= 24 {
            score += 2.0;
        } else if hours_old <= 168 {
            score += 1.0;
        }

        if matches!(post.platform.as_str(), "weibo" | "bilibili" | "douyin") {
            score += 1.0;
        }

        if post.title.chars().count() > 5 {
            score += 1.0;
        }

        score.min(10.0)
    }

    fn engagement(&self, post: &RawPost) -> Engagement {
        let total = post.likes + post.comments + post.shares;
        Engagement {
            likes: post.likes,
            comments: post.comments,
            shares: post.shares,
            score: (total as f64 / 1000.0).min(1.0),
        }
    }
}

impl Default for MemeDataCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl DataCleaner for MemeDataCleaner {
    fn clean(&self, post: &RawPost) -> Option<CleanedPost> {
        let content = self.clean_content(&post.content);
        if content.is_empty() {
            debug!("帖子 {} 清洗后内容为空，丢弃", post.id);
            return None;
        }

        Some(CleanedPost {
            id: post.id.clone(),
            platform: post.platform.clone(),
            url: post.url.clone(),
            title: self.clean_title(&post.title),
            content: content.clone(),
            author: self.clean_author(&post.author),
            timestamp: post.timestamp,
            engagement: self.engagement(post),
            sentiment: self.analyze_sentiment(&content),
            keywords: self.extract_keywords(&content),
            meme_type: self.identify_meme_type(&content),
            quality_score: self.quality_score(post),
            processed_at: Utc::now(),
        })
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}
