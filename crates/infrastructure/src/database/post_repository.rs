use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use meme_commons_core::models::RawPost;
use meme_commons_core::ports::PostRepository;
use meme_commons_core::SchedulerResult;

/// 原始帖子的SQLite仓库
pub struct SqlitePostRepository {
    pool: SqlitePool,
}

impl SqlitePostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<RawPost> {
        Ok(RawPost {
            id: row.try_get("id")?,
            platform: row.try_get("platform")?,
            url: row.try_get("url")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            author: row.try_get("author")?,
            likes: row.try_get("likes")?,
            comments: row.try_get("comments")?,
            shares: row.try_get("shares")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    /// 按主键去重写入，重复帖子静默跳过
    async fn store_posts(&self, posts: &[RawPost]) -> SchedulerResult<u64> {
        let mut stored = 0u64;
        for post in posts {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO posts_raw
                    (id, platform, url, title, content, author, likes, comments, shares, timestamp)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&post.id)
            .bind(&post.platform)
            .bind(&post.url)
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.author)
            .bind(post.likes)
            .bind(post.comments)
            .bind(post.shares)
            .bind(post.timestamp)
            .execute(&self.pool)
            .await?;
            stored += result.rows_affected();
        }

        debug!("写入 {}/{} 条原始帖子", stored, posts.len());
        Ok(stored)
    }

    async fn fetch_unprocessed(&self, limit: usize) -> SchedulerResult<Vec<RawPost>> {
        let rows = sqlx::query(
            "SELECT * FROM posts_raw WHERE processed = 0 ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_post).collect()
    }

    async fn mark_processed(&self, ids: &[String]) -> SchedulerResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "UPDATE posts_raw SET processed = 1 WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }
}
