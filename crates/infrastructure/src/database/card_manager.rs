use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use meme_commons_core::models::{AnalysisResult, KnowledgeCard};
use meme_commons_core::ports::CardManager;
use meme_commons_core::SchedulerResult;

/// 知识卡的SQLite管理器
///
/// 标题是知识卡的自然键：同名梗的新分析更新既有卡片而不是另建一张。
pub struct SqliteCardManager {
    pool: SqlitePool,
}

impl SqliteCardManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert(&self, result: &AnalysisResult) -> SchedulerResult<String> {
        let examples = serde_json::to_string(&result.examples)?;
        let tags = serde_json::to_string(&result.tags)?;
        let now = Utc::now();

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM knowledge_cards WHERE title = ?")
                .bind(&result.title)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE knowledge_cards
                    SET origin = ?, meaning = ?, examples = ?, tags = ?,
                        trend_score = ?, last_updated = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&result.origin)
                .bind(&result.meaning)
                .bind(&examples)
                .bind(&tags)
                .bind(result.trend_score)
                .bind(now)
                .bind(&id)
                .execute(&self.pool)
                .await?;

                debug!("更新知识卡: {} ({})", result.title, id);
                Ok(id)
            }
            None => {
                let id = Uuid::new_v4().to_string();
                sqlx::query(
                    r#"
                    INSERT INTO knowledge_cards
                        (id, title, origin, meaning, examples, tags, trend_score,
                         created_at, last_updated)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(&result.title)
                .bind(&result.origin)
                .bind(&result.meaning)
                .bind(&examples)
                .bind(&tags)
                .bind(result.trend_score)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;

                debug!("创建知识卡: {} ({})", result.title, id);
                Ok(id)
            }
        }
    }

    pub async fn get_card(&self, id: &str) -> SchedulerResult<Option<KnowledgeCard>> {
        let row = sqlx::query("SELECT * FROM knowledge_cards WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_card).transpose()
    }

    fn row_to_card(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<KnowledgeCard> {
        let examples: String = row.try_get("examples")?;
        let tags: String = row.try_get("tags")?;
        Ok(KnowledgeCard {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            origin: row.try_get("origin")?,
            meaning: row.try_get("meaning")?,
            examples: serde_json::from_str(&examples)?,
            tags: serde_json::from_str(&tags)?,
            trend_score: row.try_get("trend_score")?,
            created_at: row.try_get("created_at")?,
            last_updated: row.try_get("last_updated")?,
        })
    }
}

#[async_trait]
impl CardManager for SqliteCardManager {
    async fn batch_create_from_analysis(
        &self,
        results: &[AnalysisResult],
    ) -> SchedulerResult<Vec<String>> {
        let mut ids = Vec::with_capacity(results.len());
        for result in results {
            ids.push(self.upsert(result).await?);
        }

        info!("批量写入知识卡完成，涉及 {} 张卡片", ids.len());
        Ok(ids)
    }
}
