mod card_manager;
mod post_repository;

pub use card_manager::SqliteCardManager;
pub use post_repository::SqlitePostRepository;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use meme_commons_core::config::DatabaseConfig;
use meme_commons_core::SchedulerResult;

/// 创建SQLite连接池并执行建表迁移
pub async fn init_pool(config: &DatabaseConfig) -> SchedulerResult<SqlitePool> {
    debug!("初始化数据库连接池: {}", config.url);

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts_raw (
            id TEXT PRIMARY KEY,
            platform TEXT NOT NULL,
            url TEXT,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT '',
            likes INTEGER NOT NULL DEFAULT 0,
            comments INTEGER NOT NULL DEFAULT 0,
            shares INTEGER NOT NULL DEFAULT 0,
            timestamp DATETIME NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge_cards (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL UNIQUE,
            origin TEXT NOT NULL DEFAULT '',
            meaning TEXT NOT NULL DEFAULT '',
            examples TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            trend_score REAL NOT NULL DEFAULT 0.0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_updated DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_posts_raw_platform ON posts_raw(platform)",
        "CREATE INDEX IF NOT EXISTS idx_posts_raw_processed ON posts_raw(processed)",
        "CREATE INDEX IF NOT EXISTS idx_posts_raw_timestamp ON posts_raw(timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_knowledge_cards_title ON knowledge_cards(title)",
    ];
    for index_sql in indexes {
        sqlx::query(index_sql).execute(pool).await?;
    }

    debug!("数据库迁移完成");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    init_pool(&config).await.unwrap()
}
