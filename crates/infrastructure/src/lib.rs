pub mod analysis;
pub mod cleaner;
pub mod crawler;
pub mod database;

pub use analysis::MemeAnalysisEngine;
pub use cleaner::MemeDataCleaner;
pub use crawler::HttpCrawler;
pub use database::{init_pool, SqliteCardManager, SqlitePostRepository};
