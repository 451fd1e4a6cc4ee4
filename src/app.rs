use std::sync::Arc;

use anyhow::{Context, Result};
use meme_commons_api::{create_routes, AppState};
use meme_commons_core::AppConfig;
use meme_commons_infrastructure::{
    init_pool, HttpCrawler, MemeAnalysisEngine, MemeDataCleaner, SqliteCardManager,
    SqlitePostRepository,
};
use meme_commons_scheduler::{AutomationScheduler, Executors};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

/// 主应用程序：组装协作者并托管调度循环与HTTP服务
pub struct Application {
    config: AppConfig,
    scheduler: Arc<AutomationScheduler>,
}

impl Application {
    /// 创建应用实例，完成数据库初始化和依赖装配
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");
        info!("数据库: {}", config.database.url);

        let pool = init_pool(&config.database)
            .await
            .context("初始化数据库失败")?;

        let post_repository = Arc::new(SqlitePostRepository::new(pool.clone()));
        let card_manager = Arc::new(SqliteCardManager::new(pool));
        let cleaner = Arc::new(MemeDataCleaner::new());
        let crawler =
            Arc::new(HttpCrawler::new(config.crawler.clone()).context("创建爬虫客户端失败")?);
        let analysis =
            Arc::new(MemeAnalysisEngine::new(config.llm.clone()).context("创建分析引擎失败")?);

        let executors = Executors::new(
            crawler,
            cleaner,
            analysis,
            card_manager,
            post_repository,
            config.scheduler.clone(),
        );
        let scheduler = Arc::new(AutomationScheduler::new(executors, config.scheduler.clone()));

        Ok(Self { config, scheduler })
    }

    /// 运行应用程序直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        // 启动调度循环
        self.scheduler.start();

        // 组装HTTP服务
        let mut app = create_routes(AppState {
            scheduler: Arc::clone(&self.scheduler),
        })
        .layer(TraceLayer::new_for_http());

        if self.config.api.cors_enabled {
            app = app.layer(CorsLayer::permissive());
        }

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;

        info!("HTTP服务启动在 http://{}", self.config.api.bind_address);

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP服务运行失败: {e}");
            }
        });

        // 等待关闭信号
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }
        info!("应用收到关闭信号");

        // 先停HTTP入口，再停调度循环
        server_handle.abort();
        self.scheduler.stop().await;

        info!("应用已停止");
        Ok(())
    }
}
