use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use meme_commons_core::config::SchedulerConfig;
use meme_commons_core::models::{
    AnalysisResult, AutomationTask, CleanedPost, CrawlOutcome, Engagement, RawPost, TaskPriority,
    TaskStatus,
};
use meme_commons_core::ports::{AnalysisEngine, CardManager, Crawler, DataCleaner, PostRepository};
use meme_commons_core::{SchedulerError, SchedulerResult};
use meme_commons_scheduler::{AutomationScheduler, Executors};
use tokio::sync::Notify;

// ----------------------------------------------------------------------
// 桩协作者
// ----------------------------------------------------------------------

fn make_post(id: &str, content: &str) -> RawPost {
    RawPost {
        id: id.to_string(),
        platform: "weibo".to_string(),
        url: format!("https://example.com/{id}"),
        title: format!("帖子 {id}"),
        content: content.to_string(),
        author: "测试用户".to_string(),
        likes: 10,
        comments: 2,
        shares: 1,
        timestamp: Utc::now(),
    }
}

/// 可配置的桩爬虫：记录调用顺序，可选延迟、失败、永久或可释放的阻塞
struct StubCrawler {
    posts_per_call: Vec<RawPost>,
    delay: Duration,
    block_forever: bool,
    fail_message: Option<String>,
    gate: Option<(String, Arc<Notify>)>,
    calls: Mutex<Vec<String>>,
    platform_calls: Mutex<Vec<(String, usize)>>,
}

impl StubCrawler {
    fn instant(posts: Vec<RawPost>) -> Self {
        Self {
            posts_per_call: posts,
            delay: Duration::ZERO,
            block_forever: false,
            fail_message: None,
            gate: None,
            calls: Mutex::new(Vec::new()),
            platform_calls: Mutex::new(Vec::new()),
        }
    }

    fn delayed(posts: Vec<RawPost>, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::instant(posts)
        }
    }

    fn blocking() -> Self {
        Self {
            block_forever: true,
            ..Self::instant(Vec::new())
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            fail_message: Some(message.to_string()),
            ..Self::instant(Vec::new())
        }
    }

    /// 首关键词匹配时阻塞，直到返回的 Notify 被触发
    fn gated_on(keyword: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let crawler = Self {
            gate: Some((keyword.to_string(), Arc::clone(&gate))),
            ..Self::instant(Vec::new())
        };
        (crawler, gate)
    }

    fn recorded_keywords(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn recorded_platform_calls(&self) -> Vec<(String, usize)> {
        self.platform_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Crawler for StubCrawler {
    async fn crawl(
        &self,
        platform: &str,
        keywords: &[String],
        limit: usize,
    ) -> SchedulerResult<CrawlOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push(keywords.first().cloned().unwrap_or_default());
        self.platform_calls
            .lock()
            .unwrap()
            .push((platform.to_string(), limit));

        if let Some(message) = &self.fail_message {
            return Err(SchedulerError::Crawl(message.clone()));
        }
        if self.block_forever {
            futures::future::pending::<()>().await;
        }
        if let Some((gated_keyword, gate)) = &self.gate {
            if keywords.first() == Some(gated_keyword) {
                gate.notified().await;
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let results: Vec<RawPost> = self.posts_per_call.iter().take(limit).cloned().collect();
        Ok(CrawlOutcome::ok(results))
    }
}

/// 内容为 "good" 的帖子质量 9 分，其余 2 分
struct StubCleaner;

impl DataCleaner for StubCleaner {
    fn clean(&self, post: &RawPost) -> Option<CleanedPost> {
        let quality_score = if post.content == "good" { 9.0 } else { 2.0 };
        Some(CleanedPost {
            id: post.id.clone(),
            platform: post.platform.clone(),
            url: post.url.clone(),
            title: post.title.clone(),
            content: post.content.clone(),
            author: post.author.clone(),
            timestamp: post.timestamp,
            engagement: Engagement {
                likes: post.likes,
                comments: post.comments,
                shares: post.shares,
                score: 0.0,
            },
            sentiment: "neutral".to_string(),
            keywords: Vec::new(),
            meme_type: None,
            quality_score,
            processed_at: Utc::now(),
        })
    }
}

/// 记录每次收到的帖子数量
#[derive(Default)]
struct StubAnalysis {
    batch_sizes: Mutex<Vec<usize>>,
}

#[async_trait]
impl AnalysisEngine for StubAnalysis {
    async fn batch_analyze(&self, posts: &[CleanedPost]) -> SchedulerResult<Vec<AnalysisResult>> {
        self.batch_sizes.lock().unwrap().push(posts.len());
        Ok(posts
            .iter()
            .map(|p| AnalysisResult {
                title: p.title.clone(),
                origin: p.platform.clone(),
                meaning: "测试含义".to_string(),
                examples: Vec::new(),
                tags: Vec::new(),
                trend_score: 5.0,
                source_post_ids: vec![p.id.clone()],
            })
            .collect())
    }
}

#[derive(Default)]
struct StubCards {
    received: Mutex<Vec<usize>>,
}

#[async_trait]
impl CardManager for StubCards {
    async fn batch_create_from_analysis(
        &self,
        results: &[AnalysisResult],
    ) -> SchedulerResult<Vec<String>> {
        self.received.lock().unwrap().push(results.len());
        Ok((0..results.len()).map(|i| format!("card_{i}")).collect())
    }
}

#[derive(Default)]
struct StubPosts {
    stored: Mutex<Vec<RawPost>>,
    processed: Mutex<HashSet<String>>,
}

#[async_trait]
impl PostRepository for StubPosts {
    async fn store_posts(&self, posts: &[RawPost]) -> SchedulerResult<u64> {
        self.stored.lock().unwrap().extend_from_slice(posts);
        Ok(posts.len() as u64)
    }

    async fn fetch_unprocessed(&self, limit: usize) -> SchedulerResult<Vec<RawPost>> {
        let processed = self.processed.lock().unwrap();
        Ok(self
            .stored
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !processed.contains(&p.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, ids: &[String]) -> SchedulerResult<()> {
        self.processed.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

// ----------------------------------------------------------------------
// 组装
// ----------------------------------------------------------------------

fn test_config(worker_count: usize) -> SchedulerConfig {
    SchedulerConfig {
        worker_count,
        poll_interval_seconds: 0,
        error_backoff_seconds: 0,
        task_timeout_seconds: 7200,
        history_limit: 100,
        analyze_batch_size: 100,
        quality_threshold: 6.0,
    }
}

fn build_scheduler(crawler: Arc<StubCrawler>, config: SchedulerConfig) -> Arc<AutomationScheduler> {
    build_scheduler_with(
        crawler,
        Arc::new(StubAnalysis::default()),
        Arc::new(StubCards::default()),
        Arc::new(StubPosts::default()),
        config,
    )
}

fn build_scheduler_with(
    crawler: Arc<StubCrawler>,
    analysis: Arc<StubAnalysis>,
    cards: Arc<StubCards>,
    posts: Arc<StubPosts>,
    config: SchedulerConfig,
) -> Arc<AutomationScheduler> {
    let executors = Executors::new(
        crawler,
        Arc::new(StubCleaner),
        analysis,
        cards,
        posts,
        config.clone(),
    );
    Arc::new(AutomationScheduler::new(executors, config))
}

/// 手动驱动调度循环直到任务进入终态（或超时）
async fn drive_until_finished(
    scheduler: &Arc<AutomationScheduler>,
    task_id: &str,
) -> AutomationTask {
    for _ in 0..200 {
        scheduler.tick_once();
        tokio::time::sleep(Duration::from_millis(10)).await;
        if let Some(task) = scheduler.get_task(task_id) {
            if task.is_finished() {
                return task;
            }
        }
    }
    panic!("任务 {task_id} 未在预期时间内进入终态");
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}

// ----------------------------------------------------------------------
// 调度语义
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_submissions_beyond_capacity_stay_pending() {
    let scheduler = build_scheduler(Arc::new(StubCrawler::blocking()), test_config(3));

    for i in 0..5 {
        let kw = vec![format!("梗{i}")];
        scheduler
            .submit_crawl("weibo", &kw, 10, TaskPriority::Normal)
            .unwrap();
    }

    scheduler.tick_once();

    let status = scheduler.system_status();
    assert_eq!(status.running_tasks, 3);
    assert_eq!(status.pending_tasks, 2);
    assert_eq!(status.stats.total_tasks, 5);

    assert_eq!(
        scheduler.list_tasks(Some(TaskStatus::Running), 20).len(),
        3
    );
    assert_eq!(
        scheduler.list_tasks(Some(TaskStatus::Pending), 20).len(),
        2
    );
}

#[tokio::test]
async fn test_timed_out_task_is_disposed_as_failed() {
    let mut config = test_config(1);
    config.task_timeout_seconds = 0;
    let scheduler = build_scheduler(Arc::new(StubCrawler::blocking()), config);

    let task_id = scheduler
        .submit_crawl("weibo", &keywords(&["梗"]), 10, TaskPriority::Normal)
        .unwrap();

    scheduler.tick_once();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    scheduler.tick_once();

    let task = scheduler.get_task(&task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("任务执行超时"));
    assert!(task.completed_at.is_some());

    let status = scheduler.system_status();
    assert_eq!(status.running_tasks, 0);
    assert_eq!(status.stats.failed_tasks, 1);
}

#[tokio::test]
async fn test_cancel_pending_task() {
    let scheduler = build_scheduler(Arc::new(StubCrawler::blocking()), test_config(1));

    // 占住唯一的工作槽
    let blocker_id = scheduler
        .submit_crawl("weibo", &keywords(&["阻塞"]), 10, TaskPriority::Urgent)
        .unwrap();
    scheduler.tick_once();
    assert_eq!(
        scheduler.get_task(&blocker_id).unwrap().status,
        TaskStatus::Running
    );

    let pending_id = scheduler
        .submit_crawl("weibo", &keywords(&["待取消"]), 10, TaskPriority::Normal)
        .unwrap();

    assert!(scheduler.cancel(&pending_id));

    let pending_listed = scheduler.list_tasks(Some(TaskStatus::Pending), 20);
    assert!(pending_listed.iter().all(|t| t.task_id != pending_id));

    let task = scheduler.get_task(&pending_id).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.started_at.is_none());

    // 未知任务取消返回 false 且不产生副作用
    let before = scheduler.system_status();
    assert!(!scheduler.cancel("no_such_task"));
    let after = scheduler.system_status();
    assert_eq!(before.pending_tasks, after.pending_tasks);
    assert_eq!(before.running_tasks, after.running_tasks);
}

#[tokio::test]
async fn test_cancel_running_task_is_bookkeeping_only() {
    let scheduler = build_scheduler(Arc::new(StubCrawler::blocking()), test_config(1));

    let task_id = scheduler
        .submit_crawl("weibo", &keywords(&["梗"]), 10, TaskPriority::Normal)
        .unwrap();
    scheduler.tick_once();

    assert!(scheduler.cancel(&task_id));
    let task = scheduler.get_task(&task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(scheduler.system_status().running_tasks, 0);
}

#[tokio::test]
async fn test_history_never_exceeds_cap_and_evicts_oldest() {
    let mut config = test_config(3);
    config.history_limit = 5;
    let posts = Arc::new(StubPosts::default());
    let scheduler = build_scheduler_with(
        Arc::new(StubCrawler::instant(Vec::new())),
        Arc::new(StubAnalysis::default()),
        Arc::new(StubCards::default()),
        posts,
        config,
    );

    // 没有未处理数据的分析任务立即完成
    let mut ids = Vec::new();
    for _ in 0..8 {
        ids.push(
            scheduler
                .submit_analysis("recent", TaskPriority::Normal)
                .unwrap(),
        );
    }

    for id in &ids {
        drive_until_finished(&scheduler, id).await;
    }

    let status = scheduler.system_status();
    assert_eq!(status.total_completed, 5);
    assert_eq!(status.stats.completed_tasks, 8);

    // 最早的3个已被逐出，不再可查
    for id in &ids[..3] {
        assert!(scheduler.get_task(id).is_none());
    }
    for id in &ids[3..] {
        assert!(scheduler.get_task(id).is_some());
    }
}

#[tokio::test]
async fn test_terminal_reads_are_idempotent() {
    let posts = vec![make_post("p1", "good")];
    let scheduler = build_scheduler(Arc::new(StubCrawler::instant(posts)), test_config(1));

    let task_id = scheduler
        .submit_crawl("weibo", &keywords(&["梗"]), 10, TaskPriority::Normal)
        .unwrap();
    let first = drive_until_finished(&scheduler, &task_id).await;
    assert_eq!(first.status, TaskStatus::Completed);

    for _ in 0..3 {
        scheduler.tick_once();
        let again = scheduler.get_task(&task_id).unwrap();
        assert_eq!(again.status, first.status);
        assert_eq!(again.result, first.result);
        assert_eq!(again.completed_at, first.completed_at);
    }
}

#[tokio::test]
async fn test_empty_keywords_rejected_before_enqueue() {
    let scheduler = build_scheduler(Arc::new(StubCrawler::blocking()), test_config(1));

    assert!(scheduler
        .submit_crawl("weibo", &[], 10, TaskPriority::Normal)
        .is_err());
    assert!(scheduler
        .submit_full_pipeline(&keywords(&["weibo"]), &[], 10, TaskPriority::Normal)
        .is_err());

    let status = scheduler.system_status();
    assert_eq!(status.pending_tasks, 0);
    assert_eq!(status.stats.total_tasks, 0);
}

#[tokio::test]
async fn test_stop_before_start_is_noop() {
    let scheduler = build_scheduler(Arc::new(StubCrawler::blocking()), test_config(1));
    scheduler.stop().await;
    assert!(!scheduler.is_running());
}

// ----------------------------------------------------------------------
// 端到端场景
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_end_to_end_crawl_task() {
    let posts: Vec<RawPost> = (0..7).map(|i| make_post(&format!("p{i}"), "good")).collect();
    let crawler = Arc::new(StubCrawler::delayed(posts, Duration::from_millis(50)));
    let scheduler = build_scheduler(crawler, test_config(3));

    scheduler.start();
    let task_id = scheduler
        .submit_crawl("weibo", &keywords(&["梗"]), 10, TaskPriority::Normal)
        .unwrap();

    let mut finished = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if let Some(task) = scheduler.get_task(&task_id) {
            if task.is_finished() {
                finished = Some(task);
                break;
            }
        }
    }
    scheduler.stop().await;

    let task = finished.expect("任务未完成");
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100.0);
    let result = task.result.unwrap();
    assert_eq!(result["crawled_count"], 7);
    assert_eq!(result["platform"], "weibo");
}

#[tokio::test]
async fn test_crawl_all_platforms_fans_out_with_split_quota() {
    // 桩每次调用返回2条，少于单平台配额
    let posts = vec![make_post("a", "good"), make_post("b", "good")];
    let crawler = Arc::new(StubCrawler::instant(posts));
    let scheduler = build_scheduler(crawler.clone(), test_config(1));

    let task_id = scheduler
        .submit_crawl("all", &keywords(&["梗"]), 9, TaskPriority::Normal)
        .unwrap();
    let task = drive_until_finished(&scheduler, &task_id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100.0);

    // 依次遍历全部平台，每个平台分得 limit / 平台数 的配额
    assert_eq!(
        crawler.recorded_platform_calls(),
        vec![
            ("weibo".to_string(), 3),
            ("bilibili".to_string(), 3),
            ("douyin".to_string(), 3),
        ]
    );
    assert_eq!(task.result.unwrap()["crawled_count"], 6);
}

#[tokio::test]
async fn test_collaborator_error_fails_task_and_loop_continues() {
    let crawler = Arc::new(StubCrawler::failing("微博接口超时"));
    let scheduler = build_scheduler(crawler, test_config(1));

    let failed_id = scheduler
        .submit_crawl("weibo", &keywords(&["梗"]), 10, TaskPriority::Normal)
        .unwrap();
    let failed = drive_until_finished(&scheduler, &failed_id).await;

    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error_message.unwrap().contains("微博接口超时"));
    assert!(failed.completed_at.is_some());
    // 失败前已记录的进度保持原样
    assert_eq!(failed.progress, 10.0);
    assert_eq!(scheduler.system_status().stats.failed_tasks, 1);

    // 调度循环不受影响，后续任务照常派发并完成
    let next_id = scheduler
        .submit_analysis("recent", TaskPriority::Normal)
        .unwrap();
    let next = drive_until_finished(&scheduler, &next_id).await;
    assert_eq!(next.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_reverted_dispatch_keeps_fifo_position() {
    let mut config = test_config(1);
    config.task_timeout_seconds = 0;
    let (crawler, gate) = StubCrawler::gated_on("占位");
    let crawler = Arc::new(crawler);
    let scheduler = build_scheduler(crawler.clone(), config);

    // 占位任务拿住唯一槽位，随后被超时处置；许可仍被在途执行器持有
    let blocker_id = scheduler
        .submit_crawl("weibo", &keywords(&["占位"]), 10, TaskPriority::Normal)
        .unwrap();
    scheduler.tick_once();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    scheduler.tick_once();
    assert_eq!(
        scheduler.get_task(&blocker_id).unwrap().status,
        TaskStatus::Failed
    );

    // 两个同优先级任务排队；首个派发尝试因无空闲许可而回退
    let first_id = scheduler
        .submit_crawl("weibo", &keywords(&["first"]), 10, TaskPriority::Normal)
        .unwrap();
    let second_id = scheduler
        .submit_crawl("weibo", &keywords(&["second"]), 10, TaskPriority::Normal)
        .unwrap();
    scheduler.tick_once();
    assert_eq!(
        scheduler.get_task(&first_id).unwrap().status,
        TaskStatus::Pending
    );

    // 释放占位执行器后，回退的任务先于同级后来者执行
    gate.notify_one();
    drive_until_finished(&scheduler, &first_id).await;
    drive_until_finished(&scheduler, &second_id).await;

    assert_eq!(
        crawler.recorded_keywords(),
        vec!["占位", "first", "second"]
    );
}

#[tokio::test]
async fn test_end_to_end_full_pipeline_quality_filter() {
    // 10条帖子中4条通过质量阈值
    let posts: Vec<RawPost> = (0..10)
        .map(|i| make_post(&format!("p{i}"), if i < 4 { "good" } else { "bad" }))
        .collect();
    let crawler = Arc::new(StubCrawler::instant(posts));
    let analysis = Arc::new(StubAnalysis::default());
    let cards = Arc::new(StubCards::default());
    let scheduler = build_scheduler_with(
        crawler,
        analysis.clone(),
        cards.clone(),
        Arc::new(StubPosts::default()),
        test_config(1),
    );

    let task_id = scheduler
        .submit_full_pipeline(
            &keywords(&["weibo"]),
            &keywords(&["梗"]),
            10,
            TaskPriority::Normal,
        )
        .unwrap();
    let task = drive_until_finished(&scheduler, &task_id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.result.unwrap();
    assert_eq!(result["total_crawled"], 10);
    assert_eq!(result["total_cleaned"], 4);
    assert_eq!(result["total_analyzed"], 4);
    assert_eq!(result["total_cards_created"], 4);

    // 分析和知识卡阶段收到的恰好是通过清洗的4条
    assert_eq!(analysis.batch_sizes.lock().unwrap().as_slice(), &[4]);
    assert_eq!(cards.received.lock().unwrap().as_slice(), &[4]);
}

#[tokio::test]
async fn test_priority_order_with_single_worker() {
    let crawler = Arc::new(StubCrawler::instant(Vec::new()));
    let scheduler = build_scheduler(crawler.clone(), test_config(1));

    let submissions = [
        ("low1", TaskPriority::Low),
        ("urgent2", TaskPriority::Urgent),
        ("normal3", TaskPriority::Normal),
        ("urgent4", TaskPriority::Urgent),
        ("low5", TaskPriority::Low),
    ];
    let mut ids = Vec::new();
    for (tag, priority) in submissions {
        ids.push(
            scheduler
                .submit_crawl("weibo", &keywords(&[tag]), 10, priority)
                .unwrap(),
        );
    }

    for id in &ids {
        drive_until_finished(&scheduler, id).await;
    }

    assert_eq!(
        crawler.recorded_keywords(),
        vec!["urgent2", "urgent4", "normal3", "low1", "low5"]
    );
}

#[tokio::test]
async fn test_analyze_task_with_no_data_completes_with_message() {
    let scheduler = build_scheduler(Arc::new(StubCrawler::instant(Vec::new())), test_config(1));

    let task_id = scheduler
        .submit_analysis("recent", TaskPriority::Normal)
        .unwrap();
    let task = drive_until_finished(&scheduler, &task_id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100.0);
    assert_eq!(task.result.unwrap()["message"], "没有需要分析的数据");
}

#[tokio::test]
async fn test_analyze_task_consumes_stored_posts() {
    let posts_repo = Arc::new(StubPosts::default());
    posts_repo
        .store_posts(&[make_post("p1", "good"), make_post("p2", "good")])
        .await
        .unwrap();

    let analysis = Arc::new(StubAnalysis::default());
    let cards = Arc::new(StubCards::default());
    let scheduler = build_scheduler_with(
        Arc::new(StubCrawler::instant(Vec::new())),
        analysis,
        cards,
        posts_repo.clone(),
        test_config(1),
    );

    let task_id = scheduler
        .submit_analysis("recent", TaskPriority::High)
        .unwrap();
    let task = drive_until_finished(&scheduler, &task_id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.result.unwrap();
    assert_eq!(result["analyzed_count"], 2);
    assert_eq!(result["created_cards"], 2);

    // 已分析的帖子被标记处理，第二次分析无数据可做
    let remaining = posts_repo.fetch_unprocessed(100).await.unwrap();
    assert!(remaining.is_empty());
}
