use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use meme_commons_core::config::SchedulerConfig;
use meme_commons_core::models::{AutomationTask, TaskPriority, TaskStatus, TaskType};
use meme_commons_core::{SchedulerError, SchedulerResult};

use crate::executors::Executors;
use crate::pool::WorkerPool;
use crate::queue::TaskQueue;
use crate::stats::{SchedulerStats, SystemStatus};

/// 共享任务记录的句柄。执行器写自己任务的字段，
/// 调度循环和门面只在锁内读取快照。
pub type TaskHandle = Arc<Mutex<AutomationTask>>;

/// 调度器内部共享状态。队列、运行表、历史的结构性修改
/// 都在这把锁内完成。
struct SchedulerState {
    queue: TaskQueue,
    running: HashMap<String, TaskHandle>,
    history: VecDeque<TaskHandle>,
    stats: SchedulerStats,
}

/// 自动化任务调度器
///
/// 单个控制循环驱动派发、超时检查和回收；执行器在有界工作池上
/// 并发运行。进程启动时显式构造一次，通过依赖注入传给HTTP层。
pub struct AutomationScheduler {
    state: Mutex<SchedulerState>,
    executors: Arc<Executors>,
    pool: WorkerPool,
    config: SchedulerConfig,
    is_running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AutomationScheduler {
    pub fn new(executors: Executors, config: SchedulerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(SchedulerState {
                queue: TaskQueue::new(),
                running: HashMap::new(),
                history: VecDeque::new(),
                stats: SchedulerStats::default(),
            }),
            pool: WorkerPool::new(config.worker_count),
            executors: Arc::new(executors),
            config,
            is_running: AtomicBool::new(false),
            shutdown_tx,
            loop_handle: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // 生命周期
    // ------------------------------------------------------------------

    /// 启动调度循环。重复调用是无操作。
    pub fn start(self: &Arc<Self>) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!("调度器已在运行中");
            return;
        }

        let _ = self.shutdown_tx.send(false);
        let scheduler = Arc::clone(self);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            scheduler.run_loop(shutdown_rx).await;
        });
        *self.loop_handle.lock().expect("loop handle lock poisoned") = Some(handle);

        info!("自动化任务调度器已启动");
    }

    /// 停止调度器：通知循环退出并有界等待，然后排空工作池。
    /// 未启动时调用是无操作。
    pub async fn stop(&self) {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(true);
        let handle = self
            .loop_handle
            .lock()
            .expect("loop handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(10), handle)
                .await
                .is_err()
            {
                warn!("调度循环退出超时");
            }
        }

        self.pool.drain(Duration::from_secs(30)).await;
        info!("自动化任务调度器已停止");
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // 提交与查询门面
    // ------------------------------------------------------------------

    /// 提交爬取任务
    pub fn submit_crawl(
        &self,
        platform: &str,
        keywords: &[String],
        limit: usize,
        priority: TaskPriority,
    ) -> SchedulerResult<String> {
        if keywords.is_empty() {
            return Err(SchedulerError::invalid_params("keywords 不能为空"));
        }

        let task = AutomationTask::new(
            TaskType::Crawl,
            priority,
            serde_json::json!({
                "platform": platform,
                "keywords": keywords,
                "limit": limit,
            }),
        );
        Ok(self.enqueue(task))
    }

    /// 提交分析任务
    pub fn submit_analysis(&self, source: &str, priority: TaskPriority) -> SchedulerResult<String> {
        let task = AutomationTask::new(
            TaskType::Analyze,
            priority,
            serde_json::json!({ "source": source }),
        );
        Ok(self.enqueue(task))
    }

    /// 提交完整流程任务（抓取→清洗→分析→知识卡）
    pub fn submit_full_pipeline(
        &self,
        platforms: &[String],
        keywords: &[String],
        limit: usize,
        priority: TaskPriority,
    ) -> SchedulerResult<String> {
        if keywords.is_empty() {
            return Err(SchedulerError::invalid_params("keywords 不能为空"));
        }
        if platforms.is_empty() {
            return Err(SchedulerError::invalid_params("platforms 不能为空"));
        }

        let task = AutomationTask::new(
            TaskType::FullPipeline,
            priority,
            serde_json::json!({
                "platforms": platforms,
                "keywords": keywords,
                "limit": limit,
            }),
        );
        Ok(self.enqueue(task))
    }

    fn enqueue(&self, task: AutomationTask) -> String {
        let task_id = task.task_id.clone();
        let task_type = task.task_type;
        let mut state = self.lock_state();
        state.queue.enqueue(Arc::new(Mutex::new(task)));
        state.stats.total_tasks += 1;
        drop(state);

        info!("已提交{}任务: {}", task_type.as_str(), task_id);
        task_id
    }

    /// 查询单个任务的当前快照。依次检索运行表、历史和待处理队列。
    pub fn get_task(&self, task_id: &str) -> Option<AutomationTask> {
        let state = self.lock_state();

        if let Some(task) = state.running.get(task_id) {
            return Some(snapshot(task));
        }
        if let Some(task) = state
            .history
            .iter()
            .find(|t| t.lock().expect("task lock poisoned").task_id == task_id)
        {
            return Some(snapshot(task));
        }
        let found = state
            .queue
            .iter()
            .find(|t| t.lock().expect("task lock poisoned").task_id == task_id)
            .map(snapshot);
        found
    }

    /// 任务列表，按创建时间倒序
    pub fn list_tasks(&self, status: Option<TaskStatus>, limit: usize) -> Vec<AutomationTask> {
        let state = self.lock_state();

        let mut tasks: Vec<AutomationTask> = state
            .running
            .values()
            .chain(state.history.iter())
            .chain(state.queue.iter())
            .map(snapshot)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .collect();
        drop(state);

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        tasks
    }

    /// 取消任务。待处理任务立即干净地移除；运行中任务只停止跟踪，
    /// 在途的协作者调用不会被打断（记账层面的取消）。
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut state = self.lock_state();

        if let Some(task) = state.queue.remove(task_id) {
            task.lock().expect("task lock poisoned").mark_cancelled();
            Self::retire(&mut state, task, &self.config);
            info!("已取消待处理任务: {}", task_id);
            return true;
        }

        if let Some(task) = state.running.remove(task_id) {
            task.lock().expect("task lock poisoned").mark_cancelled();
            Self::retire(&mut state, task, &self.config);
            info!("已取消运行中任务: {}", task_id);
            return true;
        }

        false
    }

    /// 调度器系统状态快照
    pub fn system_status(&self) -> SystemStatus {
        let state = self.lock_state();
        SystemStatus {
            is_running: self.is_running(),
            running_tasks: state.running.len(),
            pending_tasks: state.queue.len(),
            total_completed: state.history.len(),
            stats: state.stats.clone(),
        }
    }

    // ------------------------------------------------------------------
    // 调度循环
    // ------------------------------------------------------------------

    async fn run_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!("调度循环开始运行");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let sleep = match self.tick() {
                Ok(()) => Duration::from_secs(self.config.poll_interval_seconds),
                Err(e) => {
                    // 单次迭代的错误不能终结调度循环，退避后继续
                    error!("调度器循环错误: {}", e);
                    Duration::from_secs(self.config.error_backoff_seconds)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("调度循环已退出");
    }

    /// 单次循环迭代：派发 → 超时检查 → 回收
    fn tick(&self) -> SchedulerResult<()> {
        self.dispatch_pending();
        self.check_running_tasks();
        self.cleanup_completed_tasks();
        Ok(())
    }

    /// 只要运行数低于工作池容量就从队列派发
    fn dispatch_pending(&self) {
        loop {
            let mut state = self.lock_state();
            if state.running.len() >= self.pool.capacity() {
                return;
            }
            let Some(task) = state.queue.dequeue() else {
                return;
            };

            let task_id = {
                let mut guard = task.lock().expect("task lock poisoned");
                guard.mark_running();
                guard.task_id.clone()
            };
            state.running.insert(task_id.clone(), Arc::clone(&task));
            drop(state);

            let executors = Arc::clone(&self.executors);
            let task_for_worker = Arc::clone(&task);
            let spawned = self.pool.try_spawn(async move {
                executors.run(task_for_worker).await;
            });

            if !spawned {
                self.revert_failed_dispatch(&task_id, task);
                return;
            }
        }
    }

    /// 槽位竞争失败后的回退。从释放状态锁到提交工作池之间，
    /// 门面可能已并发取消该任务并把它移入历史；终态不可逆，
    /// 此时不回滚状态也不重新入队。正常回退时放回同优先级段的队首。
    fn revert_failed_dispatch(&self, task_id: &str, task: TaskHandle) {
        let mut state = self.lock_state();
        if state.running.remove(task_id).is_none() {
            return;
        }

        let mut guard = task.lock().expect("task lock poisoned");
        if guard.is_finished() {
            drop(guard);
            Self::retire(&mut state, task, &self.config);
            return;
        }
        guard.status = TaskStatus::Pending;
        guard.started_at = None;
        drop(guard);
        state.queue.requeue(task);
    }

    /// 超时检查。超时是记账层面的处置：任务被标记失败并移入历史，
    /// 底层执行器可能仍在物理运行——这是已知限制，不是静默修复的对象。
    fn check_running_tasks(&self) {
        let now = Utc::now();
        let mut state = self.lock_state();

        let timed_out: Vec<String> = state
            .running
            .iter()
            .filter(|(_, task)| {
                let guard = task.lock().expect("task lock poisoned");
                !guard.is_finished()
                    && guard
                        .running_seconds(now)
                        .is_some_and(|secs| secs > self.config.task_timeout_seconds)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for task_id in timed_out {
            if let Some(task) = state.running.remove(&task_id) {
                task.lock()
                    .expect("task lock poisoned")
                    .mark_failed("任务执行超时");
                warn!("任务 {} 执行超时，已终止跟踪", task_id);
                Self::retire(&mut state, task, &self.config);
            }
        }
    }

    /// 回收已进入终态的运行任务
    fn cleanup_completed_tasks(&self) {
        let mut state = self.lock_state();

        let finished: Vec<String> = state
            .running
            .iter()
            .filter(|(_, task)| task.lock().expect("task lock poisoned").is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for task_id in finished {
            if let Some(task) = state.running.remove(&task_id) {
                Self::retire(&mut state, task, &self.config);
            }
        }
    }

    /// 把终态任务移入有界历史并更新统计。
    /// 调度循环（和取消路径）是统计的唯一写者。
    fn retire(state: &mut SchedulerState, task: TaskHandle, config: &SchedulerConfig) {
        {
            let guard = task.lock().expect("task lock poisoned");
            match guard.status {
                TaskStatus::Completed => {
                    state.stats.completed_tasks += 1;
                    match guard.task_type {
                        TaskType::Crawl => {
                            state.stats.last_crawl_time = Some(Utc::now());
                        }
                        TaskType::Analyze => {
                            state.stats.last_analysis_time = Some(Utc::now());
                            state.stats.total_cards_created +=
                                cards_created(guard.result.as_ref(), "created_cards");
                        }
                        TaskType::FullPipeline => {
                            state.stats.last_crawl_time = Some(Utc::now());
                            state.stats.last_analysis_time = Some(Utc::now());
                            state.stats.total_cards_created +=
                                cards_created(guard.result.as_ref(), "total_cards_created");
                        }
                    }
                }
                TaskStatus::Failed => {
                    state.stats.failed_tasks += 1;
                }
                TaskStatus::Cancelled => {
                    state.stats.cancelled_tasks += 1;
                }
                _ => {}
            }
        }

        state.history.push_back(task);
        while state.history.len() > config.history_limit {
            state.history.pop_front();
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().expect("scheduler state lock poisoned")
    }

    /// 测试钩子：立刻执行一次循环迭代
    #[doc(hidden)]
    pub fn tick_once(&self) {
        let _ = self.tick();
    }
}

fn snapshot(task: &TaskHandle) -> AutomationTask {
    task.lock().expect("task lock poisoned").clone()
}

fn cards_created(result: Option<&serde_json::Value>, key: &str) -> u64 {
    result
        .and_then(|r| r.get(key))
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}
