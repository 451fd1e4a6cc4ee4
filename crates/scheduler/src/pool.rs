use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

/// 固定大小的工作池
///
/// 用信号量限制同时运行的执行器数量。提交对调用方非阻塞：
/// 没有空闲槽位时返回 None，由调度循环稍后重试。
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 在空闲槽位上运行任务体。没有空闲槽位时返回 false，任务体不被消费方执行。
    ///
    /// 任务体内部的失败由执行器自行转化为任务状态，这里不做重试；
    /// 任务体 panic 只会终结它自己的 tokio 任务，不影响池和调度循环。
    pub fn try_spawn<F>(&self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit: OwnedSemaphorePermit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return false,
        };

        tokio::spawn(async move {
            let _permit = permit;
            fut.await;
        });
        true
    }

    /// 等待所有在途执行器结束（或超时放弃）
    pub async fn drain(&self, timeout: Duration) {
        let acquire_all = self.semaphore.acquire_many(self.capacity as u32);
        match tokio::time::timeout(timeout, acquire_all).await {
            Ok(Ok(permits)) => drop(permits),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!("工作池排空超时，放弃等待在途任务");
            }
        }
    }
}
