use tokio::sync::watch;
use tracing::{debug, info};

/// 优雅关闭管理器
///
/// 基于watch通道广播关闭信号，订阅者在任意时刻订阅都能观察到已关闭状态。
pub struct ShutdownManager {
    shutdown_tx: watch::Sender<bool>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { shutdown_tx }
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// 触发关闭，重复调用是无操作
    pub fn shutdown(&self) {
        if *self.shutdown_tx.borrow() {
            debug!("关闭信号已经触发过");
            return;
        }

        info!("触发系统关闭");
        let _ = self.shutdown_tx.send(true);
    }

    /// 检查是否已经触发关闭
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
