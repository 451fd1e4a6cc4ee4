use std::sync::{Arc, Mutex};

use meme_commons_core::models::{AutomationTask, TaskPriority};

/// 队列中的待处理任务。优先级和入队序号在入队时固定，
/// 与任务记录本身解耦，排序键不会在队列存续期间变化。
struct QueueEntry {
    task_id: String,
    priority: TaskPriority,
    seq: u64,
    task: Arc<Mutex<AutomationTask>>,
}

/// 待处理任务队列
///
/// 始终先出数值优先级最高的任务；同优先级按入队顺序（FIFO），
/// 保证同级任务不会互相饿死。结构性修改由持有者的状态锁保证互斥。
pub struct TaskQueue {
    entries: Vec<QueueEntry>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// 按优先级/FIFO顺序插入
    pub fn enqueue(&mut self, task: Arc<Mutex<AutomationTask>>) {
        let (task_id, priority) = {
            let guard = task.lock().expect("task lock poisoned");
            (guard.task_id.clone(), guard.priority)
        };
        let entry = QueueEntry {
            task_id,
            priority,
            seq: self.next_seq,
            task,
        };
        self.next_seq += 1;

        // 高优先级在前；同优先级按seq升序
        let pos = self
            .entries
            .partition_point(|e| e.priority > entry.priority || (e.priority == entry.priority && e.seq < entry.seq));
        self.entries.insert(pos, entry);
    }

    /// 派发回退时重新入队：插到同优先级段的最前面，
    /// 恢复任务出队前持有的队首位置，不落到同级后来者之后
    pub fn requeue(&mut self, task: Arc<Mutex<AutomationTask>>) {
        let (task_id, priority) = {
            let guard = task.lock().expect("task lock poisoned");
            (guard.task_id.clone(), guard.priority)
        };
        let entry = QueueEntry {
            task_id,
            priority,
            seq: self.next_seq,
            task,
        };
        self.next_seq += 1;

        let pos = self.entries.partition_point(|e| e.priority > entry.priority);
        self.entries.insert(pos, entry);
    }

    /// 取出队首（优先级最高、同级最早入队）的任务
    pub fn dequeue(&mut self) -> Option<Arc<Mutex<AutomationTask>>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0).task)
        }
    }

    /// 取出指定的待处理任务（取消时使用）。不存在或已出队时返回 None
    pub fn remove(&mut self, task_id: &str) -> Option<Arc<Mutex<AutomationTask>>> {
        let pos = self.entries.iter().position(|e| e.task_id == task_id)?;
        Some(self.entries.remove(pos).task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 遍历待处理任务（状态查询时使用）
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Mutex<AutomationTask>>> {
        self.entries.iter().map(|e| &e.task)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
