pub mod executors;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod stats;

pub use executors::Executors;
pub use pool::WorkerPool;
pub use queue::TaskQueue;
pub use scheduler::{AutomationScheduler, TaskHandle};
pub use stats::{SchedulerStats, SystemStatus};
