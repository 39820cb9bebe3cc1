//! # Dispatcher
//!
//! 批次分发模块。
//!
//! 负责：
//! - 将每个封好的 `Batch` 推送到所有消费者队列 (`DispatchBus`)
//! - 每个消费者一个工作线程池，消费失败或 panic 不影响其他批次
//! - 优雅关闭：先刷出未满的批次，再停止队列、排空、回收线程
//!
//! 单工作线程的消费者严格按封批顺序消费；多工作线程以吞吐换顺序。

pub mod bus;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod shutdown;
pub mod sinks;

pub use bus::DispatchBus;
pub use contracts::{Batch, BatchConsumer, BatchPublisher, BatchSealer};
pub use dispatcher::{create_consumer, create_dispatcher, Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use metrics::{WorkerMetrics, WorkerSnapshot};
pub use pool::{PoolReport, WorkerPool, WorkerReport};
pub use queue::ConsumerQueue;
pub use shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownState, ShutdownTrigger};
pub use sinks::{ConsoleSink, FileSink, FileSinkConfig, LogSink};
