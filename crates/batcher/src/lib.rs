//! # Batcher
//!
//! 命令分批状态机。
//!
//! 负责：
//! - 识别分组标记 (`{` / `}`，可配置)
//! - 按容量或显式分组封批
//! - 将封好的 `Batch` 交给 `BatchPublisher`
//!
//! ## 使用示例
//!
//! ```ignore
//! use batcher::BatchAccumulator;
//!
//! let mut accumulator = BatchAccumulator::new(capacity, bus);
//!
//! for line in input.lines() {
//!     accumulator.observe(&line?);
//! }
//!
//! // End of input: flush the partial batch
//! accumulator.seal_pending();
//! ```

mod accumulator;
mod line;

pub use accumulator::{AccumulatorStats, BatchAccumulator};
pub use line::Line;

// Re-export contracts types
pub use contracts::{Batch, BatchPublisher, BatchSealer, GroupMarkers, SealReason};
