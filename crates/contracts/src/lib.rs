//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - line source -> `BatchAccumulator` -> `BatchPublisher` (`DispatchBus`)
//! - `DispatchBus` -> per-consumer queues -> `BatchConsumer::consume`

mod batch;
mod blueprint;
mod consumer;
mod error;
mod publish;

pub use batch::*;
pub use blueprint::*;
pub use consumer::BatchConsumer;
pub use error::*;
pub use publish::{BatchPublisher, BatchSealer};
