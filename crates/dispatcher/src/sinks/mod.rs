//! Consumer implementations
//!
//! Contains ConsoleSink, FileSink, and LogSink.

mod console;
mod file;
mod log;

pub use self::console::ConsoleSink;
pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
