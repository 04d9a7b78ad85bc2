//! Shared helpers: logging setup and timing

mod logger;
mod timer;

pub use logger::{init_logger, LogLevel};
pub use timer::{duration_to_ticks, ticks_to_ms, Timer, TICKS_PER_SECOND};
