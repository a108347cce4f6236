// svckit/src/lib.rs
//
// Shared building blocks for the SafetyEye services: wire types consumed
// from the analytics backend, the error taxonomy and configuration sections.

pub mod config;
pub mod errors;
pub mod types;

pub use errors::{ConfigError, FetchError, FrameError};
pub use types::{ClassLabel, DetectionRecord, HourlyStat, ViolationStat};
