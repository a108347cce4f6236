// services/safety-dash/src/lib.rs
//
// Live-data sync core for the SafetyEye terminal dashboard

pub mod api;
pub mod config;
pub mod connection;
pub mod frame;
pub mod metrics;
pub mod mock;
pub mod poll;
pub mod render;
pub mod state;
pub mod ui;

pub use api::{AnalyticsSource, ApiClient};
pub use poll::{PollConfig, PollEvent, PollScheduler, PollSubscription};
pub use state::{CommitOutcome, DashboardState};
