// services/safety-dash/src/state.rs
//
// Dashboard state management
//
// Owned by the UI loop; poll results reach it only through `apply`.

use chrono::{DateTime, Local};
use tracing::debug;

use svckit::{DetectionRecord, FrameError, HourlyStat, ViolationStat};

use crate::connection::{ConnectionTracker, CycleReport, Transition};
use crate::frame::{FrameState, LiveFrame};
use crate::metrics::DerivedMetrics;
use crate::poll::PollEvent;

const MAX_LOG_ENTRIES: usize = 100;

/// Data of the last successful poll cycle. Replaced wholesale, never merged.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub generation: u64,
    pub detections: Vec<DetectionRecord>,
    pub hourly: Vec<HourlyStat>,
    pub violations: Vec<ViolationStat>,
    pub updated_at: DateTime<Local>,
}

impl DashboardSnapshot {
    pub fn metrics(&self) -> DerivedMetrics {
        DerivedMetrics::compute(&self.detections, &self.hourly)
    }
}

/// What happened to a poll result handed to `apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Fresh data replaced the snapshot.
    Applied,
    /// The cycle failed; the snapshot was kept, the connection flipped.
    Failed,
    /// A newer cycle was already committed; the result was dropped.
    Stale,
    /// A frame load was recorded.
    Frame,
    /// The dashboard was torn down; nothing changed.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug)]
pub struct DashboardState {
    snapshot: Option<DashboardSnapshot>,
    first_cycle_done: bool,
    last_generation: u64,
    closed: bool,

    pub connection: ConnectionTracker,
    pub frame: FrameState,
    pub is_live: bool,

    // Activity log
    pub activity_log: Vec<LogEntry>,

    // UI state
    pub scroll_offset: usize,
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            snapshot: None,
            first_cycle_done: false,
            last_generation: 0,
            closed: false,
            connection: ConnectionTracker::new(),
            frame: FrameState::default(),
            is_live: true,
            activity_log: Vec::new(),
            scroll_offset: 0,
        }
    }

    pub fn snapshot(&self) -> Option<&DashboardSnapshot> {
        self.snapshot.as_ref()
    }

    /// True until the first data cycle has finished, successfully or not.
    pub fn is_loading(&self) -> bool {
        !self.first_cycle_done
    }

    pub fn last_generation(&self) -> u64 {
        self.last_generation
    }

    pub fn apply(&mut self, event: PollEvent) -> CommitOutcome {
        match event {
            PollEvent::Cycle { generation, report } => self.apply_cycle(generation, report),
            PollEvent::Frame { token, result } => self.apply_frame(token, result),
        }
    }

    /// Commits a data cycle unless a newer one already landed. Failures keep
    /// the snapshot and only move the connection signal.
    pub fn apply_cycle(&mut self, generation: u64, report: CycleReport) -> CommitOutcome {
        if self.closed {
            return CommitOutcome::Closed;
        }
        if generation <= self.last_generation {
            debug!(generation, latest = self.last_generation, "Discarding stale cycle");
            return CommitOutcome::Stale;
        }
        self.last_generation = generation;
        self.first_cycle_done = true;

        match report.combine() {
            Ok(data) => {
                self.scroll_offset = self.scroll_offset.min(data.detections.len().saturating_sub(1));
                self.snapshot = Some(DashboardSnapshot {
                    generation,
                    detections: data.detections,
                    hourly: data.hourly,
                    violations: data.violations,
                    updated_at: Local::now(),
                });
                if self.connection.record_success() == Transition::Connected {
                    self.add_log(LogLevel::Info, "Connected to analytics backend");
                }
                CommitOutcome::Applied
            }
            Err(failure) => {
                let transition = self.connection.record_failure(&failure);
                if transition == Transition::Disconnected {
                    let message = if self.snapshot.is_some() {
                        format!("Lost connection: {}", failure.summary())
                    } else {
                        format!("Backend not reachable: {}", failure.summary())
                    };
                    self.add_log(LogLevel::Error, &message);
                } else if failure.is_partial() {
                    let sources: Vec<String> = failure.sources().map(|s| s.to_string()).collect();
                    self.add_log(LogLevel::Warn, &format!("Partial refresh failed: {}", sources.join(", ")));
                }
                CommitOutcome::Failed
            }
        }
    }

    pub fn apply_frame(&mut self, token: u64, result: Result<LiveFrame, FrameError>) -> CommitOutcome {
        if self.closed {
            return CommitOutcome::Closed;
        }
        if let Err(err) = &result {
            if self.frame.frame().is_some() {
                self.add_log(LogLevel::Warn, &format!("Live frame unavailable: {}", err));
            }
            debug!(token, error = %err, "Frame load failed");
        }
        self.frame.apply(result);
        CommitOutcome::Frame
    }

    /// Flips live mode and returns the new value.
    pub fn toggle_live(&mut self) -> bool {
        self.is_live = !self.is_live;
        if self.is_live {
            self.add_log(LogLevel::Info, "Live feed resumed");
        } else {
            self.add_log(LogLevel::Warn, "Live feed paused by user");
        }
        self.is_live
    }

    /// Teardown: drops the snapshot and rejects every later result.
    pub fn close(&mut self) {
        self.closed = true;
        self.snapshot = None;
    }

    pub fn scroll_up(&mut self) {
        if self.scroll_offset > 0 {
            self.scroll_offset -= 1;
        }
    }

    pub fn scroll_down(&mut self) {
        let rows = self.snapshot.as_ref().map_or(0, |s| s.detections.len());
        if self.scroll_offset + 1 < rows {
            self.scroll_offset += 1;
        }
    }

    pub fn add_log(&mut self, level: LogLevel, message: &str) {
        self.activity_log.push(LogEntry {
            timestamp: Local::now(),
            level,
            message: message.to_string(),
        });

        if self.activity_log.len() > MAX_LOG_ENTRIES {
            self.activity_log.remove(0);
        }
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use svckit::FetchError;

    fn detections(n: usize, violations: usize) -> Vec<DetectionRecord> {
        (0..n)
            .map(|i| DetectionRecord {
                id: Some(i as i64),
                violation_type: (i < violations).then(|| "no_helmet".to_string()),
                ..Default::default()
            })
            .collect()
    }

    fn success(batch: Vec<DetectionRecord>) -> CycleReport {
        CycleReport {
            detections: Ok(batch),
            hourly: Ok(vec![HourlyStat { hour: "08:00".to_string(), cnt: 4 }]),
            violations: Ok(vec![]),
        }
    }

    fn outage() -> CycleReport {
        let err = |endpoint: &str| FetchError::Transport {
            endpoint: endpoint.to_string(),
            message: "connection refused".to_string(),
        };
        CycleReport {
            detections: Err(err("/api/detections")),
            hourly: Err(err("/api/stats/hourly")),
            violations: Err(err("/api/stats/violations")),
        }
    }

    #[test]
    fn test_loading_until_first_cycle() {
        let mut state = DashboardState::new();
        assert!(state.is_loading());

        assert_eq!(state.apply_cycle(1, outage()), CommitOutcome::Failed);
        assert!(!state.is_loading());
        assert!(state.snapshot().is_none());
        assert_eq!(state.connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_failure_keeps_last_snapshot() {
        let mut state = DashboardState::new();
        state.apply_cycle(1, success(detections(10, 2)));
        assert!(state.connection.is_connected());

        assert_eq!(state.apply_cycle(2, outage()), CommitOutcome::Failed);

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.detections.len(), 10);
        assert_eq!(snapshot.metrics().compliance_display(), "80.0");
        assert_eq!(state.connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_only_fresh_success_reduces_counts() {
        let mut state = DashboardState::new();
        state.apply_cycle(1, success(detections(10, 0)));
        state.apply_cycle(2, outage());
        state.apply_cycle(3, success(detections(3, 0)));

        assert_eq!(state.snapshot().unwrap().detections.len(), 3);
        assert!(state.connection.is_connected());
    }

    #[test]
    fn test_stale_cycle_is_discarded() {
        let mut state = DashboardState::new();
        assert_eq!(state.apply_cycle(2, success(detections(5, 0))), CommitOutcome::Applied);

        assert_eq!(state.apply_cycle(1, success(detections(1, 1))), CommitOutcome::Stale);
        assert_eq!(state.apply_cycle(1, outage()), CommitOutcome::Stale);

        assert_eq!(state.snapshot().unwrap().detections.len(), 5);
        assert!(state.connection.is_connected());
        assert_eq!(state.last_generation(), 2);
    }

    #[test]
    fn test_closed_state_ignores_late_results() {
        let mut state = DashboardState::new();
        state.close();

        assert_eq!(state.apply_cycle(1, success(detections(4, 0))), CommitOutcome::Closed);
        assert_eq!(state.apply_frame(1, Err(FrameError::Empty)), CommitOutcome::Closed);
        assert!(state.snapshot().is_none());
        assert!(state.is_loading());
    }

    #[test]
    fn test_connection_changes_are_logged_once() {
        let mut state = DashboardState::new();
        state.apply_cycle(1, success(detections(1, 0)));
        state.apply_cycle(2, outage());
        state.apply_cycle(3, outage());

        let errors = state
            .activity_log
            .iter()
            .filter(|e| e.level == LogLevel::Error)
            .count();
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_partial_failure_is_logged_while_disconnected() {
        let mut state = DashboardState::new();
        state.apply_cycle(1, outage());
        let partial = CycleReport {
            hourly: Err(FetchError::Status {
                endpoint: "/api/stats/hourly".to_string(),
                status: 500,
            }),
            ..success(detections(1, 0))
        };

        assert_eq!(state.apply_cycle(2, partial), CommitOutcome::Failed);

        let last = state.activity_log.last().unwrap();
        assert_eq!(last.level, LogLevel::Warn);
        assert_eq!(last.message, "Partial refresh failed: hourly stats");
    }

    #[test]
    fn test_smaller_batch_pulls_scroll_back_into_range() {
        let mut state = DashboardState::new();
        state.apply_cycle(1, success(detections(30, 0)));
        for _ in 0..20 {
            state.scroll_down();
        }
        assert_eq!(state.scroll_offset, 20);

        state.apply_cycle(2, success(detections(5, 0)));
        assert_eq!(state.scroll_offset, 4);

        state.apply_cycle(3, success(vec![]));
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn test_first_failure_is_not_reported_as_lost_connection() {
        let mut state = DashboardState::new();
        state.apply_cycle(1, outage());
        let first = state.activity_log.last().unwrap();
        assert_eq!(first.level, LogLevel::Error);
        assert!(first.message.starts_with("Backend not reachable"));

        state.apply_cycle(2, success(detections(1, 0)));
        state.apply_cycle(3, outage());
        assert!(state.activity_log.last().unwrap().message.starts_with("Lost connection"));
    }

    #[test]
    fn test_toggle_live() {
        let mut state = DashboardState::new();
        assert!(!state.toggle_live());
        assert!(state.toggle_live());
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = DashboardState::new();
        for i in 0..150 {
            state.add_log(LogLevel::Info, &format!("entry {}", i));
        }
        assert_eq!(state.activity_log.len(), MAX_LOG_ENTRIES);
        assert_eq!(state.activity_log[0].message, "entry 50");
    }
}
