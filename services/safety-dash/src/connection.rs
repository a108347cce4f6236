// services/safety-dash/src/connection.rs
//
// Connection signal derived from poll cycle outcomes

use std::fmt;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use svckit::{DetectionRecord, FetchError, HourlyStat, ViolationStat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// The three fetches that make up one data poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Detections,
    HourlyStats,
    ViolationStats,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSource::Detections => "detections",
            DataSource::HourlyStats => "hourly stats",
            DataSource::ViolationStats => "violation stats",
        };
        f.write_str(name)
    }
}

/// Raw outcome of one data poll cycle: three independent results.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub detections: Result<Vec<DetectionRecord>, FetchError>,
    pub hourly: Result<Vec<HourlyStat>, FetchError>,
    pub violations: Result<Vec<ViolationStat>, FetchError>,
}

/// Payload of a cycle in which every fetch succeeded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleData {
    pub detections: Vec<DetectionRecord>,
    pub hourly: Vec<HourlyStat>,
    pub violations: Vec<ViolationStat>,
}

/// A cycle with at least one failed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFailure {
    pub failures: Vec<(DataSource, FetchError)>,
}

impl CycleFailure {
    pub fn sources(&self) -> impl Iterator<Item = DataSource> + '_ {
        self.failures.iter().map(|(source, _)| *source)
    }

    /// Some fetches succeeded. The connection signal treats this the same
    /// as a total failure; it only changes what gets logged.
    pub fn is_partial(&self) -> bool {
        self.failures.len() < 3
    }

    /// Every failed request died in transport: nothing answered at all.
    pub fn is_unreachable(&self) -> bool {
        self.failures.iter().all(|(_, err)| err.is_unreachable())
    }

    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|(source, err)| format!("{}: {}", source, err))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl CycleReport {
    /// All-or-nothing: any failed fetch fails the whole cycle.
    pub fn combine(self) -> Result<CycleData, CycleFailure> {
        match (self.detections, self.hourly, self.violations) {
            (Ok(detections), Ok(hourly), Ok(violations)) => Ok(CycleData {
                detections,
                hourly,
                violations,
            }),
            (detections, hourly, violations) => {
                let failures = [
                    (DataSource::Detections, detections.err()),
                    (DataSource::HourlyStats, hourly.err()),
                    (DataSource::ViolationStats, violations.err()),
                ]
                .into_iter()
                .filter_map(|(source, err)| err.map(|e| (source, e)))
                .collect();
                Err(CycleFailure { failures })
            }
        }
    }
}

/// What a recorded outcome did to the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Connected,
    Disconnected,
}

/// Binary online/offline signal. Reflects the latest committed cycle only;
/// no smoothing, no backoff.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
    observed: bool,
    last_error: Option<String>,
    failed_sources: Vec<DataSource>,
    unreachable: bool,
    last_outcome_at: Option<DateTime<Local>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn failed_sources(&self) -> &[DataSource] {
        &self.failed_sources
    }

    /// Last failure got no answer from the backend (as opposed to error
    /// statuses or unreadable bodies).
    pub fn is_unreachable(&self) -> bool {
        self.unreachable
    }

    pub fn last_outcome_at(&self) -> Option<DateTime<Local>> {
        self.last_outcome_at
    }

    pub fn record_success(&mut self) -> Transition {
        self.last_error = None;
        self.failed_sources.clear();
        self.unreachable = false;
        self.set(ConnectionState::Connected)
    }

    pub fn record_failure(&mut self, failure: &CycleFailure) -> Transition {
        for (source, err) in &failure.failures {
            debug!(%source, endpoint = err.endpoint(), error = %err, "Fetch failed");
        }
        self.last_error = Some(failure.summary());
        self.failed_sources = failure.sources().collect();
        self.unreachable = failure.is_unreachable();
        self.set(ConnectionState::Disconnected)
    }

    fn set(&mut self, next: ConnectionState) -> Transition {
        let first = !self.observed;
        self.observed = true;
        self.last_outcome_at = Some(Local::now());

        if !first && next == self.state {
            return Transition::Unchanged;
        }
        self.state = next;

        match next {
            ConnectionState::Connected => {
                info!("Backend reachable");
                Transition::Connected
            }
            ConnectionState::Disconnected => {
                warn!(
                    error = self.last_error.as_deref().unwrap_or_default(),
                    "Backend unreachable"
                );
                Transition::Disconnected
            }
        }
    }
}
