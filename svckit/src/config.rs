use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the analytics backend lives and how long a single request may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 3000,
        }
    }
}

/// Polling cadence. Detections and stats share one cycle; the live frame
/// has its own faster timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub data_interval_ms: u64,
    pub frame_interval_ms: u64,
    pub detection_limit: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            data_interval_ms: 4000,
            frame_interval_ms: 1000,
            detection_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_file: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: "safety-dash.log".to_string(),
        }
    }
}
