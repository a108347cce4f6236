// services/safety-dash/src/config.rs
//
// Layered configuration: defaults, optional file, environment

use std::num::NonZeroUsize;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use svckit::config::{ApiConfig, ObservabilityConfig, PollSettings};
use svckit::ConfigError;

use crate::poll::PollConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyDashConfig {
    pub api: ApiConfig,
    pub poll: PollSettings,
    pub observability: ObservabilityConfig,
}

impl SafetyDashConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".to_string()));
        }
        if self.api.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("api.request_timeout_ms must be positive".to_string()));
        }
        if self.poll.data_interval_ms == 0 || self.poll.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll intervals must be positive".to_string()));
        }
        if self.poll.detection_limit == 0 {
            return Err(ConfigError::Invalid("poll.detection_limit must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_config(&self) -> Result<PollConfig, ConfigError> {
        let detection_limit = NonZeroUsize::new(self.poll.detection_limit)
            .ok_or_else(|| ConfigError::Invalid("poll.detection_limit must be positive".to_string()))?;

        Ok(PollConfig {
            data_interval: Duration::from_millis(self.poll.data_interval_ms),
            frame_interval: Duration::from_millis(self.poll.frame_interval_ms),
            detection_limit,
        })
    }
}

/// Defaults, then the optional file, then `SAFETY_DASH_*` variables
/// (`SAFETY_DASH_POLL__DETECTION_LIMIT=100`).
pub fn load_config(path: Option<&str>) -> Result<SafetyDashConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::with_name(path));
    }

    let config = builder
        .add_source(
            Environment::with_prefix("SAFETY_DASH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))
}
