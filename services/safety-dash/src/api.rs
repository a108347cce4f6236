// services/safety-dash/src/api.rs
//
// Fetch client for the SafetyEye analytics backend

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use svckit::types::{DetectionsResponse, StatsResponse};
use svckit::{DetectionRecord, FetchError, HourlyStat, ViolationStat};

pub const DETECTIONS_PATH: &str = "/api/detections";
pub const HOURLY_STATS_PATH: &str = "/api/stats/hourly";
pub const VIOLATION_STATS_PATH: &str = "/api/stats/violations";
pub const LAST_FRAME_PATH: &str = "/media/last_frame";
pub const MEDIA_PREFIX: &str = "/media/";

/// Everything the dashboard reads from the backend. Each call issues exactly
/// one request; retries and caching are left to the caller (there are none).
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Most recent detections, newest first, at most `limit` of them.
    async fn get_detections(&self, limit: NonZeroUsize) -> Result<Vec<DetectionRecord>, FetchError>;

    async fn get_hourly_stats(&self) -> Result<Vec<HourlyStat>, FetchError>;

    async fn get_violation_stats(&self) -> Result<Vec<ViolationStat>, FetchError>;

    /// Cache-busted URL of the latest camera frame. No network call.
    fn last_frame_url(&self) -> FrameUrl;

    /// Raw bytes of an image resource.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reference to the live frame: the URL plus the token baked into its query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameUrl {
    pub url: String,
    pub token: u64,
}

/// Produces cache-busting values that are unique per call, even when two
/// calls land in the same millisecond.
#[derive(Debug, Default)]
pub struct CacheBuster {
    counter: AtomicU64,
}

impl CacheBuster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(token, query value)`. The token increases monotonically.
    pub fn next(&self) -> (u64, String) {
        let token = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        (token, format!("{}-{}", millis, token))
    }

    pub fn frame_url(&self, base_url: &str) -> FrameUrl {
        let (token, value) = self.next();
        FrameUrl {
            url: format!("{}{}?t={}", base_url, LAST_FRAME_PATH, value),
            token,
        }
    }
}

/// Maps a detection's stored image reference to a servable path.
///
/// Absolute URLs and paths already under `/media/` pass through; anything
/// else is treated as relative to the media root.
pub fn resolve_media_path(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with(MEDIA_PREFIX) {
        return Some(path.to_string());
    }
    Some(format!("{}{}", MEDIA_PREFIX, path.trim_start_matches('/')))
}

/// Full URL of a detection's evidence image, if it has one. Relative media
/// paths are joined to `base_url`.
pub fn media_url(base_url: &str, path: &str) -> Option<String> {
    let resolved = resolve_media_path(path)?;
    if resolved.starts_with("http://") || resolved.starts_with("https://") {
        Some(resolved)
    } else {
        Some(format!("{}{}", base_url.trim_end_matches('/'), resolved))
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cache_buster: CacheBuster,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            cache_buster: CacheBuster::new(),
        }
    }

    async fn get_bytes(&self, endpoint: &str, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;
        debug!(endpoint, bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let body = self.get_bytes(endpoint, &url, query).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    fn transport_error(&self, endpoint: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl AnalyticsSource for ApiClient {
    async fn get_detections(&self, limit: NonZeroUsize) -> Result<Vec<DetectionRecord>, FetchError> {
        let response: DetectionsResponse = self
            .get_json(DETECTIONS_PATH, &[("limit", limit.to_string())])
            .await?;
        Ok(response.detections)
    }

    async fn get_hourly_stats(&self) -> Result<Vec<HourlyStat>, FetchError> {
        let response: StatsResponse<HourlyStat> = self.get_json(HOURLY_STATS_PATH, &[]).await?;
        Ok(response.data)
    }

    async fn get_violation_stats(&self) -> Result<Vec<ViolationStat>, FetchError> {
        let response: StatsResponse<ViolationStat> = self.get_json(VIOLATION_STATS_PATH, &[]).await?;
        Ok(response.data)
    }

    fn last_frame_url(&self) -> FrameUrl {
        self.cache_buster.frame_url(&self.base_url)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let endpoint = url
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.split('?').next())
            .unwrap_or(url);
        self.get_bytes(endpoint, url, &[]).await
    }
}
