// services/safety-dash/src/mock.rs
//
// In-process analytics backend for demo mode

use std::collections::VecDeque;
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use image::{ImageFormat, Rgb, RgbImage};
use rand::Rng;

use svckit::types::CLASS_NAMES;
use svckit::{DetectionRecord, FetchError, HourlyStat, ViolationStat};

use crate::api::{AnalyticsSource, CacheBuster, FrameUrl, DETECTIONS_PATH, LAST_FRAME_PATH};

const DEMO_BASE_URL: &str = "demo://safetyeye";
const MAX_RETAINED: usize = 500;
const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 180;

const CAMERAS: [&str; 3] = ["cam1", "cam2", "dock-east"];

/// Class index -> violation type, for the classes that mean non-compliance.
const VIOLATING_CLASSES: [(usize, &str); 1] = [(3, "no_helmet")];

/// Extra violation types assigned to people seen without gear.
const PERSON_VIOLATIONS: [&str; 2] = ["no_vest", "no_mask"];

struct MockFeed {
    next_id: i64,
    ticks: u64,
    detections: VecDeque<DetectionRecord>,
    hourly: Vec<HourlyStat>,
}

/// Generates a plausible stream of detections. Roughly one request in
/// `failure_one_in` fails so the disconnected path is visible in the demo.
pub struct MockAnalyticsSource {
    feed: Mutex<MockFeed>,
    cache_buster: CacheBuster,
    failure_one_in: u32,
}

impl MockAnalyticsSource {
    pub fn new() -> Self {
        Self::with_failure_rate(40)
    }

    /// `0` disables injected failures.
    pub fn with_failure_rate(failure_one_in: u32) -> Self {
        let now = Local::now();
        let mut rng = rand::thread_rng();
        let hourly = (1..12)
            .rev()
            .map(|hours_ago| HourlyStat {
                hour: (now - ChronoDuration::hours(hours_ago)).format("%Y-%m-%d %H").to_string(),
                cnt: rng.gen_range(5..60),
            })
            .collect();

        Self {
            feed: Mutex::new(MockFeed {
                next_id: 1,
                ticks: 0,
                detections: VecDeque::new(),
                hourly,
            }),
            cache_buster: CacheBuster::new(),
            failure_one_in,
        }
    }

    fn should_fail(&self) -> bool {
        self.failure_one_in > 0 && rand::thread_rng().gen_ratio(1, self.failure_one_in)
    }

    fn unavailable(endpoint: &str) -> FetchError {
        FetchError::Status {
            endpoint: endpoint.to_string(),
            status: 503,
        }
    }

    fn lock_feed(&self) -> std::sync::MutexGuard<'_, MockFeed> {
        self.feed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockAnalyticsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFeed {
    /// Adds a handful of new detections, as if the pipeline had been running.
    fn advance(&mut self) {
        self.ticks += 1;
        let mut rng = rand::thread_rng();
        let now = Local::now();
        let hour_key = now.format("%Y-%m-%d %H").to_string();

        for _ in 0..rng.gen_range(0..4) {
            let class_idx = rng.gen_range(0..CLASS_NAMES.len());
            let violation_type = VIOLATING_CLASSES
                .iter()
                .find(|(idx, _)| *idx == class_idx)
                .map(|(_, v)| v.to_string())
                .or_else(|| {
                    (class_idx == 0 && rng.gen_ratio(1, 4))
                        .then(|| PERSON_VIOLATIONS[rng.gen_range(0..PERSON_VIOLATIONS.len())].to_string())
                });

            let x1 = rng.gen_range(0.0..500.0);
            let y1 = rng.gen_range(0.0..300.0);
            let id = self.next_id;
            self.next_id += 1;

            self.detections.push_front(DetectionRecord {
                id: Some(id),
                ts: Some(now.format("%Y-%m-%d %H:%M:%S").to_string()),
                camera: Some(CAMERAS[rng.gen_range(0..CAMERAS.len())].to_string()),
                class: Some(svckit::ClassLabel::Name(class_idx.to_string())),
                class_name: Some(CLASS_NAMES[class_idx].to_string()),
                conf: Some(rng.gen_range(0.45..0.99)),
                x1: Some(x1),
                y1: Some(y1),
                x2: Some(x1 + rng.gen_range(40.0..140.0)),
                y2: Some(y1 + rng.gen_range(80.0..220.0)),
                image_url: violation_type.as_ref().map(|_| format!("/media/violations/{}.jpg", id)),
                image_path: None,
                violation_type,
            });

            match self.hourly.last_mut() {
                Some(last) if last.hour == hour_key => last.cnt += 1,
                _ => self.hourly.push(HourlyStat {
                    hour: hour_key.clone(),
                    cnt: 1,
                }),
            }
        }

        self.detections.truncate(MAX_RETAINED);
        if self.hourly.len() > 24 {
            let excess = self.hourly.len() - 24;
            self.hourly.drain(..excess);
        }
    }

    /// Violation counts over the retained detections, most frequent first.
    fn violation_counts(&self) -> Vec<ViolationStat> {
        let mut counts: Vec<ViolationStat> = Vec::new();
        for violation in self.detections.iter().filter_map(|d| d.violation_type.as_deref()) {
            match counts.iter_mut().find(|c| c.violation_type.as_deref() == Some(violation)) {
                Some(entry) => entry.cnt += 1,
                None => counts.push(ViolationStat {
                    violation_type: Some(violation.to_string()),
                    cnt: 1,
                }),
            }
        }
        counts.sort_by(|a, b| b.cnt.cmp(&a.cnt));
        counts
    }

    /// A synthetic camera view: a gradient "floor" with a moving figure.
    fn render_frame(&self, token: u64) -> RgbImage {
        let figure_x = (token * 7 % u64::from(FRAME_WIDTH - 20)) as u32;
        RgbImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
            let in_figure = x >= figure_x && x < figure_x + 20 && y > FRAME_HEIGHT / 3;
            let on_head = x >= figure_x + 4 && x < figure_x + 16 && y > FRAME_HEIGHT / 3 - 14 && y <= FRAME_HEIGHT / 3;
            if on_head {
                Rgb([250, 200, 40])
            } else if in_figure {
                Rgb([230, 120, 30])
            } else {
                let shade = (40 + y * 120 / FRAME_HEIGHT) as u8;
                Rgb([shade / 2, shade / 2, shade])
            }
        })
    }
}

#[async_trait]
impl AnalyticsSource for MockAnalyticsSource {
    async fn get_detections(&self, limit: NonZeroUsize) -> Result<Vec<DetectionRecord>, FetchError> {
        if self.should_fail() {
            return Err(Self::unavailable(DETECTIONS_PATH));
        }
        let mut feed = self.lock_feed();
        feed.advance();
        Ok(feed.detections.iter().take(limit.get()).cloned().collect())
    }

    async fn get_hourly_stats(&self) -> Result<Vec<HourlyStat>, FetchError> {
        Ok(self.lock_feed().hourly.clone())
    }

    async fn get_violation_stats(&self) -> Result<Vec<ViolationStat>, FetchError> {
        Ok(self.lock_feed().violation_counts())
    }

    fn last_frame_url(&self) -> FrameUrl {
        self.cache_buster.frame_url(DEMO_BASE_URL)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.should_fail() {
            return Err(FetchError::Status {
                endpoint: LAST_FRAME_PATH.to_string(),
                status: 404,
            });
        }
        let token = url
            .rsplit('-')
            .next()
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or_default();

        let frame = self.lock_feed().render_frame(token);
        let mut out = Cursor::new(Vec::new());
        frame
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| FetchError::Decode {
                endpoint: LAST_FRAME_PATH.to_string(),
                message: e.to_string(),
            })?;
        Ok(out.into_inner())
    }
}
