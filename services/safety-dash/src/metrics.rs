// services/safety-dash/src/metrics.rs
//
// Derived dashboard figures. Everything here is a pure function of the
// current batch; nothing is cached between cycles.

use svckit::{DetectionRecord, HourlyStat};

/// Hour buckets shown in the activity chart.
pub const HOURLY_WINDOW: usize = 12;

/// Minimum bar height (percent) so quiet hours stay visible.
pub const HOURLY_BAR_FLOOR: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedMetrics {
    pub total_detections: usize,
    pub total_violations: usize,
    pub compliance_rate: f64,
    pub hourly_average: u64,
}

impl DerivedMetrics {
    pub fn compute(detections: &[DetectionRecord], hourly: &[HourlyStat]) -> Self {
        let total_detections = detections.len();
        let total_violations = violation_count(detections);

        Self {
            total_detections,
            total_violations,
            compliance_rate: compliance_rate(total_detections, total_violations),
            hourly_average: hourly_average(hourly),
        }
    }

    /// `"100"` for an empty batch, one decimal otherwise.
    pub fn compliance_display(&self) -> String {
        if self.total_detections == 0 {
            "100".to_string()
        } else {
            format!("{:.1}", self.compliance_rate)
        }
    }
}

pub fn violation_count(detections: &[DetectionRecord]) -> usize {
    detections.iter().filter(|d| d.is_violation()).count()
}

/// Share of compliant detections in percent, rounded to one decimal.
pub fn compliance_rate(total: usize, violations: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let compliant = total.saturating_sub(violations) as f64;
    let rate = compliant / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

pub fn hourly_average(hourly: &[HourlyStat]) -> u64 {
    if hourly.is_empty() {
        return 0;
    }
    let sum: u64 = hourly.iter().map(|h| h.cnt).sum();
    (sum as f64 / hourly.len() as f64).round() as u64
}

/// Largest value in the series, never below 1, for normalizing bars.
pub fn max_for_scale<I>(values: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    values.into_iter().max().unwrap_or(0).max(1)
}

pub fn bar_percent(value: u64, max: u64) -> f64 {
    (value as f64 / max.max(1) as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn hourly_bar_percent(value: u64, max: u64) -> f64 {
    bar_percent(value, max).max(HOURLY_BAR_FLOOR)
}

/// The trailing `HOURLY_WINDOW` buckets, oldest first.
pub fn recent_hours(hourly: &[HourlyStat]) -> &[HourlyStat] {
    &hourly[hourly.len().saturating_sub(HOURLY_WINDOW)..]
}
