// services/safety-dash/src/render.rs
//
// Render reconciliation: decides per panel whether to show a skeleton, an
// empty message, or data (possibly stale). Drawing code only consumes
// `DashboardView`.

use chrono::{DateTime, Local};

use svckit::DetectionRecord;

use crate::connection::ConnectionState;
use crate::frame::{FrameState, LiveFrame};
use crate::metrics::{self, DerivedMetrics};
use crate::state::DashboardState;

#[derive(Debug, Clone, PartialEq)]
pub enum PanelView<T> {
    /// First cycle still outstanding.
    Loading,
    /// Cycle completed but there is nothing to show.
    Empty,
    /// `stale` is set when the backend is currently unreachable and the
    /// data is from an earlier cycle.
    Ready { data: T, stale: bool },
}

impl<T> PanelView<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, PanelView::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            PanelView::Ready { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// One normalized bar of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub count: u64,
    pub percent: f64,
}

#[derive(Debug, Clone)]
pub enum FrameView<'a> {
    Waiting,
    Showing(&'a LiveFrame),
    NoFrame { reason: &'a str },
}

#[derive(Debug, Clone)]
pub struct DashboardView<'a> {
    pub connection: ConnectionState,
    pub live: bool,
    pub show_connection_warning: bool,
    pub last_updated: Option<DateTime<Local>>,
    pub stats: PanelView<DerivedMetrics>,
    pub detections: PanelView<&'a [DetectionRecord]>,
    pub hourly: PanelView<Vec<Bar>>,
    pub violations: PanelView<Vec<Bar>>,
    pub frame: FrameView<'a>,
}

pub fn reconcile(state: &DashboardState) -> DashboardView<'_> {
    let loading = state.is_loading();
    let connected = state.connection.is_connected();
    let snapshot = state.snapshot();
    let stale = !connected && snapshot.is_some();

    let stats = if loading {
        PanelView::Loading
    } else {
        let data = snapshot.map(|s| s.metrics()).unwrap_or_else(|| DerivedMetrics::compute(&[], &[]));
        PanelView::Ready { data, stale }
    };

    let detections = panel(loading, snapshot.map(|s| s.detections.as_slice()), stale, |d| d.is_empty());

    let hourly = panel(
        loading,
        snapshot.map(|s| {
            let window = metrics::recent_hours(&s.hourly);
            let max = metrics::max_for_scale(window.iter().map(|h| h.cnt));
            window
                .iter()
                .map(|h| Bar {
                    label: h.short_label().to_string(),
                    count: h.cnt,
                    percent: metrics::hourly_bar_percent(h.cnt, max),
                })
                .collect::<Vec<_>>()
        }),
        stale,
        |bars| bars.is_empty(),
    );

    let violations = panel(
        loading,
        snapshot.map(|s| {
            let max = metrics::max_for_scale(s.violations.iter().map(|v| v.cnt));
            s.violations
                .iter()
                .map(|v| Bar {
                    label: v.label().to_string(),
                    count: v.cnt,
                    percent: metrics::bar_percent(v.cnt, max),
                })
                .collect::<Vec<_>>()
        }),
        stale,
        |bars| bars.is_empty(),
    );

    let frame = match &state.frame {
        FrameState::Waiting => FrameView::Waiting,
        FrameState::Showing(frame) => FrameView::Showing(frame),
        FrameState::Unavailable { reason } => FrameView::NoFrame { reason },
    };

    DashboardView {
        connection: state.connection.state(),
        live: state.is_live,
        show_connection_warning: !connected && !loading,
        last_updated: snapshot.map(|s| s.updated_at),
        stats,
        detections,
        hourly,
        violations,
        frame,
    }
}

fn panel<C>(loading: bool, data: Option<C>, stale: bool, is_empty: fn(&C) -> bool) -> PanelView<C> {
    if loading {
        return PanelView::Loading;
    }
    match data {
        Some(data) if !is_empty(&data) => PanelView::Ready { data, stale },
        _ => PanelView::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::CycleReport;
    use svckit::{FetchError, HourlyStat, ViolationStat};

    fn report(detections: Vec<DetectionRecord>, hourly: Vec<HourlyStat>, violations: Vec<ViolationStat>) -> CycleReport {
        CycleReport {
            detections: Ok(detections),
            hourly: Ok(hourly),
            violations: Ok(violations),
        }
    }

    fn outage() -> CycleReport {
        let err = FetchError::Status {
            endpoint: "/api/detections".to_string(),
            status: 502,
        };
        CycleReport {
            detections: Err(err.clone()),
            hourly: Err(err.clone()),
            violations: Err(err),
        }
    }

    #[test]
    fn test_loading_shows_skeletons() {
        let state = DashboardState::new();
        let view = reconcile(&state);

        assert!(view.stats.is_loading());
        assert!(view.detections.is_loading());
        assert!(view.hourly.is_loading());
        assert!(view.violations.is_loading());
        assert!(!view.show_connection_warning);
        assert!(matches!(view.frame, FrameView::Waiting));
    }

    #[test]
    fn test_empty_dataset_is_distinct_from_loading() {
        let mut state = DashboardState::new();
        state.apply_cycle(1, report(vec![], vec![], vec![]));
        let view = reconcile(&state);

        assert_eq!(view.detections, PanelView::Empty);
        assert_eq!(view.hourly, PanelView::Empty);
        assert_eq!(view.violations, PanelView::Empty);
        assert_eq!(view.stats.data().map(|m| m.compliance_display()).as_deref(), Some("100"));
    }

    #[test]
    fn test_stale_data_survives_outage() {
        let mut state = DashboardState::new();
        let batch = vec![DetectionRecord::default(); 4];
        state.apply_cycle(
            1,
            report(
                batch,
                vec![HourlyStat { hour: "08".to_string(), cnt: 4 }],
                vec![ViolationStat { violation_type: Some("no_helmet".to_string()), cnt: 2 }],
            ),
        );
        state.apply_cycle(2, outage());
        let view = reconcile(&state);

        assert_eq!(view.connection, ConnectionState::Disconnected);
        assert!(view.show_connection_warning);
        match &view.detections {
            PanelView::Ready { data, stale } => {
                assert_eq!(data.len(), 4);
                assert!(*stale);
            }
            other => panic!("expected stale detections, got {:?}", other),
        }
        assert_eq!(view.stats.data().map(|m| m.total_detections), Some(4));
    }

    #[test]
    fn test_failed_first_cycle_shows_empty_panels_and_warning() {
        let mut state = DashboardState::new();
        state.apply_cycle(1, outage());
        let view = reconcile(&state);

        assert_eq!(view.detections, PanelView::Empty);
        assert!(view.show_connection_warning);
        assert_eq!(view.stats.data().map(|m| m.total_detections), Some(0));
    }

    #[test]
    fn test_bars_are_normalized() {
        let mut state = DashboardState::new();
        state.apply_cycle(
            1,
            report(
                vec![DetectionRecord::default()],
                vec![
                    HourlyStat { hour: "2025-03-01 08".to_string(), cnt: 0 },
                    HourlyStat { hour: "2025-03-01 09".to_string(), cnt: 10 },
                ],
                vec![
                    ViolationStat { violation_type: None, cnt: 5 },
                    ViolationStat { violation_type: Some("no_vest".to_string()), cnt: 10 },
                ],
            ),
        );
        let view = reconcile(&state);

        let hourly = view.hourly.data().unwrap();
        assert_eq!(hourly[0].label, "08");
        assert_eq!(hourly[0].percent, metrics::HOURLY_BAR_FLOOR);
        assert_eq!(hourly[1].percent, 100.0);

        let violations = view.violations.data().unwrap();
        assert_eq!(violations[0].label, "unknown");
        assert_eq!(violations[0].percent, 50.0);
    }

    #[test]
    fn test_zero_count_violations_do_not_divide_by_zero() {
        let mut state = DashboardState::new();
        state.apply_cycle(
            1,
            report(vec![], vec![], vec![ViolationStat { violation_type: Some("no_mask".to_string()), cnt: 0 }]),
        );
        let view = reconcile(&state);

        let bars = view.violations.data().unwrap();
        assert_eq!(bars[0].percent, 0.0);
    }
}
