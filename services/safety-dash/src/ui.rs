// services/safety-dash/src/ui.rs
//
// Terminal rendering. Consumes the reconciled `DashboardView`; never touches
// poll results directly.

use std::time::Duration;

use chrono::Local;
use ratatui::{prelude::*, widgets::*};

use svckit::types::CLASS_NAMES;
use svckit::DetectionRecord;

use crate::api::media_url;
use crate::connection::ConnectionState;
use crate::frame::LiveFrame;
use crate::metrics::DerivedMetrics;
use crate::render::{reconcile, Bar, DashboardView, FrameView, PanelView};
use crate::state::{DashboardState, LogLevel};

// Color palette: safety orange on slate
mod colors {
    use ratatui::style::Color;

    pub const ORANGE: Color = Color::Rgb(255, 140, 0);
    pub const DARK_ORANGE: Color = Color::Rgb(178, 84, 0);
    pub const WHITE: Color = Color::Rgb(241, 245, 249);
    pub const SLATE: Color = Color::Rgb(148, 163, 184);
    pub const BG_DARK: Color = Color::Rgb(15, 23, 42);
    pub const BG_PANEL: Color = Color::Rgb(30, 41, 59);
    pub const SKELETON: Color = Color::Rgb(71, 85, 105);
    pub const BLUE: Color = Color::Rgb(59, 130, 246);
    pub const PURPLE: Color = Color::Rgb(168, 85, 247);
    pub const SUCCESS: Color = Color::Rgb(34, 197, 94);
    pub const ERROR: Color = Color::Rgb(239, 68, 68);
    pub const WARN: Color = Color::Rgb(234, 179, 8);
}

const VIOLATION_COLORS: [Color; 4] = [
    colors::ERROR,
    colors::ORANGE,
    colors::WARN,
    Color::Rgb(236, 72, 153),
];

/// Static facts about the session shown in the header.
pub struct UiContext<'a> {
    pub demo: bool,
    pub backend: &'a str,
    pub data_interval: Duration,
    pub frame_interval: Duration,
}

pub fn draw(frame: &mut Frame, state: &DashboardState, ctx: &UiContext<'_>) {
    let view = reconcile(state);
    let area = frame.area();

    frame.render_widget(Block::default().style(Style::default().bg(colors::BG_DARK)), area);

    let banner_height = if view.show_connection_warning { 5 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Header
            Constraint::Length(banner_height), // Connection warning
            Constraint::Length(5),             // Stat cards
            Constraint::Min(12),               // Main grid
            Constraint::Length(3),             // Footer
        ])
        .split(area);

    draw_header(frame, chunks[0], &view, ctx);
    if view.show_connection_warning {
        draw_connection_warning(frame, chunks[1], state, ctx);
    }
    draw_stats_row(frame, chunks[2], &view.stats);
    draw_main_grid(frame, chunks[3], &view, state, ctx);
    draw_footer(frame, chunks[4], ctx);
}

fn panel_block(title: &str, accent: Color) -> Block<'_> {
    Block::default()
        .title(Span::styled(format!(" {} ", title), Style::default().fg(accent).bold()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::SLATE))
        .border_type(BorderType::Rounded)
        .style(Style::default().bg(colors::BG_PANEL))
}

fn stale_suffix<T>(panel: &PanelView<T>) -> &'static str {
    match panel {
        PanelView::Ready { stale: true, .. } => " (stale)",
        _ => "",
    }
}

fn centered_message(frame: &mut Frame, area: Rect, message: &str, color: Color) {
    let text = Paragraph::new(Line::from(Span::styled(message, Style::default().fg(color))))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    let [middle] = Layout::vertical([Constraint::Length(1)]).flex(layout::Flex::Center).areas(area);
    frame.render_widget(text, middle);
}

fn skeleton(frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = (0..area.height.min(6))
        .map(|i| {
            let width = (area.width as usize).saturating_sub(4 + (i as usize % 3) * 6);
            Line::from(Span::styled("░".repeat(width), Style::default().fg(colors::SKELETON)))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_header(frame: &mut Frame, area: Rect, view: &DashboardView<'_>, ctx: &UiContext<'_>) {
    let (conn_text, conn_color) = match view.connection {
        ConnectionState::Connected => ("CONNECTED", colors::SUCCESS),
        ConnectionState::Disconnected => ("DISCONNECTED", colors::ERROR),
    };
    let (live_text, live_color) = if view.live {
        ("LIVE", colors::SUCCESS)
    } else {
        ("PAUSED", colors::WARN)
    };
    let updated = view
        .last_updated
        .map(|t| format!("updated {}", t.format("%H:%M:%S")))
        .unwrap_or_else(|| "waiting for data".to_string());

    let title = Line::from(vec![
        Span::styled(" SAFETYEYE ", Style::default().fg(colors::BG_DARK).bg(colors::ORANGE).bold()),
        Span::raw("  "),
        Span::styled("WORKPLACE SAFETY MONITOR", Style::default().fg(colors::WHITE).bold()),
        Span::raw("  "),
        Span::styled(
            if ctx.demo { "[DEMO]".to_string() } else { format!("[{}]", ctx.backend) },
            Style::default().fg(colors::SLATE),
        ),
        Span::raw("  "),
        Span::styled(format!("[{}]", conn_text), Style::default().fg(conn_color).bold()),
        Span::raw("  "),
        Span::styled(format!("[{}]", live_text), Style::default().fg(live_color).bold()),
        Span::raw("  "),
        Span::styled(updated, Style::default().fg(colors::SLATE)),
    ]);

    let header = Paragraph::new(title).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(colors::DARK_ORANGE))
            .style(Style::default().bg(colors::BG_DARK)),
    );

    frame.render_widget(header, area);
}

fn draw_connection_warning(frame: &mut Frame, area: Rect, state: &DashboardState, ctx: &UiContext<'_>) {
    let connection = &state.connection;
    let heading = if connection.is_unreachable() {
        " Cannot reach backend "
    } else {
        " Backend returned errors "
    };
    let data_note = if state.snapshot().is_some() {
        "showing last known data"
    } else {
        "no data received yet"
    };
    let failing = connection
        .failed_sources()
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let attempted = connection
        .last_outcome_at()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let text = vec![
        Line::from(vec![
            Span::styled(heading, Style::default().fg(colors::WHITE).bg(colors::ERROR).bold()),
            Span::raw("  "),
            Span::styled(format!("{} - {}", ctx.backend, data_note), Style::default().fg(colors::ERROR)),
        ]),
        Line::from(Span::styled(
            format!("Failing: {}  |  last attempt {}", failing, attempted),
            Style::default().fg(colors::SLATE),
        )),
        Line::from(Span::styled(
            truncate(connection.last_error().unwrap_or("no response"), area.width.saturating_sub(4) as usize),
            Style::default().fg(colors::SLATE).add_modifier(Modifier::DIM),
        )),
    ];
    let banner = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors::ERROR))
            .style(Style::default().bg(colors::BG_DARK)),
    );
    frame.render_widget(banner, area);
}

fn draw_stats_row(frame: &mut Frame, area: Rect, stats: &PanelView<DerivedMetrics>) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(area);

    let metrics = stats.data();
    let cards: [(&str, Option<String>, &str, Color); 4] = [
        (
            "TOTAL DETECTIONS",
            metrics.map(|m| m.total_detections.to_string()),
            "Recent records",
            colors::BLUE,
        ),
        (
            "VIOLATIONS",
            metrics.map(|m| m.total_violations.to_string()),
            "Requires attention",
            colors::ERROR,
        ),
        (
            "COMPLIANCE RATE",
            metrics.map(|m| format!("{}%", m.compliance_display())),
            "PPE compliance",
            colors::SUCCESS,
        ),
        (
            "HOURLY AVERAGE",
            metrics.map(|m| m.hourly_average.to_string()),
            "Detections/hour",
            colors::PURPLE,
        ),
    ];

    for (chunk, (label, value, subtitle, color)) in chunks.iter().zip(cards) {
        draw_stat_card(frame, *chunk, label, value.as_deref(), subtitle, color);
    }
}

fn draw_stat_card(frame: &mut Frame, area: Rect, label: &str, value: Option<&str>, subtitle: &str, value_color: Color) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::SLATE))
        .border_type(BorderType::Rounded)
        .style(Style::default().bg(colors::BG_PANEL));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let value_span = match value {
        Some(value) => Span::styled(value.to_string(), Style::default().fg(value_color).bold()),
        None => Span::styled("░░░░░░", Style::default().fg(colors::SKELETON)),
    };

    let text = vec![
        Line::from(Span::styled(label, Style::default().fg(colors::SLATE).add_modifier(Modifier::DIM))),
        Line::from(value_span),
        Line::from(Span::styled(subtitle, Style::default().fg(colors::SLATE))),
    ];

    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), inner);
}

fn draw_main_grid(frame: &mut Frame, area: Rect, view: &DashboardView<'_>, state: &DashboardState, ctx: &UiContext<'_>) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(30),
            Constraint::Percentage(35),
        ])
        .split(columns[1]);

    draw_live_feed(frame, left[0], &view.frame, view.live && view.connection.is_connected());
    draw_detections_table(frame, left[1], &view.detections, state.scroll_offset, ctx);
    draw_hourly_chart(frame, right[0], &view.hourly);
    draw_violations(frame, right[1], &view.violations);
    draw_activity_panel(frame, right[2], state);
}

fn draw_live_feed(frame: &mut Frame, area: Rect, view: &FrameView<'_>, on_air: bool) {
    let mut title = "LIVE CAMERA FEED".to_string();
    if on_air {
        title.push_str(" ● LIVE");
    }
    let block = panel_block(&title, colors::ORANGE);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match view {
        FrameView::Waiting => centered_message(frame, inner, "Connecting to camera...", colors::SLATE),
        FrameView::NoFrame { reason } => {
            centered_message(frame, inner, &format!("No frame available ({})", reason), colors::SLATE)
        }
        FrameView::Showing(live) => {
            let [picture, caption] =
                Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
            frame.render_widget(Paragraph::new(half_block_lines(live, picture)), picture);
            let text = format!(
                "{}x{}  frame #{}  {}",
                live.width,
                live.height,
                live.token,
                live.received_at.format("%H:%M:%S")
            );
            frame.render_widget(
                Paragraph::new(Span::styled(text, Style::default().fg(colors::SLATE))).alignment(Alignment::Right),
                caption,
            );
        }
    }
}

/// Paints the thumbnail with upper-half blocks: foreground is the top pixel,
/// background the bottom one.
fn half_block_lines(live: &LiveFrame, area: Rect) -> Vec<Line<'static>> {
    let thumb = &live.thumbnail;
    let (tw, th) = (thumb.width().max(1), thumb.height().max(1));
    let cols = u32::from(area.width).max(1);
    let rows = u32::from(area.height).max(1);

    let pixel = |x: u32, y: u32| {
        let p = thumb.get_pixel((x * tw / cols).min(tw - 1), (y * th / (rows * 2)).min(th - 1));
        Color::Rgb(p[0], p[1], p[2])
    };

    (0..rows)
        .map(|row| {
            let spans: Vec<Span> = (0..cols)
                .map(|col| Span::styled("▀", Style::default().fg(pixel(col, row * 2)).bg(pixel(col, row * 2 + 1))))
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn draw_detections_table(
    frame: &mut Frame,
    area: Rect,
    panel: &PanelView<&[DetectionRecord]>,
    scroll: usize,
    ctx: &UiContext<'_>,
) {
    let title = format!("RECENT DETECTIONS{}", stale_suffix(panel));
    let block = panel_block(&title, colors::WHITE);

    let detections = match panel {
        PanelView::Loading => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            skeleton(frame, inner);
            return;
        }
        PanelView::Empty => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            centered_message(frame, inner, "No detections yet", colors::SLATE);
            return;
        }
        PanelView::Ready { data, .. } => *data,
    };

    // Top visible row is the selected one.
    let scroll = scroll.min(detections.len().saturating_sub(1));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let [table_area, detail_area] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);

    let rows: Vec<Row> = detections
        .iter()
        .skip(scroll)
        .map(|d| {
            let status = match d.violation_type.as_deref().filter(|_| d.is_violation()) {
                Some(violation) => Span::styled(format!("✗ {}", violation), Style::default().fg(colors::ERROR)),
                None => Span::styled("✓ OK", Style::default().fg(colors::SUCCESS)),
            };
            let confidence = d
                .confidence_percent()
                .map(|c| format!("{:.1}%", c))
                .unwrap_or_else(|| "-".to_string());

            Row::new(vec![
                Cell::from(Span::styled(d.timestamp().to_string(), Style::default().fg(colors::SLATE))),
                Cell::from(Span::styled(d.camera_id().to_string(), Style::default().fg(colors::SLATE))),
                Cell::from(Span::styled(d.label(), Style::default().fg(colors::WHITE))),
                Cell::from(Span::styled(confidence, Style::default().fg(colors::WHITE))),
                Cell::from(status),
                Cell::from(Span::styled(
                    if d.evidence().is_some() { "view" } else { "-" },
                    Style::default().fg(colors::BLUE),
                )),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(19),
            Constraint::Length(10),
            Constraint::Min(12),
            Constraint::Length(7),
            Constraint::Length(14),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(["TIME", "CAMERA", "CLASS", "CONF", "STATUS", "IMAGE"].map(|h| {
            Cell::from(Span::styled(h, Style::default().fg(colors::ORANGE).bold()))
        }))
        .bottom_margin(1),
    );

    frame.render_widget(table, table_area);
    if let Some(selected) = detections.get(scroll) {
        frame.render_widget(evidence_line(selected, ctx), detail_area);
    }
}

/// Detail line for the selected detection: its resolved evidence image URL.
fn evidence_line(selected: &DetectionRecord, ctx: &UiContext<'_>) -> Paragraph<'static> {
    let id = selected.id.map(|id| format!("#{} ", id)).unwrap_or_default();
    let line = match selected.evidence().and_then(|path| media_url(ctx.backend, path)) {
        Some(url) => Line::from(vec![
            Span::styled(format!("{}evidence: ", id), Style::default().fg(colors::SLATE)),
            Span::styled(url, Style::default().fg(colors::BLUE).add_modifier(Modifier::UNDERLINED)),
        ]),
        None => Line::from(Span::styled(
            format!("{}no evidence image", id),
            Style::default().fg(colors::SLATE).add_modifier(Modifier::DIM),
        )),
    };
    Paragraph::new(line)
}

fn draw_hourly_chart(frame: &mut Frame, area: Rect, panel: &PanelView<Vec<Bar>>) {
    let title = format!("HOURLY ACTIVITY{}", stale_suffix(panel));
    let block = panel_block(&title, colors::PURPLE);

    let bars = match panel {
        PanelView::Loading => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            skeleton(frame, inner);
            return;
        }
        PanelView::Empty => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            centered_message(frame, inner, "No hourly data yet", colors::SLATE);
            return;
        }
        PanelView::Ready { data, .. } => data,
    };

    let chart_bars: Vec<ratatui::widgets::Bar> = bars
        .iter()
        .map(|b| {
            ratatui::widgets::Bar::default()
                .value(b.percent.round() as u64)
                .text_value(b.count.to_string())
                .label(Line::from(b.label.clone()))
                .style(Style::default().fg(colors::PURPLE))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&chart_bars))
        .max(100)
        .bar_width(3)
        .bar_gap(1)
        .value_style(Style::default().fg(colors::WHITE).bg(colors::PURPLE));

    frame.render_widget(chart, area);
}

fn draw_violations(frame: &mut Frame, area: Rect, panel: &PanelView<Vec<Bar>>) {
    let title = format!("VIOLATION BREAKDOWN{}", stale_suffix(panel));
    let block = panel_block(&title, colors::ERROR);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let bars = match panel {
        PanelView::Loading => return skeleton(frame, inner),
        PanelView::Empty => return centered_message(frame, inner, "No violations recorded", colors::SUCCESS),
        PanelView::Ready { data, .. } => data,
    };

    let label_width = 14usize;
    let count_width = 6usize;
    let track = (inner.width as usize).saturating_sub(label_width + count_width + 2);

    let lines: Vec<Line> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let filled = ((bar.percent / 100.0) * track as f64).round() as usize;
            let color = VIOLATION_COLORS[i % VIOLATION_COLORS.len()];
            Line::from(vec![
                Span::styled(
                    format!("{:<width$} ", truncate(&bar.label, label_width), width = label_width),
                    Style::default().fg(colors::WHITE),
                ),
                Span::styled("█".repeat(filled), Style::default().fg(color)),
                Span::styled("·".repeat(track.saturating_sub(filled)), Style::default().fg(colors::SKELETON)),
                Span::styled(format!(" {:>width$}", bar.count, width = count_width), Style::default().fg(color).bold()),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_activity_panel(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = panel_block("ACTIVITY LOG", colors::WHITE);

    let logs: Vec<Line> = state
        .activity_log
        .iter()
        .rev()
        .take(area.height as usize)
        .map(|entry| {
            let (prefix, color) = match entry.level {
                LogLevel::Error => ("[ERR]", colors::ERROR),
                LogLevel::Warn => ("[WRN]", colors::WARN),
                LogLevel::Info => ("[INF]", colors::SUCCESS),
            };

            Line::from(vec![
                Span::styled(
                    format!("{} ", entry.timestamp.format("%H:%M:%S")),
                    Style::default().fg(colors::SLATE).add_modifier(Modifier::DIM),
                ),
                Span::styled(format!("{} ", prefix), Style::default().fg(color)),
                Span::styled(entry.message.clone(), Style::default().fg(colors::WHITE)),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(logs).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, ctx: &UiContext<'_>) {
    let help = Line::from(vec![
        Span::styled(" [Q] ", Style::default().fg(colors::BG_DARK).bg(colors::ERROR)),
        Span::styled(" Quit ", Style::default().fg(colors::SLATE)),
        Span::raw("  "),
        Span::styled(" [SPACE] ", Style::default().fg(colors::BG_DARK).bg(colors::ORANGE)),
        Span::styled(" Pause/Resume feed ", Style::default().fg(colors::SLATE)),
        Span::raw("  "),
        Span::styled(" [R] ", Style::default().fg(colors::BG_DARK).bg(colors::WHITE)),
        Span::styled(" Refresh ", Style::default().fg(colors::SLATE)),
        Span::raw("  "),
        Span::styled(" [UP/DOWN] ", Style::default().fg(colors::BG_DARK).bg(colors::SLATE)),
        Span::styled(" Scroll ", Style::default().fg(colors::SLATE)),
        Span::raw("  "),
        Span::styled(
            format!(
                "data {} | frame {} | {} classes",
                format_interval(ctx.data_interval),
                format_interval(ctx.frame_interval),
                CLASS_NAMES.len()
            ),
            Style::default().fg(colors::WHITE),
        ),
        Span::raw("  "),
        Span::styled(Local::now().format("%Y-%m-%d %H:%M:%S").to_string(), Style::default().fg(colors::SLATE)),
    ]);

    let footer = Paragraph::new(help).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(colors::DARK_ORANGE))
            .style(Style::default().bg(colors::BG_DARK)),
    );

    frame.render_widget(footer, area);
}

fn format_interval(interval: Duration) -> String {
    let millis = interval.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
