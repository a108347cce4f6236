// services/safety-dash/src/main.rs
//
// SafetyEye terminal dashboard
// Live workplace-safety monitoring against the analytics backend
//
// Run with: cargo run --bin safety-dash -- --demo

use std::fs::OpenOptions;
use std::io::stdout;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use futures::StreamExt;
use ratatui::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use safety_dash::config::{load_config, SafetyDashConfig};
use safety_dash::mock::MockAnalyticsSource;
use safety_dash::state::LogLevel;
use safety_dash::ui::{self, UiContext};
use safety_dash::{AnalyticsSource, ApiClient, CommitOutcome, DashboardState, PollScheduler};

const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "safety-dash")]
#[command(about = "Terminal dashboard for SafetyEye workplace-safety detections")]
#[command(version)]
struct Args {
    /// Run against a simulated backend (no server required)
    #[arg(long, short)]
    demo: bool,

    /// Optional config file (yaml, toml or json)
    #[arg(long, short, env = "SAFETY_DASH_CONFIG")]
    config: Option<String>,

    /// Analytics backend base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Detections + stats refresh interval in milliseconds
    #[arg(long)]
    data_interval_ms: Option<u64>,

    /// Live frame refresh interval in milliseconds
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Number of recent detections to request
    #[arg(long)]
    limit: Option<usize>,
}

impl Args {
    fn apply_overrides(&self, config: &mut SafetyDashConfig) {
        if let Some(url) = &self.api_url {
            config.api.base_url = url.clone();
        }
        if let Some(ms) = self.data_interval_ms {
            config.poll.data_interval_ms = ms;
        }
        if let Some(ms) = self.frame_interval_ms {
            config.poll.frame_interval_ms = ms;
        }
        if let Some(limit) = self.limit {
            config.poll.detection_limit = limit;
        }
    }
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_tracing(config: &SafetyDashConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.observability.log_file)
        .with_context(|| format!("opening log file {}", config.observability.log_file))?;

    let level = &config.observability.log_level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("safety_dash={level},svckit={level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;
    let poll_config = config.poll_config()?;

    init_tracing(&config)?;
    info!(
        demo = args.demo,
        backend = %config.api.base_url,
        data_interval_ms = config.poll.data_interval_ms,
        frame_interval_ms = config.poll.frame_interval_ms,
        "Starting SafetyEye dashboard"
    );

    let source: Arc<dyn AnalyticsSource> = if args.demo {
        Arc::new(MockAnalyticsSource::new())
    } else {
        Arc::new(ApiClient::new(&config.api.base_url, config.api.request_timeout()))
    };

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let ctx = UiContext {
        demo: args.demo,
        backend: &config.api.base_url,
        data_interval: poll_config.data_interval,
        frame_interval: poll_config.frame_interval,
    };
    let result = run_app(&mut terminal, source, poll_config, &ctx).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    if let Err(e) = &result {
        warn!(error = %e, "Dashboard exited with error");
    }
    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    source: Arc<dyn AnalyticsSource>,
    poll_config: safety_dash::PollConfig,
    ctx: &UiContext<'_>,
) -> Result<()> {
    let mut state = DashboardState::new();
    if ctx.demo {
        state.add_log(LogLevel::Info, "Dashboard started in DEMO mode");
    } else {
        state.add_log(LogLevel::Info, &format!("Dashboard started - polling {}", ctx.backend));
    }

    let mut subscription = PollScheduler::start(source, poll_config);
    let mut keys = EventStream::new();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    loop {
        terminal.draw(|frame| ui::draw(frame, &state, ctx))?;

        tokio::select! {
            event = subscription.next_event() => {
                let Some(event) = event else { break };
                if state.apply(event) == CommitOutcome::Stale {
                    tracing::debug!(latest = state.last_generation(), "Late cycle dropped");
                }
            }
            key = keys.next() => {
                let Some(key) = key else { break };
                if let Event::Key(key) = key? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char(' ') => {
                            let live = state.toggle_live();
                            subscription.set_live(live);
                        }
                        KeyCode::Char('r') => {
                            state.add_log(LogLevel::Info, "Manual refresh requested");
                            subscription.refresh_now();
                        }
                        KeyCode::Up => state.scroll_up(),
                        KeyCode::Down => state.scroll_down(),
                        _ => {}
                    }
                }
            }
            _ = redraw.tick() => {}
        }
    }

    info!("Shutting down dashboard");
    state.close();
    subscription.shutdown();
    Ok(())
}
