// services/safety-dash/src/poll.rs
//
// Poll scheduler: one timer for detections + stats, one for the live frame.
//
// Cycles are spawned per tick and may overlap when the backend is slow.
// Each data cycle carries a generation number; the consumer decides at
// commit time whether a result is still the newest. Dropping the
// subscription stops both timers, aborts in-flight work and raises the
// discard flag, so nothing is delivered after teardown.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use svckit::FrameError;

use crate::api::{AnalyticsSource, FrameUrl};
use crate::connection::CycleReport;
use crate::frame::{decode_frame, LiveFrame};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub data_interval: Duration,
    pub frame_interval: Duration,
    pub detection_limit: NonZeroUsize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            data_interval: Duration::from_secs(4),
            frame_interval: Duration::from_secs(1),
            detection_limit: NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// Delivered to the owner of the dashboard state.
#[derive(Debug)]
pub enum PollEvent {
    Cycle { generation: u64, report: CycleReport },
    Frame { token: u64, result: Result<LiveFrame, FrameError> },
}

pub struct PollScheduler;

impl PollScheduler {
    /// Starts both timers. The first tick of each fires immediately.
    pub fn start(source: Arc<dyn AnalyticsSource>, config: PollConfig) -> PollSubscription {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let discarded = Arc::new(AtomicBool::new(false));
        let refresh = Arc::new(Notify::new());
        let (live, live_rx) = watch::channel(true);

        info!(
            data_interval = ?config.data_interval,
            frame_interval = ?config.frame_interval,
            limit = config.detection_limit.get(),
            "Polling started"
        );

        let data_task = tokio::spawn(data_loop(
            source.clone(),
            config.clone(),
            tx.clone(),
            discarded.clone(),
            refresh.clone(),
        ));
        let frame_task = tokio::spawn(frame_loop(source, config.frame_interval, tx, discarded.clone(), live_rx));

        PollSubscription {
            events,
            discarded,
            refresh,
            live,
            tasks: vec![data_task, frame_task],
        }
    }
}

/// Handle to the running pollers. Owning it is owning the poll lifetime.
pub struct PollSubscription {
    events: mpsc::Receiver<PollEvent>,
    discarded: Arc<AtomicBool>,
    refresh: Arc<Notify>,
    live: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PollSubscription {
    /// Next completed cycle or frame load. `None` once shut down.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    /// Pauses or resumes the frame poll. Data polling is unaffected.
    pub fn set_live(&self, live: bool) {
        self.live.send_replace(live);
        info!(live, "Live frame polling toggled");
    }

    /// Runs one extra data cycle right away.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.discarded.store(true, Ordering::Release);
        for task in &self.tasks {
            task.abort();
        }
        self.events.close();
        debug!("Polling stopped");
    }
}

enum Wake {
    Tick,
    Reaped,
}

async fn data_loop(
    source: Arc<dyn AnalyticsSource>,
    config: PollConfig,
    tx: mpsc::Sender<PollEvent>,
    discarded: Arc<AtomicBool>,
    refresh: Arc<Notify>,
) {
    let mut ticker = interval(config.data_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Dropped with this task on abort, which aborts every cycle still in flight.
    let mut cycles = JoinSet::new();
    let mut generation = 0u64;

    loop {
        let wake = tokio::select! {
            _ = ticker.tick() => Wake::Tick,
            _ = refresh.notified() => Wake::Tick,
            Some(_) = cycles.join_next(), if !cycles.is_empty() => Wake::Reaped,
        };
        if matches!(wake, Wake::Reaped) {
            continue;
        }

        generation += 1;
        cycles.spawn(run_cycle(
            source.clone(),
            config.detection_limit,
            generation,
            tx.clone(),
            discarded.clone(),
        ));
    }
}

/// One data cycle: the three fetches run concurrently and are reported
/// together, unless the subscription was torn down in the meantime.
pub(crate) async fn run_cycle(
    source: Arc<dyn AnalyticsSource>,
    limit: NonZeroUsize,
    generation: u64,
    tx: mpsc::Sender<PollEvent>,
    discarded: Arc<AtomicBool>,
) {
    let (detections, hourly, violations) = tokio::join!(
        source.get_detections(limit),
        source.get_hourly_stats(),
        source.get_violation_stats(),
    );

    if discarded.load(Ordering::Acquire) {
        debug!(generation, "Dropping cycle result after teardown");
        return;
    }

    let report = CycleReport {
        detections,
        hourly,
        violations,
    };
    let _ = tx.send(PollEvent::Cycle { generation, report }).await;
}

async fn frame_loop(
    source: Arc<dyn AnalyticsSource>,
    period: Duration,
    tx: mpsc::Sender<PollEvent>,
    discarded: Arc<AtomicBool>,
    live: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut loads = JoinSet::new();

    loop {
        let wake = tokio::select! {
            _ = ticker.tick() => Wake::Tick,
            Some(_) = loads.join_next(), if !loads.is_empty() => Wake::Reaped,
        };
        if matches!(wake, Wake::Reaped) || !*live.borrow() {
            continue;
        }

        let frame_url = source.last_frame_url();
        loads.spawn(load_frame(source.clone(), frame_url, tx.clone(), discarded.clone()));
    }
}

/// Frame loads are not sequenced: whichever completes last is shown.
async fn load_frame(
    source: Arc<dyn AnalyticsSource>,
    frame_url: FrameUrl,
    tx: mpsc::Sender<PollEvent>,
    discarded: Arc<AtomicBool>,
) {
    let token = frame_url.token;
    let result = match source.fetch_image(&frame_url.url).await {
        Ok(bytes) => tokio::task::spawn_blocking(move || decode_frame(token, &bytes))
            .await
            .unwrap_or_else(|e| Err(FrameError::Decode(e.to_string()))),
        Err(err) => Err(FrameError::from(err)),
    };

    if discarded.load(Ordering::Acquire) {
        return;
    }
    let _ = tx.send(PollEvent::Frame { token, result }).await;
}
