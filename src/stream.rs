//! Continuous delivery of snapshots to one consumer.
//!
//! A stream runs two tokio tasks that share one output channel: the poll task
//! sends an immediate snapshot and then one per poll interval, and the
//! heartbeat task sends a keep-alive every 25 seconds. Neither waits on the
//! other. Both stop when the consumer drops its receiver or the handle is
//! closed.

use crate::constants::HEARTBEAT_INTERVAL;
use crate::domain::NormalizedSnapshot;
use crate::error::{FeedError, Result};
use crate::metrics::FeedMetrics;
use crate::pipeline::AcquisitionPipeline;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Data(NormalizedSnapshot),
    Error { message: String },
    KeepAlive,
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Data(_) => "data",
            StreamEvent::Error { .. } => "error",
            StreamEvent::KeepAlive => "keep_alive",
        }
    }

    /// Wire form as a `text/event-stream` frame.
    pub fn to_sse_frame(&self) -> String {
        match self {
            StreamEvent::Data(snapshot) => match serde_json::to_string(snapshot) {
                Ok(body) => format!("data: {}\n\n", body),
                Err(e) => format!("event: error\ndata: {}\n\n", json!({ "error": e.to_string() })),
            },
            StreamEvent::Error { message } => {
                format!("event: error\ndata: {}\n\n", json!({ "error": message }))
            }
            StreamEvent::KeepAlive => ": keep-alive\n\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Starting,
    Streaming,
    Closed,
}

pub struct StreamDeliveryLoop {
    pipeline: AcquisitionPipeline,
    poll_interval: Duration,
    heartbeat_interval: Duration,
}

impl StreamDeliveryLoop {
    pub fn new(pipeline: AcquisitionPipeline, poll_interval: Duration) -> Result<Self> {
        Ok(Self {
            pipeline,
            poll_interval: non_zero("poll interval", poll_interval)?,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        })
    }

    pub fn with_heartbeat_interval(mut self, heartbeat_interval: Duration) -> Result<Self> {
        self.heartbeat_interval = non_zero("heartbeat interval", heartbeat_interval)?;
        Ok(self)
    }

    /// Starts both tasks on the current runtime and returns immediately.
    pub fn spawn(self, tx: mpsc::Sender<StreamEvent>) -> StreamHandle {
        let (state_tx, _) = watch::channel(StreamState::Starting);
        let shared = Arc::new(Shared {
            state: state_tx,
            live_tasks: AtomicUsize::new(2),
        });
        let start = Instant::now();

        FeedMetrics::stream_opened();
        shared.state.send_replace(StreamState::Streaming);
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            heartbeat_interval_ms = self.heartbeat_interval.as_millis() as u64,
            "Stream started"
        );

        let heartbeat = tokio::spawn(run_heartbeat(
            self.heartbeat_interval,
            start,
            tx.clone(),
            shared.clone(),
        ));
        let poll = tokio::spawn(run_poll(self.pipeline, self.poll_interval, start, tx, shared.clone()));

        StreamHandle {
            shared,
            poll,
            heartbeat,
        }
    }
}

struct Shared {
    state: watch::Sender<StreamState>,
    live_tasks: AtomicUsize,
}

pub struct StreamHandle {
    shared: Arc<Shared>,
    poll: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl StreamHandle {
    pub fn state(&self) -> StreamState {
        *self.shared.state.borrow()
    }

    /// Stops both timers. A callback that already fired may still deliver its event.
    pub fn close(&self) {
        self.shared.state.send_replace(StreamState::Closed);
    }

    /// Waits until both tasks have exited.
    pub async fn join(self) {
        if let Err(e) = self.poll.await {
            warn!("Poll task ended abnormally: {}", e);
        }
        if let Err(e) = self.heartbeat.await {
            warn!("Heartbeat task ended abnormally: {}", e);
        }
    }
}

async fn run_poll(
    mut pipeline: AcquisitionPipeline,
    period: Duration,
    start: Instant,
    tx: mpsc::Sender<StreamEvent>,
    shared: Arc<Shared>,
) {
    let _guard = TaskGuard::new(shared.clone(), "poll");
    let mut closed = shared.state.subscribe();

    // First snapshot goes out without waiting for the timer.
    let first = tokio::select! {
        biased;
        _ = wait_closed(&mut closed) => None,
        _ = tx.closed() => None,
        event = fetch_event(&mut pipeline) => Some(event),
    };
    let Some(first) = first else {
        return;
    };
    if !push(&tx, first).await {
        return;
    }

    let mut ticker = interval_at(start + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => break,
            _ = tx.closed() => break,
            _ = ticker.tick() => {
                let event = fetch_event(&mut pipeline).await;
                if !push(&tx, event).await {
                    break;
                }
            }
        }
    }
}

async fn run_heartbeat(
    period: Duration,
    start: Instant,
    tx: mpsc::Sender<StreamEvent>,
    shared: Arc<Shared>,
) {
    let _guard = TaskGuard::new(shared.clone(), "heartbeat");
    let mut closed = shared.state.subscribe();
    let mut ticker = interval_at(start + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => break,
            _ = tx.closed() => break,
            _ = ticker.tick() => {
                if !push(&tx, StreamEvent::KeepAlive).await {
                    break;
                }
            }
        }
    }
}

/// Fetch failures become error events; the stream keeps going.
async fn fetch_event(pipeline: &mut AcquisitionPipeline) -> StreamEvent {
    match pipeline.fetch_snapshot().await {
        Ok(snapshot) => StreamEvent::Data(snapshot),
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "Stream fetch failed");
            FeedMetrics::record_fetch_error(e.kind());
            StreamEvent::Error {
                message: e.to_string(),
            }
        }
    }
}

async fn push(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    let kind = event.kind();
    match tx.send(event).await {
        Ok(()) => {
            FeedMetrics::record_stream_event(kind);
            true
        }
        Err(_) => {
            debug!(kind, "Consumer gone, dropping event");
            false
        }
    }
}

async fn wait_closed(rx: &mut watch::Receiver<StreamState>) {
    loop {
        let state = *rx.borrow_and_update();
        if state == StreamState::Closed {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn non_zero(what: &str, period: Duration) -> Result<Duration> {
    if period.is_zero() {
        return Err(FeedError::InvalidConfig(format!("{} must be positive", what)));
    }
    Ok(period)
}

/// Closes the stream when a task exits, including by panic.
struct TaskGuard {
    shared: Arc<Shared>,
    task: &'static str,
}

impl TaskGuard {
    fn new(shared: Arc<Shared>, task: &'static str) -> Self {
        Self { shared, task }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.shared.state.send_replace(StreamState::Closed);
        debug!(task = self.task, "Stream task stopped");
        if self.shared.live_tasks.fetch_sub(1, Ordering::AcqRel) == 1 {
            FeedMetrics::stream_closed();
            info!("Stream closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mock::{location, sensor, MockUpstream};
    use crate::app::ports::{LocationSearch, UpstreamPort};
    use crate::domain::LocationQuery;
    use crate::types::{LatestRecord, LocationRecord};
    use async_trait::async_trait;

    /// Resolves fine, then blows up inside the poll task.
    struct PanickingUpstream;

    #[async_trait]
    impl UpstreamPort for PanickingUpstream {
        async fn search_locations(&self, _search: &LocationSearch) -> Result<Vec<LocationRecord>> {
            Ok(vec![location(1, vec![sensor(1, "co")])])
        }

        async fn location(&self, _location_id: i64) -> Result<Vec<LocationRecord>> {
            Ok(vec![location(1, vec![sensor(1, "co")])])
        }

        async fn latest(&self, _location_id: i64) -> Result<Vec<LatestRecord>> {
            panic!("latest readings exploded");
        }
    }

    fn stream_pipeline(upstream: &Arc<MockUpstream>) -> AcquisitionPipeline {
        AcquisitionPipeline::new(
            upstream.clone(),
            LocationQuery::City {
                city: "Seattle".to_string(),
                country: "US".to_string(),
            },
        )
    }

    fn drain(rx: &mut mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_sse_frames() {
        assert_eq!(StreamEvent::KeepAlive.to_sse_frame(), ": keep-alive\n\n");
        assert_eq!(
            StreamEvent::Error {
                message: "boom".to_string()
            }
            .to_sse_frame(),
            "event: error\ndata: {\"error\":\"boom\"}\n\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_event_is_immediate() {
        let upstream = Arc::new(MockUpstream::with_location(location(1, vec![sensor(1, "co")])));
        upstream.set_latest(&[(1, 3.0)]);
        let (tx, mut rx) = mpsc::channel(16);

        let started = Instant::now();
        let handle = StreamDeliveryLoop::new(stream_pipeline(&upstream), Duration::from_secs(300))
            .unwrap()
            .spawn(tx);
        let first = rx.recv().await.unwrap();

        assert!(matches!(first, StreamEvent::Data(_)));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(handle.state(), StreamState::Streaming);
        handle.close();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_becomes_error_event_and_polling_continues() {
        let upstream = Arc::new(MockUpstream::with_location(location(1, vec![sensor(1, "co")])));
        let (tx, mut rx) = mpsc::channel(16);

        let handle = StreamDeliveryLoop::new(stream_pipeline(&upstream), Duration::from_secs(60))
            .unwrap()
            .with_heartbeat_interval(Duration::from_secs(3600))
            .unwrap()
            .spawn(tx);

        // Empty latest readings: NoDataAvailable.
        match rx.recv().await.unwrap() {
            StreamEvent::Error { message } => assert!(message.contains("No latest data")),
            other => panic!("expected error event, got {:?}", other),
        }

        upstream.set_latest(&[(1, 20.0)]);
        assert!(matches!(rx.recv().await.unwrap(), StreamEvent::Data(_)));
        assert_eq!(handle.state(), StreamState::Streaming);

        handle.close();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_receiver_closes_stream() {
        let upstream = Arc::new(MockUpstream::with_location(location(1, vec![sensor(1, "co")])));
        upstream.set_latest(&[(1, 3.0)]);
        let (tx, mut rx) = mpsc::channel(16);

        let handle = StreamDeliveryLoop::new(stream_pipeline(&upstream), Duration::from_secs(300))
            .unwrap()
            .spawn(tx);
        rx.recv().await.unwrap();
        drop(rx);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.state(), StreamState::Closed);
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_both_timers() {
        let upstream = Arc::new(MockUpstream::with_location(location(1, vec![sensor(1, "co")])));
        upstream.set_latest(&[(1, 3.0)]);
        let (tx, mut rx) = mpsc::channel(64);

        let handle = StreamDeliveryLoop::new(stream_pipeline(&upstream), Duration::from_secs(300))
            .unwrap()
            .spawn(tx);
        tokio::time::sleep(Duration::from_millis(60_001)).await;
        handle.close();
        handle.join().await;

        let before = drain(&mut rx);
        assert_eq!(before.len(), 3); // immediate + 2 heartbeats
        tokio::time::sleep(Duration::from_secs(1_000)).await;
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let upstream = Arc::new(MockUpstream::default());

        let err = StreamDeliveryLoop::new(stream_pipeline(&upstream), Duration::ZERO).err();
        assert!(matches!(err, Some(FeedError::InvalidConfig(_))));

        let err = StreamDeliveryLoop::new(stream_pipeline(&upstream), Duration::from_secs(300))
            .unwrap()
            .with_heartbeat_interval(Duration::ZERO)
            .err();
        assert!(matches!(err, Some(FeedError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_poll_task_still_closes_stream() {
        let pipeline = AcquisitionPipeline::new(
            Arc::new(PanickingUpstream),
            LocationQuery::City {
                city: "Seattle".to_string(),
                country: "US".to_string(),
            },
        );
        let (tx, mut rx) = mpsc::channel(16);

        let handle = StreamDeliveryLoop::new(pipeline, Duration::from_secs(300))
            .unwrap()
            .spawn(tx);
        tokio::time::sleep(Duration::from_secs(60)).await;

        // The heartbeat stops too instead of running on alone.
        assert_eq!(handle.state(), StreamState::Closed);
        handle.join().await;
        assert!(rx.recv().await.is_none());
    }
}
