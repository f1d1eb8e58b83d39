//! Browser Push Channel
//!
//! Bridges one pipeline connection onto one server-sent-events response.
//! Each browser session that opens `GET /api/stream` gets its own
//! [`PipelineClient`] plus a forwarding task; sessions share nothing, so an
//! upstream failure in one session never affects another.
//!
//! # Channel Messages
//!
//! - `connected` / `disconnected` / `error`: connection lifecycle
//! - `ping`: heartbeat on a fixed interval, keeps intermediaries from
//!   idling out the response
//! - `friend-online`, `friend-offline`, `friend-location`, `friend-update`:
//!   forwarded pipeline events, data = decoded inner payload JSON
//!
//! # Teardown
//!
//! The browser closing the tab drops the SSE body, which closes the
//! receiver; the forwarding task notices and cancels the session token,
//! tearing down the pipeline connection and the heartbeat. The relay never
//! reconnects upstream: the browser-side engine reopens the whole channel.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::response::sse::Event;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::metrics;
use crate::infrastructure::upstream::pipeline::{
    PipelineClient, PipelineClientConfig, PipelineEvent,
};
use crate::infrastructure::upstream::SessionToken;

// =============================================================================
// Session Registry
// =============================================================================

/// Process-wide counters over all relay sessions, for health reporting.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: AtomicUsize,
    opened_total: AtomicU64,
    events_forwarded: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            opened_total: AtomicU64::new(0),
            events_forwarded: AtomicU64::new(0),
        }
    }

    /// Number of sessions currently streaming.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Total sessions opened since start.
    #[must_use]
    pub fn opened_total(&self) -> u64 {
        self.opened_total.load(Ordering::Relaxed)
    }

    /// Total events forwarded to browsers since start.
    #[must_use]
    pub fn events_forwarded(&self) -> u64 {
        self.events_forwarded.load(Ordering::Relaxed)
    }

    #[allow(clippy::cast_precision_loss)]
    fn open(self: &Arc<Self>) -> SessionGuard {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.opened_total.fetch_add(1, Ordering::Relaxed);
        metrics::set_active_sessions(self.active() as f64);
        SessionGuard {
            registry: Arc::clone(self),
        }
    }

    fn record_forwarded(&self) {
        self.events_forwarded.fetch_add(1, Ordering::Relaxed);
    }
}

/// Decrements the active-session count when the forwarding task ends.
struct SessionGuard {
    registry: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    #[allow(clippy::cast_precision_loss)]
    fn drop(&mut self) {
        self.registry.active.fetch_sub(1, Ordering::Relaxed);
        metrics::set_active_sessions(self.registry.active() as f64);
    }
}

// =============================================================================
// Relay Settings
// =============================================================================

/// Settings for one relay session.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Pipeline connection settings.
    pub pipeline: PipelineClientConfig,
    /// Interval between `ping` heartbeat messages.
    pub heartbeat_interval: Duration,
}

// =============================================================================
// Session Spawning
// =============================================================================

/// SSE item stream type returned to the axum handler.
pub type RelayStream = ReceiverStream<Result<Event, Infallible>>;

/// Start one relay session for an authenticated browser request.
///
/// Spawns the pipeline client and the forwarding task, and returns the
/// event stream to hand to `Sse::new`. The returned stream owns the
/// session: dropping it tears everything down.
#[must_use]
pub fn open_session(
    settings: &RelaySettings,
    token: SessionToken,
    registry: &Arc<SessionRegistry>,
    shutdown: &CancellationToken,
) -> RelayStream {
    let session_id = uuid::Uuid::new_v4();
    let cancel = shutdown.child_token();

    let (sse_tx, sse_rx) = mpsc::channel::<Result<Event, Infallible>>(64);
    let (pipe_tx, pipe_rx) = mpsc::channel::<PipelineEvent>(256);

    let client = PipelineClient::new(
        settings.pipeline.clone(),
        token,
        pipe_tx,
        cancel.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = client.run().await {
            tracing::warn!(error = %e, "Pipeline connection ended with error");
        }
    });

    let guard = registry.open();
    let heartbeat_interval = settings.heartbeat_interval;
    let registry = Arc::clone(registry);
    tokio::spawn(async move {
        tracing::info!(%session_id, "Relay session opened");
        forward_events(pipe_rx, sse_tx, heartbeat_interval, &cancel, &registry).await;
        cancel.cancel();
        drop(guard);
        tracing::info!(%session_id, "Relay session closed");
    });

    ReceiverStream::new(sse_rx)
}

/// Forward pipeline events and heartbeats until either side goes away.
async fn forward_events(
    mut pipe_rx: mpsc::Receiver<PipelineEvent>,
    sse_tx: mpsc::Sender<Result<Event, Infallible>>,
    heartbeat_interval: Duration,
    cancel: &CancellationToken,
    registry: &Arc<SessionRegistry>,
) {
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so the first ping lands one
    // interval after `connected`.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                break;
            }
            () = sse_tx.closed() => {
                tracing::debug!("Browser channel dropped");
                break;
            }
            _ = heartbeat.tick() => {
                let ping = Event::default()
                    .event("ping")
                    .data(Utc::now().timestamp_millis().to_string());
                if sse_tx.send(Ok(ping)).await.is_err() {
                    break;
                }
            }
            event = pipe_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                let terminal = matches!(
                    event,
                    PipelineEvent::Disconnected | PipelineEvent::Error(_)
                );
                if send_channel_message(&sse_tx, event, registry).await.is_err() || terminal {
                    break;
                }
            }
        }
    }
}

/// Convert one pipeline event into an SSE message and send it.
async fn send_channel_message(
    sse_tx: &mpsc::Sender<Result<Event, Infallible>>,
    event: PipelineEvent,
    registry: &Arc<SessionRegistry>,
) -> Result<(), ()> {
    let message = match event {
        PipelineEvent::Connected => Event::default().event("connected").data("{}"),
        PipelineEvent::Disconnected => Event::default().event("disconnected").data("{}"),
        PipelineEvent::Error(msg) => {
            let data = serde_json::json!({ "message": msg }).to_string();
            Event::default().event("error").data(data)
        }
        PipelineEvent::Event(event) => {
            let Ok(payload) = event.payload_json() else {
                return Ok(());
            };
            registry.record_forwarded();
            metrics::record_event_forwarded(event.kind());
            Event::default()
                .event(event.kind().as_channel_name())
                .data(payload)
        }
    };

    sse_tx.send(Ok(message)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::event::{FriendEvent, FriendOffline};

    async fn recv_event(
        rx: &mut mpsc::Receiver<Result<Event, Infallible>>,
    ) -> Event {
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("should receive event")
            .expect("channel should stay open")
            .expect("event is infallible")
    }

    #[tokio::test]
    async fn forwards_lifecycle_and_friend_events() {
        let (sse_tx, mut sse_rx) = mpsc::channel(16);
        let (pipe_tx, pipe_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let registry = Arc::new(SessionRegistry::new());

        let task = tokio::spawn({
            let cancel = cancel.clone();
            let registry = Arc::clone(&registry);
            async move {
                forward_events(
                    pipe_rx,
                    sse_tx,
                    Duration::from_secs(60),
                    &cancel,
                    &registry,
                )
                .await;
            }
        });

        pipe_tx.send(PipelineEvent::Connected).await.unwrap();
        let _connected = recv_event(&mut sse_rx).await;

        pipe_tx
            .send(PipelineEvent::Event(FriendEvent::Offline(FriendOffline {
                user_id: "usr_1".to_string(),
            })))
            .await
            .unwrap();
        let _friend_offline = recv_event(&mut sse_rx).await;
        assert_eq!(registry.events_forwarded(), 1);

        // A terminal pipeline event ends the forwarding task.
        pipe_tx.send(PipelineEvent::Disconnected).await.unwrap();
        let _disconnected = recv_event(&mut sse_rx).await;

        tokio::time::timeout(Duration::from_millis(200), task)
            .await
            .expect("forwarder should stop after terminal event")
            .unwrap();
    }

    #[tokio::test]
    async fn browser_drop_stops_forwarding() {
        let (sse_tx, sse_rx) = mpsc::channel::<Result<Event, Infallible>>(16);
        let (_pipe_tx, pipe_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let registry = Arc::new(SessionRegistry::new());

        let task = tokio::spawn({
            let cancel = cancel.clone();
            let registry = Arc::clone(&registry);
            async move {
                forward_events(
                    pipe_rx,
                    sse_tx,
                    Duration::from_secs(60),
                    &cancel,
                    &registry,
                )
                .await;
            }
        });

        drop(sse_rx);

        tokio::time::timeout(Duration::from_millis(200), task)
            .await
            .expect("forwarder should stop when the browser goes away")
            .unwrap();
    }

    #[tokio::test]
    async fn heartbeat_pings_are_emitted() {
        let (sse_tx, mut sse_rx) = mpsc::channel(16);
        let (_pipe_tx, pipe_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let registry = Arc::new(SessionRegistry::new());

        tokio::spawn({
            let cancel = cancel.clone();
            let registry = Arc::clone(&registry);
            async move {
                forward_events(
                    pipe_rx,
                    sse_tx,
                    Duration::from_millis(20),
                    &cancel,
                    &registry,
                )
                .await;
            }
        });

        // Two consecutive pings prove the interval keeps firing.
        let _first = recv_event(&mut sse_rx).await;
        let _second = recv_event(&mut sse_rx).await;

        cancel.cancel();
    }

    #[test]
    fn registry_counts_open_sessions() {
        let registry = Arc::new(SessionRegistry::new());
        assert_eq!(registry.active(), 0);

        let guard = registry.open();
        assert_eq!(registry.active(), 1);
        assert_eq!(registry.opened_total(), 1);

        drop(guard);
        assert_eq!(registry.active(), 0);
        assert_eq!(registry.opened_total(), 1);
    }
}
