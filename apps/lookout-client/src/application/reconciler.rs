//! Client State Reconciler
//!
//! Owns the contact store and merges three inputs into it on one logical
//! thread: the initial snapshot, the relay's push events, and the results
//! of its own async tasks (venue lookups, periodic snapshot refreshes).
//! Because the loop is the single writer, no locking is needed anywhere in
//! the state path; async venue results are reconciled with an optimistic
//! freshness check instead of a lock.
//!
//! # Lifecycle
//!
//! 1. Restore persisted side-state (location stamps, venue cache, log).
//! 2. Fetch the initial snapshot. Only after it is applied is the push
//!    channel opened, so a partial push-driven state never races an
//!    unfetched baseline.
//! 3. Pump the channel. On channel error, schedule exactly one reopen per
//!    error after a fixed backoff - suppressed once the logged-out latch
//!    is set, which also cancels a pending backoff timer.
//!
//! Derived view state is published through a `tokio::sync::watch` channel;
//! the presentation layer renders whatever snapshot it last saw.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::domain::activity::ActivityLog;

use super::ports::{
    EventStream, KEY_ACTIVITY_LOG, KEY_LOCATION_STAMPS, KEY_VENUE_CACHE, PushEvent, RelayMessage,
    RelayTransport, SnapshotApi, SnapshotPayload, StateStorage, TransportError, WorldDirectory,
    WorldMetadata,
};
use super::store::{ApplyEffects, ContactStore};
use super::view::{ConnectionStatus, ViewState, build_view};

// =============================================================================
// Configuration
// =============================================================================

/// Reconciler timing configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Fixed delay before reopening the channel after an error.
    pub reconnect_backoff: Duration,
    /// Jitter factor applied to the backoff (±fraction).
    pub reconnect_jitter: f64,
    /// Interval between full snapshot refreshes.
    pub refresh_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(5),
            reconnect_jitter: 0.1,
            refresh_interval: Duration::from_secs(300),
        }
    }
}

// =============================================================================
// Reconnect Scheduling
// =============================================================================

/// Schedules channel reopens: one attempt per error, fixed backoff with
/// jitter, suppressed entirely once the logged-out latch is set.
#[derive(Debug)]
pub struct ReconnectScheduler {
    backoff: Duration,
    jitter_factor: f64,
    latch: CancellationToken,
    scheduled: u32,
}

impl ReconnectScheduler {
    /// Create a scheduler bound to the logged-out latch.
    #[must_use]
    pub const fn new(backoff: Duration, jitter_factor: f64, latch: CancellationToken) -> Self {
        Self {
            backoff,
            jitter_factor,
            latch,
            scheduled: 0,
        }
    }

    /// Request one reconnect attempt. Returns the delay to wait, or `None`
    /// when the session has been logged out - a stale error callback after
    /// logout must not race a reopen.
    #[must_use]
    pub fn schedule(&mut self) -> Option<Duration> {
        if self.latch.is_cancelled() {
            return None;
        }
        self.scheduled += 1;
        Some(self.apply_jitter(self.backoff))
    }

    /// Number of attempts scheduled so far.
    #[must_use]
    pub const fn scheduled_count(&self) -> u32 {
        self.scheduled
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Presentation-side handle to a running reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerHandle {
    view_rx: watch::Receiver<ViewState>,
    latch: CancellationToken,
}

impl ReconcilerHandle {
    /// Subscribe to view state updates.
    #[must_use]
    pub fn view(&self) -> watch::Receiver<ViewState> {
        self.view_rx.clone()
    }

    /// Set the logged-out latch: stops the loop and suppresses any
    /// pending or future reconnect attempts.
    pub fn log_out(&self) {
        self.latch.cancel();
    }

    /// Whether the session has been logged out.
    #[must_use]
    pub fn is_logged_out(&self) -> bool {
        self.latch.is_cancelled()
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Result of one background task, delivered back to the single-writer loop.
enum TaskOutcome {
    World {
        world_id: String,
        result: Result<WorldMetadata, TransportError>,
    },
    Refresh {
        start_seq: u64,
        result: Result<SnapshotPayload, TransportError>,
    },
}

/// What one pump turn produced, extracted from the select so mutation
/// happens outside the borrow of the select futures.
enum Step {
    Channel(Option<RelayMessage>),
    Task(Option<TaskOutcome>),
    Refresh,
    LoggedOut,
}

/// The browser-side state reconciler.
pub struct Reconciler {
    store: ContactStore,
    log: ActivityLog,
    storage: Box<dyn StateStorage>,
    transport: Arc<dyn RelayTransport>,
    snapshots: Arc<dyn SnapshotApi>,
    worlds: Arc<dyn WorldDirectory>,
    config: ReconcilerConfig,
    latch: CancellationToken,
    view_tx: watch::Sender<ViewState>,
    task_tx: mpsc::Sender<TaskOutcome>,
    task_rx: mpsc::Receiver<TaskOutcome>,
    pending_worlds: HashSet<String>,
    connection: ConnectionStatus,
}

impl Reconciler {
    /// Create a reconciler and its handle.
    #[must_use]
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        snapshots: Arc<dyn SnapshotApi>,
        worlds: Arc<dyn WorldDirectory>,
        storage: Box<dyn StateStorage>,
        config: ReconcilerConfig,
    ) -> (Self, ReconcilerHandle) {
        let latch = CancellationToken::new();
        let (view_tx, view_rx) = watch::channel(ViewState::default());
        let (task_tx, task_rx) = mpsc::channel(64);

        let handle = ReconcilerHandle {
            view_rx,
            latch: latch.clone(),
        };
        let reconciler = Self {
            store: ContactStore::new(),
            log: ActivityLog::new(),
            storage,
            transport,
            snapshots,
            worlds,
            config,
            latch,
            view_tx,
            task_tx,
            task_rx,
            pending_worlds: HashSet::new(),
            connection: ConnectionStatus::Disconnected,
        };
        (reconciler, handle)
    }

    /// Run until logged out.
    pub async fn run(mut self) {
        self.restore_persisted();
        self.initialize().await;

        let mut refresh = tokio::time::interval(self.config.refresh_interval);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; the initial snapshot already ran.
        refresh.tick().await;

        let mut scheduler = ReconnectScheduler::new(
            self.config.reconnect_backoff,
            self.config.reconnect_jitter,
            self.latch.clone(),
        );

        while !self.latch.is_cancelled() {
            self.publish(ConnectionStatus::Reconnecting);

            match self.transport.connect().await {
                Ok(stream) => {
                    self.pump(stream, &mut refresh).await;
                }
                Err(TransportError::Unauthorized) => {
                    tracing::info!("Session credential rejected, logging out");
                    self.latch.cancel();
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Relay channel failed to open");
                }
            }

            self.publish(ConnectionStatus::Disconnected);

            let Some(delay) = scheduler.schedule() else {
                break;
            };
            tracing::debug!(delay_ms = delay.as_millis(), "Reconnect scheduled");
            tokio::select! {
                () = self.latch.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.publish(ConnectionStatus::Disconnected);
        tracing::info!("Reconciler stopped");
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    fn restore_persisted(&mut self) {
        let stamps = self
            .storage
            .load(KEY_LOCATION_STAMPS)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let venues = self
            .storage
            .load(KEY_VENUE_CACHE)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        self.store.restore(stamps, venues);

        if let Some(log) = self
            .storage
            .load(KEY_ACTIVITY_LOG)
            .and_then(|v| serde_json::from_value(v).ok())
        {
            self.log = log;
        }
    }

    async fn initialize(&mut self) {
        match self.snapshots.fetch().await {
            Ok(payload) => {
                let start_seq = self.store.seq();
                let effects = self.store.apply_snapshot(&payload, start_seq, Utc::now());
                self.handle_effects(effects);
            }
            Err(TransportError::Unauthorized) => {
                tracing::info!("Snapshot rejected the session credential, logging out");
                self.latch.cancel();
            }
            Err(e) => {
                // A later periodic refresh backfills the baseline.
                tracing::warn!(error = %e, "Initial snapshot failed");
            }
        }
    }

    // =========================================================================
    // Channel Pump
    // =========================================================================

    async fn pump(&mut self, mut stream: EventStream, refresh: &mut tokio::time::Interval) {
        loop {
            let step = {
                let latch = self.latch.clone();
                tokio::select! {
                    () = latch.cancelled() => Step::LoggedOut,
                    message = stream.next() => Step::Channel(message),
                    outcome = self.task_rx.recv() => Step::Task(outcome),
                    _ = refresh.tick() => Step::Refresh,
                }
            };

            match step {
                Step::LoggedOut => return,
                Step::Channel(Some(RelayMessage::Connected)) => {
                    tracing::info!("Relay channel connected");
                    self.publish(ConnectionStatus::Connected);
                }
                Step::Channel(Some(RelayMessage::Ping)) => {
                    // Heartbeat only proves liveness.
                }
                Step::Channel(Some(RelayMessage::Event(event))) => {
                    self.apply_push(&event);
                }
                Step::Channel(Some(RelayMessage::Error(message))) => {
                    tracing::warn!(%message, "Relay channel error");
                    return;
                }
                Step::Channel(Some(RelayMessage::Disconnected) | None) => {
                    tracing::info!("Relay channel closed");
                    return;
                }
                Step::Task(Some(outcome)) => self.apply_task(outcome),
                Step::Task(None) => {
                    // Own sender is held; this cannot happen.
                }
                Step::Refresh => self.spawn_refresh(),
            }
        }
    }

    // =========================================================================
    // Mutation Paths
    // =========================================================================

    fn apply_push(&mut self, event: &PushEvent) {
        let now = Utc::now();
        let effects = match event {
            PushEvent::Online(payload) => self.store.apply_online(payload, now),
            PushEvent::Offline(payload) => self.store.apply_offline(payload, now),
            PushEvent::LocationChanged(payload) => self.store.apply_location(payload, now),
            PushEvent::ProfileUpdated(payload) => self.store.apply_profile(payload, now),
        };
        self.handle_effects(effects);
    }

    fn apply_task(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::World { world_id, result } => {
                self.pending_worlds.remove(&world_id);
                match result {
                    Ok(metadata) => {
                        let changed = self.store.apply_world(&world_id, &metadata, Utc::now());
                        self.persist();
                        if changed {
                            self.publish(self.connection);
                        }
                    }
                    Err(error) => {
                        // The UI degrades to the raw location string.
                        tracing::debug!(%world_id, %error, "World lookup failed");
                    }
                }
            }
            TaskOutcome::Refresh { start_seq, result } => match result {
                Ok(payload) => {
                    let effects = self.store.apply_snapshot(&payload, start_seq, Utc::now());
                    self.handle_effects(effects);
                }
                Err(TransportError::Unauthorized) => {
                    tracing::info!("Refresh rejected the session credential, logging out");
                    self.latch.cancel();
                }
                Err(error) => {
                    tracing::warn!(%error, "Snapshot refresh failed");
                }
            },
        }
    }

    fn handle_effects(&mut self, effects: ApplyEffects) {
        for request in &effects.log {
            self.log
                .push(request.kind, request.subject.clone(), request.detail.clone());
        }
        for world_id in effects.fetch_worlds {
            self.spawn_world_fetch(world_id);
        }
        if effects.changed {
            self.persist();
            self.publish(self.connection);
        }
    }

    fn spawn_world_fetch(&mut self, world_id: String) {
        if !self.pending_worlds.insert(world_id.clone()) {
            return;
        }
        let worlds = Arc::clone(&self.worlds);
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = worlds.world(&world_id).await;
            let _ = task_tx.send(TaskOutcome::World { world_id, result }).await;
        });
    }

    fn spawn_refresh(&self) {
        let snapshots = Arc::clone(&self.snapshots);
        let task_tx = self.task_tx.clone();
        let start_seq = self.store.seq();
        tokio::spawn(async move {
            let result = snapshots.fetch().await;
            let _ = task_tx
                .send(TaskOutcome::Refresh { start_seq, result })
                .await;
        });
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    fn publish(&mut self, connection: ConnectionStatus) {
        self.connection = connection;
        let view = build_view(&self.store, connection);
        let _ = self.view_tx.send(view);
    }

    fn persist(&mut self) {
        persist_value(self.storage.as_mut(), KEY_LOCATION_STAMPS, self.store.stamps());
        persist_value(self.storage.as_mut(), KEY_VENUE_CACHE, self.store.venues());
        persist_value(self.storage.as_mut(), KEY_ACTIVITY_LOG, &self.log);
    }
}

fn persist_value<T: serde::Serialize>(storage: &mut dyn StateStorage, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(value) => storage.store(key, &value),
        Err(error) => tracing::warn!(%key, %error, "Failed to serialize persisted state"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_one_attempt_per_error() {
        let latch = CancellationToken::new();
        let mut scheduler = ReconnectScheduler::new(Duration::from_secs(5), 0.0, latch.clone());

        // Three consecutive channel errors: one attempt scheduled each.
        for expected in 1..=3 {
            let delay = scheduler.schedule();
            assert_eq!(delay, Some(Duration::from_secs(5)));
            assert_eq!(scheduler.scheduled_count(), expected);
        }

        // After logout, no further attempts.
        latch.cancel();
        assert!(scheduler.schedule().is_none());
        assert_eq!(scheduler.scheduled_count(), 3);
    }

    #[test]
    fn scheduler_jitter_stays_in_bounds() {
        let latch = CancellationToken::new();
        let mut scheduler = ReconnectScheduler::new(Duration::from_millis(1000), 0.1, latch);

        for _ in 0..100 {
            let millis = scheduler.schedule().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of bounds");
        }
    }

    #[test]
    fn scheduler_suppressed_when_latch_preset() {
        let latch = CancellationToken::new();
        latch.cancel();
        let mut scheduler = ReconnectScheduler::new(Duration::from_secs(5), 0.1, latch);
        assert!(scheduler.schedule().is_none());
    }
}
