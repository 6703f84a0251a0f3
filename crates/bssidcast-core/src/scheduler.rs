//! Publish scheduler.
//!
//! The scheduler is a single actor task that owns the [`SchedulerState`],
//! the timer deadline and the broker client. [`PublishScheduler`] is the
//! handle the host application uses to drive it.
//!
//! # Cycle
//!
//! While publishing, each cycle is: trigger a scan, build a snapshot from the
//! results, publish it, then wait `interval` before the next scan. The wait
//! starts when the publish attempt completes, so a slow scan never overlaps
//! the next one.
//!
//! # Stale results
//!
//! Scans, connects and publishes run in their own tasks and post their
//! completion back to the actor tagged with the epoch that started them.
//! `start()` and `stop()` bump the epoch, so anything still in flight when
//! the scheduler stops is dropped when it lands.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bssidcast_core::{MockPublishClient, MockScanProvider, PublishScheduler, SchedulerConfig, SchedulerState};
//!
//! #[tokio::main]
//! async fn main() -> bssidcast_core::Result<()> {
//!     let provider = Arc::new(MockScanProvider::new());
//!     let client = Arc::new(MockPublishClient::new());
//!     let scheduler = PublishScheduler::spawn(provider, client, SchedulerConfig::default());
//!
//!     scheduler.start(5).await?;
//!     assert_eq!(scheduler.state(), SchedulerState::Publishing);
//!
//!     scheduler.stop().await?;
//!     assert_eq!(scheduler.state(), SchedulerState::Idle);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use bssidcast_types::{DEFAULT_SOURCE_LABEL, Observation};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, SchedulerEvent};
use crate::snapshot::{DisplayView, SnapshotBuilder, client_id};
use crate::state::SchedulerState;
use crate::traits::{PublishClient, QoS, ScanProvider};

/// Default topic snapshots are published to.
pub const DEFAULT_TOPIC: &str = "geoloc/wifi/bssids";

/// Default broker.
pub const DEFAULT_BROKER_URI: &str = "tcp://test.mosquitto.org:1883";

/// Default seconds between the end of one cycle and the next scan.
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Default bound on a broker connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Static settings for a scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Broker to connect to on `start()`.
    pub broker_uri: String,
    /// Topic snapshots are published to.
    pub topic: String,
    /// Delivery guarantee for published snapshots.
    pub qos: QoS,
    /// Prefix of the generated client ID (`<prefix>_<unix-millis>`).
    pub client_id_prefix: String,
    /// Label written to each snapshot's `device` field.
    pub source_label: String,
    /// Connect attempts taking longer than this count as failures.
    pub connect_timeout: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            broker_uri: DEFAULT_BROKER_URI.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            qos: QoS::AtLeastOnce,
            client_id_prefix: DEFAULT_SOURCE_LABEL.to_string(),
            source_label: DEFAULT_SOURCE_LABEL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_capacity: 100,
        }
    }
}

enum Command {
    Start {
        interval: Duration,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    ScanOnce {
        reply: oneshot::Sender<Result<DisplayView>>,
    },
}

/// Results of work done outside the actor, marshaled back onto it.
enum Completion {
    Connected {
        epoch: u64,
        result: Result<()>,
    },
    Scanned {
        epoch: u64,
        result: Result<Vec<Observation>>,
    },
    Published {
        epoch: u64,
        count: usize,
        result: Result<()>,
    },
    DisplayScanned {
        result: Result<Vec<Observation>>,
        reply: oneshot::Sender<Result<DisplayView>>,
    },
}

/// Handle to a running publish scheduler.
///
/// Dropping the handle stops the scheduler task.
pub struct PublishScheduler {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SchedulerState>,
    events: EventDispatcher,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PublishScheduler {
    /// Spawn a scheduler on the current tokio runtime.
    pub fn spawn(
        provider: Arc<dyn ScanProvider>,
        client: Arc<dyn PublishClient>,
        config: SchedulerConfig,
    ) -> Self {
        let builder = SnapshotBuilder::new(config.source_label.clone());
        Self::spawn_with_builder(provider, client, config, builder)
    }

    /// Spawn a scheduler that builds snapshots with `builder`.
    ///
    /// Useful for injecting a fixed clock.
    pub fn spawn_with_builder(
        provider: Arc<dyn ScanProvider>,
        client: Arc<dyn PublishClient>,
        config: SchedulerConfig,
        builder: SnapshotBuilder,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let events = EventDispatcher::new(config.event_capacity);
        let cancel_token = CancellationToken::new();

        let actor = Actor {
            provider,
            client,
            config,
            builder,
            state: state_tx,
            events: events.clone(),
            completions: completion_tx,
            epoch: 0,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            next_tick: None,
            pending_start: None,
        };
        let handle = tokio::spawn(actor.run(command_rx, completion_rx, cancel_token.clone()));

        Self {
            commands: command_tx,
            state: state_rx,
            events,
            cancel_token,
            handle: Some(handle),
        }
    }

    /// Connect to the broker and start publishing every `interval_seconds`.
    ///
    /// Resolves once the connection attempt finishes: `Ok(())` when the
    /// scheduler is publishing, [`Error::ConnectFailure`] when the broker
    /// could not be reached (the scheduler is back to Idle), or
    /// [`Error::Cancelled`] if `stop()` ran first.
    pub async fn start(&self, interval_seconds: u64) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start {
            interval: Duration::from_secs(interval_seconds),
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::SchedulerClosed)?
    }

    /// Stop publishing and disconnect from the broker.
    ///
    /// The timer is cancelled before this returns. Scans or publishes still
    /// in flight are not aborted; their results are discarded.
    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        rx.await.map_err(|_| Error::SchedulerClosed)?
    }

    /// Run a single scan for display, whatever the current state.
    ///
    /// Never publishes and never changes state.
    pub async fn scan_once(&self) -> Result<DisplayView> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ScanOnce { reply }).await?;
        rx.await.map_err(|_| Error::SchedulerClosed)?
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receiver that is notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Subscribe to scheduler events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Stop the scheduler task and wait for it to finish.
    ///
    /// Disconnects from the broker first if still connected.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::SchedulerClosed)
    }
}

impl Drop for PublishScheduler {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct Actor {
    provider: Arc<dyn ScanProvider>,
    client: Arc<dyn PublishClient>,
    config: SchedulerConfig,
    builder: SnapshotBuilder,
    state: watch::Sender<SchedulerState>,
    events: EventDispatcher,
    completions: mpsc::UnboundedSender<Completion>,
    epoch: u64,
    interval: Duration,
    next_tick: Option<Instant>,
    pending_start: Option<oneshot::Sender<Result<()>>>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        cancel_token: CancellationToken,
    ) {
        loop {
            let deadline = self.next_tick.unwrap_or_else(Instant::now);

            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Scheduler cancelled, stopping gracefully");
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("Scheduler handle dropped, stopping");
                        break;
                    }
                },
                Some(completion) = completions.recv() => {
                    self.handle_completion(completion).await;
                }
                () = sleep_until(deadline), if self.next_tick.is_some() => {
                    self.trigger_cycle();
                }
            }
        }

        if self.current_state().is_active() {
            let _ = self.stop().await;
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { interval, reply } => match self.start(interval).await {
                Ok(()) => self.pending_start = Some(reply),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            Command::ScanOnce { reply } => self.scan_for_display(reply),
        }
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Connected { epoch, result } => self.on_connected(epoch, result).await,
            Completion::Scanned { epoch, result } => self.on_scanned(epoch, result),
            Completion::Published {
                epoch,
                count,
                result,
            } => self.on_published(epoch, count, result),
            Completion::DisplayScanned { result, reply } => {
                let _ = reply.send(self.on_display_scanned(result));
            }
        }
    }

    async fn start(&mut self, interval: Duration) -> Result<()> {
        let state = self.current_state();
        if state != SchedulerState::Idle {
            return Err(Error::InvalidState {
                operation: "start",
                state,
            });
        }
        if interval.is_zero() || Instant::now().checked_add(interval).is_none() {
            return Err(Error::InvalidInterval);
        }
        if let Err(e) = self.provider.check_permission().await {
            warn!("Cannot start publishing: {}", e);
            self.events.status(e.to_string());
            return Err(e);
        }

        self.epoch += 1;
        self.interval = interval;
        self.set_state(SchedulerState::Connecting);

        let broker = self.config.broker_uri.clone();
        let id = client_id(&self.config.client_id_prefix, OffsetDateTime::now_utc());
        info!("Connecting to {} as {}", broker, id);
        self.events.status(format!("Connecting to {}...", broker));

        let client = Arc::clone(&self.client);
        let completions = self.completions.clone();
        let epoch = self.epoch;
        let connect_timeout = self.config.connect_timeout;
        tokio::spawn(async move {
            let timeout_secs = connect_timeout.as_secs().max(1);
            let result = match timeout(connect_timeout, client.connect(&broker, &id, timeout_secs))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::connect_timeout(broker.as_str(), connect_timeout)),
            };
            let _ = completions.send(Completion::Connected { epoch, result });
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let state = self.current_state();
        if !state.is_active() {
            return Err(Error::InvalidState {
                operation: "stop",
                state,
            });
        }

        self.next_tick = None;
        self.epoch += 1;
        if let Some(reply) = self.pending_start.take() {
            let _ = reply.send(Err(Error::Cancelled));
        }
        self.set_state(SchedulerState::Idle);

        if let Err(e) = self.client.disconnect().await {
            debug!("Ignoring disconnect error: {}", e);
        }

        info!("Publishing stopped");
        self.events.status("Stopped");
        Ok(())
    }

    async fn on_connected(&mut self, epoch: u64, result: Result<()>) {
        if epoch != self.epoch || self.current_state() != SchedulerState::Connecting {
            // A newer session may already be using the client; only clean up when idle.
            if result.is_ok() && self.current_state() == SchedulerState::Idle {
                debug!("Dropping broker connection that completed after stop");
                if let Err(e) = self.client.disconnect().await {
                    debug!("Ignoring disconnect error: {}", e);
                }
            }
            return;
        }

        match result {
            Ok(()) => {
                info!("Connected to {}", self.config.broker_uri);
                self.set_state(SchedulerState::Publishing);
                self.events.status(format!(
                    "Publishing to {} every {}s",
                    self.config.topic,
                    self.interval.as_secs()
                ));
                if let Some(reply) = self.pending_start.take() {
                    let _ = reply.send(Ok(()));
                }
                self.trigger_cycle();
            }
            Err(e) => {
                error!("Failed to connect: {}", e);
                self.set_state(SchedulerState::Idle);
                self.events.status(e.to_string());
                if let Some(reply) = self.pending_start.take() {
                    let _ = reply.send(Err(e));
                }
            }
        }
    }

    fn trigger_cycle(&mut self) {
        self.next_tick = None;

        let provider = Arc::clone(&self.provider);
        let completions = self.completions.clone();
        let epoch = self.epoch;
        debug!("Triggering scan");
        tokio::spawn(async move {
            let result = scan(provider.as_ref()).await;
            let _ = completions.send(Completion::Scanned { epoch, result });
        });
    }

    fn on_scanned(&mut self, epoch: u64, result: Result<Vec<Observation>>) {
        if !self.is_current(epoch) {
            debug!("Discarding scan result from a stopped session");
            return;
        }

        let observations = match result {
            Ok(observations) => observations,
            Err(e) => {
                warn!("Scan failed: {}", e);
                self.events.status(e.to_string());
                self.finish_cycle();
                return;
            }
        };

        self.events.send(SchedulerEvent::ScanCompleted {
            view: DisplayView::new(&observations),
        });

        let snapshot = self.builder.build(&observations);
        let count = snapshot.count();
        let payload = match serde_json::to_vec(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                self.on_published(epoch, count, Err(e.into()));
                return;
            }
        };
        self.events.send(SchedulerEvent::SnapshotReady { snapshot });

        let client = Arc::clone(&self.client);
        let completions = self.completions.clone();
        let topic = self.config.topic.clone();
        let qos = self.config.qos;
        tokio::spawn(async move {
            let result = client.publish(&topic, payload, qos).await;
            let _ = completions.send(Completion::Published {
                epoch,
                count,
                result,
            });
        });
    }

    fn on_published(&mut self, epoch: u64, count: usize, result: Result<()>) {
        if !self.is_current(epoch) {
            debug!("Discarding publish result from a stopped session");
            return;
        }

        let topic = self.config.topic.clone();
        match &result {
            Ok(()) => {
                debug!("Published {} networks to {}", count, topic);
                self.events
                    .status(format!("Published {} networks to {}", count, topic));
            }
            Err(e) => {
                warn!("Failed to publish snapshot: {}", e);
                self.events.status(e.to_string());
            }
        }
        self.events.send(SchedulerEvent::PublishCompleted {
            topic,
            count,
            error: result.err().map(|e| e.to_string()),
        });

        self.finish_cycle();
    }

    fn scan_for_display(&self, reply: oneshot::Sender<Result<DisplayView>>) {
        let provider = Arc::clone(&self.provider);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = match provider.check_permission().await {
                Ok(()) => scan(provider.as_ref()).await,
                Err(e) => Err(e),
            };
            let _ = completions.send(Completion::DisplayScanned { result, reply });
        });
    }

    fn on_display_scanned(&self, result: Result<Vec<Observation>>) -> Result<DisplayView> {
        match result {
            Ok(observations) => {
                let view = DisplayView::new(&observations);
                self.events
                    .status(format!("Found {} networks", view.total()));
                self.events.send(SchedulerEvent::ScanCompleted { view: view.clone() });
                Ok(view)
            }
            Err(e) => {
                warn!("Scan failed: {}", e);
                self.events.status(e.to_string());
                Err(e)
            }
        }
    }

    /// Arm the timer for the next cycle, measured from now.
    fn finish_cycle(&mut self) {
        if self.current_state() == SchedulerState::Publishing {
            self.next_tick = Instant::now().checked_add(self.interval);
            if self.next_tick.is_none() {
                warn!("Next scan is past the end of the clock, not scheduling another");
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch && self.current_state() == SchedulerState::Publishing
    }

    fn current_state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    fn set_state(&mut self, state: SchedulerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!("Scheduler state: {} -> {}", previous, state);
            self.events.send(SchedulerEvent::StateChanged { state });
        }
    }
}

async fn scan(provider: &dyn ScanProvider) -> Result<Vec<Observation>> {
    provider.trigger_scan().await?;
    Ok(provider.last_results().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPublishClient, MockScanProvider};
    use tokio::time::sleep;

    fn observations(n: i32) -> Vec<Observation> {
        (0..n)
            .map(|i| Observation::new(format!("net{}", i), format!("AA:BB:CC:00:00:{:02X}", i), -50 - i, 2437))
            .collect()
    }

    fn setup(n: i32) -> (Arc<MockScanProvider>, Arc<MockPublishClient>, PublishScheduler) {
        let provider = Arc::new(MockScanProvider::with_observations(observations(n)));
        let client = Arc::new(MockPublishClient::new());
        let scheduler =
            PublishScheduler::spawn(provider.clone(), client.clone(), SchedulerConfig::default());
        (provider, client, scheduler)
    }

    async fn next_publish(rx: &mut EventReceiver) -> (usize, Option<String>) {
        timeout(Duration::from_secs(120), async {
            loop {
                match rx.recv().await {
                    Ok(SchedulerEvent::PublishCompleted { count, error, .. }) => return (count, error),
                    Ok(_) => continue,
                    Err(e) => panic!("event stream failed: {}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for a publish")
    }

    async fn next_status_containing(rx: &mut EventReceiver, needle: &str) -> String {
        timeout(Duration::from_secs(120), async {
            loop {
                match rx.recv().await {
                    Ok(SchedulerEvent::StatusChanged { text }) if text.contains(needle) => return text,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream failed: {}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for status")
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let (_provider, _client, scheduler) = setup(1);
        scheduler.start(5).await.unwrap();

        let err = scheduler.start(5).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                operation: "start",
                state: SchedulerState::Publishing
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_idle_is_rejected() {
        let (_provider, client, scheduler) = setup(1);
        let err = scheduler.stop().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { operation: "stop", .. }));
        assert_eq!(client.disconnect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_rejected() {
        let (_provider, client, scheduler) = setup(1);
        assert!(matches!(scheduler.start(0).await, Err(Error::InvalidInterval)));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(client.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_interval_is_rejected() {
        let (provider, client, scheduler) = setup(1);
        assert!(matches!(scheduler.start(u64::MAX).await, Err(Error::InvalidInterval)));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(client.connect_count(), 0);
        assert_eq!(provider.scan_count(), 0);

        // The actor is still alive and usable afterwards.
        scheduler.start(5).await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Publishing);
        scheduler.stop().await.unwrap();
        assert_eq!(client.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_interval_publishes_once_and_stops_cleanly() {
        let (_provider, client, scheduler) = setup(1);
        let mut rx = scheduler.subscribe();

        // Roughly 30 years: representable, so accepted.
        scheduler.start(1_000_000_000).await.unwrap();
        assert_eq!(next_publish(&mut rx).await, (1, None));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(client.publish_count().await, 1);
        assert_eq!(scheduler.state(), SchedulerState::Publishing);

        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(client.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_stays_idle() {
        let (provider, client, scheduler) = setup(1);
        provider.set_permission_denied(true);

        let err = scheduler.start(5).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(client.connect_count(), 0);
        assert_eq!(provider.scan_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_id_uses_prefix() {
        let provider = Arc::new(MockScanProvider::new());
        let client = Arc::new(MockPublishClient::new());
        let config = SchedulerConfig {
            client_id_prefix: "linux".to_string(),
            ..SchedulerConfig::default()
        };
        let scheduler = PublishScheduler::spawn(provider, client.clone(), config);
        scheduler.start(5).await.unwrap();

        let id = client.last_client_id().await.unwrap();
        let (prefix, millis) = id.split_once('_').unwrap();
        assert_eq!(prefix, "linux");
        assert!(millis.parse::<i128>().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_keeps_publishing() {
        let (_provider, client, scheduler) = setup(2);
        client.set_fail_publish(true);
        let mut rx = scheduler.subscribe();

        scheduler.start(1).await.unwrap();

        let (count, error) = next_publish(&mut rx).await;
        assert_eq!(count, 2);
        assert!(error.unwrap().contains("mock publish failure"));
        assert_eq!(scheduler.state(), SchedulerState::Publishing);

        // The next tick is the retry.
        client.set_fail_publish(false);
        let (count, error) = next_publish(&mut rx).await;
        assert_eq!(count, 2);
        assert!(error.is_none());
        assert_eq!(client.publish_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_failure_keeps_publishing() {
        let (provider, client, scheduler) = setup(2);
        provider.set_should_fail(true);
        let mut rx = scheduler.subscribe();

        scheduler.start(1).await.unwrap();
        next_status_containing(&mut rx, "Scan failed").await;
        assert_eq!(scheduler.state(), SchedulerState::Publishing);
        assert_eq!(client.publish_count().await, 0);

        provider.set_should_fail(false);
        let (count, error) = next_publish(&mut rx).await;
        assert_eq!(count, 2);
        assert!(error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_scans_never_overlap() {
        let (provider, client, scheduler) = setup(1);
        provider.set_scan_latency(Duration::from_secs(3));

        scheduler.start(1).await.unwrap();
        sleep(Duration::from_millis(9_500)).await;

        // Scans start at t=0, t=4 and t=8: each waits for the previous
        // cycle to finish, then a further second.
        assert_eq!(provider.scan_count(), 3);
        assert_eq!(client.publish_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let (provider, _client, scheduler) = setup(1);
        let mut rx = scheduler.subscribe();

        scheduler.start(5).await.unwrap();
        next_publish(&mut rx).await;
        scheduler.stop().await.unwrap();

        sleep(Duration::from_secs(60)).await;
        assert_eq!(provider.scan_count(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_connecting_cancels_start() {
        let (provider, client, scheduler) = setup(1);
        client.set_connect_latency(Duration::from_secs(5));

        let (start, stop) = tokio::join!(scheduler.start(5), async {
            sleep(Duration::from_secs(1)).await;
            scheduler.stop().await
        });
        assert!(matches!(start, Err(Error::Cancelled)));
        stop.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        // The connect lands after stop and is torn down again.
        sleep(Duration::from_secs(10)).await;
        assert!(!client.is_connected().await);
        assert_eq!(client.disconnect_count(), 2);
        assert_eq!(provider.scan_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let (_provider, client, scheduler) = setup(2);
        let mut rx = scheduler.subscribe();

        scheduler.start(5).await.unwrap();
        next_publish(&mut rx).await;
        scheduler.stop().await.unwrap();

        scheduler.start(5).await.unwrap();
        next_publish(&mut rx).await;
        assert_eq!(client.connect_count(), 2);
        assert_eq!(client.publish_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_once_does_not_publish() {
        let (provider, client, scheduler) = setup(12);

        let view = scheduler.scan_once().await.unwrap();
        assert_eq!(view.entries().len(), 10);
        assert_eq!(view.omitted(), 2);
        assert_eq!(provider.scan_count(), 1);
        assert_eq!(client.publish_count().await, 0);
        assert_eq!(client.connect_count(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_once_permission_denied() {
        let (provider, _client, scheduler) = setup(1);
        provider.set_permission_denied(true);
        let err = scheduler.scan_once().await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert_eq!(provider.scan_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_errors_are_swallowed() {
        let (_provider, client, scheduler) = setup(1);
        client.set_fail_disconnect(true);

        scheduler.start(5).await.unwrap();
        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(client.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_events() {
        let (_provider, _client, scheduler) = setup(1);
        let mut rx = scheduler.subscribe();

        scheduler.start(5).await.unwrap();
        scheduler.stop().await.unwrap();

        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SchedulerEvent::StateChanged { state } = event {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            [
                SchedulerState::Connecting,
                SchedulerState::Publishing,
                SchedulerState::Idle
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disconnects() {
        let (_provider, client, scheduler) = setup(1);
        scheduler.start(5).await.unwrap();
        scheduler.shutdown().await;
        assert!(!client.is_connected().await);
        assert_eq!(client.disconnect_count(), 1);
    }
}
