//! Polling scheduler for one order.
//!
//! Runs the fetch -> map -> reconcile -> record cycle on a timer until the
//! order reaches a terminal status, a fatal error occurs, or the session is
//! stopped or cancelled.
//!
//! # Phases
//!
//! `Idle --start()--> Polling --(terminal | fatal | stop | cancel)--> Stopped`
//!
//! # Ordering
//!
//! - Cycles (scheduled, forced, simulated) are serialized by an async mutex
//! - Cancellation is checked before a reconciliation is applied and before
//!   the next cycle is scheduled
//! - Every await in the loop races the cancellation token

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use swapwatch_client::DynStatusSource;
use swapwatch_core::{CoreError, Divergence, Order, OrderId, OrderStatus, OrderToken, Rate};
use swapwatch_persistence::CompletionRecorder;
use swapwatch_telemetry::Metrics;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::emergency::{available_actions, EmergencyAction};
use crate::error::{TrackerError, TrackerResult};
use crate::mapper::Observation;
use crate::reconciler::{default_rate_threshold, reconcile, ReconcileContext, Reconciliation};
use crate::session::{Phase, PollingSession};
use crate::simulation::synthetic_observation;

// ============================================================================
// Configuration
// ============================================================================

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Delay between successful cycles.
    pub interval: Duration,
    /// Upper bound for the failure backoff.
    pub max_interval: Duration,
    /// Relative rate drift reported as a divergence.
    pub rate_threshold: Decimal,
    /// Allow `simulate()`.
    pub simulation_enabled: bool,
    /// Broadcast channel capacity.
    pub event_capacity: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_interval: Duration::from_secs(120),
            rate_threshold: default_rate_threshold(),
            simulation_enabled: false,
            event_capacity: 64,
        }
    }
}

impl PollingConfig {
    /// Delay before the next cycle after `failures` consecutive failures.
    ///
    /// Doubles per failure, capped at `max_interval`.
    pub fn next_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        self.interval
            .checked_mul(1u32 << failures.min(16))
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Order to watch, as supplied by the caller (unvalidated).
#[derive(Debug, Clone)]
pub struct OrderTarget {
    pub order_id: String,
    pub token: String,
    pub quoted_rate: Option<Rate>,
}

impl OrderTarget {
    pub fn new(order_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            token: token.into(),
            quoted_rate: None,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Forced,
    Simulated,
}

impl Trigger {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Forced => "forced",
            Self::Simulated => "simulated",
        }
    }
}

/// Why the session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "status", rename_all = "snake_case")]
pub enum StopReason {
    Terminal(OrderStatus),
    Fatal,
    Stopped,
    Cancelled,
}

/// Event broadcast to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    /// A cycle produced a new order state.
    Updated {
        order: Order,
        divergences: Vec<Divergence>,
        actions: Vec<EmergencyAction>,
        trigger: Trigger,
    },
    /// A cycle failed; polling continues.
    SoftFailure {
        error: String,
        attempt_count: u32,
        trigger: Trigger,
    },
    /// A cycle failed in a way that ends the session.
    Fatal { error: String },
    /// The order reached a terminal status.
    Completed { order: Order, recorded: bool },
    /// The session entered `Stopped`.
    Stopped { reason: StopReason },
}

/// Result of one successful cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub order: Order,
    pub divergences: Vec<Divergence>,
    pub actions: Vec<EmergencyAction>,
    /// A completion record was written by this cycle.
    pub recorded: bool,
}

// ============================================================================
// PollingScheduler
// ============================================================================

#[derive(Debug, Clone)]
struct Credentials {
    order_id: OrderId,
    token: OrderToken,
}

struct Inner {
    /// Raw order id for log fields (valid or not).
    label: String,
    credentials: Result<Credentials, CoreError>,
    quoted_rate: Option<Rate>,
    source: DynStatusSource,
    recorder: Arc<CompletionRecorder>,
    config: PollingConfig,
    phase: RwLock<Phase>,
    session: RwLock<PollingSession>,
    cycle_lock: tokio::sync::Mutex<()>,
    /// Session-wide cancellation (cancel / drop).
    cancel: CancellationToken,
    /// Loop-only cancellation (stop / terminal / fatal); child of `cancel`.
    loop_token: CancellationToken,
    events: broadcast::Sender<PollEvent>,
}

/// Drives polling for a single order.
pub struct PollingScheduler {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    /// Create an idle scheduler. Nothing runs until [`start`](Self::start)
    /// or [`force_check`](Self::force_check).
    pub fn new(
        target: OrderTarget,
        source: DynStatusSource,
        recorder: Arc<CompletionRecorder>,
        config: PollingConfig,
    ) -> Self {
        let credentials = OrderId::parse(&target.order_id).and_then(|order_id| {
            Ok(Credentials {
                order_id,
                token: OrderToken::parse(&target.token)?,
            })
        });
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let cancel = CancellationToken::new();
        let loop_token = cancel.child_token();

        Self {
            inner: Arc::new(Inner {
                label: target.order_id.trim().to_string(),
                credentials,
                quoted_rate: target.quoted_rate,
                source,
                recorder,
                config,
                phase: RwLock::new(Phase::Idle),
                session: RwLock::new(PollingSession::default()),
                cycle_lock: tokio::sync::Mutex::new(()),
                cancel,
                loop_token,
                events,
            }),
            task: Mutex::new(None),
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.inner.events.subscribe()
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.read()
    }

    /// Snapshot of the session bookkeeping.
    pub fn session(&self) -> PollingSession {
        self.inner.session.read().clone()
    }

    /// Last reconciled order, if any cycle succeeded.
    pub fn current_order(&self) -> Option<Order> {
        self.inner.session.read().last_order.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Validate the target and start the polling loop.
    ///
    /// The first cycle runs immediately. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// - `TrackerError::Validation` for a malformed order id or token; the
    ///   session moves to `Stopped` without any request
    /// - `TrackerError::InvalidPhase` unless the scheduler is `Idle`
    /// - `TrackerError::Cancelled` after `cancel()`
    pub fn start(&self) -> TrackerResult<()> {
        if self.inner.cancel.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }
        if let Err(e) = &self.inner.credentials {
            let error = TrackerError::Validation(e.clone());
            self.inner.fail(Trigger::Scheduled, &error);
            return Err(error);
        }
        {
            let mut phase = self.inner.phase.write();
            if *phase != Phase::Idle {
                return Err(TrackerError::InvalidPhase(*phase));
            }
            *phase = Phase::Polling;
        }
        self.inner.session.write().is_polling = true;
        Metrics::session_started();
        info!(
            order_id = %self.inner.label,
            interval_ms = self.inner.config.interval.as_millis() as u64,
            "Polling started"
        );

        let handle = tokio::spawn(self.inner.clone().run_loop());
        *self.task.lock() = Some(handle);
        Ok(())
    }

    /// Run one cycle now, outside the timer.
    ///
    /// Allowed in any phase (a stopped session can be re-checked manually)
    /// until the session is cancelled. Does not change the phase unless the
    /// cycle itself ends the session.
    pub async fn force_check(&self) -> TrackerResult<CycleReport> {
        if self.inner.cancel.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }
        info!(order_id = %self.inner.label, phase = %self.phase(), "Forced status check");
        self.inner
            .run_cycle(Trigger::Forced, &self.inner.cancel)
            .await
    }

    /// Apply `status` to the last known order without contacting the upstream.
    ///
    /// # Errors
    /// `SimulationDisabled` unless enabled in config, `NoObservation` before
    /// the first successful cycle.
    pub async fn simulate(&self, status: OrderStatus) -> TrackerResult<CycleReport> {
        if !self.inner.config.simulation_enabled {
            return Err(TrackerError::SimulationDisabled);
        }
        if self.inner.cancel.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }

        let _cycle = self.inner.cycle_lock.lock().await;
        let last = self
            .inner
            .session
            .read()
            .last_order
            .clone()
            .ok_or(TrackerError::NoObservation)?;

        warn!(order_id = %self.inner.label, status = %status, "Applying simulated status");
        self.inner.apply(
            synthetic_observation(&last, status),
            Trigger::Simulated,
            &self.inner.cancel,
        )
    }

    /// Cancel the session: no further cycles, the loop task is aborted.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        self.inner.finish(StopReason::Cancelled);
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(&self) {
        self.inner.finish(StopReason::Stopped);
        self.wait().await;
    }

    /// Wait for the loop task to exit on its own.
    pub async fn wait(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(order_id = %self.inner.label, error = %e, "Polling task panicked");
                }
            }
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Cycle
// ============================================================================

impl Inner {
    fn emit(&self, event: PollEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn credentials(&self) -> TrackerResult<&Credentials> {
        self.credentials
            .as_ref()
            .map_err(|e| TrackerError::Validation(e.clone()))
    }

    async fn run_loop(self: Arc<Self>) {
        let token = self.loop_token.clone();
        let mut delay = Duration::ZERO;

        loop {
            if !delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = token.cancelled() => break,
                }
            }
            if token.is_cancelled() {
                break;
            }

            delay = match self.run_cycle(Trigger::Scheduled, &token).await {
                Ok(_) => self.config.interval,
                Err(TrackerError::Cancelled) => break,
                Err(e) if e.is_fatal() => break,
                Err(_) => {
                    let failures = self.session.read().attempt_count;
                    self.config.next_delay(failures)
                }
            };
            debug!(
                order_id = %self.label,
                delay_ms = delay.as_millis() as u64,
                "Next cycle scheduled"
            );
        }

        debug!(order_id = %self.label, "Polling loop exited");
    }

    async fn run_cycle(
        &self,
        trigger: Trigger,
        token: &CancellationToken,
    ) -> TrackerResult<CycleReport> {
        let credentials = match self.credentials() {
            Ok(c) => c,
            Err(e) => {
                self.fail(trigger, &e);
                return Err(e);
            }
        };
        if token.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }

        let _cycle = self.cycle_lock.lock().await;
        if token.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }

        let fetched = tokio::select! {
            result = self.source.fetch_order_status(&credentials.order_id, &credentials.token) => result,
            () = token.cancelled() => return Err(TrackerError::Cancelled),
        };

        match fetched {
            Ok(snapshot) => self.apply(Observation::from_upstream(snapshot), trigger, token),
            Err(e) => {
                let error = TrackerError::Api(e);
                self.fail(trigger, &error);
                Err(error)
            }
        }
    }

    /// Reconcile, record and publish one observation. Caller holds the
    /// cycle lock.
    fn apply(
        &self,
        observation: Observation,
        trigger: Trigger,
        token: &CancellationToken,
    ) -> TrackerResult<CycleReport> {
        if token.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }
        let credentials = self.credentials()?;
        let previous = self.session.read().last_order.clone();

        let ctx = ReconcileContext {
            order_id: credentials.order_id.clone(),
            token: credentials.token.clone(),
            quoted_rate: self.quoted_rate,
            rate_threshold: self.config.rate_threshold,
        };
        let Reconciliation { order, divergences } =
            reconcile(previous.as_ref(), &observation, &ctx);

        for divergence in &divergences {
            warn!(
                order_id = %order.order_id,
                kind = divergence.kind(),
                divergence = %divergence,
                "Order divergence"
            );
            Metrics::divergence(divergence.kind());
        }

        // Record before publishing so a failed write is retried next cycle.
        let recorded = match self.recorder.record_if_terminal(&order) {
            Ok(recorded) => recorded,
            Err(e) => {
                let error = TrackerError::Persistence(e);
                self.fail(trigger, &error);
                return Err(error);
            }
        };

        let previous_status = previous.as_ref().map(|p| p.status);
        if previous_status != Some(order.status) {
            info!(
                order_id = %order.order_id,
                status = %order.status,
                previous = ?previous_status,
                simulated = order.simulated,
                "Order status changed"
            );
        }

        let actions = available_actions(&order, &divergences);
        self.session.write().record_success(order.clone(), Utc::now());
        Metrics::poll_cycle(trigger.label(), "updated");

        self.emit(PollEvent::Updated {
            order: order.clone(),
            divergences: divergences.clone(),
            actions: actions.clone(),
            trigger,
        });

        if order.is_terminal() {
            let newly_terminal = !previous.as_ref().is_some_and(|p| p.is_terminal());
            if newly_terminal || recorded {
                self.emit(PollEvent::Completed {
                    order: order.clone(),
                    recorded,
                });
            }
            self.finish(StopReason::Terminal(order.status));
        }

        Ok(CycleReport {
            order,
            divergences,
            actions,
            recorded,
        })
    }

    fn fail(&self, trigger: Trigger, error: &TrackerError) {
        let attempt_count = {
            let mut session = self.session.write();
            session.record_failure(&error.to_string(), Utc::now());
            session.attempt_count
        };

        if error.is_fatal() {
            error!(order_id = %self.label, error = %error, "Fatal polling error");
            Metrics::poll_cycle(trigger.label(), "fatal");
            self.emit(PollEvent::Fatal {
                error: error.to_string(),
            });
            self.finish(StopReason::Fatal);
        } else {
            warn!(
                order_id = %self.label,
                attempt_count,
                error = %error,
                "Polling cycle failed"
            );
            Metrics::poll_cycle(trigger.label(), "soft_failure");
            self.emit(PollEvent::SoftFailure {
                error: error.to_string(),
                attempt_count,
                trigger,
            });
        }
    }

    /// Move to `Stopped` once; later calls are no-ops.
    fn finish(&self, reason: StopReason) {
        let was_polling = {
            let mut phase = self.phase.write();
            if *phase == Phase::Stopped {
                return;
            }
            let was_polling = *phase == Phase::Polling;
            *phase = Phase::Stopped;
            was_polling
        };

        self.session.write().is_polling = false;
        self.loop_token.cancel();
        if was_polling {
            Metrics::session_stopped();
        }

        info!(order_id = %self.label, reason = ?reason, "Polling stopped");
        self.emit(PollEvent::Stopped { reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swapwatch_client::{
        ClientConfig, MockReply, MockTransport, RetryPolicy, Signer, UpstreamClient,
    };
    use swapwatch_persistence::{CompletionStore, MemoryStore};
    use tokio::time::Instant;
    use tokio_test::assert_ok;

    struct Harness {
        scheduler: PollingScheduler,
        transport: Arc<MockTransport>,
        store: Arc<MemoryStore>,
        events: broadcast::Receiver<PollEvent>,
    }

    fn harness(order_id: &str, replies: Vec<MockReply>, retry: RetryPolicy, simulation: bool) -> Harness {
        let transport = Arc::new(MockTransport::with_script(replies));
        let mut client_config = ClientConfig::new("http://upstream.test/api/v2", "key-123");
        client_config.retry = retry;
        let signer = Arc::new(Signer::new("test-secret").unwrap());
        let client =
            UpstreamClient::with_transport(client_config, signer, transport.clone()).unwrap();

        let store = Arc::new(MemoryStore::new());
        let recorder = Arc::new(CompletionRecorder::new(store.clone()).unwrap());
        let config = PollingConfig {
            simulation_enabled: simulation,
            ..PollingConfig::default()
        };

        let scheduler = PollingScheduler::new(
            OrderTarget::new(order_id, "T1"),
            Arc::new(client),
            recorder,
            config,
        );
        let events = scheduler.subscribe();
        Harness {
            scheduler,
            transport,
            store,
            events,
        }
    }

    fn order_reply(status: &str) -> MockReply {
        MockReply::order(json!({
            "id": "X1",
            "type": "fixed",
            "status": status,
            "from": {"code": "BTC", "amount": "0.1", "address": "bc1qdeposit"},
            "to": {"code": "ETH", "amount": "1.6", "address": "0xdest"}
        }))
    }

    async fn until_stopped(events: &mut broadcast::Receiver<PollEvent>) -> Vec<PollEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.recv().await {
            let stopped = matches!(event, PollEvent::Stopped { .. });
            seen.push(event);
            if stopped {
                break;
            }
        }
        seen
    }

    fn updated_statuses(events: &[PollEvent]) -> Vec<OrderStatus> {
        events
            .iter()
            .filter_map(|e| match e {
                PollEvent::Updated { order, .. } => Some(order.status),
                _ => None,
            })
            .collect()
    }

    fn float_reply(status: &str, receive: &str) -> MockReply {
        MockReply::order(json!({
            "id": "X1",
            "type": "float",
            "status": status,
            "from": {"code": "BTC", "amount": "1", "address": "bc1qdeposit"},
            "to": {"code": "USDT", "amount": receive, "address": "0xdest"}
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_until_completed() {
        let mut h = harness(
            "X1",
            vec![order_reply("NEW"), order_reply("PENDING"), order_reply("DONE")],
            RetryPolicy::default(),
            false,
        );

        assert_ok!(h.scheduler.start());
        assert_eq!(h.scheduler.phase(), Phase::Polling);

        let events = until_stopped(&mut h.events).await;

        assert_eq!(
            updated_statuses(&events),
            vec![
                OrderStatus::AwaitingDeposit,
                OrderStatus::Confirming,
                OrderStatus::Completed
            ]
        );
        for event in &events {
            if let PollEvent::Updated { divergences, .. } = event {
                assert!(divergences.is_empty());
            }
        }
        assert!(events
            .iter()
            .any(|e| matches!(e, PollEvent::Completed { recorded: true, .. })));
        assert!(matches!(
            events.last(),
            Some(PollEvent::Stopped {
                reason: StopReason::Terminal(OrderStatus::Completed)
            })
        ));

        h.scheduler.wait().await;
        assert_eq!(h.scheduler.phase(), Phase::Stopped);
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.transport.request_count(), 3);

        let session = h.scheduler.session();
        assert_eq!(session.cycle_count, 3);
        assert_eq!(session.attempt_count, 0);
        assert!(!session.is_polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_cycle_completes() {
        let h = harness("X1", vec![MockReply::Hang], RetryPolicy::default(), false);
        h.transport.set_fallback(order_reply("DONE"));

        assert_ok!(h.scheduler.start());
        while h.transport.request_count() == 0 {
            tokio::task::yield_now().await;
        }
        h.scheduler.cancel();

        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(h.scheduler.phase(), Phase::Stopped);
        assert_eq!(h.transport.request_count(), 1);
        assert!(h.store.is_empty());
        assert!(h.scheduler.current_order().is_none());
        assert!(matches!(
            h.scheduler.force_check().await,
            Err(TrackerError::Cancelled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_failure_is_fatal() {
        let mut h = harness(
            "X1",
            vec![MockReply::application_error(401, "Unauthorized")],
            RetryPolicy::default(),
            false,
        );
        h.transport.set_fallback(order_reply("NEW"));

        assert_ok!(h.scheduler.start());
        let events = until_stopped(&mut h.events).await;

        assert!(matches!(events[0], PollEvent::Fatal { .. }));
        assert!(matches!(
            events.last(),
            Some(PollEvent::Stopped {
                reason: StopReason::Fatal
            })
        ));
        h.scheduler.wait().await;
        assert_eq!(h.transport.request_count(), 1);
        assert_eq!(h.scheduler.phase(), Phase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_failure_backs_off_and_recovers() {
        let mut h = harness(
            "X1",
            vec![
                MockReply::status(503, "maintenance"),
                order_reply("NEW"),
                order_reply("DONE"),
            ],
            RetryPolicy::no_retry(),
            false,
        );
        let started = Instant::now();

        assert_ok!(h.scheduler.start());
        let events = until_stopped(&mut h.events).await;

        match &events[0] {
            PollEvent::SoftFailure { attempt_count, .. } => assert_eq!(*attempt_count, 1),
            other => panic!("unexpected first event: {other:?}"),
        }
        assert_eq!(
            updated_statuses(&events),
            vec![OrderStatus::AwaitingDeposit, OrderStatus::Completed]
        );

        // 30s backoff after one failure, then the regular 15s interval.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(45), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(46), "elapsed {elapsed:?}");
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_target_stops_without_request() {
        let mut h = harness("bad id", vec![order_reply("NEW")], RetryPolicy::default(), false);

        assert!(matches!(
            h.scheduler.start(),
            Err(TrackerError::Validation(_))
        ));
        assert_eq!(h.scheduler.phase(), Phase::Stopped);
        assert_eq!(h.transport.request_count(), 0);

        assert!(matches!(h.events.recv().await, Ok(PollEvent::Fatal { .. })));
        assert!(matches!(
            h.events.recv().await,
            Ok(PollEvent::Stopped {
                reason: StopReason::Fatal
            })
        ));
        assert!(matches!(
            h.scheduler.force_check().await,
            Err(TrackerError::Validation(_))
        ));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_force_check_keeps_phase() {
        let h = harness("X1", vec![order_reply("PENDING")], RetryPolicy::default(), false);

        let report = h.scheduler.force_check().await.unwrap();
        assert_eq!(report.order.status, OrderStatus::Confirming);
        assert!(!report.recorded);
        assert_eq!(h.scheduler.phase(), Phase::Idle);
        assert_eq!(h.transport.request_count(), 1);
        assert_eq!(
            h.scheduler.current_order().map(|o| o.status),
            Some(OrderStatus::Confirming)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_check_after_stop() {
        let h = harness("X1", vec![order_reply("NEW")], RetryPolicy::default(), false);
        h.transport.set_fallback(order_reply("PENDING"));

        assert_ok!(h.scheduler.start());
        while h.scheduler.current_order().is_none() {
            tokio::task::yield_now().await;
        }
        h.scheduler.stop().await;
        assert_eq!(h.scheduler.phase(), Phase::Stopped);

        let report = h.scheduler.force_check().await.unwrap();
        assert_eq!(report.order.status, OrderStatus::Confirming);
        assert_eq!(h.scheduler.phase(), Phase::Stopped);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let h = harness("X1", vec![], RetryPolicy::no_retry(), false);
        h.transport.set_fallback(order_reply("NEW"));

        assert_ok!(h.scheduler.start());
        assert!(matches!(
            h.scheduler.start(),
            Err(TrackerError::InvalidPhase(Phase::Polling))
        ));
        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_simulation_records_flagged_completion() {
        let h = harness("X1", vec![order_reply("NEW")], RetryPolicy::default(), true);

        assert!(matches!(
            h.scheduler.simulate(OrderStatus::Completed).await,
            Err(TrackerError::NoObservation)
        ));

        h.scheduler.force_check().await.unwrap();
        let report = h.scheduler.simulate(OrderStatus::Completed).await.unwrap();

        assert!(report.recorded);
        assert!(report.order.simulated);
        assert_eq!(h.transport.request_count(), 1, "simulation never hits upstream");

        let records = h.store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].simulated);

        // A second simulated completion is not recorded again.
        let again = h.scheduler.simulate(OrderStatus::Completed).await.unwrap();
        assert!(!again.recorded);
    }

    #[tokio::test]
    async fn test_simulation_disabled_by_default() {
        let h = harness("X1", vec![order_reply("NEW")], RetryPolicy::default(), false);
        h.scheduler.force_check().await.unwrap();

        assert!(matches!(
            h.scheduler.simulate(OrderStatus::Completed).await,
            Err(TrackerError::SimulationDisabled)
        ));
        assert!(h.store.is_empty());
    }

    #[test]
    fn test_next_delay_doubles_and_caps() {
        let config = PollingConfig {
            interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(60),
            ..PollingConfig::default()
        };
        assert_eq!(config.next_delay(0), Duration::from_secs(10));
        assert_eq!(config.next_delay(1), Duration::from_secs(20));
        assert_eq!(config.next_delay(2), Duration::from_secs(40));
        assert_eq!(config.next_delay(3), Duration::from_secs(60));
        assert_eq!(config.next_delay(100), Duration::from_secs(60));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_forced_and_scheduled_cycles_record_once() {
        let mut h = harness("X1", vec![], RetryPolicy::default(), false);
        h.transport.set_fallback(order_reply("DONE"));

        assert_ok!(h.scheduler.start());
        let (a, b, c) = tokio::join!(
            h.scheduler.force_check(),
            h.scheduler.force_check(),
            h.scheduler.force_check()
        );
        h.scheduler.wait().await;

        let forced_writes = [a, b, c]
            .into_iter()
            .map(|report| report.unwrap())
            .filter(|report| report.recorded)
            .count();
        assert!(forced_writes <= 1);

        let mut recorded_events = 0;
        while let Ok(event) = h.events.try_recv() {
            if let PollEvent::Completed { recorded: true, .. } = event {
                recorded_events += 1;
            }
        }
        assert_eq!(recorded_events, 1);
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.scheduler.phase(), Phase::Stopped);
    }

    #[tokio::test]
    async fn test_rate_drift_reaches_report_and_events() {
        let mut h = harness(
            "X1",
            vec![float_reply("NEW", "100"), float_reply("PENDING", "110")],
            RetryPolicy::default(),
            false,
        );

        let first = h.scheduler.force_check().await.unwrap();
        assert!(first.divergences.is_empty());
        assert!(first.actions.is_empty());

        let drifted = h.scheduler.force_check().await.unwrap();
        assert_eq!(drifted.order.status, OrderStatus::Confirming);
        assert!(matches!(
            drifted.divergences.as_slice(),
            [Divergence::Rate { .. }]
        ));
        assert_eq!(
            drifted.actions,
            vec![EmergencyAction::Exchange, EmergencyAction::Refund]
        );

        let mut updates = Vec::new();
        while let Ok(event) = h.events.try_recv() {
            if let PollEvent::Updated {
                divergences,
                actions,
                trigger,
                ..
            } = event
            {
                updates.push((divergences, actions, trigger));
            }
        }
        assert_eq!(updates.len(), 2);
        let (divergences, actions, trigger) = &updates[1];
        assert_eq!(divergences, &drifted.divergences);
        assert_eq!(actions, &drifted.actions);
        assert_eq!(*trigger, Trigger::Forced);
    }
}
