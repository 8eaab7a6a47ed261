//! Main application orchestration.
//!
//! Wires the configured upstream client, completion store and scheduler
//! together for each CLI command:
//! - `watch`: polling session until the order stops
//! - `check`: one forced cycle
//! - `quote`: signed price quote with a drift check
//! - `gateway`: signed relay server
//! - `records`: stored completion records

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use swapwatch_client::{quote_drift, PriceQuote, QuoteRequest, Signer, UpstreamClient};
use swapwatch_core::{Order, OrderStatus, Rate};
use swapwatch_gateway::GatewayState;
use swapwatch_persistence::{CompletionRecord, CompletionRecorder, JsonLinesStore};
use swapwatch_tracker::{
    CycleReport, OrderTarget, PollEvent, PollingConfig, PollingScheduler, StopReason, TrackerError,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Outcome of a `watch` session.
#[derive(Debug, Clone)]
pub struct WatchSummary {
    pub reason: StopReason,
    /// Last reconciled order, if any cycle succeeded.
    pub order: Option<Order>,
}

/// Extra behaviour for a `watch` session.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Status applied after the first observation, without contacting the
    /// upstream. Needs `polling.simulation_enabled`.
    pub simulate: Option<OrderStatus>,
}

/// Price quote with its drift from a previously quoted rate.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteReport {
    pub quote: PriceQuote,
    /// Set when the drift from the previous rate exceeds the threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<Decimal>,
}

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Create a new application from a validated config.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn client(&self) -> AppResult<Arc<UpstreamClient>> {
        self.config.require_credentials()?;
        let signer = Arc::new(Signer::new(&self.config.upstream.api_secret)?);
        let client = UpstreamClient::new(self.config.upstream.client_config(), signer)?;
        Ok(Arc::new(client))
    }

    fn recorder(&self) -> AppResult<Arc<CompletionRecorder>> {
        let store = JsonLinesStore::open(&self.config.persistence.data_dir)?;
        Ok(Arc::new(CompletionRecorder::new(Arc::new(store))?))
    }

    fn scheduler(&self, target: OrderTarget) -> AppResult<PollingScheduler> {
        Ok(PollingScheduler::new(
            target,
            self.client()?,
            self.recorder()?,
            PollingConfig::from(&self.config.polling),
        ))
    }

    /// Poll `target` until the session stops or `shutdown` resolves.
    pub async fn watch<F>(&self, target: OrderTarget, shutdown: F) -> AppResult<WatchSummary>
    where
        F: Future<Output = ()>,
    {
        self.watch_with(target, WatchOptions::default(), shutdown)
            .await
    }

    /// [`watch`](Self::watch) with extra options.
    pub async fn watch_with<F>(
        &self,
        target: OrderTarget,
        options: WatchOptions,
        shutdown: F,
    ) -> AppResult<WatchSummary>
    where
        F: Future<Output = ()>,
    {
        if options.simulate.is_some() && !self.config.polling.simulation_enabled {
            return Err(TrackerError::SimulationDisabled.into());
        }
        let scheduler = self.scheduler(target)?;
        let mut events = scheduler.subscribe();
        scheduler.start()?;
        let mut pending_simulation = options.simulate;

        tokio::pin!(shutdown);
        let reason = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(PollEvent::Stopped { reason }) => break reason,
                    Ok(event) => {
                        log_event(&event);
                        if let (PollEvent::Updated { .. }, Some(status)) = (&event, pending_simulation) {
                            pending_simulation = None;
                            match scheduler.simulate(status).await {
                                Ok(report) => info!(
                                    status = %report.order.status,
                                    recorded = report.recorded,
                                    "Simulated status applied"
                                ),
                                Err(e) => warn!(error = %e, "Simulated status rejected"),
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged");
                    }
                    Err(RecvError::Closed) => break StopReason::Stopped,
                },
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    scheduler.cancel();
                    break StopReason::Cancelled;
                }
            }
        };

        scheduler.wait().await;
        info!(reason = ?reason, cycles = scheduler.session().cycle_count, "Watch finished");
        Ok(WatchSummary {
            reason,
            order: scheduler.current_order(),
        })
    }

    /// Run a single forced cycle.
    pub async fn check(&self, target: OrderTarget) -> AppResult<CycleReport> {
        let scheduler = self.scheduler(target)?;
        Ok(scheduler.force_check().await?)
    }

    /// Fetch a price quote and compare it with `previous`.
    pub async fn quote(&self, request: &QuoteRequest, previous: Option<Rate>) -> AppResult<QuoteReport> {
        let quote = self.client()?.quote_price(request).await?;
        let drift = quote_drift(previous, &quote, self.config.polling.rate_threshold);
        if let Some(drift) = drift {
            warn!(
                rate = %quote.rate,
                previous = ?previous.map(|r| r.to_string()),
                %drift,
                "Exchange rate has changed significantly"
            );
        } else {
            info!(from = %quote.from_currency, to = %quote.to_currency, rate = %quote.rate, "Price quoted");
        }
        Ok(QuoteReport { quote, drift })
    }

    /// Run the relay until `shutdown` resolves.
    pub async fn run_gateway<F>(&self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = GatewayState::new(self.client()?, self.config.gateway.clone());
        swapwatch_gateway::run_server(state, shutdown).await?;
        Ok(())
    }

    /// Stored completion records, oldest first.
    pub fn records(&self) -> AppResult<Vec<CompletionRecord>> {
        Ok(self.recorder()?.records()?)
    }
}

fn log_event(event: &PollEvent) {
    match event {
        PollEvent::Updated {
            order,
            divergences,
            actions,
            trigger,
        } => {
            info!(
                order_id = %order.order_id,
                status = %order.status,
                trigger = trigger.label(),
                divergences = divergences.len(),
                "Order updated"
            );
            if !actions.is_empty() {
                warn!(order_id = %order.order_id, ?actions, "Emergency actions available");
            }
        }
        PollEvent::SoftFailure {
            error,
            attempt_count,
            ..
        } => {
            warn!(attempt_count, error = %error, "Status check failed, will retry");
        }
        PollEvent::Fatal { error } => {
            error!(error = %error, "Polling stopped on a fatal error");
        }
        PollEvent::Completed { order, recorded } => {
            info!(
                order_id = %order.order_id,
                status = %order.status,
                recorded,
                "Order finished"
            );
        }
        PollEvent::Stopped { reason } => {
            info!(reason = ?reason, "Polling stopped");
        }
    }
}
