use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{ExecutionResult, Executor};
use crate::gateway::{Gateway, GatewayError};
use crate::models::{CandleSeries, Fill, Timeframe};
use crate::risk::breakeven_stop;
use crate::settings::SleepConfig;
use crate::strategy::{GateKind, MarketSnapshot, Pipeline, Rejection};

/// What one polling cycle ended with
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A position with our magic number is already open
    PositionOpen { count: usize },
    CoolingDown { remaining_secs: i64 },
    Rejected(Rejection),
    DataUnavailable(String),
    OrderPlaced(Fill),
    OrderSkipped(String),
    OrderRejected(String),
}

impl CycleOutcome {
    pub fn sleep_duration(&self, sleep: &SleepConfig) -> Duration {
        let secs = match self {
            CycleOutcome::PositionOpen { .. } => sleep.position_open_secs,
            CycleOutcome::CoolingDown { remaining_secs } => {
                (*remaining_secs).clamp(1, sleep.filtered_secs.max(1) as i64) as u64
            }
            CycleOutcome::Rejected(r) if r.gate == GateKind::Session => sleep.session_closed_secs,
            CycleOutcome::DataUnavailable(_) => sleep.data_unavailable_secs,
            CycleOutcome::OrderPlaced(_) => sleep.after_trade_secs,
            CycleOutcome::Rejected(_)
            | CycleOutcome::OrderSkipped(_)
            | CycleOutcome::OrderRejected(_) => sleep.filtered_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Polling loop: breakeven sweep, gate pipeline, order placement
pub struct Engine<G: Gateway> {
    gateway: G,
    pipeline: Pipeline,
    executor: Executor,
    last_trade: Option<DateTime<Utc>>,
}

impl<G: Gateway> Engine<G> {
    pub fn new(gateway: G, pipeline: Pipeline) -> Self {
        let executor = Executor::new(pipeline.config());
        Self {
            gateway,
            pipeline,
            executor,
            last_trade: None,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Move qualifying stops to entry; returns how many were moved
    ///
    /// Failures are logged per position and never abort the cycle.
    pub async fn manage_breakeven(&self) -> usize {
        let config = self.pipeline.config();
        let Some(trigger) = config.breakeven_trigger else {
            return 0;
        };

        let positions = match self.gateway.list_open_positions(&config.symbol).await {
            Ok(positions) => positions,
            Err(e) => {
                tracing::warn!("Breakeven sweep skipped, positions unavailable: {}", e);
                return 0;
            }
        };

        let ours: Vec<_> = positions
            .into_iter()
            .filter(|p| p.magic == config.magic && p.stop_loss != 0.0)
            .collect();
        if ours.is_empty() {
            return 0;
        }

        let tick = match self.gateway.current_tick(&config.symbol).await {
            Ok(tick) => tick,
            Err(e) => {
                tracing::warn!("Breakeven sweep skipped, no tick: {}", e);
                return 0;
            }
        };

        let mut moved = 0;
        for position in &ours {
            let Some(new_stop) = breakeven_stop(position, &tick, trigger) else {
                continue;
            };
            match self.gateway.modify_position_stop(position.ticket, new_stop).await {
                Ok(()) => {
                    tracing::info!(
                        ticket = position.ticket,
                        "🔒 Stop moved to breakeven at {:.5}",
                        new_stop
                    );
                    moved += 1;
                }
                Err(e) => tracing::warn!(ticket = position.ticket, "Breakeven update failed: {}", e),
            }
        }
        moved
    }

    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        let outcome = self.cycle(now).await;
        if let CycleOutcome::OrderPlaced(_) = outcome {
            self.last_trade = Some(now);
        }
        log_outcome(&outcome);
        outcome
    }

    async fn cycle(&self, now: DateTime<Utc>) -> CycleOutcome {
        let config = self.pipeline.config();

        self.manage_breakeven().await;

        match self.gateway.list_open_positions(&config.symbol).await {
            Ok(positions) => {
                let count = positions.iter().filter(|p| p.magic == config.magic).count();
                if count > 0 {
                    return CycleOutcome::PositionOpen { count };
                }
            }
            Err(e) => return CycleOutcome::DataUnavailable(format!("positions: {}", e)),
        }

        if let Some(last) = self.last_trade {
            let remaining_secs = config.cooldown_secs as i64 - (now - last).num_seconds();
            if remaining_secs > 0 {
                return CycleOutcome::CoolingDown { remaining_secs };
            }
        }

        if let Err(rejection) = self.pipeline.precheck(now) {
            return CycleOutcome::Rejected(rejection);
        }

        let snapshot = match self.load_snapshot(now).await {
            Ok(snapshot) => snapshot,
            Err(reason) => return CycleOutcome::DataUnavailable(reason),
        };

        let decision = match self.pipeline.evaluate(&snapshot) {
            Ok(decision) => decision,
            Err(rejection) => return CycleOutcome::Rejected(rejection),
        };

        tracing::info!(
            direction = %decision.direction,
            "🎯 Signal: entry {:.5} stop {:.5} target {:.5} (RR {:.2})",
            decision.entry,
            decision.stop,
            decision.target,
            decision.reward_risk()
        );

        match self.executor.execute(&self.gateway, &decision).await {
            ExecutionResult::Placed { order, fill } => {
                tracing::info!(
                    ticket = fill.ticket,
                    "✅ {} {} lots {} @ {:.5}",
                    order.direction,
                    order.volume,
                    order.symbol,
                    fill.price
                );
                CycleOutcome::OrderPlaced(fill)
            }
            ExecutionResult::Skipped(reason) => CycleOutcome::OrderSkipped(reason),
            ExecutionResult::Rejected(reason) => CycleOutcome::OrderRejected(reason),
        }
    }

    /// Fetch the feeds the pipeline needs; any gap aborts the cycle
    async fn load_snapshot(&self, now: DateTime<Utc>) -> Result<MarketSnapshot, String> {
        let config = self.pipeline.config();
        let required = self.pipeline.requirements();
        let mut snapshot = MarketSnapshot::new(now);

        if required.htf {
            snapshot.htf = Some(self.series(&config.symbol, config.timeframes.htf).await?);
        }
        if required.itf {
            snapshot.itf = Some(self.series(&config.symbol, config.timeframes.itf).await?);
        }
        if required.ltf {
            snapshot.ltf = Some(self.series(&config.symbol, config.timeframes.ltf).await?);
        }
        if required.correlated {
            let symbol = config
                .correlated_symbol
                .as_deref()
                .ok_or_else(|| "no correlated symbol configured".to_string())?;
            snapshot.correlated = Some(self.series(symbol, config.timeframes.ltf).await?);
        }
        if required.tick {
            snapshot.tick = Some(
                self.gateway
                    .current_tick(&config.symbol)
                    .await
                    .map_err(|e| format!("tick: {}", e))?,
            );
        }
        if required.instrument {
            snapshot.instrument = Some(
                self.gateway
                    .instrument_spec(&config.symbol)
                    .await
                    .map_err(|e| format!("instrument: {}", e))?,
            );
        }

        Ok(snapshot)
    }

    async fn series(&self, symbol: &str, timeframe: Timeframe) -> Result<CandleSeries, String> {
        let lookback = self.pipeline.config().lookback;
        let candles = self
            .gateway
            .fetch_candles(symbol, timeframe, lookback)
            .await
            .map_err(|e: GatewayError| format!("{} {} candles: {}", symbol, timeframe, e))?;
        CandleSeries::new(symbol, timeframe, candles, lookback).map_err(|e| e.to_string())
    }

    /// Cycle until `shutdown` resolves, sleeping per outcome in between
    pub async fn run<F: Future<Output = ()>>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        let sleep_config = self.pipeline.config().sleep;

        loop {
            let outcome = self.run_cycle(Utc::now()).await;
            let pause = outcome.sleep_duration(&sleep_config);

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("⚠️  Shutdown requested, leaving polling loop");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::PositionOpen { count } => {
            tracing::info!("📌 {} position(s) open, waiting", count)
        }
        CycleOutcome::CoolingDown { remaining_secs } => {
            tracing::info!("⏳ Cooling down, {}s left", remaining_secs)
        }
        CycleOutcome::Rejected(rejection) => {
            tracing::info!(gate = %rejection.gate, "No trade: {}", rejection.reason)
        }
        CycleOutcome::DataUnavailable(reason) => tracing::warn!("Data unavailable: {}", reason),
        CycleOutcome::OrderPlaced(_) => {}
        CycleOutcome::OrderSkipped(reason) => tracing::warn!("Order skipped: {}", reason),
        CycleOutcome::OrderRejected(reason) => tracing::error!("❌ Order rejected: {}", reason),
    }
}
