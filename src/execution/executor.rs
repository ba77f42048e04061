use anyhow::{bail, Context};

use crate::gateway::Gateway;
use crate::models::{Fill, OrderRequest, TradeDecision};
use crate::risk::{position_size, snap_to_step, stop_distance};
use crate::settings::{SizingBasis, StrategyConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Placed { order: OrderRequest, fill: Fill },
    /// Nothing submitted: missing data or an untradable size
    Skipped(String),
    /// Submitted and refused
    Rejected(String),
}

/// Turns a trade decision into a sized market order
#[derive(Debug, Clone)]
pub struct Executor {
    symbol: String,
    magic: u64,
    comment: String,
    risk_percent: f64,
    sizing_basis: SizingBasis,
}

impl Executor {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            symbol: config.symbol.clone(),
            magic: config.magic,
            comment: config.comment.clone(),
            risk_percent: config.risk_percent,
            sizing_basis: config.sizing_basis,
        }
    }

    /// Size and submit `decision`; never submits a zero or invalid volume
    pub async fn execute<G: Gateway>(&self, gateway: &G, decision: &TradeDecision) -> ExecutionResult {
        let order = match self.prepare_order(gateway, decision).await {
            Ok(order) => order,
            Err(e) => return ExecutionResult::Skipped(format!("{:#}", e)),
        };

        match gateway.submit_market_order(&order).await {
            Ok(fill) => ExecutionResult::Placed { order, fill },
            Err(e) => ExecutionResult::Rejected(e.to_string()),
        }
    }

    async fn prepare_order<G: Gateway>(
        &self,
        gateway: &G,
        decision: &TradeDecision,
    ) -> anyhow::Result<OrderRequest> {
        let account = gateway
            .account_snapshot()
            .await
            .context("account snapshot")?;
        let spec = gateway
            .instrument_spec(&self.symbol)
            .await
            .context("instrument spec")?;

        let distance = stop_distance(decision, self.sizing_basis, &spec);
        let raw = position_size(account.balance, self.risk_percent, distance, spec.tick_value)
            .context("position size")?;
        let volume = snap_to_step(raw, spec.volume_step);
        if volume <= 0.0 || volume < spec.volume_min {
            bail!("volume {} below broker minimum {}", volume, spec.volume_min);
        }

        let tick = gateway
            .current_tick(&self.symbol)
            .await
            .context("current tick")?;

        Ok(OrderRequest {
            symbol: self.symbol.clone(),
            direction: decision.direction,
            volume,
            price: tick.entry_price(decision.direction),
            stop_loss: decision.stop,
            take_profit: decision.target,
            magic: self.magic,
            comment: self.comment.clone(),
        })
    }
}
