use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Gateway, GatewayError};
use crate::models::{
    AccountSnapshot, Candle, Fill, InstrumentSpec, OpenPosition, OrderRequest, Tick, Timeframe,
};

#[derive(Debug, Default)]
struct PaperState {
    candles: HashMap<(String, Timeframe), Vec<Candle>>,
    ticks: HashMap<String, Tick>,
    account: Option<AccountSnapshot>,
    instruments: HashMap<String, InstrumentSpec>,
    positions: Vec<OpenPosition>,
    orders: Vec<OrderRequest>,
    calls: HashMap<&'static str, usize>,
    reject_orders: Option<String>,
    next_ticket: u64,
}

/// In-memory terminal: scripted data, fills at the current tick
///
/// Records every call and submitted order so tests can assert on what the
/// engine did (or did not) ask for.
#[derive(Debug, Default)]
pub struct PaperGateway {
    state: Mutex<PaperState>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: &'static str) -> MutexGuard<'_, PaperState> {
        let mut state = self.state();
        *state.calls.entry(call).or_default() += 1;
        state
    }

    pub fn with_candles(self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.set_candles(symbol, timeframe, candles);
        self
    }

    pub fn with_tick(self, symbol: &str, tick: Tick) -> Self {
        self.set_tick(symbol, tick);
        self
    }

    pub fn with_account(self, account: AccountSnapshot) -> Self {
        self.state().account = Some(account);
        self
    }

    pub fn with_instrument(self, spec: InstrumentSpec) -> Self {
        self.state().instruments.insert(spec.symbol.clone(), spec);
        self
    }

    pub fn with_position(self, position: OpenPosition) -> Self {
        {
            let mut state = self.state();
            state.next_ticket = state.next_ticket.max(position.ticket);
            state.positions.push(position);
        }
        self
    }

    /// Refuse every order with `reason`
    pub fn rejecting_orders(self, reason: &str) -> Self {
        self.state().reject_orders = Some(reason.to_string());
        self
    }

    pub fn set_candles(&self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        self.state()
            .candles
            .insert((symbol.to_string(), timeframe), candles);
    }

    pub fn set_tick(&self, symbol: &str, tick: Tick) {
        self.state().ticks.insert(symbol.to_string(), tick);
    }

    /// Drop a position as if its stop or target was hit
    pub fn close_position(&self, ticket: u64) -> Option<OpenPosition> {
        let mut state = self.state();
        let index = state.positions.iter().position(|p| p.ticket == ticket)?;
        Some(state.positions.remove(index))
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.state().orders.clone()
    }

    pub fn positions(&self) -> Vec<OpenPosition> {
        self.state().positions.clone()
    }

    /// Times the named trait method was invoked
    pub fn call_count(&self, call: &str) -> usize {
        self.state().calls.get(call).copied().unwrap_or(0)
    }
}

impl Gateway for PaperGateway {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let state = self.record("fetch_candles");
        let candles = state
            .candles
            .get(&(symbol.to_string(), timeframe))
            .ok_or_else(|| GatewayError::Unavailable(format!("no {} {} candles", symbol, timeframe)))?;

        let start = candles.len().saturating_sub(count);
        Ok(candles[start..].to_vec())
    }

    async fn current_tick(&self, symbol: &str) -> Result<Tick, GatewayError> {
        let state = self.record("current_tick");
        state
            .ticks
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::Unavailable(format!("no tick for {}", symbol)))
    }

    async fn account_snapshot(&self) -> Result<AccountSnapshot, GatewayError> {
        let state = self.record("account_snapshot");
        state
            .account
            .clone()
            .ok_or_else(|| GatewayError::Unavailable("no account".to_string()))
    }

    async fn instrument_spec(&self, symbol: &str) -> Result<InstrumentSpec, GatewayError> {
        let state = self.record("instrument_spec");
        state
            .instruments
            .get(symbol)
            .cloned()
            .ok_or_else(|| GatewayError::Unavailable(format!("unknown symbol {}", symbol)))
    }

    async fn submit_market_order(&self, order: &OrderRequest) -> Result<Fill, GatewayError> {
        let mut state = self.record("submit_market_order");
        if let Some(reason) = &state.reject_orders {
            return Err(GatewayError::Rejected(reason.clone()));
        }

        let price = state
            .ticks
            .get(&order.symbol)
            .map(|tick| tick.entry_price(order.direction))
            .ok_or_else(|| GatewayError::Unavailable(format!("no tick for {}", order.symbol)))?;

        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.orders.push(order.clone());
        state.positions.push(OpenPosition {
            ticket,
            symbol: order.symbol.clone(),
            direction: order.direction,
            entry_price: price,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            volume: order.volume,
            magic: order.magic,
        });

        Ok(Fill {
            ticket,
            price,
            volume: order.volume,
        })
    }

    async fn modify_position_stop(&self, ticket: u64, stop_loss: f64) -> Result<(), GatewayError> {
        let mut state = self.record("modify_position_stop");
        let position = state
            .positions
            .iter_mut()
            .find(|p| p.ticket == ticket)
            .ok_or_else(|| GatewayError::Unavailable(format!("no position {}", ticket)))?;
        position.stop_loss = stop_loss;
        Ok(())
    }

    async fn list_open_positions(&self, symbol: &str) -> Result<Vec<OpenPosition>, GatewayError> {
        let state = self.record("list_open_positions");
        Ok(state
            .positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .cloned()
            .collect())
    }
}
