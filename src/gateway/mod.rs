// Broker/terminal access behind one async trait
pub mod bridge;
pub mod paper;
pub mod synthetic;

pub use bridge::BridgeGateway;
pub use paper::PaperGateway;
pub use synthetic::{paper_gateway, SyntheticFeed};

use crate::models::{
    AccountSnapshot, Candle, Fill, InstrumentSpec, OpenPosition, OrderRequest, Tick, Timeframe,
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Data the terminal cannot provide right now (no tick, unknown symbol, ...)
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Broker refused the order
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("cannot reach terminal at {url}: {reason}")]
    Connect { url: String, reason: String },
}

/// Everything the bot needs from the trading terminal
///
/// Calls are awaited one at a time by the engine; implementations need not
/// be `Sync`-friendly beyond that.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    /// Most recent `count` closed candles, oldest first
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, GatewayError>;

    async fn current_tick(&self, symbol: &str) -> Result<Tick, GatewayError>;

    async fn account_snapshot(&self) -> Result<AccountSnapshot, GatewayError>;

    async fn instrument_spec(&self, symbol: &str) -> Result<InstrumentSpec, GatewayError>;

    async fn submit_market_order(&self, order: &OrderRequest) -> Result<Fill, GatewayError>;

    async fn modify_position_stop(&self, ticket: u64, stop_loss: f64) -> Result<(), GatewayError>;

    async fn list_open_positions(&self, symbol: &str) -> Result<Vec<OpenPosition>, GatewayError>;
}
