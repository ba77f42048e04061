// Signal pipeline: ordered gates over a multi-timeframe market snapshot
pub mod gates;
pub mod pipeline;

pub use gates::{GateContext, GateKind};
pub use pipeline::{FeedRequirements, Pipeline};

use chrono::{DateTime, Utc};

use crate::models::{CandleSeries, InstrumentSpec, Tick};

/// Everything one evaluation may look at, fetched before the gates run
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub now: DateTime<Utc>,
    pub htf: Option<CandleSeries>,
    pub itf: Option<CandleSeries>,
    pub ltf: Option<CandleSeries>,
    /// LTF candles of the correlated instrument
    pub correlated: Option<CandleSeries>,
    pub tick: Option<Tick>,
    pub instrument: Option<InstrumentSpec>,
}

impl MarketSnapshot {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            htf: None,
            itf: None,
            ltf: None,
            correlated: None,
            tick: None,
            instrument: None,
        }
    }
}

/// First failing gate and why
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{gate} gate rejected: {reason}")]
pub struct Rejection {
    pub gate: GateKind,
    pub reason: String,
}
