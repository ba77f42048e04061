use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One closed bar of one timeframe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Absolute body size |close - open|
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// True when the candle's colour agrees with the trade direction
    pub fn closes_toward(&self, direction: Direction) -> bool {
        match direction {
            Direction::Buy => self.is_bullish(),
            Direction::Sell => self.is_bearish(),
        }
    }
}

/// Chart timeframe, serialised by its terminal name (M5, H4, ...)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SeriesError {
    #[error("insufficient data for {symbol} {timeframe}: got {got} bars, need {need}")]
    Insufficient {
        symbol: String,
        timeframe: Timeframe,
        got: usize,
        need: usize,
    },
}

/// Fixed lookback window of candles for one (instrument, timeframe) pair
///
/// Oldest candle first. Construction refuses windows shorter than the
/// requested lookback so no indicator ever runs on partial history.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
        lookback: usize,
    ) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        if candles.len() < lookback || candles.is_empty() {
            return Err(SeriesError::Insufficient {
                symbol,
                timeframe,
                got: candles.len(),
                need: lookback.max(1),
            });
        }

        Ok(Self {
            symbol,
            timeframe,
            candles,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Most recent candle (construction guarantees at least one)
    pub fn last(&self) -> &Candle {
        &self.candles[self.candles.len() - 1]
    }

    /// Candle `n` bars back from the latest (`back(0)` is the latest)
    pub fn back(&self, n: usize) -> Option<&Candle> {
        self.candles.len().checked_sub(n + 1).map(|i| &self.candles[i])
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => f.write_str("BUY"),
            Direction::Sell => f.write_str("SELL"),
        }
    }
}

/// Higher-timeframe market structure label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    BullishBos,
    BearishBos,
    BullishChoch,
    BearishChoch,
}

impl Bias {
    pub fn direction(&self) -> Direction {
        match self {
            Bias::BullishBos | Bias::BullishChoch => Direction::Buy,
            Bias::BearishBos | Bias::BearishChoch => Direction::Sell,
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Bias::BullishBos => "BULLISH_BOS",
            Bias::BearishBos => "BEARISH_BOS",
            Bias::BullishChoch => "BULLISH_CHOCH",
            Bias::BearishChoch => "BEARISH_CHOCH",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    FairValueGap,
    OrderBlock,
}

/// Price interval an entry is expected to retrace into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub kind: ZoneKind,
    pub low: f64,
    pub high: f64,
}

impl Zone {
    /// Bounds may be given in either order
    pub fn new(kind: ZoneKind, a: f64, b: f64) -> Self {
        Self {
            kind,
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    pub fn contains(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}

/// Prior session high/low used as liquidity pools
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyLevels {
    pub high: f64,
    pub low: f64,
}

impl KeyLevels {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
    pub time: DateTime<Utc>,
}

impl Tick {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Price a market order in `direction` would fill at
    pub fn entry_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Buy => self.ask,
            Direction::Sell => self.bid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentSpec {
    pub symbol: String,
    /// Account-currency value of one tick move per lot
    pub tick_value: f64,
    /// Smallest price increment
    pub point: f64,
    pub volume_min: f64,
    pub volume_step: f64,
}

/// Position as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenPosition {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    /// 0.0 means no stop attached
    pub stop_loss: f64,
    pub take_profit: f64,
    pub volume: f64,
    pub magic: u64,
}

/// Market order with attached stop and target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub magic: u64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub ticket: u64,
    pub price: f64,
    pub volume: f64,
}

/// Output of one successful pipeline evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeDecision {
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

impl TradeDecision {
    pub fn risk(&self) -> f64 {
        (self.entry - self.stop).abs()
    }

    /// Distance to target measured in the trade direction (negative if the
    /// target sits on the wrong side of entry)
    pub fn reward(&self) -> f64 {
        match self.direction {
            Direction::Buy => self.target - self.entry,
            Direction::Sell => self.entry - self.target,
        }
    }

    pub fn reward_risk(&self) -> f64 {
        self.reward() / self.risk()
    }
}
