use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::PaperGateway;
use crate::models::{AccountSnapshot, Candle, InstrumentSpec, Tick};
use crate::settings::StrategyConfig;

const PAPER_BALANCE: f64 = 10_000.0;

/// Seeded random-walk candles for paper trading
pub struct SyntheticFeed {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticFeed {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64, base_price: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price,
        }
    }

    /// `count` bars of `interval_minutes`, the last one opening at or before `end`
    pub fn generate(&mut self, count: usize, interval_minutes: i64, end: DateTime<Utc>) -> Vec<Candle> {
        let step = Duration::minutes(interval_minutes);
        let last_open = end.duration_trunc(step).unwrap_or(end);
        let start = last_open - step * (count.saturating_sub(1) as i32);

        // ±0.15% per bar keeps a 5-minute walk in a plausible range
        let volatility = 0.0015 * (interval_minutes as f64 / 5.0).sqrt();

        let mut price = self.base_price;
        (0..count)
            .map(|i| {
                let open = price;
                let close = open * (1.0 + self.rng.gen_range(-volatility..volatility));
                let wick_up = open.max(close) * self.rng.gen_range(0.0..volatility / 2.0);
                let wick_down = open.min(close) * self.rng.gen_range(0.0..volatility / 2.0);
                price = close;

                Candle {
                    time: start + step * i as i32,
                    open,
                    high: open.max(close) + wick_up,
                    low: open.min(close) - wick_down,
                    close,
                    volume: self.rng.gen_range(100.0..1_000.0),
                }
            })
            .collect()
    }
}

/// Paper gateway seeded with every feed `config` can ask for
pub fn paper_gateway(config: &StrategyConfig, seed: u64, now: DateTime<Utc>) -> PaperGateway {
    let count = config.lookback.max(1);
    let base_price = 2_000.0;
    let mut gateway = PaperGateway::new()
        .with_account(AccountSnapshot {
            balance: PAPER_BALANCE,
            equity: PAPER_BALANCE,
            currency: "USD".to_string(),
        })
        .with_instrument(InstrumentSpec {
            symbol: config.symbol.clone(),
            tick_value: 1.0,
            point: 0.01,
            volume_min: 0.01,
            volume_step: 0.01,
        });

    let timeframes = [
        config.timeframes.htf,
        config.timeframes.itf,
        config.timeframes.ltf,
    ];
    for (i, timeframe) in timeframes.into_iter().enumerate() {
        let mut feed = SyntheticFeed::new(seed + i as u64, base_price);
        gateway = gateway.with_candles(&config.symbol, timeframe, feed.generate(count, timeframe.minutes(), now));
    }

    if let Some(correlated) = &config.correlated_symbol {
        let mut feed = SyntheticFeed::new(seed + 10, base_price / 80.0);
        let ltf = config.timeframes.ltf;
        gateway = gateway.with_candles(correlated, ltf, feed.generate(count, ltf.minutes(), now));
    }

    let mut ltf_feed = SyntheticFeed::new(seed + 2, base_price);
    let last_close = ltf_feed
        .generate(count, config.timeframes.ltf.minutes(), now)
        .last()
        .map_or(base_price, |c| c.close);
    gateway.with_tick(
        &config.symbol,
        Tick {
            bid: last_close,
            ask: last_close + 0.2,
            time: now,
        },
    )
}
