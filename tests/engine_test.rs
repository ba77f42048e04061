// End-to-end cycles against the paper gateway
use chrono::{DateTime, Duration, TimeZone, Utc};
use smcbot::gateway::PaperGateway;
use smcbot::models::{AccountSnapshot, Candle, Direction, InstrumentSpec, OpenPosition, Tick};
use smcbot::{CycleOutcome, Engine, GateKind, Pipeline, StrategyConfig, Variant};

const SYMBOL: &str = "XAUUSD";
const CORRELATED: &str = "XAGUSD";
const LOOKBACK: usize = 30;

fn candle(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        time,
        open,
        high,
        low,
        close,
        volume: 100.0,
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap()
}

fn config() -> StrategyConfig {
    StrategyConfig {
        lookback: LOOKBACK,
        ..StrategyConfig::preset(Variant::Structure)
    }
}

/// Rising zigzag: every odd bar a swing high, every even bar a swing low
fn htf_candles() -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2023, 12, 29, 0, 0, 0).unwrap();
    (0..LOOKBACK)
        .map(|i| {
            let base = 90.0 + 0.5 * i as f64 + if i % 2 == 1 { 1.5 } else { 0.0 };
            candle(start + Duration::hours(4 * i as i64), base, base + 1.0, base - 1.0, base)
        })
        .collect()
}

/// Prior day ranges 100..110; today's last close sits just above the low
fn itf_candles() -> Vec<Candle> {
    let day1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
    let mut candles: Vec<Candle> = (0..24)
        .map(|h| candle(day1 + Duration::hours(h), 105.0, 110.0, 100.0, 105.0))
        .collect();
    candles.extend((0..6).map(|h| candle(day2 + Duration::hours(h), 100.5, 101.0, 100.0, 100.1)));
    candles
}

/// Quiet tape, then one large bullish bar that sweeps below 100
fn ltf_candles() -> Vec<Candle> {
    let start = now() - Duration::minutes(5 * LOOKBACK as i64);
    let mut candles: Vec<Candle> = (0..LOOKBACK - 1)
        .map(|i| candle(start + Duration::minutes(5 * i as i64), 100.5, 100.7, 100.4, 100.6))
        .collect();
    candles.push(candle(
        start + Duration::minutes(5 * (LOOKBACK as i64 - 1)),
        99.8,
        101.2,
        99.5,
        101.0,
    ));
    candles
}

/// Falling zigzag: every even bar a swing high, every odd bar a swing low
fn bearish_htf_candles() -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2023, 12, 29, 0, 0, 0).unwrap();
    (0..LOOKBACK)
        .map(|i| {
            let base = 110.0 - 0.5 * i as f64 - if i % 2 == 1 { 1.5 } else { 0.0 };
            candle(start + Duration::hours(4 * i as i64), base, base + 1.0, base - 1.0, base)
        })
        .collect()
}

/// Prior day ranges 100..110; today's last close sits just below the high
fn bearish_itf_candles() -> Vec<Candle> {
    let mut candles = itf_candles();
    for c in candles.iter_mut().filter(|c| c.time >= now() - Duration::hours(9)) {
        *c = candle(c.time, 109.5, 110.0, 109.0, 109.9);
    }
    candles
}

/// Quiet tape, then one large bearish bar that sweeps above 110
fn bearish_ltf_candles() -> Vec<Candle> {
    ltf_candles()
        .into_iter()
        .map(|c| candle(c.time, 210.0 - c.open, 210.0 - c.low, 210.0 - c.high, 210.0 - c.close))
        .collect()
}

fn flat_candles(price: f64) -> Vec<Candle> {
    let start = now() - Duration::minutes(5 * LOOKBACK as i64);
    (0..LOOKBACK)
        .map(|i| {
            candle(
                start + Duration::minutes(5 * i as i64),
                price,
                price + 0.1,
                price - 0.1,
                price + 0.05,
            )
        })
        .collect()
}

fn tick(bid: f64) -> Tick {
    Tick {
        bid,
        ask: bid + 0.1,
        time: now(),
    }
}

fn gateway() -> PaperGateway {
    let config = config();
    PaperGateway::new()
        .with_candles(SYMBOL, config.timeframes.htf, htf_candles())
        .with_candles(SYMBOL, config.timeframes.itf, itf_candles())
        .with_candles(SYMBOL, config.timeframes.ltf, ltf_candles())
        .with_candles(CORRELATED, config.timeframes.ltf, flat_candles(25.0))
        .with_tick(SYMBOL, tick(100.9))
        .with_account(AccountSnapshot {
            balance: 10_000.0,
            equity: 10_000.0,
            currency: "USD".to_string(),
        })
        .with_instrument(InstrumentSpec {
            symbol: SYMBOL.to_string(),
            tick_value: 1.0,
            point: 0.01,
            volume_min: 0.01,
            volume_step: 0.01,
        })
}

fn engine(gateway: PaperGateway, config: StrategyConfig) -> Engine<PaperGateway> {
    let pipeline = Pipeline::new(config).unwrap();
    Engine::new(gateway, pipeline)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("smcbot=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_full_cycle_places_order() {
    init_tracing();
    let config = config();
    let mut engine = engine(gateway(), config.clone());

    let outcome = engine.run_cycle(now()).await;
    let fill = match outcome {
        CycleOutcome::OrderPlaced(fill) => fill,
        other => panic!("expected an order, got {:?}", other),
    };
    assert!((fill.price - 101.0).abs() < 1e-9);

    let orders = engine.gateway().orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.direction, Direction::Buy);
    assert_eq!(order.stop_loss, 99.5);
    assert_eq!(order.take_profit, 110.0);
    assert_eq!(order.magic, config.magic);
    // 100 risked over a 0.85 stop from the order-block midpoint 100.35
    assert_eq!(order.volume, 117.65);

    // Our position now blocks further entries
    let outcome = engine.run_cycle(now() + Duration::minutes(1)).await;
    assert_eq!(outcome, CycleOutcome::PositionOpen { count: 1 });
    assert_eq!(engine.gateway().orders().len(), 1);
}

#[tokio::test]
async fn test_bearish_structure_places_sell() {
    let config = config();
    let gateway = gateway();
    gateway.set_candles(SYMBOL, config.timeframes.htf, bearish_htf_candles());
    gateway.set_candles(SYMBOL, config.timeframes.itf, bearish_itf_candles());
    gateway.set_candles(SYMBOL, config.timeframes.ltf, bearish_ltf_candles());
    gateway.set_tick(SYMBOL, tick(109.1));
    let mut engine = engine(gateway, config);

    let outcome = engine.run_cycle(now()).await;
    let fill = match outcome {
        CycleOutcome::OrderPlaced(fill) => fill,
        other => panic!("expected an order, got {:?}", other),
    };
    // Sells fill at the bid
    assert_eq!(fill.price, 109.1);

    let orders = engine.gateway().orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.direction, Direction::Sell);
    // Stop above the order block, target at the prior session low
    assert_eq!(order.stop_loss, 110.5);
    assert_eq!(order.take_profit, 100.0);
    assert_eq!(order.volume, 117.65);
}

#[tokio::test]
async fn test_session_closed_touches_nothing() {
    let mut engine = engine(gateway(), config());
    let night = Utc.with_ymd_and_hms(2024, 1, 3, 3, 0, 0).unwrap();

    let outcome = engine.run_cycle(night).await;
    let rejection = match outcome {
        CycleOutcome::Rejected(rejection) => rejection,
        other => panic!("expected rejection, got {:?}", other),
    };
    assert_eq!(rejection.gate, GateKind::Session);

    let gateway = engine.gateway();
    assert_eq!(gateway.call_count("fetch_candles"), 0);
    assert_eq!(gateway.call_count("account_snapshot"), 0);
    assert_eq!(gateway.call_count("submit_market_order"), 0);
}

#[tokio::test]
async fn test_short_history_is_data_unavailable() {
    let config = config();
    let gateway = gateway();
    gateway.set_candles(SYMBOL, config.timeframes.ltf, ltf_candles()[10..].to_vec());
    let mut engine = engine(gateway, config);

    let outcome = engine.run_cycle(now()).await;
    assert!(matches!(outcome, CycleOutcome::DataUnavailable(ref r) if r.contains("M5")));
    assert!(engine.gateway().orders().is_empty());
    assert_eq!(engine.gateway().call_count("account_snapshot"), 0);
}

#[tokio::test]
async fn test_correlated_displacement_blocks_entry() {
    let config = config();
    let gateway = gateway();
    let mut correlated = flat_candles(25.0);
    if let Some(last) = correlated.last_mut() {
        *last = candle(last.time, 25.0, 25.6, 24.9, 25.5);
    }
    gateway.set_candles(CORRELATED, config.timeframes.ltf, correlated);
    let mut engine = engine(gateway, config);

    let outcome = engine.run_cycle(now()).await;
    let rejection = match outcome {
        CycleOutcome::Rejected(rejection) => rejection,
        other => panic!("expected rejection, got {:?}", other),
    };
    assert_eq!(rejection.gate, GateKind::Divergence);
    assert!(engine.gateway().orders().is_empty());
}

#[tokio::test]
async fn test_rejected_order_is_reported() {
    let mut engine = engine(gateway().rejecting_orders("market closed"), config());

    let outcome = engine.run_cycle(now()).await;
    assert!(matches!(outcome, CycleOutcome::OrderRejected(ref r) if r.contains("market closed")));
    assert!(engine.gateway().positions().is_empty());
}

#[tokio::test]
async fn test_breakeven_moves_only_after_one_r() {
    let config = config();
    let position = OpenPosition {
        ticket: 5,
        symbol: SYMBOL.to_string(),
        direction: Direction::Buy,
        entry_price: 100.0,
        stop_loss: 98.0,
        take_profit: 106.0,
        volume: 1.0,
        magic: config.magic,
    };
    let mut engine = engine(
        gateway().with_position(position).with_tick(SYMBOL, tick(101.9)),
        config,
    );

    let outcome = engine.run_cycle(now()).await;
    assert_eq!(outcome, CycleOutcome::PositionOpen { count: 1 });
    assert_eq!(engine.gateway().positions()[0].stop_loss, 98.0);

    engine.gateway().set_tick(SYMBOL, tick(102.0));
    engine.run_cycle(now() + Duration::minutes(1)).await;
    assert_eq!(engine.gateway().positions()[0].stop_loss, 100.0);
    assert_eq!(engine.gateway().call_count("modify_position_stop"), 1);

    // Already at entry: no second modification
    engine.run_cycle(now() + Duration::minutes(2)).await;
    assert_eq!(engine.gateway().call_count("modify_position_stop"), 1);
}

#[tokio::test]
async fn test_foreign_positions_are_left_alone() {
    let config = config();
    let foreign = OpenPosition {
        ticket: 9,
        symbol: SYMBOL.to_string(),
        direction: Direction::Buy,
        entry_price: 100.0,
        stop_loss: 98.0,
        take_profit: 106.0,
        volume: 1.0,
        magic: config.magic + 1,
    };
    let mut engine = engine(
        gateway().with_position(foreign).with_tick(SYMBOL, tick(105.0)),
        config,
    );

    engine.run_cycle(now()).await;
    assert_eq!(engine.gateway().call_count("modify_position_stop"), 0);
}

#[tokio::test]
async fn test_cooldown_after_trade() {
    let config = StrategyConfig {
        cooldown_secs: 120,
        ..config()
    };
    let mut engine = engine(gateway(), config);

    let outcome = engine.run_cycle(now()).await;
    let fill = match outcome {
        CycleOutcome::OrderPlaced(fill) => fill,
        other => panic!("expected an order, got {:?}", other),
    };
    engine.gateway().close_position(fill.ticket);

    let outcome = engine.run_cycle(now() + Duration::seconds(60)).await;
    assert_eq!(outcome, CycleOutcome::CoolingDown { remaining_secs: 60 });

    let outcome = engine.run_cycle(now() + Duration::seconds(121)).await;
    assert!(matches!(outcome, CycleOutcome::OrderPlaced(_)));
    assert_eq!(engine.gateway().orders().len(), 2);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let mut engine = engine(gateway(), config());
    let started = std::time::Instant::now();

    engine.run(async {}).await;

    assert!(engine.gateway().call_count("list_open_positions") >= 1);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}
