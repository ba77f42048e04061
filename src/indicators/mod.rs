// Technical indicators module
// Moving averages, RSI, ATR, structure, displacement, entry zones, key levels

pub mod atr;
pub mod displacement;
pub mod levels;
pub mod moving_average;
pub mod rsi;
pub mod structure;
pub mod zones;

pub use atr::{calculate_atr, calculate_atr_series, is_atr_expanding};
pub use displacement::{average_body, is_displacement};
pub use levels::{near_key_level, session_key_levels};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma, rolling_mean};
pub use rsi::calculate_rsi;
pub use structure::{bar_structure, classify_bias, market_structure, swing_highs, swing_lows};
pub use zones::{fair_value_gap, order_block};
