use crate::models::{Direction, OpenPosition, Tick};

/// New stop for `position` if it has earned a move to breakeven
///
/// Risk r is the entry-to-stop distance. A BUY moves once bid reaches
/// entry + r × `trigger`; a SELL once ask reaches entry − r × `trigger`.
/// Positions without a stop, or whose stop is already at or past entry, are
/// left alone, so repeated sweeps never move a stop twice.
pub fn breakeven_stop(position: &OpenPosition, tick: &Tick, trigger: f64) -> Option<f64> {
    if position.stop_loss == 0.0 {
        return None;
    }

    let entry = position.entry_price;
    match position.direction {
        Direction::Buy => {
            let risk = entry - position.stop_loss;
            (risk > 0.0 && tick.bid >= entry + risk * trigger).then_some(entry)
        }
        Direction::Sell => {
            let risk = position.stop_loss - entry;
            (risk > 0.0 && tick.ask <= entry - risk * trigger).then_some(entry)
        }
    }
}
