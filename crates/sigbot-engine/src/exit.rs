//! Exit evaluation for open positions.
//!
//! Priority, first match wins:
//! 1. Stop-loss
//! 2. Take-profit 2
//! 3. Trailing stop (armed once take-profit 1 is reached)
//!
//! Expiry is checked last and overrides every other outcome.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sigbot_core::{Direction, Price, SignalData};

/// Why a position was closed by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit2,
    TrailingStop,
    Expired,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit2 => "take_profit_2",
            Self::TrailingStop => "trailing_stop",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-signal trailing stop state. Process-local; a restart disarms it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrailingState {
    /// Peak for buys, trough for sells. `None` until armed.
    extreme: Option<Price>,
}

impl TrailingState {
    pub fn is_armed(&self) -> bool {
        self.extreme.is_some()
    }

    pub fn extreme(&self) -> Option<Price> {
        self.extreme
    }

    /// Stop threshold for the current extreme.
    pub fn threshold(&self, direction: Direction, trail_pct: Decimal) -> Option<Price> {
        self.extreme.map(|extreme| match direction {
            Direction::Buy => extreme.offset_pct(-trail_pct),
            Direction::Sell => extreme.offset_pct(trail_pct),
        })
    }
}

fn reached(direction: Direction, price: Price, level: Price) -> bool {
    match direction {
        Direction::Buy => price >= level,
        Direction::Sell => price <= level,
    }
}

fn breached(direction: Direction, price: Price, stop: Price) -> bool {
    match direction {
        Direction::Buy => price <= stop,
        Direction::Sell => price >= stop,
    }
}

/// Decide whether the position behind `data` exits at `price`.
///
/// Updates `trailing` in place. Arming alone never exits.
pub fn evaluate_exit(
    data: &SignalData,
    trailing: &mut TrailingState,
    price: Price,
    now: DateTime<Utc>,
    trail_pct: Decimal,
) -> Option<ExitReason> {
    let direction = data.direction;

    let decision = if breached(direction, price, data.sl) {
        Some(ExitReason::StopLoss)
    } else if reached(direction, price, data.tp2) {
        Some(ExitReason::TakeProfit2)
    } else {
        evaluate_trailing(direction, trailing, price, data.tp1, trail_pct)
    };

    if now >= data.expires_at {
        return Some(ExitReason::Expired);
    }
    decision
}

fn evaluate_trailing(
    direction: Direction,
    trailing: &mut TrailingState,
    price: Price,
    tp1: Price,
    trail_pct: Decimal,
) -> Option<ExitReason> {
    let Some(extreme) = trailing.extreme else {
        if reached(direction, price, tp1) {
            trailing.extreme = Some(price);
        }
        return None;
    };

    let extreme = match direction {
        Direction::Buy => extreme.max(price),
        Direction::Sell => extreme.min(price),
    };
    trailing.extreme = Some(extreme);

    let stop = trailing.threshold(direction, trail_pct)?;
    breached(direction, price, stop).then_some(ExitReason::TrailingStop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    const TRAIL: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

    fn buy() -> SignalData {
        SignalData {
            direction: Direction::Buy,
            symbol: "ETH".to_string(),
            tp1: Price::new(dec!(110)),
            tp2: Price::new(dec!(130)),
            sl: Price::new(dec!(90)),
            expires_at: Utc::now() + Duration::hours(1),
            reference_price: Price::new(dec!(100)),
        }
    }

    fn sell() -> SignalData {
        SignalData {
            direction: Direction::Sell,
            symbol: "ETH".to_string(),
            tp1: Price::new(dec!(90)),
            tp2: Price::new(dec!(70)),
            sl: Price::new(dec!(110)),
            expires_at: Utc::now() + Duration::hours(1),
            reference_price: Price::new(dec!(100)),
        }
    }

    fn run(data: &SignalData, prices: &[Decimal]) -> Vec<Option<ExitReason>> {
        let mut state = TrailingState::default();
        let now = Utc::now();
        prices
            .iter()
            .map(|p| evaluate_exit(data, &mut state, Price::new(*p), now, TRAIL))
            .collect()
    }

    #[test]
    fn test_buy_trailing_sequence() {
        let data = buy();
        let mut state = TrailingState::default();
        let now = Utc::now();

        let tick = |state: &mut TrailingState, p: Decimal| {
            evaluate_exit(&data, state, Price::new(p), now, TRAIL)
        };

        assert_eq!(tick(&mut state, dec!(100)), None);
        assert_eq!(tick(&mut state, dec!(108)), None);
        assert!(!state.is_armed());

        assert_eq!(tick(&mut state, dec!(111)), None);
        assert_eq!(state.extreme(), Some(Price::new(dec!(111))));

        assert_eq!(tick(&mut state, dec!(120)), None);
        assert_eq!(state.extreme(), Some(Price::new(dec!(120))));
        assert_eq!(
            state.threshold(Direction::Buy, TRAIL),
            Some(Price::new(dec!(117.6)))
        );

        assert_eq!(tick(&mut state, dec!(117.5)), Some(ExitReason::TrailingStop));
    }

    #[test]
    fn test_tp2_wins_over_arming_in_same_tick() {
        let results = run(&buy(), &[dec!(100), dec!(131)]);
        assert_eq!(results, vec![None, Some(ExitReason::TakeProfit2)]);
    }

    #[test]
    fn test_stop_loss_beats_everything_but_expiry() {
        let results = run(&buy(), &[dec!(111), dec!(89)]);
        assert_eq!(results, vec![None, Some(ExitReason::StopLoss)]);

        let results = run(&sell(), &[dec!(110)]);
        assert_eq!(results, vec![Some(ExitReason::StopLoss)]);
    }

    #[test]
    fn test_peak_does_not_drop_on_pullback_within_trail() {
        let results = run(&buy(), &[dec!(112), dec!(125), dec!(123), dec!(124)]);
        assert_eq!(results, vec![None, None, None, None]);

        let results = run(&buy(), &[dec!(112), dec!(125), dec!(123), dec!(122.5)]);
        assert_eq!(results[3], Some(ExitReason::TrailingStop));
    }

    #[test]
    fn test_sell_trailing_uses_trough() {
        let data = sell();
        let mut state = TrailingState::default();
        let now = Utc::now();

        assert_eq!(evaluate_exit(&data, &mut state, Price::new(dec!(89)), now, TRAIL), None);
        assert_eq!(evaluate_exit(&data, &mut state, Price::new(dec!(80)), now, TRAIL), None);
        assert_eq!(state.extreme(), Some(Price::new(dec!(80))));
        // 80 * 1.02 = 81.6
        assert_eq!(evaluate_exit(&data, &mut state, Price::new(dec!(81.5)), now, TRAIL), None);
        assert_eq!(
            evaluate_exit(&data, &mut state, Price::new(dec!(81.6)), now, TRAIL),
            Some(ExitReason::TrailingStop)
        );
    }

    #[test]
    fn test_sell_tp2() {
        let results = run(&sell(), &[dec!(95), dec!(70)]);
        assert_eq!(results, vec![None, Some(ExitReason::TakeProfit2)]);
    }

    #[test]
    fn test_expiry_overrides_all_outcomes() {
        let mut data = buy();
        data.expires_at = Utc::now() - Duration::seconds(1);
        let now = Utc::now();

        for price in [dec!(100), dec!(89), dec!(131), dec!(111)] {
            let mut state = TrailingState::default();
            assert_eq!(
                evaluate_exit(&data, &mut state, Price::new(price), now, TRAIL),
                Some(ExitReason::Expired),
                "price {price}"
            );
        }
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let data = buy();
        let mut state = TrailingState::default();
        assert_eq!(
            evaluate_exit(&data, &mut state, Price::new(dec!(100)), data.expires_at, TRAIL),
            Some(ExitReason::Expired)
        );
    }
}
