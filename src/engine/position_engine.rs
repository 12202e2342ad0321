use crate::config::StrategyConfig;
use crate::portfolio::{Direction, PositionState};
use crate::strategy::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;

//why an open position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::StopLoss => write!(f, "stop_loss"),
        }
    }
}

//what happened to the position on a step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionEvent {
    Opened {
        direction: Direction,
        size: f64,
        price: f64,
    },
    Closed {
        direction: Direction,
        size: f64,
        entry_price: f64,
        exit_price: f64,
        reason: ExitReason,
    },
}

//outcome of one step of the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: PositionState,
    pub event: Option<PositionEvent>,
}

//take-profit and stop-loss barriers relative to the entry price
//
//stop_loss_pct is signed and applied as written: a short stops out when
//close <= entry * (1 - stop_loss_pct), a long when close >= entry * (1 + stop_loss_pct).
//with the usual negative value (eg -0.1) the short barrier sits above entry and the
//long barrier below it, so both fire on any close on the near side of the barrier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitRules {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
}

impl ExitRules {
    pub fn new(take_profit_pct: f64, stop_loss_pct: f64) -> Self {
        ExitRules {
            take_profit_pct,
            stop_loss_pct,
        }
    }

    //first matching exit for the current position, take-profit wins over stop-loss
    pub fn evaluate(&self, state: &PositionState, close: f64) -> Option<ExitReason> {
        let entry = state.entry_price?;

        let take_profit = match state.direction {
            Direction::Short => close >= entry * (1.0 + self.take_profit_pct),
            Direction::Long => close <= entry * (1.0 - self.take_profit_pct),
            Direction::Flat => false,
        };
        if take_profit {
            return Some(ExitReason::TakeProfit);
        }

        let stop_loss = match state.direction {
            Direction::Short => close <= entry * (1.0 - self.stop_loss_pct),
            Direction::Long => close >= entry * (1.0 + self.stop_loss_pct),
            Direction::Flat => false,
        };
        if stop_loss {
            return Some(ExitReason::StopLoss);
        }

        None
    }
}

//the position state machine
//step is a pure function of (previous state, close, signal), so runs over the same
//input always produce the same sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionEngine {
    rules: ExitRules,
    max_position_size: f64,
}

impl PositionEngine {
    pub fn new(rules: ExitRules, max_position_size: f64) -> Self {
        PositionEngine {
            rules,
            max_position_size,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            ExitRules::new(config.take_profit_pct, config.stop_loss_pct),
            config.max_position_size,
        )
    }

    //advances the state by one observation
    //an exit leaves the step flat, re-entry is only possible on the next step
    pub fn step(&self, state: PositionState, close: f64, signal: Signal) -> Transition {
        if let Some(reason) = self.rules.evaluate(&state, close) {
            let entry_price = state.entry_price.unwrap_or(close);
            return Transition {
                state: PositionState::flat(),
                event: Some(PositionEvent::Closed {
                    direction: state.direction,
                    size: state.size,
                    entry_price,
                    exit_price: close,
                    reason,
                }),
            };
        }

        if state.is_flat() {
            let next = PositionState::open(
                Direction::from(signal),
                1.0,
                self.max_position_size,
                close,
            );
            let event = (!next.is_flat()).then_some(PositionEvent::Opened {
                direction: next.direction,
                size: next.size,
                price: close,
            });
            return Transition { state: next, event };
        }

        Transition { state, event: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PositionEngine {
        PositionEngine::new(ExitRules::new(0.2, -0.1), 1.0)
    }

    #[test]
    fn flat_opens_on_signal() {
        let t = engine().step(PositionState::flat(), 100.0, Signal::Short);
        assert!(t.state.is_short());
        assert_eq!(t.state.entry_price, Some(100.0));
        assert_eq!(
            t.event,
            Some(PositionEvent::Opened {
                direction: Direction::Short,
                size: 1.0,
                price: 100.0,
            })
        );
    }

    #[test]
    fn flat_signal_stays_flat_without_event() {
        let t = engine().step(PositionState::flat(), 100.0, Signal::Flat);
        assert!(t.state.is_flat());
        assert_eq!(t.event, None);
    }

    #[test]
    fn short_take_profit_at_upper_barrier() {
        let short = PositionState::open(Direction::Short, 1.0, 1.0, 100.0);
        let t = engine().step(short, 120.0, Signal::Short);
        assert!(t.state.is_flat());
        assert!(matches!(
            t.event,
            Some(PositionEvent::Closed {
                reason: ExitReason::TakeProfit,
                ..
            })
        ));
    }

    #[test]
    fn short_stop_loss_below_inverted_barrier() {
        //1 - (-0.1) puts the short stop at 110
        let short = PositionState::open(Direction::Short, 1.0, 1.0, 100.0);
        let t = engine().step(short, 110.0, Signal::Short);
        assert!(t.state.is_flat());
        assert!(matches!(
            t.event,
            Some(PositionEvent::Closed {
                reason: ExitReason::StopLoss,
                exit_price,
                ..
            }) if exit_price == 110.0
        ));
    }

    #[test]
    fn long_take_profit_and_stop_loss() {
        let long = PositionState::open(Direction::Long, 1.0, 1.0, 100.0);

        //take-profit barrier at 80
        let t = engine().step(long, 80.0, Signal::Long);
        assert_eq!(
            ExitRules::new(0.2, -0.1).evaluate(&long, 80.0),
            Some(ExitReason::TakeProfit)
        );
        assert!(t.state.is_flat());

        //stop-loss barrier at 90
        assert_eq!(
            ExitRules::new(0.2, -0.1).evaluate(&long, 90.0),
            Some(ExitReason::StopLoss)
        );
        assert_eq!(ExitRules::new(0.2, -0.1).evaluate(&long, 85.0), None);
    }

    #[test]
    fn take_profit_checked_before_stop_loss() {
        //at 100 the short is past both the tp barrier (100) and the stop barrier (110)
        let rules = ExitRules::new(0.0, -0.1);
        let short = PositionState::open(Direction::Short, 1.0, 1.0, 100.0);
        assert_eq!(rules.evaluate(&short, 100.0), Some(ExitReason::TakeProfit));
    }

    #[test]
    fn holding_without_exit_keeps_entry() {
        //115 sits between the short stop (110) and take-profit (120) barriers
        let short = PositionState::open(Direction::Short, 1.0, 1.0, 100.0);
        let t = engine().step(short, 115.0, Signal::Long);
        assert_eq!(t.state, short);
        assert_eq!(t.event, None);
    }

    #[test]
    fn no_same_step_reentry_after_exit() {
        let short = PositionState::open(Direction::Short, 1.0, 1.0, 100.0);
        let t = engine().step(short, 110.0, Signal::Long);
        assert!(t.state.is_flat());

        let next = engine().step(t.state, 111.0, Signal::Long);
        assert!(next.state.is_long());
        assert_eq!(next.state.entry_price, Some(111.0));
    }

    #[test]
    fn fractional_max_size_scales_position() {
        let engine = PositionEngine::new(ExitRules::new(0.2, -0.1), 0.5);
        let t = engine.step(PositionState::flat(), 100.0, Signal::Long);
        assert_eq!(t.state.exposure(), 0.5);
    }
}
