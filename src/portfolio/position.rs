use crate::strategy::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;

//side of the single open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Flat,
    Long,
    Short,
}

impl Direction {
    //converts to a sign (Long = +1, Short = -1, Flat = 0)
    pub fn to_sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Flat => 0.0,
        }
    }
}

impl From<Signal> for Direction {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Long => Direction::Long,
            Signal::Short => Direction::Short,
            Signal::Flat => Direction::Flat,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
            Direction::Flat => write!(f, "flat"),
        }
    }
}

//the engine's only mutable state, owned by a single run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub direction: Direction,

    //position magnitude, 0 when flat
    pub size: f64,

    //defined only while a position is open
    pub entry_price: Option<f64>,
}

impl PositionState {
    //creates a new flat position
    pub fn flat() -> Self {
        PositionState {
            direction: Direction::Flat,
            size: 0.0,
            entry_price: None,
        }
    }

    //opens a position, the magnitude is clamped to max_size
    //a flat direction yields a flat state
    pub fn open(direction: Direction, size: f64, max_size: f64, entry_price: f64) -> Self {
        if direction == Direction::Flat {
            return Self::flat();
        }

        PositionState {
            direction,
            size: size.abs().min(max_size),
            entry_price: Some(entry_price),
        }
    }

    //signed position (direction x size)
    pub fn exposure(&self) -> f64 {
        self.direction.to_sign() * self.size
    }

    //returns true if the position is flat (no open position)
    pub fn is_flat(&self) -> bool {
        self.direction == Direction::Flat
    }

    //returns true if the position is long
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    //returns true if the position is short
    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }
}

impl Default for PositionState {
    fn default() -> Self {
        Self::flat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_state_has_no_entry() {
        let state = PositionState::flat();
        assert!(state.is_flat());
        assert_eq!(state.exposure(), 0.0);
        assert_eq!(state.entry_price, None);
    }

    #[test]
    fn open_clamps_to_max_size() {
        let state = PositionState::open(Direction::Short, 1.0, 0.25, 100.0);
        assert!(state.is_short());
        assert_eq!(state.size, 0.25);
        assert_eq!(state.exposure(), -0.25);
        assert_eq!(state.entry_price, Some(100.0));

        let state = PositionState::open(Direction::Long, 1.0, 3.0, 100.0);
        assert_eq!(state.exposure(), 1.0);
    }

    #[test]
    fn open_flat_is_flat() {
        assert_eq!(
            PositionState::open(Direction::Flat, 1.0, 1.0, 100.0),
            PositionState::flat()
        );
    }

    #[test]
    fn direction_from_signal() {
        assert_eq!(Direction::from(Signal::Long), Direction::Long);
        assert_eq!(Direction::from(Signal::Short), Direction::Short);
        assert_eq!(Direction::from(Signal::Flat), Direction::Flat);
    }
}
