pub mod position;
pub mod trade;

pub use position::{Direction, PositionState};
pub use trade::{build_trade_log, Trade};
