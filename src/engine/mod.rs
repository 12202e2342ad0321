pub mod backtest;
pub mod position_engine;
pub mod sweep;

pub use backtest::{run_backtest, BacktestConfig, BacktestEngine, BacktestResult, StepRecord};
pub use position_engine::{ExitReason, ExitRules, PositionEngine, PositionEvent, Transition};
pub use sweep::{rank_by_total_return, run_sweep, SweepGrid, SweepOutcome};
