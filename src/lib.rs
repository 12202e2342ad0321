//a Rust-based funding-rate backtesting engine for perpetual futures

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod portfolio;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BacktestConfiguration, CumulativeMode, MetricsConfig, ReturnAlignment, StrategyConfig,
    };
    pub use crate::data::{
        join_on_timestamp, load_funding_csv, load_price_csv, FundingRate, JoinPolicy, JoinReport,
        Observation, PricePoint,
    };
    pub use crate::engine::{
        rank_by_total_return, run_backtest, run_sweep, BacktestConfig, BacktestEngine,
        BacktestResult, ExitReason, PositionEngine, PositionEvent, StepRecord, SweepGrid,
        SweepOutcome,
    };
    pub use crate::error::{BacktestError, MetricValue, UndefinedReason};
    pub use crate::metrics::{ReturnRecord, SummaryMetrics};
    pub use crate::portfolio::{Direction, PositionState, Trade};
    pub use crate::strategy::{FundingThresholdRule, Signal, SignalCounts, SignalRule};
}
