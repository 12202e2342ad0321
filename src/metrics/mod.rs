pub mod returns;
pub mod summary;

pub use returns::{
    additive_curve, calculate_return_records, drawdown_series, equity_curve, max_drawdown,
    percent_change, step_returns, ReturnRecord,
};
pub use summary::{sharpe_ratio, SummaryMetrics};
