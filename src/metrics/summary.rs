use crate::config::{CumulativeMode, MetricsConfig};
use crate::engine::ExitReason;
use crate::error::{MetricValue, UndefinedReason};
use crate::metrics::returns::{max_drawdown, ReturnRecord};
use crate::portfolio::{PositionState, Trade};
use crate::strategy::{count_signals, Signal};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//summary metrics for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub cumulative_mode: CumulativeMode,
    //final value of the cumulative series, as a fraction
    pub total_return: f64,
    pub sharpe_ratio: MetricValue,
    pub max_drawdown: f64,
    pub num_long_signals: usize,
    pub num_short_signals: usize,
    pub num_trades: usize,
    pub num_take_profits: usize,
    pub num_stop_losses: usize,
    //share of observations with an open position
    pub exposure: f64,
    pub num_observations: usize,
}

impl SummaryMetrics {
    //calculate summary metrics from the aligned run outputs
    pub fn from_backtest(
        records: &[ReturnRecord],
        positions: &[PositionState],
        signals: &[Signal],
        trades: &[Trade],
        config: &MetricsConfig,
    ) -> Self {
        let total_return = match (config.cumulative_mode, records.last()) {
            (CumulativeMode::Additive, Some(last)) => last.cumulative_return,
            (CumulativeMode::Compounding, Some(last)) => last.equity - 1.0,
            (_, None) => 0.0,
        };

        let drawdowns: Vec<f64> = records.iter().map(|r| r.drawdown).collect();

        //step 0 has no prior price, sharpe is computed over the remaining steps
        let returns: Vec<f64> = records.iter().skip(1).map(|r| r.step_return).collect();
        let sharpe_ratio = sharpe_ratio(&returns, config);

        let counts = count_signals(signals);

        let exits = |reason: ExitReason| {
            trades
                .iter()
                .filter(|t| t.exit_reason == Some(reason))
                .count()
        };

        SummaryMetrics {
            cumulative_mode: config.cumulative_mode,
            total_return,
            sharpe_ratio,
            max_drawdown: max_drawdown(&drawdowns),
            num_long_signals: counts.long,
            num_short_signals: counts.short,
            num_trades: trades.len(),
            num_take_profits: exits(ExitReason::TakeProfit),
            num_stop_losses: exits(ExitReason::StopLoss),
            exposure: calculate_exposure(positions),
            num_observations: records.len(),
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        table.add_row(Row::new(vec![
            Cell::new("Observations"),
            Cell::new(&format!("{}", self.num_observations)),
        ]));

        let mode = match self.cumulative_mode {
            CumulativeMode::Additive => "additive",
            CumulativeMode::Compounding => "compounding",
        };
        table.add_row(Row::new(vec![
            Cell::new("Total Return"),
            Cell::new(&format!("{:.2}% ({})", self.total_return * 100.0, mode)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Sharpe Ratio"),
            Cell::new(&self.sharpe_ratio.to_string()),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Max Drawdown"),
            Cell::new(&format!("{:.2}%", self.max_drawdown * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Long Signals"),
            Cell::new(&format!("{}", self.num_long_signals)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Short Signals"),
            Cell::new(&format!("{}", self.num_short_signals)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Number of Trades"),
            Cell::new(&format!("{}", self.num_trades)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Take-Profit Exits"),
            Cell::new(&format!("{}", self.num_take_profits)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Stop-Loss Exits"),
            Cell::new(&format!("{}", self.num_stop_losses)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Exposure"),
            Cell::new(&format!("{:.2}%", self.exposure * 100.0)),
        ]));

        table.printstd();
    }
}

//annualized sharpe ratio of per-step returns
//mean excess return over sample standard deviation, scaled by sqrt(annualization_factor)
pub fn sharpe_ratio(returns: &[f64], config: &MetricsConfig) -> MetricValue {
    if returns.len() < 2 {
        return MetricValue::Undefined(UndefinedReason::InsufficientData);
    }

    let risk_free = config.per_step_risk_free();
    let mean = returns.mean() - risk_free;
    let std_dev = returns.std_dev();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return MetricValue::Undefined(UndefinedReason::ZeroVariance);
    }

    MetricValue::Defined(mean / std_dev * config.annualization_factor.sqrt())
}

fn calculate_exposure(positions: &[PositionState]) -> f64 {
    if positions.is_empty() {
        return 0.0;
    }

    let in_market_count = positions.iter().filter(|p| !p.is_flat()).count();
    in_market_count as f64 / positions.len() as f64
}
