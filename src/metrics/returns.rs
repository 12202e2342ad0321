use crate::config::{CumulativeMode, MetricsConfig, ReturnAlignment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//per-step return accounting, aligned 1:1 with the observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub timestamp: DateTime<Utc>,
    //fractional return earned over the step
    pub step_return: f64,
    //additive sum of step returns so far
    pub cumulative_return: f64,
    //compounded equity curve value, starting at 1
    pub equity: f64,
    //drawdown of the configured cumulative series, always <= 0
    pub drawdown: f64,
}

//fractional change from prev to current
pub fn percent_change(prev: f64, current: f64) -> f64 {
    current / prev - 1.0
}

//price change of each step times the position held over it
//step 0 has no prior price and returns 0
pub fn step_returns(closes: &[f64], exposures: &[f64], alignment: ReturnAlignment) -> Vec<f64> {
    let n = closes.len().min(exposures.len());
    let mut returns = Vec::with_capacity(n);

    for i in 0..n {
        if i == 0 {
            returns.push(0.0);
            continue;
        }

        let position = match alignment {
            ReturnAlignment::Lagged => exposures[i - 1],
            ReturnAlignment::SameStep => exposures[i],
        };
        returns.push(percent_change(closes[i - 1], closes[i]) * position);
    }

    returns
}

//running sum of step returns
pub fn additive_curve(step_returns: &[f64]) -> Vec<f64> {
    step_returns
        .iter()
        .scan(0.0, |sum, r| {
            *sum += r;
            Some(*sum)
        })
        .collect()
}

//running product of (1 + step return), the equity curve starting from 1
pub fn equity_curve(step_returns: &[f64]) -> Vec<f64> {
    step_returns
        .iter()
        .scan(1.0, |equity, r| {
            *equity *= 1.0 + r;
            Some(*equity)
        })
        .collect()
}

//distance below the running peak of a cumulative series
pub fn drawdown_series(cumulative: &[f64], mode: CumulativeMode) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;

    cumulative
        .iter()
        .map(|&value| {
            peak = peak.max(value);
            match mode {
                CumulativeMode::Additive => value - peak,
                //equity curves start at 1, so the peak is always positive
                CumulativeMode::Compounding => value / peak - 1.0,
            }
        })
        .collect()
}

//most negative drawdown, 0 for a non-decreasing series
pub fn max_drawdown(drawdowns: &[f64]) -> f64 {
    drawdowns.iter().copied().fold(0.0, f64::min)
}

//builds the return records for a run
pub fn calculate_return_records(
    timestamps: &[DateTime<Utc>],
    closes: &[f64],
    exposures: &[f64],
    config: &MetricsConfig,
) -> Vec<ReturnRecord> {
    let returns = step_returns(closes, exposures, config.return_alignment);
    let cumulative = additive_curve(&returns);
    let equity = equity_curve(&returns);

    let drawdowns = match config.cumulative_mode {
        CumulativeMode::Additive => drawdown_series(&cumulative, CumulativeMode::Additive),
        CumulativeMode::Compounding => drawdown_series(&equity, CumulativeMode::Compounding),
    };

    timestamps
        .iter()
        .zip(returns)
        .zip(cumulative)
        .zip(equity)
        .zip(drawdowns)
        .map(
            |((((&timestamp, step_return), cumulative_return), equity), drawdown)| ReturnRecord {
                timestamp,
                step_return,
                cumulative_return,
                equity,
                drawdown,
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn close_enough(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn lagged_returns_use_previous_position() {
        let closes = [100.0, 110.0, 99.0];
        let exposures = [1.0, 0.0, 0.0];

        let r = step_returns(&closes, &exposures, ReturnAlignment::Lagged);
        assert_eq!(r[0], 0.0);
        assert!(close_enough(r[1], 0.1));
        assert_eq!(r[2], 0.0);
    }

    #[test]
    fn same_step_returns_use_current_position() {
        let closes = [100.0, 110.0, 99.0];
        let exposures = [1.0, 0.0, -1.0];

        let r = step_returns(&closes, &exposures, ReturnAlignment::SameStep);
        assert_eq!(r[0], 0.0);
        assert_eq!(r[1], 0.0);
        assert!(close_enough(r[2], 0.1));
    }

    #[test]
    fn short_exposure_flips_sign() {
        let r = step_returns(&[100.0, 90.0], &[-0.5, 0.0], ReturnAlignment::Lagged);
        assert!(close_enough(r[1], 0.05));
    }

    #[test]
    fn additive_and_compounding_curves() {
        let returns = [0.0, 0.1, -0.1];
        let additive = additive_curve(&returns);
        let equity = equity_curve(&returns);

        assert!(close_enough(additive[2], 0.0));
        assert!(close_enough(equity[1], 1.1));
        assert!(close_enough(equity[2], 0.99));
    }

    #[test]
    fn drawdown_is_zero_for_rising_series() {
        let dd = drawdown_series(&[0.0, 0.1, 0.1, 0.3], CumulativeMode::Additive);
        assert!(dd.iter().all(|&d| d == 0.0));
        assert_eq!(max_drawdown(&dd), 0.0);
    }

    #[test]
    fn additive_drawdown_is_point_difference() {
        let dd = drawdown_series(&[0.0, 0.2, 0.05, 0.1], CumulativeMode::Additive);
        assert!(close_enough(max_drawdown(&dd), -0.15));
    }

    #[test]
    fn compounding_drawdown_is_ratio() {
        let dd = drawdown_series(&[1.0, 1.2, 0.9, 1.0], CumulativeMode::Compounding);
        assert!(close_enough(max_drawdown(&dd), -0.25));
    }

    #[test]
    fn compounding_drawdown_can_pass_total_loss() {
        //a short through a tripling price leaves equity at -1
        let equity = equity_curve(&[0.0, -2.0]);
        assert_eq!(equity, vec![1.0, -1.0]);

        let dd = drawdown_series(&equity, CumulativeMode::Compounding);
        assert!(close_enough(max_drawdown(&dd), -2.0));
    }

    #[test]
    fn max_drawdown_of_empty_is_zero() {
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn records_follow_configured_mode() {
        let timestamps: Vec<_> = (0..3)
            .map(|h| Utc.with_ymd_and_hms(2024, 1, 1, h * 8, 0, 0).unwrap())
            .collect();
        let closes = [100.0, 120.0, 90.0];
        let exposures = [1.0, 1.0, 0.0];

        let config = MetricsConfig {
            cumulative_mode: CumulativeMode::Compounding,
            ..MetricsConfig::default()
        };
        let records = calculate_return_records(&timestamps, &closes, &exposures, &config);

        assert_eq!(records.len(), 3);
        assert!(close_enough(records[1].step_return, 0.2));
        assert!(close_enough(records[2].step_return, -0.25));
        assert!(close_enough(records[2].cumulative_return, -0.05));
        assert!(close_enough(records[2].equity, 0.9));
        assert!(close_enough(records[2].drawdown, -0.25));
    }
}
