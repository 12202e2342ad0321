use crate::config::{MetricsConfig, StrategyConfig};
use crate::data::Observation;
use crate::engine::backtest::{run_backtest, BacktestConfig};
use crate::error::Result;
use crate::metrics::SummaryMetrics;
use crate::strategy::FundingThresholdRule;
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;

//parameter grid for a sweep, every combination becomes one run
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub threshold_high: Vec<f64>,
    pub threshold_low: Vec<f64>,
    pub take_profit_pct: Vec<f64>,
    pub stop_loss_pct: Vec<f64>,
    pub max_position_size: f64,
}

impl SweepGrid {
    //cartesian product of the grid axes
    pub fn configs(&self) -> Vec<StrategyConfig> {
        let mut configs = Vec::new();
        for &threshold_high in &self.threshold_high {
            for &threshold_low in &self.threshold_low {
                for &take_profit_pct in &self.take_profit_pct {
                    for &stop_loss_pct in &self.stop_loss_pct {
                        configs.push(StrategyConfig {
                            threshold_high,
                            threshold_low,
                            take_profit_pct,
                            stop_loss_pct,
                            max_position_size: self.max_position_size,
                        });
                    }
                }
            }
        }
        configs
    }
}

//outcome of one run in a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub strategy: StrategyConfig,
    pub result: Result<SummaryMetrics>,
}

//runs every strategy config over the same observations in parallel
//runs share only read-only input, a failing run is reported in its own outcome
pub fn run_sweep(
    strategies: &[StrategyConfig],
    metrics: &MetricsConfig,
    observations: &[Observation],
) -> Vec<SweepOutcome> {
    tracing::info!(runs = strategies.len(), "starting parameter sweep");

    strategies
        .par_iter()
        .map(|strategy| {
            let config = BacktestConfig {
                strategy: strategy.clone(),
                metrics: metrics.clone(),
            };
            let rule = FundingThresholdRule::new(strategy.threshold_high, strategy.threshold_low);
            let result = run_backtest(&config, observations, &rule, &AtomicBool::new(false))
                .map(|r| r.summary);

            if let Err(err) = &result {
                tracing::warn!(error = %err, ?strategy, "sweep run failed");
            }

            SweepOutcome {
                strategy: strategy.clone(),
                result,
            }
        })
        .collect()
}

//orders outcomes best total return first, failed runs last
pub fn rank_by_total_return(outcomes: &mut [SweepOutcome]) {
    outcomes.sort_by(|a, b| {
        let key = |o: &SweepOutcome| {
            o.result
                .as_ref()
                .map(|s| s.total_return)
                .unwrap_or(f64::NEG_INFINITY)
        };
        key(b).total_cmp(&key(a))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BacktestError;
    use chrono::{TimeZone, Utc};

    fn observations() -> Vec<Observation> {
        let closes = [100.0, 104.0, 101.0, 98.0, 103.0, 107.0];
        let rates = [0.001, -0.001, 0.0002, -0.002, 0.0007, 0.0];
        closes
            .iter()
            .zip(rates)
            .enumerate()
            .map(|(i, (&close, funding_rate))| Observation {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(8 * i as i64),
                funding_rate,
                close,
            })
            .collect()
    }

    #[test]
    fn grid_is_cartesian_product() {
        let grid = SweepGrid {
            threshold_high: vec![0.0005, 0.001],
            threshold_low: vec![0.0, -0.0005],
            take_profit_pct: vec![0.1, 0.2, 0.3],
            stop_loss_pct: vec![-0.1],
            max_position_size: 1.0,
        };
        let configs = grid.configs();
        assert_eq!(configs.len(), 12);
        assert!(configs.iter().all(|c| c.max_position_size == 1.0));
    }

    #[test]
    fn parallel_runs_match_sequential() {
        let obs = observations();
        let strategies = SweepGrid {
            threshold_high: vec![0.0005, 0.001],
            threshold_low: vec![0.0, -0.0005],
            take_profit_pct: vec![0.2],
            stop_loss_pct: vec![-0.1, -0.02],
            max_position_size: 1.0,
        }
        .configs();
        let metrics = MetricsConfig::default();

        let outcomes = run_sweep(&strategies, &metrics, &obs);
        assert_eq!(outcomes.len(), strategies.len());

        for outcome in &outcomes {
            let config = BacktestConfig {
                strategy: outcome.strategy.clone(),
                metrics: metrics.clone(),
            };
            let rule = FundingThresholdRule::new(
                outcome.strategy.threshold_high,
                outcome.strategy.threshold_low,
            );
            let sequential =
                run_backtest(&config, &obs, &rule, &AtomicBool::new(false)).unwrap();
            assert_eq!(outcome.result.as_ref().unwrap(), &sequential.summary);
        }
    }

    #[test]
    fn failing_run_does_not_abort_sweep() {
        let obs = observations();
        let strategies = vec![
            StrategyConfig::default(),
            StrategyConfig {
                max_position_size: 0.0,
                ..StrategyConfig::default()
            },
        ];

        let mut outcomes = run_sweep(&strategies, &MetricsConfig::default(), &obs);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(BacktestError::InvalidConfig(_))
        ));

        rank_by_total_return(&mut outcomes);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
    }
}
