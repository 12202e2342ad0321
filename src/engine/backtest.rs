use crate::config::{MetricsConfig, StrategyConfig};
use crate::data::{validate_observations, Observation};
use crate::engine::position_engine::{PositionEngine, PositionEvent};
use crate::error::{BacktestError, Result};
use crate::metrics::{calculate_return_records, ReturnRecord, SummaryMetrics};
use crate::portfolio::{build_trade_log, PositionState, Trade};
use crate::strategy::{generate_signals, FundingThresholdRule, Signal, SignalRule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

//engine output for one observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub funding_rate: f64,
    pub signal: Signal,
    //position held at the end of the step
    pub position: PositionState,
    pub event: Option<PositionEvent>,
}

//result of a backtest
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub steps: Vec<StepRecord>,
    pub returns: Vec<ReturnRecord>,
    pub trades: Vec<Trade>,
    pub summary: SummaryMetrics,
}

impl BacktestResult {
    pub fn positions(&self) -> Vec<PositionState> {
        self.steps.iter().map(|s| s.position).collect()
    }
}

//configuration for a backtest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub strategy: StrategyConfig,
    pub metrics: MetricsConfig,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        self.metrics.validate()
    }
}

//main backtest engine
pub struct BacktestEngine {
    config: BacktestConfig,
    observations: Vec<Observation>,
}

impl BacktestEngine {
    //creates a new backtest engine
    pub fn new(config: BacktestConfig, observations: Vec<Observation>) -> Self {
        BacktestEngine {
            config,
            observations,
        }
    }

    //runs the backtest with the funding threshold rule from the config
    pub fn run(&self) -> Result<BacktestResult> {
        self.run_with_cancel(&AtomicBool::new(false))
    }

    //runs the backtest, checking the cancel flag before every observation
    pub fn run_with_cancel(&self, cancel: &AtomicBool) -> Result<BacktestResult> {
        let rule = FundingThresholdRule::new(
            self.config.strategy.threshold_high,
            self.config.strategy.threshold_low,
        );
        run_backtest(&self.config, &self.observations, &rule, cancel)
    }

    //runs the backtest with a custom signal rule
    pub fn run_with_rule(&self, rule: &dyn SignalRule) -> Result<BacktestResult> {
        run_backtest(
            &self.config,
            &self.observations,
            rule,
            &AtomicBool::new(false),
        )
    }
}

//runs one backtest over borrowed observations
//input and config are validated before the first step, a failure leaves no partial result
pub fn run_backtest(
    config: &BacktestConfig,
    observations: &[Observation],
    rule: &dyn SignalRule,
    cancel: &AtomicBool,
) -> Result<BacktestResult> {
    config.validate()?;
    validate_observations(observations)?;

    let signals = generate_signals(rule, observations)?;
    let engine = PositionEngine::from_config(&config.strategy);
    let total = observations.len();

    tracing::info!(
        observations = total,
        rule = rule.name(),
        threshold_high = config.strategy.threshold_high,
        threshold_low = config.strategy.threshold_low,
        "starting backtest"
    );

    let mut steps = Vec::with_capacity(total);
    let mut state = PositionState::flat();

    for (index, (observation, &signal)) in observations.iter().zip(&signals).enumerate() {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!(completed = index, total, "backtest cancelled");
            return Err(BacktestError::Cancelled {
                completed: index,
                total,
            });
        }

        let transition = engine.step(state, observation.close, signal);
        if let Some(event) = &transition.event {
            tracing::debug!(timestamp = %observation.timestamp, ?event, "position transition");
        }
        state = transition.state;

        steps.push(StepRecord {
            timestamp: observation.timestamp,
            close: observation.close,
            funding_rate: observation.funding_rate,
            signal,
            position: state,
            event: transition.event,
        });
    }

    Ok(build_result(steps, signals, &config.metrics))
}

fn build_result(
    steps: Vec<StepRecord>,
    signals: Vec<Signal>,
    metrics: &MetricsConfig,
) -> BacktestResult {
    let timestamps: Vec<_> = steps.iter().map(|s| s.timestamp).collect();
    let closes: Vec<_> = steps.iter().map(|s| s.close).collect();
    let positions: Vec<_> = steps.iter().map(|s| s.position).collect();
    let exposures: Vec<_> = positions.iter().map(|p| p.exposure()).collect();

    let returns = calculate_return_records(&timestamps, &closes, &exposures, metrics);

    let trades = build_trade_log(
        steps
            .iter()
            .filter_map(|s| s.event.as_ref().map(|e| (s.timestamp, e))),
    );

    let summary = SummaryMetrics::from_backtest(&returns, &positions, &signals, &trades, metrics);

    tracing::info!(
        total_return = summary.total_return,
        sharpe = %summary.sharpe_ratio,
        max_drawdown = summary.max_drawdown,
        trades = summary.num_trades,
        "backtest finished"
    );

    BacktestResult {
        steps,
        returns,
        trades,
        summary,
    }
}
