use crate::data::JoinPolicy;
use crate::error::{BacktestError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

//how per-step returns accumulate into a cumulative series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CumulativeMode {
    //sum of step returns (percentage points)
    Additive,
    //product of (1 + step return), equity curve starting at 1
    Compounding,
}

impl CumulativeMode {
    //parse cumulative mode from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "additive" | "sum" => Some(CumulativeMode::Additive),
            "compounding" | "compound" | "equity" => Some(CumulativeMode::Compounding),
            _ => None,
        }
    }
}

//which position a step's price change is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnAlignment {
    //return at step i uses the position decided at step i-1
    Lagged,
    //return at step i uses the position decided at step i (look-ahead, parity testing only)
    SameStep,
}

impl ReturnAlignment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lagged" => Some(ReturnAlignment::Lagged),
            "same_step" | "same-step" | "unlagged" => Some(ReturnAlignment::SameStep),
            _ => None,
        }
    }
}

//funding-rate strategy parameters, immutable for the duration of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    //funding rate above which the strategy goes short
    pub threshold_high: f64,
    //funding rate below which the strategy goes long
    pub threshold_low: f64,
    pub take_profit_pct: f64,
    //signed fraction, typically negative (eg -0.1)
    pub stop_loss_pct: f64,
    pub max_position_size: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            threshold_high: 0.0005,
            threshold_low: 0.0,
            take_profit_pct: 0.2,
            stop_loss_pct: -0.1,
            max_position_size: 1.0,
        }
    }
}

impl StrategyConfig {
    //checks that every parameter is usable
    //threshold ordering is left to the caller, a low threshold at or above the
    //high one only makes the short branch win every tie
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("threshold_high", self.threshold_high),
            ("threshold_low", self.threshold_low),
            ("take_profit_pct", self.take_profit_pct),
            ("stop_loss_pct", self.stop_loss_pct),
            ("max_position_size", self.max_position_size),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(BacktestError::InvalidConfig(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }

        if self.max_position_size <= 0.0 {
            return Err(BacktestError::InvalidConfig(format!(
                "max_position_size must be positive, got {}",
                self.max_position_size
            )));
        }

        if self.take_profit_pct < 0.0 {
            return Err(BacktestError::InvalidConfig(format!(
                "take_profit_pct must not be negative, got {}",
                self.take_profit_pct
            )));
        }

        if self.threshold_low >= self.threshold_high {
            tracing::warn!(
                threshold_low = self.threshold_low,
                threshold_high = self.threshold_high,
                "threshold_low is not below threshold_high"
            );
        }

        Ok(())
    }
}

//return and risk metric settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    //periods per year used to annualize sharpe (252 daily, 1095 for 8h funding)
    pub annualization_factor: f64,
    //annual risk-free rate, spread evenly over annualization_factor periods
    pub risk_free_rate: f64,
    pub cumulative_mode: CumulativeMode,
    pub return_alignment: ReturnAlignment,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            annualization_factor: 252.0,
            risk_free_rate: 0.0,
            cumulative_mode: CumulativeMode::Additive,
            return_alignment: ReturnAlignment::Lagged,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.annualization_factor.is_finite() || self.annualization_factor <= 0.0 {
            return Err(BacktestError::InvalidConfig(format!(
                "annualization_factor must be a positive number, got {}",
                self.annualization_factor
            )));
        }

        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::InvalidConfig(format!(
                "risk_free_rate must be finite, got {}",
                self.risk_free_rate
            )));
        }

        if self.return_alignment == ReturnAlignment::SameStep {
            tracing::warn!("same-step return alignment uses look-ahead positions");
        }

        Ok(())
    }

    //risk-free rate for a single step
    pub fn per_step_risk_free(&self) -> f64 {
        self.risk_free_rate / self.annualization_factor
    }
}

//complete backtest configuration, loadable from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfiguration {
    //data
    pub funding_path: PathBuf,
    pub price_path: PathBuf,
    #[serde(default)]
    pub join_policy: JoinPolicy,

    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,

    //optional output paths
    #[serde(default)]
    pub output_series_csv: Option<PathBuf>,
    #[serde(default)]
    pub output_trades_csv: Option<PathBuf>,
    #[serde(default)]
    pub output_summary_json: Option<PathBuf>,
}

impl Default for BacktestConfiguration {
    fn default() -> Self {
        BacktestConfiguration {
            funding_path: PathBuf::from("funding.csv"),
            price_path: PathBuf::from("prices.csv"),
            join_policy: JoinPolicy::default(),
            strategy: StrategyConfig::default(),
            metrics: MetricsConfig::default(),
            output_series_csv: None,
            output_trades_csv: None,
            output_summary_json: None,
        }
    }
}

impl BacktestConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BacktestConfiguration = serde_json::from_str(&contents)?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        self.metrics.validate()
    }
}
