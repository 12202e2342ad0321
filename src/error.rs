use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BacktestError>;

//errors that abort a backtest run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    //non-finite or out-of-domain numeric field
    #[error("invalid input: {0}")]
    InvalidInput(String),
    //non-monotonic or duplicate timestamps, missing fields, empty series
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("backtest cancelled after {completed} of {total} observations")]
    Cancelled { completed: usize, total: usize },
}

//why a metric could not be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    ZeroVariance,
    InsufficientData,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndefinedReason::ZeroVariance => write!(f, "zero variance"),
            UndefinedReason::InsufficientData => write!(f, "insufficient data"),
        }
    }
}

//a summary metric that is either a number or tagged as undefined
//undefined metrics never abort a run, they are reported alongside the valid series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl MetricValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Defined(v) => Some(*v),
            MetricValue::Undefined(_) => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, MetricValue::Undefined(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(v) => write!(f, "{:.3}", v),
            MetricValue::Undefined(reason) => write!(f, "undefined ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_value_display() {
        assert_eq!(MetricValue::Defined(1.23456).to_string(), "1.235");
        assert_eq!(
            MetricValue::Undefined(UndefinedReason::ZeroVariance).to_string(),
            "undefined (zero variance)"
        );
    }

    #[test]
    fn metric_value_serializes_with_status_tag() {
        let json = serde_json::to_string(&MetricValue::Defined(0.5)).unwrap();
        assert_eq!(json, r#"{"status":"defined","value":0.5}"#);

        let undefined = MetricValue::Undefined(UndefinedReason::InsufficientData);
        let json = serde_json::to_string(&undefined).unwrap();
        assert_eq!(json, r#"{"status":"undefined","value":"insufficient_data"}"#);
    }

    #[test]
    fn cancelled_error_message() {
        let err = BacktestError::Cancelled {
            completed: 3,
            total: 10,
        };
        assert_eq!(
            err.to_string(),
            "backtest cancelled after 3 of 10 observations"
        );
    }
}
