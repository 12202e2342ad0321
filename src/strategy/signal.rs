use crate::error::{BacktestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

//directional signal derived from a single funding rate print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Long,
    Short,
    Flat,
}

impl Signal {
    //converts to a direction sign (Long = +1, Short = -1, Flat = 0)
    pub fn to_sign(&self) -> i8 {
        match self {
            Signal::Long => 1,
            Signal::Short => -1,
            Signal::Flat => 0,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => write!(f, "long"),
            Signal::Short => write!(f, "short"),
            Signal::Flat => write!(f, "flat"),
        }
    }
}

//fixed-threshold mean reversion on the funding rate
//crowded longs (high funding) are faded with a short, crowded shorts with a long
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingThresholdRule {
    pub threshold_high: f64,
    pub threshold_low: f64,
}

impl FundingThresholdRule {
    pub fn new(threshold_high: f64, threshold_low: f64) -> Self {
        FundingThresholdRule {
            threshold_high,
            threshold_low,
        }
    }
}

impl super::SignalRule for FundingThresholdRule {
    fn signal(&self, funding_rate: f64) -> Result<Signal> {
        if !funding_rate.is_finite() {
            return Err(BacktestError::InvalidInput(format!(
                "funding rate is {}",
                funding_rate
            )));
        }

        //strict comparisons, a rate equal to a threshold stays flat
        let signal = if funding_rate > self.threshold_high {
            Signal::Short
        } else if funding_rate < self.threshold_low {
            Signal::Long
        } else {
            Signal::Flat
        };

        Ok(signal)
    }

    fn name(&self) -> &str {
        "Funding Threshold"
    }
}
