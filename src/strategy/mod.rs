pub mod signal;

pub use signal::{FundingThresholdRule, Signal};

use crate::data::Observation;
use crate::error::Result;
use serde::{Deserialize, Serialize};

//signal interface that all entry rules must implement
//a rule is a pure function of the funding rate and never sees engine state
pub trait SignalRule: Send + Sync {
    //maps one funding rate to a directional signal
    fn signal(&self, funding_rate: f64) -> Result<Signal>;

    //returns the rule name
    fn name(&self) -> &str;
}

//number of long and short signals over a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalCounts {
    pub long: usize,
    pub short: usize,
}

//attaches one signal to each observation, in order
pub fn generate_signals(
    rule: &dyn SignalRule,
    observations: &[Observation],
) -> Result<Vec<Signal>> {
    observations
        .iter()
        .map(|o| rule.signal(o.funding_rate))
        .collect()
}

//counts long and short signals
pub fn count_signals(signals: &[Signal]) -> SignalCounts {
    signals
        .iter()
        .fold(SignalCounts::default(), |mut counts, signal| {
            match signal {
                Signal::Long => counts.long += 1,
                Signal::Short => counts.short += 1,
                Signal::Flat => {}
            }
            counts
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BacktestError;
    use chrono::{TimeZone, Utc};

    fn observations(rates: &[f64]) -> Vec<Observation> {
        rates
            .iter()
            .enumerate()
            .map(|(i, &rate)| Observation {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(8 * i as i64),
                funding_rate: rate,
                close: 100.0,
            })
            .collect()
    }

    #[test]
    fn generates_one_signal_per_observation() {
        let rule = FundingThresholdRule::new(0.0005, -0.0005);
        let rows = observations(&[0.001, 0.001, 0.0, -0.002]);
        let signals = generate_signals(&rule, &rows).unwrap();
        assert_eq!(
            signals,
            vec![Signal::Short, Signal::Short, Signal::Flat, Signal::Long]
        );
    }

    #[test]
    fn propagates_invalid_rate() {
        let rule = FundingThresholdRule::new(0.0005, -0.0005);
        let result = generate_signals(&rule, &observations(&[0.0, f64::NAN]));
        assert!(matches!(result, Err(BacktestError::InvalidInput(_))));
    }

    #[test]
    fn counts_signals() {
        let counts = count_signals(&[
            Signal::Short,
            Signal::Long,
            Signal::Flat,
            Signal::Short,
        ]);
        assert_eq!(counts, SignalCounts { long: 1, short: 2 });
    }
}
