use crate::error::{BacktestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//a single aligned (timestamp, funding rate, close) row fed to the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub funding_rate: f64,
    pub close: f64,
}

impl Observation {
    //creates a new Observation with validation
    pub fn new(timestamp: DateTime<Utc>, funding_rate: f64, close: f64) -> Result<Self> {
        let observation = Observation {
            timestamp,
            funding_rate,
            close,
        };
        observation.check_values()?;
        Ok(observation)
    }

    //checks the numeric fields of a single row
    pub fn check_values(&self) -> Result<()> {
        if !self.funding_rate.is_finite() {
            return Err(BacktestError::InvalidInput(format!(
                "funding rate at {} is {}",
                self.timestamp, self.funding_rate
            )));
        }

        if !self.close.is_finite() || self.close <= 0.0 {
            return Err(BacktestError::InvalidInput(format!(
                "close price at {} is {}",
                self.timestamp, self.close
            )));
        }

        Ok(())
    }
}

//validates a whole observation sequence before a run
//every row must carry finite values and timestamps must strictly increase
pub fn validate_observations(observations: &[Observation]) -> Result<()> {
    if observations.is_empty() {
        return Err(BacktestError::MalformedInput(
            "observation sequence is empty".to_string(),
        ));
    }

    for (index, observation) in observations.iter().enumerate() {
        observation.check_values().map_err(|err| match err {
            BacktestError::InvalidInput(msg) => {
                BacktestError::InvalidInput(format!("observation {}: {}", index, msg))
            }
            other => other,
        })?;
    }

    for (index, pair) in observations.windows(2).enumerate() {
        let (prev, next) = (pair[0].timestamp, pair[1].timestamp);
        if next == prev {
            return Err(BacktestError::MalformedInput(format!(
                "duplicate timestamp {} at observation {}",
                next,
                index + 1
            )));
        }
        if next < prev {
            return Err(BacktestError::MalformedInput(format!(
                "timestamp {} at observation {} precedes {}",
                next,
                index + 1,
                prev
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn obs(hour: u32, funding_rate: f64, close: f64) -> Observation {
        Observation {
            timestamp: ts(hour),
            funding_rate,
            close,
        }
    }

    #[test]
    fn new_rejects_nan_funding_and_bad_close() {
        assert!(matches!(
            Observation::new(ts(0), f64::NAN, 100.0),
            Err(BacktestError::InvalidInput(_))
        ));
        assert!(matches!(
            Observation::new(ts(0), 0.0001, f64::INFINITY),
            Err(BacktestError::InvalidInput(_))
        ));
        assert!(matches!(
            Observation::new(ts(0), 0.0001, 0.0),
            Err(BacktestError::InvalidInput(_))
        ));
        assert!(Observation::new(ts(0), -0.0001, 42000.0).is_ok());
    }

    #[test]
    fn rejects_empty_sequence() {
        assert!(matches!(
            validate_observations(&[]),
            Err(BacktestError::MalformedInput(_))
        ));
    }

    #[test]
    fn rejects_duplicate_and_backwards_timestamps() {
        let dup = vec![obs(0, 0.0, 1.0), obs(0, 0.0, 1.0)];
        assert!(matches!(
            validate_observations(&dup),
            Err(BacktestError::MalformedInput(_))
        ));

        let backwards = vec![obs(8, 0.0, 1.0), obs(0, 0.0, 1.0)];
        assert!(matches!(
            validate_observations(&backwards),
            Err(BacktestError::MalformedInput(_))
        ));
    }

    #[test]
    fn reports_index_of_invalid_row() {
        let rows = vec![obs(0, 0.0, 1.0), obs(8, f64::NAN, 1.0)];
        match validate_observations(&rows) {
            Err(BacktestError::InvalidInput(msg)) => assert!(msg.starts_with("observation 1:")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
