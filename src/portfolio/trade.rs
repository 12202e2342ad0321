use crate::engine::{ExitReason, PositionEvent};
use crate::portfolio::position::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//a round trip from open to close
//exit fields stay empty while the position is still open at the end of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub direction: Direction,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    //realized return of a closed trade as a fraction of entry
    pub fn realized_return(&self) -> Option<f64> {
        self.exit_price
            .map(|exit| (exit / self.entry_price - 1.0) * self.direction.to_sign() * self.size)
    }
}

//builds the round-trip log from timestamped position events
pub fn build_trade_log<'a, I>(events: I) -> Vec<Trade>
where
    I: IntoIterator<Item = (DateTime<Utc>, &'a PositionEvent)>,
{
    let mut trades: Vec<Trade> = Vec::new();

    for (timestamp, event) in events {
        match *event {
            PositionEvent::Opened {
                direction,
                size,
                price,
            } => trades.push(Trade {
                direction,
                size,
                entry_time: timestamp,
                entry_price: price,
                exit_time: None,
                exit_price: None,
                exit_reason: None,
            }),
            PositionEvent::Closed {
                exit_price, reason, ..
            } => {
                //the engine never closes without a prior open
                if let Some(open) = trades.last_mut().filter(|t| t.is_open()) {
                    open.exit_time = Some(timestamp);
                    open.exit_price = Some(exit_price);
                    open.exit_reason = Some(reason);
                }
            }
        }
    }

    trades
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn pairs_open_and_close_events() {
        let events = [
            (
                ts(0),
                PositionEvent::Opened {
                    direction: Direction::Short,
                    size: 1.0,
                    price: 100.0,
                },
            ),
            (
                ts(8),
                PositionEvent::Closed {
                    direction: Direction::Short,
                    size: 1.0,
                    entry_price: 100.0,
                    exit_price: 110.0,
                    reason: ExitReason::StopLoss,
                },
            ),
            (
                ts(16),
                PositionEvent::Opened {
                    direction: Direction::Long,
                    size: 0.5,
                    price: 90.0,
                },
            ),
        ];

        let trades = build_trade_log(events.iter().map(|(t, e)| (*t, e)));

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].exit_time, Some(ts(8)));
        assert_eq!(trades[0].exit_reason, Some(ExitReason::StopLoss));
        assert!((trades[0].realized_return().unwrap() + 0.1).abs() < 1e-12);

        assert!(trades[1].is_open());
        assert_eq!(trades[1].realized_return(), None);
    }
}
