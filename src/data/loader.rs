use crate::data::observation::Observation;
use crate::error::BacktestError;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

//a funding rate print from the exchange
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
}

//a close price sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

//how unmatched rows are handled when joining funding and price data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    //every funding timestamp must have a price, extra prices are skipped
    #[default]
    Strict,
    //drop unmatched rows on either side
    Inner,
}

impl JoinPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(JoinPolicy::Strict),
            "inner" => Some(JoinPolicy::Inner),
            _ => None,
        }
    }
}

//row counts produced by a join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinReport {
    pub matched: usize,
    pub unmatched_funding: usize,
    pub unmatched_prices: usize,
}

#[derive(Debug, Deserialize)]
struct FundingRecord {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, rename = "fundingRate", alias = "funding_rate")]
    funding_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    close: Option<f64>,
}

//parses rfc3339, spreadsheet-style "YYYY-MM-DD HH:MM:SS" (utc) or epoch milliseconds
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

fn required_timestamp(raw: Option<String>, line: usize) -> Result<DateTime<Utc>> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            BacktestError::MalformedInput(format!("missing timestamp at line {}", line))
        })?;

    parse_timestamp(&raw).ok_or_else(|| {
        BacktestError::MalformedInput(format!(
            "unparseable timestamp '{}' at line {}",
            raw, line
        ))
        .into()
    })
}

//sorts rows by timestamp and rejects duplicates within one source
fn sort_unique<T>(rows: &mut [T], key: impl Fn(&T) -> DateTime<Utc>, source: &str) -> Result<()> {
    rows.sort_by_key(|row| key(row));

    if let Some(pair) = rows.windows(2).find(|pair| key(&pair[0]) == key(&pair[1])) {
        return Err(BacktestError::MalformedInput(format!(
            "duplicate {} timestamp {}",
            source,
            key(&pair[0])
        ))
        .into());
    }

    Ok(())
}

//loads funding rates from a csv file with `timestamp,fundingRate` columns
pub fn load_funding_csv<P: AsRef<Path>>(path: P) -> Result<Vec<FundingRate>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(format!("Failed to open funding CSV file: {:?}", path))?;

    let mut rates = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        let line = index + 2;
        let record: FundingRecord =
            result.context(format!("Failed to parse funding record at line {}", line))?;

        let timestamp = required_timestamp(record.timestamp, line)?;
        let rate = record.funding_rate.ok_or_else(|| {
            BacktestError::MalformedInput(format!("missing fundingRate at line {}", line))
        })?;

        rates.push(FundingRate { timestamp, rate });
    }

    sort_unique(&mut rates, |r| r.timestamp, "funding")?;
    tracing::debug!(rows = rates.len(), path = ?path, "loaded funding rates");

    Ok(rates)
}

//loads close prices from a csv file with `timestamp,close` columns
pub fn load_price_csv<P: AsRef<Path>>(path: P) -> Result<Vec<PricePoint>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(format!("Failed to open price CSV file: {:?}", path))?;

    let mut prices = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        let line = index + 2;
        let record: PriceRecord =
            result.context(format!("Failed to parse price record at line {}", line))?;

        let timestamp = required_timestamp(record.timestamp, line)?;
        let close = record.close.ok_or_else(|| {
            BacktestError::MalformedInput(format!("missing close at line {}", line))
        })?;

        prices.push(PricePoint { timestamp, close });
    }

    sort_unique(&mut prices, |p| p.timestamp, "price")?;
    tracing::debug!(rows = prices.len(), path = ?path, "loaded prices");

    Ok(prices)
}

//joins funding rates and prices on identical timestamps
//the output is sorted ascending by timestamp
pub fn join_on_timestamp(
    funding: &[FundingRate],
    prices: &[PricePoint],
    policy: JoinPolicy,
) -> crate::error::Result<(Vec<Observation>, JoinReport)> {
    let mut price_by_time: IndexMap<DateTime<Utc>, f64> = IndexMap::with_capacity(prices.len());
    for point in prices {
        if price_by_time.insert(point.timestamp, point.close).is_some() {
            return Err(BacktestError::MalformedInput(format!(
                "duplicate price timestamp {}",
                point.timestamp
            )));
        }
    }

    let mut observations = Vec::with_capacity(funding.len());
    let mut report = JoinReport::default();

    for rate in funding {
        match price_by_time.get(&rate.timestamp) {
            Some(&close) => {
                observations.push(Observation::new(rate.timestamp, rate.rate, close)?);
                report.matched += 1;
            }
            None => match policy {
                JoinPolicy::Strict => {
                    return Err(BacktestError::MalformedInput(format!(
                        "no close price for funding timestamp {}",
                        rate.timestamp
                    )));
                }
                JoinPolicy::Inner => report.unmatched_funding += 1,
            },
        }
    }

    observations.sort_by_key(|o| o.timestamp);
    if let Some(pair) = observations
        .windows(2)
        .find(|pair| pair[0].timestamp == pair[1].timestamp)
    {
        return Err(BacktestError::MalformedInput(format!(
            "duplicate funding timestamp {}",
            pair[0].timestamp
        )));
    }

    report.unmatched_prices = prices.len() - report.matched;

    if report.unmatched_funding > 0 {
        tracing::warn!(
            dropped = report.unmatched_funding,
            "funding rows without a matching price were dropped"
        );
    }
    tracing::info!(
        matched = report.matched,
        unmatched_prices = report.unmatched_prices,
        "joined funding and price data"
    );

    Ok((observations, report))
}
