pub mod loader;
pub mod observation;

pub use loader::{
    join_on_timestamp, load_funding_csv, load_price_csv, parse_timestamp, FundingRate, JoinPolicy,
    JoinReport, PricePoint,
};
pub use observation::{validate_observations, Observation};
