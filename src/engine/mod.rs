//! Pure reconciliation over materialized schedule data. Nothing in here touches
//! the row store; the runner reads everything first and writes afterwards.

mod availability;
mod bracket;
mod catalog;
mod error;
mod idle;
mod occupancy;
mod time;
mod tokens;

pub use availability::intersect_availability;
pub use bracket::{Timeline, bracket, bracket_range};
pub use catalog::Catalog;
pub use error::EngineError;
pub use idle::{WindowMatcher, idle_difference, reconcile_idle, reconcile_window};
pub use occupancy::{Occupancy, overlapping, union_occupancy};
pub use time::{parse_timestamp, parse_window, validate_window};
pub use tokens::{parse_tokens, resource_set, split_tokens, text_value};
