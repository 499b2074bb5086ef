//! Aggregation and insight derivation.
//!
//! Tabulators live in [`aggregator`], named cross-tabulations in
//! [`bundle`], ranking in [`ranker`] and chart conversions in [`series`].

pub mod aggregator;
pub mod bundle;
pub mod ranker;
pub mod series;

pub use aggregator::*;
pub use bundle::*;
pub use series::*;
