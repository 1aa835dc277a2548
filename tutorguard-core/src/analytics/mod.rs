//! Analytics derived from the interaction and event log
//!
//! Everything here is a pure function of the log: the same records always
//! yield bit-identical numbers.

pub mod achievements;
pub mod aggregator;

pub use achievements::{Achievement, AchievementKind};
pub use aggregator::{AnalyticsAggregator, AnalyticsSnapshot, AnalyticsTarget, Timeframe};
