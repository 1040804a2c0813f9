//! Stats module - aggregation and statistical calculations

mod aggregator;
mod calculator;

pub use aggregator::{Aggregator, CategorySummary, SummaryTable};
pub use calculator::{Coverage, DescriptiveStats, EventTypeTotals, StatsCalculator, VolumeShift};
