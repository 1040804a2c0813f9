//! Statistics Calculator Module
//! Descriptive statistics and yearly volume figures used by the report.

use crate::classify::Category;
use crate::data::{ResolvedRecord, StormRecord};
use chrono::NaiveDate;
use serde::Serialize;
use statrs::statistics::{Data, Distribution, Max, Median, OrderStatistics};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Descriptive statistics for one measure.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub p95: f64,
    pub max: f64,
}

impl Default for DescriptiveStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            p95: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Average yearly record volume on either side of the cutoff year.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeShift {
    pub cutoff_year: i32,
    pub mean_before: f64,
    pub mean_from: f64,
}

impl VolumeShift {
    /// How many times larger the post-cutoff volume is.
    pub fn ratio(&self) -> Option<f64> {
        (self.mean_before > 0.0).then(|| self.mean_from / self.mean_before)
    }
}

/// Date span and geographic spread of a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Coverage {
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub states: usize,
    pub counties: usize,
}

/// Totals for a single raw event type string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTypeTotals {
    pub event_type: String,
    pub events: usize,
    pub casualties: u64,
    pub economic_loss: f64,
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> DescriptiveStats {
        let n = values.len();
        if n == 0 {
            return DescriptiveStats::default();
        }

        let mut data = Data::new(values.to_vec());
        let std = if n > 1 {
            data.std_dev().unwrap_or(f64::NAN)
        } else {
            0.0
        };

        DescriptiveStats {
            count: n,
            mean: data.mean().unwrap_or(f64::NAN),
            median: data.median(),
            std,
            p95: data.percentile(95),
            max: data.max(),
        }
    }

    /// Casualties per resolved event.
    pub fn casualty_stats(records: &[ResolvedRecord]) -> DescriptiveStats {
        let values: Vec<f64> = records.iter().map(|r| r.casualties as f64).collect();
        Self::compute_descriptive_stats(&values)
    }

    /// Economic loss per resolved event.
    pub fn economic_loss_stats(records: &[ResolvedRecord]) -> DescriptiveStats {
        let values: Vec<f64> = records.iter().map(|r| r.economic_loss).collect();
        Self::compute_descriptive_stats(&values)
    }

    /// Number of records per calendar year.
    pub fn records_per_year(records: &[StormRecord]) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(record.year).or_insert(0) += 1;
        }
        counts
    }

    pub fn coverage(records: &[StormRecord]) -> Coverage {
        let states: HashSet<&str> = records
            .iter()
            .map(|r| r.state.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        let counties: HashSet<(&str, &str)> = records
            .iter()
            .filter(|r| !r.county_name.is_empty())
            .map(|r| (r.state.as_str(), r.county_name.as_str()))
            .collect();

        Coverage {
            first_date: records.iter().map(|r| r.begin_date).min(),
            last_date: records.iter().map(|r| r.begin_date).max(),
            states: states.len(),
            counties: counties.len(),
        }
    }

    /// Event type strings within one category, most casualties first
    /// (economic loss breaks ties).
    pub fn top_event_types(
        records: &[ResolvedRecord],
        category: Category,
        limit: usize,
    ) -> Vec<EventTypeTotals> {
        let mut totals: HashMap<String, EventTypeTotals> = HashMap::new();
        for record in records.iter().filter(|r| r.category == category) {
            let key = record.event_type.to_ascii_uppercase();
            let entry = totals.entry(key.clone()).or_insert_with(|| EventTypeTotals {
                event_type: key,
                events: 0,
                casualties: 0,
                economic_loss: 0.0,
            });
            entry.events += 1;
            entry.casualties += record.casualties;
            entry.economic_loss += record.economic_loss;
        }

        let mut ranked: Vec<EventTypeTotals> = totals.into_values().collect();
        ranked.sort_by(|a, b| {
            b.casualties
                .cmp(&a.casualties)
                .then_with(|| {
                    b.economic_loss
                        .partial_cmp(&a.economic_loss)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.event_type.cmp(&b.event_type))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Mean records per year before and from the cutoff year.
    ///
    /// Years absent from `per_year` are not counted as zero-volume years.
    pub fn volume_shift(per_year: &BTreeMap<i32, usize>, cutoff_year: i32) -> VolumeShift {
        let mean = |counts: Vec<usize>| {
            if counts.is_empty() {
                0.0
            } else {
                counts.iter().sum::<usize>() as f64 / counts.len() as f64
            }
        };

        let before = per_year.range(..cutoff_year).map(|(_, &n)| n).collect();
        let from = per_year.range(cutoff_year..).map(|(_, &n)| n).collect();

        VolumeShift {
            cutoff_year,
            mean_before: mean(before),
            mean_from: mean(from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storm(year: i32) -> StormRecord {
        located(year, "KS", "SEDGWICK")
    }

    fn located(year: i32, state: &str, county: &str) -> StormRecord {
        StormRecord {
            event_type: "TORNADO".to_string(),
            begin_date: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
            year,
            state: state.to_string(),
            county_name: county.to_string(),
            fatalities: 0,
            injuries: 0,
            property_damage: 0.0,
            property_damage_unit: None,
            crop_damage: 0.0,
            crop_damage_unit: None,
        }
    }

    #[test]
    fn descriptive_stats_basic() {
        let stats = StatsCalculator::compute_descriptive_stats(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(stats.count, 5);
        assert!((stats.mean - 3.0).abs() < 1e-12);
        assert!((stats.median - 3.0).abs() < 1e-12);
        assert!((stats.std - 2.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.max, 5.0);
        assert!(stats.p95 > 4.0 && stats.p95 <= 5.0);
    }

    #[test]
    fn descriptive_stats_single_value() {
        let stats = StatsCalculator::compute_descriptive_stats(&[7.0]);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.mean, 7.0);
        assert_eq!(stats.std, 0.0);
    }

    #[test]
    fn descriptive_stats_empty_is_nan() {
        let stats = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn counts_records_per_year() {
        let records = vec![storm(1990), storm(1995), storm(1995), storm(2001)];
        let per_year = StatsCalculator::records_per_year(&records);
        assert_eq!(per_year.get(&1995), Some(&2));
        assert_eq!(per_year.len(), 3);
    }

    #[test]
    fn volume_shift_splits_at_cutoff() {
        let per_year = BTreeMap::from([(1990, 10), (1992, 30), (1993, 200), (1994, 400)]);
        let shift = StatsCalculator::volume_shift(&per_year, 1993);
        assert_eq!(shift.mean_before, 20.0);
        assert_eq!(shift.mean_from, 300.0);
        assert_eq!(shift.ratio(), Some(15.0));
    }

    #[test]
    fn volume_shift_without_early_years_has_no_ratio() {
        let per_year = BTreeMap::from([(1996, 5)]);
        let shift = StatsCalculator::volume_shift(&per_year, 1993);
        assert_eq!(shift.mean_before, 0.0);
        assert_eq!(shift.ratio(), None);
    }

    #[test]
    fn coverage_counts_distinct_places() {
        let records = vec![
            located(1995, "KS", "SEDGWICK"),
            located(2003, "KS", "SEDGWICK"),
            located(1999, "OK", "CLEVELAND"),
            located(1997, "TX", "CLEVELAND"),
            located(1996, "TX", ""),
        ];
        let coverage = StatsCalculator::coverage(&records);
        assert_eq!(coverage.states, 3);
        assert_eq!(coverage.counties, 3);
        assert_eq!(coverage.first_date, NaiveDate::from_ymd_opt(1995, 6, 1));
        assert_eq!(coverage.last_date, NaiveDate::from_ymd_opt(2003, 6, 1));
        assert_eq!(StatsCalculator::coverage(&[]), Coverage::default());
    }

    #[test]
    fn top_event_types_ranks_within_category() {
        let resolved = |event_type: &str, category, casualties: u64, loss: f64| ResolvedRecord {
            event_type: event_type.to_string(),
            category,
            fatalities: 0,
            injuries: casualties as u32,
            property_damage_dollars: loss,
            crop_damage_dollars: 0.0,
            casualties,
            economic_loss: loss,
        };
        let records = vec![
            resolved("FOG", Category::Other, 10, 0.0),
            resolved("Fog", Category::Other, 5, 0.0),
            resolved("RIP CURRENT", Category::Other, 12, 0.0),
            resolved("LANDSLIDE", Category::Other, 0, 1e6),
            resolved("TORNADO", Category::Tornado, 100, 0.0),
        ];
        let top = StatsCalculator::top_event_types(&records, Category::Other, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].event_type, "FOG");
        assert_eq!(top[0].events, 2);
        assert_eq!(top[0].casualties, 15);
        assert_eq!(top[1].event_type, "RIP CURRENT");
    }
}
