//! Category Aggregator
//! Sums casualties and economic loss per storm category.

use crate::classify::Category;
use crate::data::ResolvedRecord;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub event_count: usize,
    pub total_fatalities: u64,
    pub total_injuries: u64,
    pub total_casualties: u64,
    pub total_property_damage: f64,
    pub total_crop_damage: f64,
    pub total_economic_loss: f64,
}

impl CategorySummary {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            event_count: 0,
            total_fatalities: 0,
            total_injuries: 0,
            total_casualties: 0,
            total_property_damage: 0.0,
            total_crop_damage: 0.0,
            total_economic_loss: 0.0,
        }
    }

    fn add(&mut self, record: &ResolvedRecord) {
        self.event_count += 1;
        self.total_fatalities += u64::from(record.fatalities);
        self.total_injuries += u64::from(record.injuries);
        self.total_casualties += record.casualties;
        self.total_property_damage += record.property_damage_dollars;
        self.total_crop_damage += record.crop_damage_dollars;
        self.total_economic_loss += record.economic_loss;
    }

    fn merge(&mut self, other: &CategorySummary) {
        self.event_count += other.event_count;
        self.total_fatalities += other.total_fatalities;
        self.total_injuries += other.total_injuries;
        self.total_casualties += other.total_casualties;
        self.total_property_damage += other.total_property_damage;
        self.total_crop_damage += other.total_crop_damage;
        self.total_economic_loss += other.total_economic_loss;
    }
}

/// Per-category summaries, looked up by category rather than position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    rows: BTreeMap<Category, CategorySummary>,
}

impl SummaryTable {
    pub fn get(&self, category: Category) -> Option<&CategorySummary> {
        self.rows.get(&category)
    }

    /// Total casualties for a category, zero when it has no events.
    pub fn casualties(&self, category: Category) -> u64 {
        self.get(category).map(|s| s.total_casualties).unwrap_or(0)
    }

    /// Total economic loss for a category, zero when it has no events.
    pub fn economic_loss(&self, category: Category) -> f64 {
        self.get(category).map(|s| s.total_economic_loss).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Summaries in category order.
    pub fn iter(&self) -> impl Iterator<Item = &CategorySummary> {
        self.rows.values()
    }

    pub fn total_casualties(&self) -> u64 {
        self.iter().map(|s| s.total_casualties).sum()
    }

    pub fn total_economic_loss(&self) -> f64 {
        self.iter().map(|s| s.total_economic_loss).sum()
    }

    /// Summaries sorted by total casualties, largest first.
    pub fn ranked_by_casualties(&self) -> Vec<&CategorySummary> {
        let mut ranked: Vec<&CategorySummary> = self.iter().collect();
        ranked.sort_by(|a, b| b.total_casualties.cmp(&a.total_casualties));
        ranked
    }

    /// Summaries sorted by total economic loss, largest first.
    pub fn ranked_by_economic_loss(&self) -> Vec<&CategorySummary> {
        let mut ranked: Vec<&CategorySummary> = self.iter().collect();
        ranked.sort_by(|a, b| {
            b.total_economic_loss
                .partial_cmp(&a.total_economic_loss)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    /// Columnar view for CSV export.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let categories: Vec<&str> = self.iter().map(|s| s.category.label()).collect();
        let counts: Vec<u64> = self.iter().map(|s| s.event_count as u64).collect();
        let fatalities: Vec<u64> = self.iter().map(|s| s.total_fatalities).collect();
        let injuries: Vec<u64> = self.iter().map(|s| s.total_injuries).collect();
        let casualties: Vec<u64> = self.iter().map(|s| s.total_casualties).collect();
        let property: Vec<f64> = self.iter().map(|s| s.total_property_damage).collect();
        let crop: Vec<f64> = self.iter().map(|s| s.total_crop_damage).collect();
        let economic: Vec<f64> = self.iter().map(|s| s.total_economic_loss).collect();

        DataFrame::new(vec![
            Column::new("category".into(), categories),
            Column::new("event_count".into(), counts),
            Column::new("fatalities".into(), fatalities),
            Column::new("injuries".into(), injuries),
            Column::new("casualties".into(), casualties),
            Column::new("property_damage".into(), property),
            Column::new("crop_damage".into(), crop),
            Column::new("economic_loss".into(), economic),
        ])
    }
}

type PartialSums = BTreeMap<Category, CategorySummary>;

/// Groups resolved records by category.
pub struct Aggregator;

impl Aggregator {
    /// Sum casualties and economic loss per category in parallel.
    pub fn aggregate(records: &[ResolvedRecord]) -> SummaryTable {
        let rows = records
            .par_iter()
            .fold(PartialSums::new, |mut acc, record| {
                acc.entry(record.category)
                    .or_insert_with(|| CategorySummary::new(record.category))
                    .add(record);
                acc
            })
            .reduce(PartialSums::new, |mut left, right| {
                for (category, summary) in right {
                    left.entry(category)
                        .or_insert_with(|| CategorySummary::new(category))
                        .merge(&summary);
                }
                left
            });

        SummaryTable { rows }
    }
}
