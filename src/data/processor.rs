//! Data Processor Module
//! Normalizes raw rows, filters to damaging recent events and resolves
//! category and dollar figures.

use crate::classify::{Classifier, MagnitudeResolver};
use crate::data::{RawStormRecord, RecordError, ResolvedRecord, StormRecord};
use crate::stats::{Coverage, StatsCalculator};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Default first year kept for comparative analysis. Event volume in the
/// source steps up sharply here due to reporting practice changes.
pub const DEFAULT_CUTOFF_YEAR: i32 = 1993;

const DATE_FORMAT: &str = "%m/%d/%Y";

/// Rejected records logged individually before switching to counts only.
const MAX_LOGGED_REJECTIONS: usize = 5;

/// Data-quality counters collected while preparing records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQuality {
    pub rows_loaded: usize,
    pub malformed_dates: usize,
    /// Rows rejected for at least one missing numeric field.
    pub missing_numeric_rows: usize,
    /// Missing values per numeric field; a row may count under several.
    pub missing_numeric: BTreeMap<&'static str, usize>,
    pub invalid_numeric: usize,
    pub dropped_no_damage: usize,
    pub dropped_before_cutoff: usize,
    pub rows_kept: usize,
}

impl DataQuality {
    pub fn rows_rejected(&self) -> usize {
        self.malformed_dates + self.missing_numeric_rows + self.invalid_numeric
    }

    fn record_rejection(&mut self, error: &RecordError) {
        match error {
            RecordError::MalformedDate(_) => self.malformed_dates += 1,
            RecordError::MissingNumericField { fields } => {
                self.missing_numeric_rows += 1;
                for field in fields {
                    *self.missing_numeric.entry(*field).or_default() += 1;
                }
            }
            RecordError::InvalidNumber { .. } => self.invalid_numeric += 1,
        }
    }
}

/// Output of [`DataProcessor::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub records: Vec<ResolvedRecord>,
    pub quality: DataQuality,
    /// Normalized record count per year, before any filtering.
    pub records_per_year: BTreeMap<i32, usize>,
    /// Date span and places of the kept records.
    pub coverage: Coverage,
    pub cutoff_year: i32,
}

/// Handles record cleaning and transformation.
pub struct DataProcessor;

impl DataProcessor {
    /// Parse a month/day/year date, ignoring any trailing time of day.
    pub fn parse_begin_date(raw: &str) -> Result<NaiveDate, RecordError> {
        let date_token = raw.split_whitespace().next().unwrap_or_default();
        NaiveDate::parse_from_str(date_token, DATE_FORMAT)
            .map_err(|_| RecordError::MalformedDate(raw.to_string()))
    }

    /// All numeric fields of `raw` that are null, in column order.
    fn missing_numeric_fields(raw: &RawStormRecord) -> Vec<&'static str> {
        [
            ("FATALITIES", raw.fatalities),
            ("INJURIES", raw.injuries),
            ("PROPDMG", raw.property_damage),
            ("CROPDMG", raw.crop_damage),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(field, _)| field)
        .collect()
    }

    fn count(value: Option<f64>, field: &'static str) -> Result<u32, RecordError> {
        let value = value.ok_or_else(|| RecordError::MissingNumericField { fields: vec![field] })?;
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
            Ok(value as u32)
        } else {
            Err(RecordError::InvalidNumber { field, value })
        }
    }

    fn amount(value: Option<f64>, field: &'static str) -> Result<f64, RecordError> {
        let value = value.ok_or_else(|| RecordError::MissingNumericField { fields: vec![field] })?;
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(RecordError::InvalidNumber { field, value })
        }
    }

    fn unit_code(code: &Option<String>) -> Option<String> {
        code.as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }

    /// Parse the date, derive the year and verify the numeric fields.
    pub fn normalize(raw: &RawStormRecord) -> Result<StormRecord, RecordError> {
        let begin_date = Self::parse_begin_date(raw.begin_date.as_deref().unwrap_or_default())?;
        let missing = Self::missing_numeric_fields(raw);
        if !missing.is_empty() {
            return Err(RecordError::MissingNumericField { fields: missing });
        }
        let fatalities = Self::count(raw.fatalities, "FATALITIES")?;
        let injuries = Self::count(raw.injuries, "INJURIES")?;
        let property_damage = Self::amount(raw.property_damage, "PROPDMG")?;
        let crop_damage = Self::amount(raw.crop_damage, "CROPDMG")?;

        Ok(StormRecord {
            event_type: raw.event_type.as_deref().unwrap_or_default().trim().to_string(),
            year: begin_date.year(),
            begin_date,
            state: raw.state.clone().unwrap_or_default(),
            county_name: raw.county_name.clone().unwrap_or_default(),
            fatalities,
            injuries,
            property_damage,
            property_damage_unit: Self::unit_code(&raw.property_damage_unit),
            crop_damage,
            crop_damage_unit: Self::unit_code(&raw.crop_damage_unit),
        })
    }

    /// True when the record reports any casualty or damage.
    pub fn has_reported_damage(record: &StormRecord) -> bool {
        record.fatalities > 0
            || record.injuries > 0
            || record.property_damage > 0.0
            || record.crop_damage > 0.0
    }

    pub fn is_recent(record: &StormRecord, cutoff_year: i32) -> bool {
        record.year >= cutoff_year
    }

    /// Keep records reporting damage, preserving order.
    pub fn filter_damage_reported(records: Vec<StormRecord>) -> Vec<StormRecord> {
        records
            .into_iter()
            .filter(Self::has_reported_damage)
            .collect()
    }

    /// Keep records from `cutoff_year` onward, preserving order.
    pub fn filter_recent(records: Vec<StormRecord>, cutoff_year: i32) -> Vec<StormRecord> {
        records
            .into_iter()
            .filter(|r| Self::is_recent(r, cutoff_year))
            .collect()
    }

    /// Classify the record and convert its damage figures to dollars.
    pub fn resolve(record: &StormRecord) -> ResolvedRecord {
        let property_damage_dollars = MagnitudeResolver::dollars(
            record.property_damage,
            record.property_damage_unit.as_deref(),
        );
        let crop_damage_dollars =
            MagnitudeResolver::dollars(record.crop_damage, record.crop_damage_unit.as_deref());

        ResolvedRecord {
            event_type: record.event_type.clone(),
            category: Classifier::classify(&record.event_type),
            fatalities: record.fatalities,
            injuries: record.injuries,
            property_damage_dollars,
            crop_damage_dollars,
            casualties: u64::from(record.fatalities) + u64::from(record.injuries),
            economic_loss: property_damage_dollars + crop_damage_dollars,
        }
    }

    /// Run the full per-record pipeline: normalize, filter, resolve.
    ///
    /// Rows failing normalization are counted in [`DataQuality`] and
    /// excluded; they are never coerced to zero.
    pub fn prepare(raw: &[RawStormRecord], cutoff_year: i32) -> PreparedData {
        let mut quality = DataQuality {
            rows_loaded: raw.len(),
            ..Default::default()
        };

        let normalized: Vec<Result<StormRecord, RecordError>> =
            raw.par_iter().map(Self::normalize).collect();

        let mut records = Vec::with_capacity(normalized.len());
        for result in normalized {
            match result {
                Ok(record) => records.push(record),
                Err(error) => {
                    if quality.rows_rejected() < MAX_LOGGED_REJECTIONS {
                        warn!(%error, "rejected storm record");
                    }
                    quality.record_rejection(&error);
                }
            }
        }
        if quality.rows_rejected() > 0 {
            warn!(
                rejected = quality.rows_rejected(),
                malformed_dates = quality.malformed_dates,
                invalid_numeric = quality.invalid_numeric,
                "storm records failed normalization"
            );
        }

        let records_per_year = StatsCalculator::records_per_year(&records);

        let before = records.len();
        let records = Self::filter_damage_reported(records);
        quality.dropped_no_damage = before - records.len();

        let before = records.len();
        let records = Self::filter_recent(records, cutoff_year);
        quality.dropped_before_cutoff = before - records.len();

        let coverage = StatsCalculator::coverage(&records);
        let resolved: Vec<ResolvedRecord> = records.par_iter().map(Self::resolve).collect();
        quality.rows_kept = resolved.len();

        info!(
            loaded = quality.rows_loaded,
            rejected = quality.rows_rejected(),
            no_damage = quality.dropped_no_damage,
            before_cutoff = quality.dropped_before_cutoff,
            kept = quality.rows_kept,
            cutoff_year,
            "prepared storm records"
        );

        PreparedData {
            records: resolved,
            quality,
            records_per_year,
            coverage,
            cutoff_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;

    fn raw(
        event_type: &str,
        date: &str,
        fatalities: f64,
        injuries: f64,
        prop: f64,
        prop_unit: &str,
    ) -> RawStormRecord {
        RawStormRecord {
            begin_date: Some(date.to_string()),
            state: Some("AL".to_string()),
            county_name: Some("MOBILE".to_string()),
            event_type: Some(event_type.to_string()),
            fatalities: Some(fatalities),
            injuries: Some(injuries),
            property_damage: Some(prop),
            property_damage_unit: Some(prop_unit.to_string()),
            crop_damage: Some(0.0),
            crop_damage_unit: None,
        }
    }

    fn normalized(record: RawStormRecord) -> StormRecord {
        DataProcessor::normalize(&record).unwrap()
    }

    #[test]
    fn parses_month_day_year_with_time() {
        let date = DataProcessor::parse_begin_date("4/18/1950 0:00:00").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(1950, 4, 18).unwrap());
        let date = DataProcessor::parse_begin_date("11/05/2011").unwrap();
        assert_eq!(date.year(), 2011);
    }

    #[test]
    fn rejects_malformed_dates() {
        for bad in ["", "1950-04-18", "13/01/1995", "2/30/1995", "not a date"] {
            assert!(
                matches!(DataProcessor::parse_begin_date(bad), Err(RecordError::MalformedDate(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn normalize_derives_year_and_trims_units() {
        let record = normalized(raw("TSTM WIND", "1/22/1995 0:00:00", 1.0, 0.0, 10.0, " K "));
        assert_eq!(record.year, 1995);
        assert_eq!(record.fatalities, 1);
        assert_eq!(record.property_damage_unit.as_deref(), Some("K"));
        assert_eq!(record.crop_damage_unit, None);

        let record = normalized(raw("TSTM WIND", "1/22/1995", 1.0, 0.0, 10.0, ""));
        assert_eq!(record.property_damage_unit, None);
    }

    #[test]
    fn normalize_surfaces_missing_numeric_fields() {
        let mut record = raw("HAIL", "6/1/1996", 0.0, 0.0, 1.0, "K");
        record.injuries = None;
        assert_eq!(
            DataProcessor::normalize(&record),
            Err(RecordError::MissingNumericField { fields: vec!["INJURIES"] })
        );

        let mut record = raw("HAIL", "6/1/1996", 0.0, 0.0, 1.0, "K");
        record.crop_damage = None;
        assert_eq!(
            DataProcessor::normalize(&record),
            Err(RecordError::MissingNumericField { fields: vec!["CROPDMG"] })
        );

        let mut record = raw("HAIL", "6/1/1996", 0.0, 0.0, 1.0, "K");
        record.fatalities = None;
        record.injuries = None;
        assert_eq!(
            DataProcessor::normalize(&record),
            Err(RecordError::MissingNumericField { fields: vec!["FATALITIES", "INJURIES"] })
        );
    }

    #[test]
    fn normalize_rejects_invalid_numbers() {
        let record = raw("HAIL", "6/1/1996", -1.0, 0.0, 1.0, "K");
        assert!(matches!(
            DataProcessor::normalize(&record),
            Err(RecordError::InvalidNumber { field: "FATALITIES", .. })
        ));
        let record = raw("HAIL", "6/1/1996", 0.5, 0.0, 1.0, "K");
        assert!(DataProcessor::normalize(&record).is_err());
        let record = raw("HAIL", "6/1/1996", 0.0, 0.0, f64::NAN, "K");
        assert!(matches!(
            DataProcessor::normalize(&record),
            Err(RecordError::InvalidNumber { field: "PROPDMG", .. })
        ));
    }

    #[test]
    fn damage_filter_keeps_any_nonzero_measure() {
        let none = normalized(raw("FOG", "1/1/1996", 0.0, 0.0, 0.0, ""));
        assert!(!DataProcessor::has_reported_damage(&none));

        let mut crop_only = none.clone();
        crop_only.crop_damage = 3.0;
        assert!(DataProcessor::has_reported_damage(&crop_only));

        let mut injured = none.clone();
        injured.injuries = 1;
        assert!(DataProcessor::has_reported_damage(&injured));
    }

    #[test]
    fn damage_filter_is_idempotent_and_order_preserving() {
        let records: Vec<StormRecord> = vec![
            normalized(raw("A", "1/1/1996", 1.0, 0.0, 0.0, "")),
            normalized(raw("B", "1/1/1996", 0.0, 0.0, 0.0, "")),
            normalized(raw("C", "1/1/1996", 0.0, 0.0, 5.0, "K")),
            normalized(raw("D", "1/1/1996", 0.0, 0.0, 0.0, "M")),
            normalized(raw("E", "1/1/1996", 0.0, 4.0, 0.0, "")),
        ];
        let once = DataProcessor::filter_damage_reported(records);
        let twice = DataProcessor::filter_damage_reported(once.clone());
        assert_eq!(once, twice);
        let names: Vec<&str> = once.iter().map(|r| r.event_type.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "E"]);
    }

    #[test]
    fn recency_filter_includes_cutoff_year() {
        let records = vec![
            normalized(raw("A", "12/31/1992", 1.0, 0.0, 0.0, "")),
            normalized(raw("B", "1/1/1993", 1.0, 0.0, 0.0, "")),
            normalized(raw("C", "1/1/2005", 1.0, 0.0, 0.0, "")),
        ];
        let kept = DataProcessor::filter_recent(records, 1993);
        let years: Vec<i32> = kept.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![1993, 2005]);
    }

    #[test]
    fn resolve_absent_unit_keeps_figure() {
        let record = normalized(raw("HAIL", "1/1/1996", 0.0, 0.0, 100.0, ""));
        let resolved = DataProcessor::resolve(&record);
        assert_eq!(resolved.property_damage_dollars, 100.0);
        assert_eq!(resolved.category, Category::Hail);
    }

    #[test]
    fn resolve_converts_property_and_crop_separately() {
        let mut record = normalized(raw("HAIL", "1/1/1996", 0.0, 0.0, 10.0, "K"));
        record.crop_damage = 2.5;
        record.crop_damage_unit = Some("m".to_string());
        let resolved = DataProcessor::resolve(&record);
        assert_eq!(resolved.property_damage_dollars, 10_000.0);
        assert_eq!(resolved.crop_damage_dollars, 2_500_000.0);
        assert_eq!(resolved.economic_loss, 2_510_000.0);
    }

    #[test]
    fn prepare_end_to_end_scenario() {
        let raw_records = vec![
            raw("TSTM WIND", "3/4/1995 0:00:00", 1.0, 0.0, 10.0, "K"),
            raw("RIVER FLOOD", "7/9/1994 0:00:00", 0.0, 2.0, 5.0, "M"),
            raw("EXCESSIVE HEAT", "8/1/1990 0:00:00", 3.0, 0.0, 0.0, ""),
        ];
        let prepared = DataProcessor::prepare(&raw_records, 1993);

        assert_eq!(prepared.records.len(), 2);
        let wind = &prepared.records[0];
        assert_eq!(wind.category, Category::Wind);
        assert_eq!(wind.casualties, 1);
        assert_eq!(wind.economic_loss, 10_000.0);
        let flood = &prepared.records[1];
        assert_eq!(flood.category, Category::Flood);
        assert_eq!(flood.casualties, 2);
        assert_eq!(flood.economic_loss, 5_000_000.0);

        assert_eq!(prepared.quality.rows_loaded, 3);
        assert_eq!(prepared.quality.dropped_before_cutoff, 1);
        assert_eq!(prepared.quality.dropped_no_damage, 0);
        assert_eq!(prepared.quality.rows_kept, 2);
        assert_eq!(prepared.records_per_year.get(&1990), Some(&1));
        assert_eq!(prepared.coverage.first_date, NaiveDate::from_ymd_opt(1994, 7, 9));
        assert_eq!(prepared.coverage.states, 1);
    }

    #[test]
    fn prepare_counts_rejections_instead_of_zeroing() {
        let mut missing = raw("TORNADO", "5/3/1999", 0.0, 0.0, 1.0, "K");
        missing.fatalities = None;
        let mut bad_date = raw("TORNADO", "5/3/1999", 1.0, 0.0, 1.0, "K");
        bad_date.begin_date = Some("1999/05/03".to_string());
        let mut no_date = raw("TORNADO", "5/3/1999", 1.0, 0.0, 1.0, "K");
        no_date.begin_date = None;
        let good = raw("TORNADO", "5/3/1999", 1.0, 0.0, 1.0, "K");

        let prepared = DataProcessor::prepare(&[missing, bad_date, no_date, good], 1993);
        assert_eq!(prepared.quality.malformed_dates, 2);
        assert_eq!(prepared.quality.missing_numeric.get("FATALITIES"), Some(&1));
        assert_eq!(prepared.quality.rows_rejected(), 3);
        assert_eq!(prepared.records.len(), 1);
    }

    #[test]
    fn prepare_counts_every_missing_field_of_a_row() {
        let mut record = raw("TORNADO", "5/3/1999", 0.0, 0.0, 1.0, "K");
        record.fatalities = None;
        record.injuries = None;
        let mut crop_missing = raw("TORNADO", "5/3/1999", 1.0, 0.0, 1.0, "K");
        crop_missing.crop_damage = None;

        let prepared = DataProcessor::prepare(&[record, crop_missing], 1993);
        let quality = &prepared.quality;
        assert_eq!(quality.missing_numeric.get("FATALITIES"), Some(&1));
        assert_eq!(quality.missing_numeric.get("INJURIES"), Some(&1));
        assert_eq!(quality.missing_numeric.get("CROPDMG"), Some(&1));
        assert_eq!(quality.missing_numeric_rows, 2);
        assert_eq!(quality.rows_rejected(), 2);
    }
}
