//! Storm record types at each pipeline stage.

use crate::classify::Category;
use chrono::NaiveDate;
use thiserror::Error;

/// One row as read from the source file. Every field may be null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStormRecord {
    pub begin_date: Option<String>,
    pub state: Option<String>,
    pub county_name: Option<String>,
    pub event_type: Option<String>,
    pub fatalities: Option<f64>,
    pub injuries: Option<f64>,
    pub property_damage: Option<f64>,
    pub property_damage_unit: Option<String>,
    pub crop_damage: Option<f64>,
    pub crop_damage_unit: Option<String>,
}

/// A record with a parsed date and verified numeric fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StormRecord {
    pub event_type: String,
    pub begin_date: NaiveDate,
    pub year: i32,
    pub state: String,
    pub county_name: String,
    pub fatalities: u32,
    pub injuries: u32,
    pub property_damage: f64,
    pub property_damage_unit: Option<String>,
    pub crop_damage: f64,
    pub crop_damage_unit: Option<String>,
}

/// A classified record with damage expressed in dollars.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub event_type: String,
    pub category: Category,
    pub fatalities: u32,
    pub injuries: u32,
    pub property_damage_dollars: f64,
    pub crop_damage_dollars: f64,
    pub casualties: u64,
    pub economic_loss: f64,
}

/// Reasons a row cannot be normalized.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Malformed begin date: {0:?}")]
    MalformedDate(String),
    #[error("Missing numeric fields {}", fields.join(", "))]
    MissingNumericField { fields: Vec<&'static str> },
    #[error("Invalid value {value} in numeric field {field}")]
    InvalidNumber { field: &'static str, value: f64 },
}
