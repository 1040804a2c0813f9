//! Report Generator Module
//! Writes the narrative markdown report plus JSON and CSV summaries.

use crate::classify::Category;
use crate::data::{DataQuality, PreparedData};
use crate::stats::{
    CategorySummary, Coverage, DescriptiveStats, EventTypeTotals, StatsCalculator, SummaryTable,
    VolumeShift,
};
use polars::prelude::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const REPORT_FILE: &str = "report.md";
pub const SUMMARY_JSON_FILE: &str = "summary.json";
pub const SUMMARY_CSV_FILE: &str = "summary.csv";
pub const CASUALTY_CHART_FILE: &str = "casualties_by_category.png";
pub const ECONOMIC_CHART_FILE: &str = "economic_loss_by_category.png";
pub const VOLUME_CHART_FILE: &str = "records_per_year.png";

/// Unclassified event types listed in the narrative.
const UNCLASSIFIED_LISTED: usize = 5;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to export summary table: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to format report: {0}")]
    Format(#[from] std::fmt::Error),
}

/// A rendered chart image referenced from the narrative.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLink {
    pub alt: String,
    pub file: String,
}

/// Everything the narrative interpolates.
pub struct ReportContext<'a> {
    pub source: &'a Path,
    pub quality: &'a DataQuality,
    pub coverage: &'a Coverage,
    pub cutoff_year: i32,
    pub table: &'a SummaryTable,
    pub highlights: Vec<Category>,
    pub unclassified: Vec<EventTypeTotals>,
    pub casualty_stats: DescriptiveStats,
    pub economic_loss_stats: DescriptiveStats,
    pub volume_shift: VolumeShift,
    pub casualty_chart: Option<ChartLink>,
    pub economic_chart: Option<ChartLink>,
    pub volume_chart: Option<ChartLink>,
}

impl<'a> ReportContext<'a> {
    pub fn new(source: &'a Path, prepared: &'a PreparedData, table: &'a SummaryTable) -> Self {
        Self {
            source,
            quality: &prepared.quality,
            coverage: &prepared.coverage,
            cutoff_year: prepared.cutoff_year,
            table,
            highlights: Vec::new(),
            unclassified: StatsCalculator::top_event_types(
                &prepared.records,
                Category::Other,
                UNCLASSIFIED_LISTED,
            ),
            casualty_stats: StatsCalculator::casualty_stats(&prepared.records),
            economic_loss_stats: StatsCalculator::economic_loss_stats(&prepared.records),
            volume_shift: StatsCalculator::volume_shift(
                &prepared.records_per_year,
                prepared.cutoff_year,
            ),
            casualty_chart: None,
            economic_chart: None,
            volume_chart: None,
        }
    }
}

/// Machine-readable summary written next to the narrative.
#[derive(Debug, Serialize)]
struct ReportSummary<'a> {
    cutoff_year: i32,
    data_quality: &'a DataQuality,
    coverage: &'a Coverage,
    total_casualties: u64,
    total_economic_loss: f64,
    categories: Vec<&'a CategorySummary>,
    casualties_per_event: &'a DescriptiveStats,
    economic_loss_per_event: &'a DescriptiveStats,
    volume_shift: &'a VolumeShift,
    unclassified_event_types: &'a [EventTypeTotals],
}

/// Paths of the files written by [`ReportWriter::write_all`].
#[derive(Debug, Clone)]
pub struct ReportFiles {
    pub report: PathBuf,
    pub summary_json: PathBuf,
    pub summary_csv: PathBuf,
}

pub struct ReportWriter;

impl ReportWriter {
    /// Write report.md, summary.json and summary.csv into `output_dir`.
    pub fn write_all(ctx: &ReportContext<'_>, output_dir: &Path) -> Result<ReportFiles, ReportError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ReportError::Io { path, source }
        };
        fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;

        let files = ReportFiles {
            report: output_dir.join(REPORT_FILE),
            summary_json: output_dir.join(SUMMARY_JSON_FILE),
            summary_csv: output_dir.join(SUMMARY_CSV_FILE),
        };

        let narrative = Self::narrative(ctx)?;
        fs::write(&files.report, narrative).map_err(io_err(&files.report))?;

        let json = Self::summary_json(ctx)?;
        fs::write(&files.summary_json, json).map_err(io_err(&files.summary_json))?;

        let mut df = ctx.table.to_dataframe()?;
        let file = File::create(&files.summary_csv).map_err(io_err(&files.summary_csv))?;
        CsvWriter::new(file).include_header(true).finish(&mut df)?;

        info!(dir = %output_dir.display(), "report written");
        Ok(files)
    }

    pub fn summary_json(ctx: &ReportContext<'_>) -> Result<String, ReportError> {
        let summary = ReportSummary {
            cutoff_year: ctx.cutoff_year,
            data_quality: ctx.quality,
            coverage: ctx.coverage,
            total_casualties: ctx.table.total_casualties(),
            total_economic_loss: ctx.table.total_economic_loss(),
            categories: ctx.table.iter().collect(),
            casualties_per_event: &ctx.casualty_stats,
            economic_loss_per_event: &ctx.economic_loss_stats,
            volume_shift: &ctx.volume_shift,
            unclassified_event_types: &ctx.unclassified,
        };
        Ok(serde_json::to_string_pretty(&summary)?)
    }

    /// Render the markdown narrative. Category figures are looked up by
    /// category so a reordered table can never mislabel a value.
    pub fn narrative(ctx: &ReportContext<'_>) -> Result<String, std::fmt::Error> {
        let q = ctx.quality;
        let table = ctx.table;
        let mut out = String::new();

        writeln!(out, "# Impact of severe weather events in the United States")?;
        writeln!(out)?;
        writeln!(
            out,
            "Storm events from the NOAA storm database, grouped into {} storm categories \
             and ranked by harm to population health and by economic consequences.",
            Category::ALL.len()
        )?;
        writeln!(out)?;

        writeln!(out, "## Data processing")?;
        writeln!(out)?;
        writeln!(
            out,
            "- Loaded {} records from `{}`.",
            format_count(q.rows_loaded as u64),
            ctx.source.display()
        )?;
        if q.rows_rejected() > 0 {
            writeln!(
                out,
                "- Rejected {} records: {} with a malformed begin date, {} with an invalid numeric value.",
                format_count(q.rows_rejected() as u64),
                format_count(q.malformed_dates as u64),
                format_count(q.invalid_numeric as u64)
            )?;
            for (field, count) in &q.missing_numeric {
                writeln!(
                    out,
                    "  - {} records missing `{field}`.",
                    format_count(*count as u64)
                )?;
            }
        } else {
            writeln!(out, "- No records were rejected for missing or malformed fields.")?;
        }
        writeln!(
            out,
            "- Dropped {} records reporting no fatalities, injuries, property or crop damage.",
            format_count(q.dropped_no_damage as u64)
        )?;
        writeln!(
            out,
            "- Dropped {} records dated before {}.",
            format_count(q.dropped_before_cutoff as u64),
            ctx.cutoff_year
        )?;
        writeln!(
            out,
            "- Kept {} events for analysis.",
            format_count(q.rows_kept as u64)
        )?;
        let coverage = ctx.coverage;
        if let (Some(first), Some(last)) = (coverage.first_date, coverage.last_date) {
            writeln!(
                out,
                "- Kept events run from {first} to {last} across {} states and territories and {} counties.",
                coverage.states,
                format_count(coverage.counties as u64)
            )?;
        }
        writeln!(out)?;

        let shift = &ctx.volume_shift;
        write!(
            out,
            "Recorded volume averaged {:.0} events per year before {} and {:.0} per year from {} onward",
            shift.mean_before, shift.cutoff_year, shift.mean_from, shift.cutoff_year
        )?;
        match shift.ratio() {
            Some(ratio) => writeln!(
                out,
                " ({ratio:.1}x). Earlier years mostly reflect narrower reporting rather than \
                 fewer events, so comparisons start in {}.",
                shift.cutoff_year
            )?,
            None => writeln!(out, ".")?,
        }
        writeln!(out)?;
        Self::write_chart(&mut out, &ctx.volume_chart)?;

        writeln!(out, "## Harm to population health")?;
        writeln!(out)?;
        if let Some(top) = table.ranked_by_casualties().first() {
            writeln!(
                out,
                "**{}** caused the most casualties: {} ({} fatalities, {} injuries) across {} events.",
                top.category,
                format_count(top.total_casualties),
                format_count(top.total_fatalities),
                format_count(top.total_injuries),
                format_count(top.event_count as u64)
            )?;
            writeln!(out)?;
        }
        writeln!(
            out,
            "Casualties across all categories: {}.",
            format_count(table.total_casualties())
        )?;
        writeln!(out)?;
        Self::write_highlights(&mut out, ctx)?;
        writeln!(out, "| Category | Events | Fatalities | Injuries | Casualties |")?;
        writeln!(out, "|---|---:|---:|---:|---:|")?;
        for s in table.ranked_by_casualties() {
            writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                s.category,
                format_count(s.event_count as u64),
                format_count(s.total_fatalities),
                format_count(s.total_injuries),
                format_count(s.total_casualties)
            )?;
        }
        writeln!(out)?;
        Self::write_chart(&mut out, &ctx.casualty_chart)?;
        Self::write_stats(&mut out, "Casualties per event", &ctx.casualty_stats, |v| {
            format!("{v:.2}")
        })?;

        writeln!(out, "## Economic consequences")?;
        writeln!(out)?;
        if let Some(top) = table.ranked_by_economic_loss().first() {
            writeln!(
                out,
                "**{}** caused the greatest economic loss: {} ({} property, {} crop).",
                top.category,
                format_dollars(top.total_economic_loss),
                format_dollars(top.total_property_damage),
                format_dollars(top.total_crop_damage)
            )?;
            writeln!(out)?;
        }
        writeln!(
            out,
            "Total economic loss across all categories: {}.",
            format_dollars(table.total_economic_loss())
        )?;
        writeln!(out)?;
        writeln!(out, "| Category | Property damage | Crop damage | Economic loss |")?;
        writeln!(out, "|---|---:|---:|---:|")?;
        for s in table.ranked_by_economic_loss() {
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                s.category,
                format_dollars(s.total_property_damage),
                format_dollars(s.total_crop_damage),
                format_dollars(s.total_economic_loss)
            )?;
        }
        writeln!(out)?;
        Self::write_chart(&mut out, &ctx.economic_chart)?;
        Self::write_stats(
            &mut out,
            "Economic loss per event",
            &ctx.economic_loss_stats,
            format_dollars,
        )?;
        Self::write_unclassified(&mut out, &ctx.unclassified)?;

        Ok(out)
    }

    fn write_highlights(out: &mut String, ctx: &ReportContext<'_>) -> std::fmt::Result {
        if ctx.highlights.is_empty() {
            return Ok(());
        }
        for &category in &ctx.highlights {
            let events = ctx.table.get(category).map(|s| s.event_count).unwrap_or(0);
            writeln!(
                out,
                "- {category}: {} casualties and {} economic loss across {} events.",
                format_count(ctx.table.casualties(category)),
                format_dollars(ctx.table.economic_loss(category)),
                format_count(events as u64)
            )?;
        }
        writeln!(out)
    }

    fn write_unclassified(out: &mut String, unclassified: &[EventTypeTotals]) -> std::fmt::Result {
        if unclassified.is_empty() {
            return Ok(());
        }
        writeln!(out, "## Unclassified event types")?;
        writeln!(out)?;
        writeln!(out, "Event types matching no category rule, by casualties:")?;
        writeln!(out)?;
        writeln!(out, "| Event type | Events | Casualties | Economic loss |")?;
        writeln!(out, "|---|---:|---:|---:|")?;
        for t in unclassified {
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                t.event_type,
                format_count(t.events as u64),
                format_count(t.casualties),
                format_dollars(t.economic_loss)
            )?;
        }
        writeln!(out)
    }

    fn write_chart(out: &mut String, chart: &Option<ChartLink>) -> std::fmt::Result {
        if let Some(chart) = chart {
            writeln!(out, "![{}]({})", chart.alt, chart.file)?;
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_stats(
        out: &mut String,
        title: &str,
        stats: &DescriptiveStats,
        fmt_value: impl Fn(f64) -> String,
    ) -> std::fmt::Result {
        if stats.count == 0 {
            return Ok(());
        }
        writeln!(
            out,
            "{title}: mean {}, median {}, std {}, 95th percentile {}, max {} (n = {}).",
            fmt_value(stats.mean),
            fmt_value(stats.median),
            fmt_value(stats.std),
            fmt_value(stats.p95),
            fmt_value(stats.max),
            format_count(stats.count as u64)
        )?;
        writeln!(out)
    }
}

/// Integer with thousands separators: `1234567` -> `1,234,567`.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Dollar amount scaled to a readable unit.
pub fn format_dollars(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("${:.2} billion", value / 1e9)
    } else if abs >= 1e6 {
        format!("${:.2} million", value / 1e6)
    } else if abs >= 1e3 {
        format!("${:.1} thousand", value / 1e3)
    } else {
        format!("${value:.0}")
    }
}
