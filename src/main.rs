//! Storm Impact - storm event casualty & economic loss report
//!
//! Loads the NOAA storm database, classifies events into storm categories and
//! writes bar charts, a narrative report and summary tables.

mod charts;
mod classify;
mod config;
mod data;
mod fetch;
mod report;
mod stats;

use anyhow::{Context, Result};
use charts::{BarChart, StaticChartRenderer};
use clap::Parser;
use classify::Classifier;
use config::ReportConfig;
use data::{DataLoader, DataProcessor};
use fetch::DatasetFetcher;
use report::{ChartLink, ReportContext, ReportWriter};
use stats::Aggregator;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storm_impact", version, about = "Storm event casualty & economic loss report")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Source dataset (.csv.bz2 or .csv); downloaded here when absent
    #[arg(long)]
    data: Option<PathBuf>,
    /// Directory receiving charts and report files
    #[arg(long)]
    output: Option<PathBuf>,
    /// First year included in the analysis
    #[arg(long)]
    cutoff_year: Option<i32>,
    /// Fail instead of downloading a missing dataset
    #[arg(long)]
    no_fetch: bool,
    /// Open the generated report when done
    #[arg(long)]
    open: bool,
    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<ReportConfig> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ReportConfig::default(),
        };
        if let Some(data) = &self.data {
            config.data_path = data.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(cutoff_year) = self.cutoff_year {
            config.cutoff_year = cutoff_year;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Render one chart, logging instead of failing so the text report is
/// still produced when chart output is unavailable (e.g. no system fonts).
fn render_chart(chart: &BarChart, dir: &Path, file: &str, config: &ReportConfig) -> Option<ChartLink> {
    let path = dir.join(file);
    match StaticChartRenderer::render_png(chart, &path, config.chart_width, config.chart_height) {
        Ok(()) => Some(ChartLink {
            alt: chart.title.clone(),
            file: file.to_string(),
        }),
        Err(error) => {
            warn!(%error, "skipping chart");
            None
        }
    }
}

fn run(config: &ReportConfig, allow_download: bool) -> Result<PathBuf> {
    let fetcher = DatasetFetcher::new(
        &config.source_url,
        Duration::from_secs(config.download_timeout_seconds),
    );
    let source = fetcher
        .ensure(&config.data_path, allow_download)
        .context("failed to obtain storm dataset")?;

    let mut loader = DataLoader::new();
    loader
        .load(&source)
        .with_context(|| format!("failed to load {}", source.display()))?;
    if loader.get_row_count() == 0 {
        warn!(path = %source.display(), "storm dataset has no rows");
    }
    let raw = loader.records().context("failed to extract storm records")?;

    debug!(
        redundant = ?Classifier::redundant_rules(),
        "category rules shadowed by an earlier identical rule"
    );

    let prepared = DataProcessor::prepare(&raw, config.cutoff_year);
    drop(raw);

    let table = Aggregator::aggregate(&prepared.records);
    info!(
        categories = table.len(),
        casualties = table.total_casualties(),
        economic_loss = table.total_economic_loss(),
        "aggregated storm categories"
    );
    if table.is_empty() {
        warn!(cutoff_year = config.cutoff_year, "no storm events left after filtering");
    }

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("failed to create output directory {}", config.output_dir.display())
    })?;

    let mut ctx = ReportContext::new(&source, &prepared, &table);
    ctx.highlights = config.highlights();
    ctx.casualty_chart = render_chart(
        &BarChart::casualties_by_category(&table),
        &config.output_dir,
        report::CASUALTY_CHART_FILE,
        config,
    );
    ctx.economic_chart = render_chart(
        &BarChart::economic_loss_by_category(&table),
        &config.output_dir,
        report::ECONOMIC_CHART_FILE,
        config,
    );
    ctx.volume_chart = render_chart(
        &BarChart::records_per_year(&prepared.records_per_year, prepared.cutoff_year),
        &config.output_dir,
        report::VOLUME_CHART_FILE,
        config,
    );

    let files = ReportWriter::write_all(&ctx, &config.output_dir).context("failed to write report")?;
    debug!(
        json = %files.summary_json.display(),
        csv = %files.summary_csv.display(),
        "summary tables written"
    );
    Ok(files.report)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.resolve_config()?;
    let report = run(&config, !cli.no_fetch)?;
    info!(path = %report.display(), "storm report ready");

    if cli.open {
        if let Err(error) = open::that(&report) {
            warn!(%error, path = %report.display(), "could not open report");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "storm_impact",
            "--data",
            "storm.csv",
            "--output",
            "out",
            "--cutoff-year",
            "1996",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.data_path, PathBuf::from("storm.csv"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.cutoff_year, 1996);
        assert_eq!(config.chart_width, ReportConfig::default().chart_width);
    }

    #[test]
    fn cli_rejects_invalid_cutoff() {
        let cli = Cli::parse_from(["storm_impact", "--cutoff-year", "3000"]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn cli_layers_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storm.toml");
        std::fs::write(&path, "cutoff_year = 2000\nchart_width = 640\n").unwrap();

        let cli = Cli::parse_from(["storm_impact", "--config", path.to_str().unwrap(), "--no-fetch"]);
        assert!(cli.no_fetch);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.cutoff_year, 2000);
        assert_eq!(config.chart_width, 640);
    }

    #[test]
    fn run_produces_report_from_local_csv() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("storm.csv");
        std::fs::write(
            &data_path,
            "BGN_DATE,STATE,COUNTYNAME,EVTYPE,FATALITIES,INJURIES,PROPDMG,PROPDMGEXP,CROPDMG,CROPDMGEXP\n\
             3/4/1995 0:00:00,AL,MOBILE,TSTM WIND,1,0,10,K,0,\n\
             7/9/1994 0:00:00,AL,MOBILE,RIVER FLOOD,0,2,5,M,0,\n\
             8/1/1990 0:00:00,AL,MOBILE,EXCESSIVE HEAT,3,0,0,,0,\n",
        )
        .unwrap();

        let config = ReportConfig {
            data_path,
            output_dir: dir.path().join("report"),
            ..ReportConfig::default()
        };
        let report_path = run(&config, false).unwrap();
        let text = std::fs::read_to_string(report_path).unwrap();
        assert!(text.contains("Kept 2 events for analysis."));
        assert!(text.contains("- Tornado: 0 casualties"));

        let json = std::fs::read_to_string(dir.path().join("report").join(report::SUMMARY_JSON_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(json["total_casualties"], 3);
        assert_eq!(json["total_economic_loss"], 5_010_000.0);
    }
}
