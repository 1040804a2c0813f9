//! Static Chart Renderer
//! Generates PNG bar charts for the storm report.
//!
//! Charts:
//! 1. Total casualties by category
//! 2. Total economic loss by category (billions of USD)
//! 3. Records per year, bars from the cutoff year highlighted

use crate::stats::SummaryTable;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

// Colors
const BAR: RGBColor = RGBColor(91, 155, 213);
const BAR_MUTED: RGBColor = RGBColor(200, 200, 200);
const BAR_HIGHLIGHT: RGBColor = RGBColor(237, 125, 49);

const FONT: &str = "sans-serif";

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Nothing to plot for {0}")]
    Empty(String),
    #[error("Failed to draw {chart}: {message}")]
    Draw { chart: String, message: String },
}

/// A labelled bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub highlight: bool,
}

/// Bars plus axis text for one chart.
#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
    pub bars: Vec<Bar>,
}

impl BarChart {
    /// Category vs total casualties, largest first.
    pub fn casualties_by_category(table: &SummaryTable) -> Self {
        let bars = table
            .ranked_by_casualties()
            .into_iter()
            .map(|s| Bar {
                label: s.category.label().to_string(),
                value: s.total_casualties as f64,
                highlight: false,
            })
            .collect();

        Self {
            title: "Total casualties by storm category".to_string(),
            x_desc: "Category".to_string(),
            y_desc: "Fatalities + injuries".to_string(),
            bars,
        }
    }

    /// Category vs total economic loss in billions of dollars, largest first.
    pub fn economic_loss_by_category(table: &SummaryTable) -> Self {
        let bars = table
            .ranked_by_economic_loss()
            .into_iter()
            .map(|s| Bar {
                label: s.category.label().to_string(),
                value: s.total_economic_loss / 1e9,
                highlight: false,
            })
            .collect();

        Self {
            title: "Total economic loss by storm category".to_string(),
            x_desc: "Category".to_string(),
            y_desc: "Property + crop damage (billion USD)".to_string(),
            bars,
        }
    }

    /// Records per year, highlighting years kept by the cutoff.
    pub fn records_per_year(per_year: &BTreeMap<i32, usize>, cutoff_year: i32) -> Self {
        let bars = per_year
            .iter()
            .map(|(&year, &count)| Bar {
                label: year.to_string(),
                value: count as f64,
                highlight: year >= cutoff_year,
            })
            .collect();

        Self {
            title: format!("Recorded events per year (analysis from {cutoff_year})"),
            x_desc: "Year".to_string(),
            y_desc: "Records".to_string(),
            bars,
        }
    }

    /// Upper bound of the value axis with headroom above the tallest bar.
    pub fn y_max(&self) -> f64 {
        let max = self.bars.iter().map(|b| b.value).fold(0.0, f64::max);
        if max > 0.0 {
            max * 1.1
        } else {
            1.0
        }
    }

    /// Show at most `max_labels` x-axis labels so long series stay readable.
    pub fn label_stride(&self, max_labels: usize) -> usize {
        self.bars.len().div_ceil(max_labels.max(1)).max(1)
    }
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render a bar chart to a PNG file.
    pub fn render_png(chart: &BarChart, path: &Path, width: u32, height: u32) -> Result<(), ChartError> {
        if chart.bars.is_empty() {
            return Err(ChartError::Empty(chart.title.clone()));
        }

        let draw_err = |e: &dyn std::fmt::Display| ChartError::Draw {
            chart: chart.title.clone(),
            message: e.to_string(),
        };

        let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| draw_err(&e))?;

        let n = chart.bars.len() as u32;
        let y_max = chart.y_max();
        let stride = chart.label_stride(25);
        let labels: Vec<&str> = chart.bars.iter().map(|b| b.label.as_str()).collect();

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT, 28))
            .margin(20)
            .x_label_area_size(90)
            .y_label_area_size(90)
            .build_cartesian_2d((0u32..n).into_segmented(), 0f64..y_max)
            .map_err(|e| draw_err(&e))?;

        ctx.configure_mesh()
            .disable_x_mesh()
            .x_desc(chart.x_desc.as_str())
            .y_desc(chart.y_desc.as_str())
            .x_labels(labels.len())
            .x_label_style(
                (FONT, 14)
                    .into_font()
                    .transform(FontTransform::Rotate90)
                    .color(&BLACK),
            )
            .x_label_formatter(&|x: &SegmentValue<u32>| match x {
                SegmentValue::CenterOf(i) if (*i as usize) % stride == 0 => {
                    labels.get(*i as usize).map(|s| s.to_string()).unwrap_or_default()
                }
                _ => String::new(),
            })
            .y_label_formatter(&|y: &f64| {
                if y_max < 10.0 {
                    format!("{y:.1}")
                } else {
                    format!("{y:.0}")
                }
            })
            .draw()
            .map_err(|e| draw_err(&e))?;

        for (i, bar) in chart.bars.iter().enumerate() {
            let color = if bar.highlight {
                BAR_HIGHLIGHT
            } else if chart.bars.iter().any(|b| b.highlight) {
                BAR_MUTED
            } else {
                BAR
            };
            ctx.draw_series(
                Histogram::vertical(&ctx)
                    .style(color.filled())
                    .margin(4)
                    .data([(i as u32, bar.value)]),
            )
            .map_err(|e| draw_err(&e))?;
        }

        root.present().map_err(|e| draw_err(&e))?;
        debug!(path = %path.display(), bars = chart.bars.len(), "rendered chart");
        Ok(())
    }
}
