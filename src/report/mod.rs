//! Report rendering: SVG figures, the HTML page and a JSON dump of all results.

pub mod charts;
pub mod html;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;

use crate::config::{PERSISTENCE, PLOT};
use crate::domain::Symbol;
use crate::engine::StudyOutput;
use crate::models::AggregateResult;
use charts::HorizontalGuide;

fn stem(symbol: &str) -> String {
    Symbol::new(symbol, 0).file_stem()
}

fn id_stem(event_id: &str) -> String {
    event_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub fn mean_ar_figure(symbol: &str) -> String {
    format!("{}_mean_ar.svg", stem(symbol))
}

pub fn mean_car_figure(symbol: &str) -> String {
    format!("{}_mean_car.svg", stem(symbol))
}

pub fn price_figure(symbol: &str, event_id: &str) -> String {
    format!("{}_{}_price.svg", stem(symbol), id_stem(event_id))
}

/// Files written by one render.
#[derive(Debug, Clone, Default)]
pub struct ReportPaths {
    pub html: PathBuf,
    pub json: PathBuf,
    pub figures: Vec<PathBuf>,
}

pub struct ReportRenderer {
    out_dir: PathBuf,
}

impl ReportRenderer {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.out_dir.join(PERSISTENCE.figures_subdir)
    }

    pub fn render(&self, output: &StudyOutput) -> Result<ReportPaths> {
        let figures_dir = self.figures_dir();
        fs::create_dir_all(&figures_dir)
            .with_context(|| format!("failed to create {}", figures_dir.display()))?;

        let mut paths = ReportPaths::default();
        for agg in &output.by_symbol {
            paths.figures.extend(self.write_aggregate_charts(&figures_dir, agg)?);
        }
        for result in &output.results {
            let Some(series) = output.prices.get(&result.symbol) else {
                continue;
            };
            let context = Duration::hours(PLOT.price_context_hours);
            let points = series.between(result.event_ts - context, result.event_ts + context);
            let title = format!("{} around {}", result.symbol, result.event_id);
            if let Some(svg) = charts::price_chart(&title, &points, result.event_ts) {
                let path = figures_dir.join(price_figure(&result.symbol, &result.event_id));
                write_file(&path, &svg)?;
                paths.figures.push(path);
            }
        }

        paths.html = self.out_dir.join(PERSISTENCE.html_filename);
        write_file(&paths.html, &html::render_html(output))?;

        paths.json = self.out_dir.join(PERSISTENCE.json_filename);
        let json = serde_json::to_string_pretty(output).context("failed to serialise results")?;
        write_file(&paths.json, &json)?;

        log::info!(
            "Report written to {} ({} figures)",
            paths.html.display(),
            paths.figures.len()
        );
        Ok(paths)
    }

    fn write_aggregate_charts(&self, dir: &Path, agg: &AggregateResult) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let ar_title = format!("{}: mean AR (n={})", agg.label, agg.n_events());
        if let Some(svg) = charts::offset_chart(&ar_title, &agg.mean_ar, PLOT.ar_color, &[]) {
            let path = dir.join(mean_ar_figure(&agg.label));
            write_file(&path, &svg)?;
            written.push(path);
        }

        let guides: Vec<HorizontalGuide> = agg
            .car_ci
            .map(|ci| {
                vec![
                    HorizontalGuide {
                        value: ci.low,
                        label: "2.5%".to_string(),
                    },
                    HorizontalGuide {
                        value: ci.high,
                        label: "97.5%".to_string(),
                    },
                ]
            })
            .unwrap_or_default();
        let car_title = format!("{}: mean CAR (n={})", agg.label, agg.n_events());
        if let Some(svg) = charts::offset_chart(&car_title, &agg.mean_car, PLOT.car_color, &guides) {
            let path = dir.join(mean_car_figure(&agg.label));
            write_file(&path, &svg)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
