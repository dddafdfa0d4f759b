//! The single-page HTML report.

use std::fmt::Write;

use crate::analysis::NormalReturnModel;
use crate::config::{ANALYSIS, PERSISTENCE};
use crate::engine::StudyOutput;
use crate::models::ConfidenceInterval;
use crate::utils::time_utils;

use super::charts::escape_xml as esc;
use super::{mean_ar_figure, mean_car_figure, price_figure};

const STYLE: &str = "body{font-family:Arial,sans-serif;margin:24px;color:#222}\
table{border-collapse:collapse;margin:8px 0 20px}\
th,td{border:1px solid #ddd;padding:4px 8px;font-size:13px;text-align:left}\
th{background:#f4f4f4}td.num{text-align:right}\
.caution{color:#b35900}.muted{color:#777;font-size:12px}\
.charts img{max-width:48%;margin-right:1%}";

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn pct_opt(value: Option<f64>) -> String {
    value.map(pct).unwrap_or_else(|| "n/a".to_string())
}

fn ci_text(ci: Option<ConfidenceInterval>) -> String {
    match ci {
        Some(ci) => format!("[{}, {}]", pct(ci.low), pct(ci.high)),
        None => "n/a".to_string(),
    }
}

fn figure_src(file_name: &str) -> String {
    esc(&format!("{}/{}", PERSISTENCE.figures_subdir, file_name))
}

pub fn render_html(output: &StudyOutput) -> String {
    let mut html = String::new();
    // Writing to a String never fails
    let _ = write_document(&mut html, output);
    html
}

fn write_document(html: &mut String, output: &StudyOutput) -> std::fmt::Result {
    let summary = &output.summary;
    writeln!(html, "<!DOCTYPE html><html><head><meta charset=\"utf-8\">")?;
    writeln!(html, "<title>Crypto event study</title><style>{}</style></head><body>", STYLE)?;
    writeln!(html, "<h1>Crypto event study</h1>")?;

    writeln!(html, "<h2>Summary</h2><ul>")?;
    writeln!(html, "<li>Price source: {}</li>", esc(&summary.provider))?;
    writeln!(
        html,
        "<li>Events loaded: {} ({} rows rejected)</li>",
        summary.events_loaded,
        summary.rejected_rows.len()
    )?;
    writeln!(
        html,
        "<li>Events evaluated: {}, skipped: {}</li>",
        output.results.len(),
        summary.skipped_events.len()
    )?;
    writeln!(
        html,
        "<li>Overall mean CAR at +{}h: {} (95% CI {})</li></ul>",
        output.method.windows.event,
        pct_opt(output.overall.final_mean_car()),
        ci_text(output.overall.car_ci)
    )?;

    write_ranking(html, output)?;
    write_symbol_charts(html, output)?;
    write_categories(html, output)?;
    write_events(html, output)?;
    write_skips(html, output)?;
    write_method_notes(html, output)?;

    writeln!(html, "</body></html>")
}

fn write_ranking(html: &mut String, output: &StudyOutput) -> std::fmt::Result {
    writeln!(html, "<h2>Ranking by final mean CAR</h2>")?;
    writeln!(
        html,
        "<table><tr><th>#</th><th>Symbol</th><th>Events</th><th>Final mean CAR</th><th>Std dev</th><th>95% CI</th><th></th></tr>"
    )?;
    for (rank, row) in output.ranking.iter().enumerate() {
        let caution = if row.small_sample {
            format!(
                "<span class=\"caution\">small sample (n &lt; {})</span>",
                ANALYSIS.aggregate.small_sample_threshold
            )
        } else {
            String::new()
        };
        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td>{}</td><td>{}</td></tr>",
            rank + 1,
            esc(&row.symbol),
            row.n_events,
            pct(row.final_mean_car),
            pct_opt(row.final_car_std),
            ci_text(row.car_ci),
            caution
        )?;
    }
    writeln!(html, "</table>")
}

fn write_symbol_charts(html: &mut String, output: &StudyOutput) -> std::fmt::Result {
    writeln!(html, "<h2>Mean AR / CAR by symbol</h2>")?;
    for agg in &output.by_symbol {
        writeln!(
            html,
            "<h3>{} <span class=\"muted\">({} events)</span></h3><div class=\"charts\">",
            esc(&agg.label),
            agg.n_events()
        )?;
        writeln!(
            html,
            "<img src=\"{}\" alt=\"mean AR\"><img src=\"{}\" alt=\"mean CAR\"></div>",
            figure_src(&mean_ar_figure(&agg.label)),
            figure_src(&mean_car_figure(&agg.label))
        )?;
        if !agg.excluded.is_empty() {
            writeln!(html, "<p class=\"muted\">Excluded from this aggregate:")?;
            for ex in &agg.excluded {
                write!(html, " {} ({});", esc(&ex.event_id), esc(&ex.reason))?;
            }
            writeln!(html, "</p>")?;
        }
    }
    Ok(())
}

fn write_categories(html: &mut String, output: &StudyOutput) -> std::fmt::Result {
    writeln!(html, "<h2>By category</h2>")?;
    writeln!(
        html,
        "<table><tr><th>Category</th><th>Events</th><th>Mean AR at t0</th><th>Final mean CAR</th><th>95% CI</th></tr>"
    )?;
    for agg in &output.by_category {
        writeln!(
            html,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td>{}</td></tr>",
            esc(agg.label.trim_start_matches("category: ")),
            agg.n_events(),
            pct_opt(agg.mean_ar.first().copied()),
            pct_opt(agg.final_mean_car()),
            ci_text(agg.car_ci)
        )?;
    }
    writeln!(html, "</table>")
}

fn write_events(html: &mut String, output: &StudyOutput) -> std::fmt::Result {
    writeln!(html, "<h2>Events</h2>")?;
    writeln!(
        html,
        "<table><tr><th>ID</th><th>Time (UTC)</th><th>Symbol</th><th>Category</th><th>Dir</th><th>Headline</th><th>Final CAR</th><th>Bootstrap CI</th><th>Price</th></tr>"
    )?;
    for result in &output.results {
        let (headline, source) = output
            .event(&result.event_id)
            .map(|e| (e.headline.as_str(), e.source.as_str()))
            .unwrap_or(("", ""));
        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{} <span class=\"muted\">{}</span></td><td class=\"num\">{}</td><td>{}</td><td><a href=\"{}\">chart</a></td></tr>",
            esc(&result.event_id),
            time_utils::format_utc(&result.event_ts),
            esc(&result.symbol),
            esc(&result.category),
            result.direction.short(),
            esc(headline),
            esc(source),
            pct_opt(result.final_car()),
            ci_text(result.car_ci),
            figure_src(&price_figure(&result.symbol, &result.event_id))
        )?;
    }
    writeln!(html, "</table>")
}

fn write_skips(html: &mut String, output: &StudyOutput) -> std::fmt::Result {
    let summary = &output.summary;
    if summary.skipped_symbols.is_empty()
        && summary.skipped_events.is_empty()
        && summary.rejected_rows.is_empty()
    {
        return Ok(());
    }
    writeln!(html, "<h2>Skipped</h2><ul>")?;
    for s in &summary.skipped_symbols {
        writeln!(html, "<li>Symbol {}: {}</li>", esc(&s.symbol), esc(&s.reason))?;
    }
    for s in &summary.skipped_events {
        writeln!(
            html,
            "<li>Event {} ({}): {}</li>",
            esc(&s.event_id),
            esc(&s.symbol),
            esc(&s.reason)
        )?;
    }
    for row in &summary.rejected_rows {
        writeln!(
            html,
            "<li>Event file line {}{}: {}</li>",
            row.line,
            row.event_id
                .as_ref()
                .map(|id| format!(" ({})", esc(id)))
                .unwrap_or_default(),
            esc(&row.message)
        )?;
    }
    writeln!(html, "</ul>")
}

fn write_method_notes(html: &mut String, output: &StudyOutput) -> std::fmt::Result {
    let method = &output.method;
    writeln!(html, "<h2>Method</h2><ul>")?;
    writeln!(
        html,
        "<li>{} {} returns. The event bar is the last bar at or before the event time.</li>",
        method.interval, method.return_kind
    )?;
    writeln!(
        html,
        "<li>Estimation window: the {} bars before the event bar. Event window: offsets 0 to +{}.</li>",
        method.windows.estimation, method.windows.event
    )?;
    match &method.model {
        NormalReturnModel::MeanAdjusted => writeln!(
            html,
            "<li>AR = return minus the estimation-window mean return. CAR is the running sum of AR.</li>"
        )?,
        NormalReturnModel::MarketModel {
            benchmark,
            min_observations,
        } => writeln!(
            html,
            "<li>AR = return minus (alpha + beta x {} return), alpha and beta by OLS over the estimation window (at least {} matched bars, otherwise zero). CAR is the running sum of AR.</li>",
            esc(benchmark),
            min_observations
        )?,
    }
    match method.bootstrap_iterations {
        Some(n) => writeln!(
            html,
            "<li>Per-event CAR interval: {} bootstrap draws of consecutive estimation-window returns, 2.5% and 97.5% quantiles.</li>",
            n
        )?,
        None => writeln!(html, "<li>Per-event bootstrap intervals disabled.</li>")?,
    }
    writeln!(
        html,
        "<li>Aggregate CAR interval: 2.5% and 97.5% quantiles of the events' final CAR, shown with at least {} events.</li>",
        ANALYSIS.aggregate.min_events_for_ci
    )?;
    writeln!(html, "</ul>")
}
